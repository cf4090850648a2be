//! Schema fragments - the recursive node type of a resource schema.
//!
//! A fragment carries the closed keyword set of the resource type format.
//! Unknown keywords are dropped during parsing so new schema revisions never
//! break loading.

use indexmap::IndexMap;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// The `type` keyword: a single type name or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<String>),
}

impl SchemaType {
    /// Returns true if `name` is one of the declared types.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            SchemaType::Single(t) => t == name,
            SchemaType::Multiple(ts) => ts.iter().any(|t| t == name),
        }
    }

    /// All declared type names.
    pub fn names(&self) -> Vec<&str> {
        match self {
            SchemaType::Single(t) => vec![t.as_str()],
            SchemaType::Multiple(ts) => ts.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for SchemaType {
    fn from(name: &str) -> Self {
        SchemaType::Single(name.to_string())
    }
}

/// The `additionalProperties` keyword: a flag or a schema for extra keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaFragment>),
}

/// Cross-resource relationship annotation (`relationshipRef`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRef {
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub property_path: String,
}

/// A node of a resource schema: the root, a property, an array item, a
/// definition, or a composition alternative.
///
/// A fragment with `reference` set is unresolved; see
/// [`RefResolver`](crate::RefResolver).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFragment {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub schema_type: Option<SchemaType>,
    #[serde(
        rename = "$ref",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(
        rename = "enum",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub enum_values: Option<Vec<Value>>,
    #[serde(
        rename = "const",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub const_value: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub insertion_order: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub array_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub relationship_ref: Option<RelationshipRef>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaFragment>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaFragment>>,
    #[serde(
        default,
        deserialize_with = "string_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub required: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<IndexMap<String, SchemaFragment>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SchemaFragment>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaFragment>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SchemaFragment>>,
}

// Copy every listed field from `$top` when it is set there.
macro_rules! take_set_fields {
    ($merged:ident, $top:ident; $($field:ident),+ $(,)?) => {
        $(
            if $top.$field.is_some() {
                $merged.$field = $top.$field.clone();
            }
        )+
    };
}

impl SchemaFragment {
    /// An empty fragment with the given type.
    pub fn of_type(name: &str) -> Self {
        Self {
            schema_type: Some(SchemaType::from(name)),
            ..Self::default()
        }
    }

    /// A fragment that only points at another fragment.
    pub fn reference_to(pointer: impl Into<String>) -> Self {
        Self {
            reference: Some(pointer.into()),
            ..Self::default()
        }
    }

    /// Returns true if `type` names `name`.
    pub fn is_type(&self, name: &str) -> bool {
        self.schema_type
            .as_ref()
            .map(|t| t.includes(name))
            .unwrap_or(false)
    }

    /// Returns true if any of `oneOf`, `anyOf`, `allOf` is present and non-empty.
    pub fn has_composition(&self) -> bool {
        [&self.one_of, &self.any_of, &self.all_of]
            .into_iter()
            .any(|list| list.as_ref().map(|l| !l.is_empty()).unwrap_or(false))
    }

    /// Returns true if the fragment declares at least one direct property.
    pub fn has_properties(&self) -> bool {
        self.properties
            .as_ref()
            .map(|p| !p.is_empty())
            .unwrap_or(false)
    }

    /// Returns true if array elements can be addressed through this fragment.
    pub fn accepts_items(&self) -> bool {
        self.items.is_some() && (self.schema_type.is_none() || self.is_type("array"))
    }

    /// Returns true if the fragment is an object (or untyped) that declares no
    /// shape below itself.
    ///
    /// Free-form JSON properties (`"type": "object"` with nothing else) are opaque.
    pub fn is_opaque(&self) -> bool {
        (self.schema_type.is_none() || self.is_type("object"))
            && !self.has_properties()
            && self
                .pattern_properties
                .as_ref()
                .map(|p| p.is_empty())
                .unwrap_or(true)
            && self.items.is_none()
            && !self.has_composition()
            && !matches!(
                self.additional_properties,
                Some(AdditionalProperties::Schema(_))
            )
    }

    /// Look up a direct property by name.
    pub fn property(&self, name: &str) -> Option<&SchemaFragment> {
        self.properties.as_ref().and_then(|p| p.get(name))
    }

    /// The `required` list, empty when absent.
    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }

    /// Property names this fragment constrains: `required` if present,
    /// otherwise the declared property names.
    pub fn declared_names(&self) -> Vec<String> {
        let required = self.required_names();
        if !required.is_empty() {
            return required.to_vec();
        }
        self.properties
            .as_ref()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Composition alternatives in keyword order (`oneOf`, then `anyOf`, then `allOf`).
    pub fn alternatives(&self) -> impl Iterator<Item = &SchemaFragment> {
        [&self.one_of, &self.any_of, &self.all_of]
            .into_iter()
            .flatten()
            .flatten()
    }

    /// Copy of this fragment without its `$ref`.
    pub fn without_reference(&self) -> SchemaFragment {
        SchemaFragment {
            reference: None,
            ..self.clone()
        }
    }

    /// Copy of this fragment without composition keywords.
    pub fn without_composition(&self) -> SchemaFragment {
        SchemaFragment {
            one_of: None,
            any_of: None,
            all_of: None,
            ..self.clone()
        }
    }

    /// Merge `top` over this fragment.
    ///
    /// Every keyword set on `top` replaces this fragment's value, except
    /// `required` (ordered union), and `properties`/`patternProperties`
    /// (key union, `top` wins per key).
    pub fn overlay(&self, top: &SchemaFragment) -> SchemaFragment {
        let mut merged = self.clone();

        take_set_fields!(merged, top;
            schema_type, reference, description, title, pattern, enum_values,
            const_value, default, examples, format, minimum, maximum,
            exclusive_minimum, exclusive_maximum, multiple_of, min_length,
            max_length, min_items, max_items, unique_items, insertion_order,
            array_type, min_properties, max_properties, dependencies,
            relationship_ref, items, additional_properties, one_of, any_of,
            all_of,
        );

        merged.required = union_required(&self.required, &top.required);
        merged.properties = union_maps(&self.properties, &top.properties);
        merged.pattern_properties = union_maps(&self.pattern_properties, &top.pattern_properties);
        merged
    }
}

/// Ordered union of two `required` lists, duplicates removed.
pub(crate) fn union_required(
    base: &Option<Vec<String>>,
    top: &Option<Vec<String>>,
) -> Option<Vec<String>> {
    match (base, top) {
        (None, None) => None,
        _ => {
            let mut names: Vec<String> = Vec::new();
            for name in base.iter().flatten().chain(top.iter().flatten()) {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Some(names)
        }
    }
}

fn union_maps(
    base: &Option<IndexMap<String, SchemaFragment>>,
    top: &Option<IndexMap<String, SchemaFragment>>,
) -> Option<IndexMap<String, SchemaFragment>> {
    match (base, top) {
        (None, None) => None,
        (Some(b), None) => Some(b.clone()),
        (None, Some(t)) => Some(t.clone()),
        (Some(b), Some(t)) => {
            let mut merged = b.clone();
            for (key, value) in t {
                merged.insert(key.clone(), value.clone());
            }
            Some(merged)
        }
    }
}

/// Deserialize `T`, falling back to its default when the value has another
/// shape. Optional keywords never fail a load.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        debug!("dropping malformed keyword value: {}", err);
        T::default()
    }))
}

/// `required` as a list of strings; other forms (draft-03 booleans) are ignored.
fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        _ => None,
    })
}

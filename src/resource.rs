//! Resource schemas - the root aggregate for one resource type.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{derive_attributes, Attribute};
use crate::error::SchemaError;
use crate::fragment::{lenient, AdditionalProperties, SchemaFragment, SchemaType};
use crate::loader::{load_document_str, navigate_pointer};
use crate::path::PathResolver;
use crate::types::{canonical_path, path_segments, unescape_segment, PathOptions};

/// Top-level fields every resource schema document must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "typeName",
    "properties",
    "description",
    "primaryIdentifier",
    "additionalProperties",
];

/// Tagging metadata (`tagging`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tagging {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub taggable: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tag_on_create: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tag_updatable: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cloud_formation_system_tags: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub tag_property: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

/// One provisioning handler descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    #[serde(default, deserialize_with = "lenient")]
    pub permissions: Vec<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timeout_in_minutes: Option<u32>,
    /// Filter schema accepted by the `list` handler.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub handler_schema: Option<SchemaFragment>,
}

/// The `handlers` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Handlers {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub create: Option<Handler>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub read: Option<Handler>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub update: Option<Handler>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub delete: Option<Handler>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub list: Option<Handler>,
}

/// Provisioning operations a resource type may declare handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerOperation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl HandlerOperation {
    /// Parse an operation name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

impl Handlers {
    /// The handler for one operation, if declared.
    pub fn get(&self, operation: HandlerOperation) -> Option<&Handler> {
        match operation {
            HandlerOperation::Create => self.create.as_ref(),
            HandlerOperation::Read => self.read.as_ref(),
            HandlerOperation::Update => self.update.as_ref(),
            HandlerOperation::Delete => self.delete.as_ref(),
            HandlerOperation::List => self.list.as_ref(),
        }
    }
}

/// Console link metadata (`resourceLink`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    #[serde(default, deserialize_with = "lenient")]
    pub template_uri: String,
    #[serde(default, deserialize_with = "lenient")]
    pub mappings: IndexMap<String, String>,
}

/// Wire shape of a resource schema document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDocument {
    type_name: String,
    description: String,
    properties: IndexMap<String, SchemaFragment>,
    primary_identifier: Vec<String>,
    additional_properties: bool,
    #[serde(default, deserialize_with = "lenient")]
    definitions: IndexMap<String, SchemaFragment>,
    #[serde(default, deserialize_with = "lenient")]
    additional_identifiers: Vec<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    required: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    read_only_properties: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    write_only_properties: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    create_only_properties: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    deprecated_properties: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    conditional_create_only_properties: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    documentation_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    replacement_strategy: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    taggable: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    tagging: Option<Tagging>,
    #[serde(default, deserialize_with = "lenient")]
    handlers: Option<Handlers>,
    #[serde(default, deserialize_with = "lenient")]
    resource_link: Option<ResourceLink>,
    #[serde(default, deserialize_with = "lenient")]
    property_transform: IndexMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    type_configuration: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    one_of: Option<Vec<SchemaFragment>>,
    #[serde(default, deserialize_with = "lenient")]
    any_of: Option<Vec<SchemaFragment>>,
    #[serde(default, deserialize_with = "lenient")]
    all_of: Option<Vec<SchemaFragment>>,
}

/// A parsed resource type schema.
///
/// Immutable after construction and safe to share between threads. All
/// resolution produces new fragments; the source is never mutated.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    type_name: String,
    description: String,
    root: SchemaFragment,
    definitions: IndexMap<String, SchemaFragment>,
    primary_identifier: Vec<String>,
    additional_identifiers: Vec<Vec<String>>,
    read_only: Vec<String>,
    write_only: Vec<String>,
    create_only: Vec<String>,
    deprecated: Vec<String>,
    conditional_create_only: Vec<String>,
    source_url: Option<String>,
    documentation_url: Option<String>,
    replacement_strategy: Option<String>,
    taggable: Option<bool>,
    tagging: Option<Tagging>,
    handlers: Option<Handlers>,
    resource_link: Option<ResourceLink>,
    property_transform: IndexMap<String, String>,
    type_configuration: Option<Value>,
    document: Value,
    attributes: OnceCell<Vec<Attribute>>,
    /// Compiled `patternProperties` keys; `None` for invalid expressions.
    patterns: OnceCell<HashMap<String, Option<Regex>>>,
}

impl ResourceSchema {
    /// Build a resource schema from a parsed document.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::MissingField` naming the first absent required
    /// top-level field, or `SchemaError::InvalidDocument` if a required field
    /// has the wrong shape. Optional keywords with the wrong shape are dropped.
    pub fn from_value(document: Value) -> Result<Self, SchemaError> {
        for &field in REQUIRED_FIELDS {
            if document.get(field).is_none() {
                return Err(SchemaError::MissingField { field });
            }
        }

        let parsed: ResourceDocument =
            serde_json::from_value(document.clone()).map_err(|source| {
                SchemaError::InvalidDocument {
                    type_name: document
                        .get("typeName")
                        .and_then(Value::as_str)
                        .unwrap_or("<unknown>")
                        .to_string(),
                    source,
                }
            })?;

        let root = SchemaFragment {
            schema_type: Some(SchemaType::from("object")),
            description: Some(parsed.description.clone()),
            properties: Some(parsed.properties),
            required: (!parsed.required.is_empty()).then_some(parsed.required),
            additional_properties: Some(AdditionalProperties::Allowed(
                parsed.additional_properties,
            )),
            one_of: parsed.one_of,
            any_of: parsed.any_of,
            all_of: parsed.all_of,
            ..SchemaFragment::default()
        };

        Ok(Self {
            type_name: parsed.type_name,
            description: parsed.description,
            root,
            definitions: parsed.definitions,
            primary_identifier: parsed.primary_identifier,
            additional_identifiers: parsed.additional_identifiers,
            read_only: normalize_paths(parsed.read_only_properties),
            write_only: normalize_paths(parsed.write_only_properties),
            create_only: normalize_paths(parsed.create_only_properties),
            deprecated: normalize_paths(parsed.deprecated_properties),
            conditional_create_only: normalize_paths(parsed.conditional_create_only_properties),
            source_url: parsed.source_url,
            documentation_url: parsed.documentation_url,
            replacement_strategy: parsed.replacement_strategy,
            taggable: parsed.taggable,
            tagging: parsed.tagging,
            handlers: parsed.handlers,
            resource_link: parsed.resource_link,
            property_transform: parsed.property_transform,
            type_configuration: parsed.type_configuration,
            document,
            attributes: OnceCell::new(),
            patterns: OnceCell::new(),
        })
    }

    /// Parse a resource schema from JSON text.
    pub fn from_json_str(content: &str) -> Result<Self, SchemaError> {
        Self::from_value(load_document_str(content)?)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The root as a fragment: `type: object`, top-level properties, top-level
    /// `required`, and root composition keywords.
    pub fn root(&self) -> &SchemaFragment {
        &self.root
    }

    /// Top-level properties in document order.
    pub fn properties(&self) -> impl Iterator<Item = (&String, &SchemaFragment)> {
        self.root.properties.iter().flatten()
    }

    pub fn property(&self, name: &str) -> Option<&SchemaFragment> {
        self.root.property(name)
    }

    pub fn definitions(&self) -> &IndexMap<String, SchemaFragment> {
        &self.definitions
    }

    pub fn definition(&self, name: &str) -> Option<&SchemaFragment> {
        self.definitions.get(name)
    }

    pub fn required(&self) -> &[String] {
        self.root.required_names()
    }

    pub fn additional_properties(&self) -> bool {
        !matches!(
            self.root.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        )
    }

    pub fn primary_identifier(&self) -> &[String] {
        &self.primary_identifier
    }

    pub fn additional_identifiers(&self) -> &[Vec<String>] {
        &self.additional_identifiers
    }

    pub fn read_only_properties(&self) -> &[String] {
        &self.read_only
    }

    pub fn write_only_properties(&self) -> &[String] {
        &self.write_only
    }

    pub fn create_only_properties(&self) -> &[String] {
        &self.create_only
    }

    pub fn deprecated_properties(&self) -> &[String] {
        &self.deprecated
    }

    pub fn conditional_create_only_properties(&self) -> &[String] {
        &self.conditional_create_only
    }

    pub fn is_read_only(&self, path: &str) -> bool {
        contains_path(&self.read_only, path)
    }

    pub fn is_write_only(&self, path: &str) -> bool {
        contains_path(&self.write_only, path)
    }

    pub fn is_create_only(&self, path: &str) -> bool {
        contains_path(&self.create_only, path)
    }

    pub fn is_deprecated(&self, path: &str) -> bool {
        contains_path(&self.deprecated, path)
    }

    pub fn is_conditional_create_only(&self, path: &str) -> bool {
        contains_path(&self.conditional_create_only, path)
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn documentation_url(&self) -> Option<&str> {
        self.documentation_url.as_deref()
    }

    pub fn replacement_strategy(&self) -> Option<&str> {
        self.replacement_strategy.as_deref()
    }

    pub fn tagging(&self) -> Option<&Tagging> {
        self.tagging.as_ref()
    }

    /// Whether the resource supports tags.
    ///
    /// `tagging.taggable` wins over the legacy top-level `taggable`; a schema
    /// declaring neither is taggable.
    pub fn is_taggable(&self) -> bool {
        self.tagging
            .as_ref()
            .and_then(|t| t.taggable)
            .or(self.taggable)
            .unwrap_or(true)
    }

    pub fn handlers(&self) -> Option<&Handlers> {
        self.handlers.as_ref()
    }

    /// Permissions the handler for `operation` needs; empty if undeclared.
    pub fn handler_permissions(&self, operation: HandlerOperation) -> &[String] {
        self.handlers
            .as_ref()
            .and_then(|h| h.get(operation))
            .map(|h| h.permissions.as_slice())
            .unwrap_or(&[])
    }

    pub fn resource_link(&self) -> Option<&ResourceLink> {
        self.resource_link.as_ref()
    }

    /// The transform expression registered for a property path.
    pub fn property_transform(&self, path: &str) -> Option<&str> {
        let canonical = canonical_path(&path_segments(path));
        self.property_transform
            .iter()
            .find(|(key, _)| canonical_path(&path_segments(key)) == canonical)
            .map(|(_, expr)| expr.as_str())
    }

    pub fn type_configuration(&self) -> Option<&Value> {
        self.type_configuration.as_ref()
    }

    /// The raw document this schema was built from.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Raw field lookup by JSON Pointer against the original document.
    ///
    /// No references are followed and no shape is checked.
    pub fn get_by_path(&self, pointer: &str) -> Option<&Value> {
        navigate_pointer(&self.document, pointer)
    }

    /// The typed fragment a reference pointer addresses, if any.
    ///
    /// Understands `#` (the root), `/definitions/Name`, `/properties/Name`, and
    /// keyword steps below them (`properties`, `patternProperties`, `items`,
    /// `additionalProperties`, `oneOf`/`anyOf`/`allOf` indices).
    pub fn lookup(&self, pointer: &str) -> Option<&SchemaFragment> {
        let mut segments = pointer
            .trim_start_matches('#')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(unescape_segment);

        let mut current = match segments.next() {
            None => return Some(&self.root),
            Some(first) if first == "definitions" => self.definitions.get(&segments.next()?)?,
            Some(first) => step(&self.root, &first, &mut segments)?,
        };

        while let Some(keyword) = segments.next() {
            current = step(current, &keyword, &mut segments)?;
        }
        Some(current)
    }

    /// Single-level reference lookup: the referent of `pointer`, cloned, with
    /// any references inside it left in place.
    pub fn resolve_ref(&self, pointer: &str) -> Option<SchemaFragment> {
        self.lookup(pointer).cloned()
    }

    /// Every fragment that may apply at `path`.
    ///
    /// Never fails: an unknown or malformed path yields an empty list.
    pub fn resolve_json_pointer_path(&self, path: &str, options: &PathOptions) -> Vec<SchemaFragment> {
        PathResolver::new(self, *options).resolve(path)
    }

    /// Externally readable attributes, derived on first use.
    pub fn attributes(&self) -> &[Attribute] {
        self.attributes.get_or_init(|| derive_attributes(self))
    }

    /// The compiled regex for a `patternProperties` key of this schema.
    ///
    /// Every key in the schema is compiled once, on first use. Invalid
    /// expressions (and keys the schema does not declare) yield `None`.
    pub(crate) fn pattern(&self, source: &str) -> Option<&Regex> {
        self.patterns
            .get_or_init(|| compile_patterns(self))
            .get(source)
            .and_then(Option::as_ref)
    }
}

fn compile_patterns(schema: &ResourceSchema) -> HashMap<String, Option<Regex>> {
    let mut compiled = HashMap::new();
    let mut pending: Vec<&SchemaFragment> = vec![&schema.root];
    pending.extend(schema.definitions.values());

    while let Some(fragment) = pending.pop() {
        for (source, child) in fragment.pattern_properties.iter().flatten() {
            compiled
                .entry(source.clone())
                .or_insert_with(|| match Regex::new(source) {
                    Ok(regex) => Some(regex),
                    Err(err) => {
                        debug!(
                            "{}: skipping invalid pattern {:?}: {}",
                            schema.type_name, source, err
                        );
                        None
                    }
                });
            pending.push(child);
        }
        pending.extend(fragment.properties.iter().flat_map(|p| p.values()));
        pending.extend(fragment.items.as_deref());
        if let Some(AdditionalProperties::Schema(extra)) = &fragment.additional_properties {
            pending.push(extra);
        }
        pending.extend(fragment.alternatives());
    }
    compiled
}

/// Follow one keyword step from `fragment`, consuming a key/index where needed.
fn step<'a, I>(fragment: &'a SchemaFragment, keyword: &str, rest: &mut I) -> Option<&'a SchemaFragment>
where
    I: Iterator<Item = String>,
{
    match keyword {
        "properties" => fragment.properties.as_ref()?.get(&rest.next()?),
        "patternProperties" => fragment.pattern_properties.as_ref()?.get(&rest.next()?),
        "items" => fragment.items.as_deref(),
        "additionalProperties" => match &fragment.additional_properties {
            Some(AdditionalProperties::Schema(schema)) => Some(&**schema),
            _ => None,
        },
        "oneOf" => fragment.one_of.as_ref()?.get(rest.next()?.parse::<usize>().ok()?),
        "anyOf" => fragment.any_of.as_ref()?.get(rest.next()?.parse::<usize>().ok()?),
        "allOf" => fragment.all_of.as_ref()?.get(rest.next()?.parse::<usize>().ok()?),
        _ => None,
    }
}

fn normalize_paths(paths: Vec<String>) -> Vec<String> {
    paths
        .iter()
        .map(|path| canonical_path(&path_segments(path)))
        .collect()
}

fn contains_path(paths: &[String], path: &str) -> bool {
    let canonical = canonical_path(&path_segments(path));
    paths.iter().any(|p| *p == canonical)
}

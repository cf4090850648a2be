//! `$ref` chain resolution.
//!
//! A reference is replaced by its referent with the referring fragment's own
//! keywords laid over the top. Each chain carries its own visitation stack:
//! a pointer already on the stack, or a stack at [`MAX_REFERENCE_DEPTH`], ends
//! the chain and the referring fragment is kept without its `$ref`.

use log::debug;

use crate::fragment::SchemaFragment;
use crate::resource::ResourceSchema;
use crate::types::MAX_REFERENCE_DEPTH;

/// Resolves references against one resource schema.
#[derive(Debug, Clone, Copy)]
pub struct RefResolver<'a> {
    schema: &'a ResourceSchema,
}

impl<'a> RefResolver<'a> {
    pub fn new(schema: &'a ResourceSchema) -> Self {
        Self { schema }
    }

    /// Resolve the reference chain starting at `fragment`.
    ///
    /// `visited` holds the pointers already followed on this chain and is
    /// restored before returning. A fragment without `$ref` comes back as-is.
    pub fn resolve(&self, fragment: &SchemaFragment, visited: &mut Vec<String>) -> SchemaFragment {
        let depth = visited.len();
        let resolved = self.follow(fragment, visited);
        visited.truncate(depth);
        resolved
    }

    /// Like [`resolve`](Self::resolve), but followed pointers stay on
    /// `visited` so a caller can continue the same chain.
    pub(crate) fn follow(&self, fragment: &SchemaFragment, visited: &mut Vec<String>) -> SchemaFragment {
        let Some(pointer) = fragment.reference.as_deref() else {
            return fragment.clone();
        };
        let local = fragment.without_reference();

        if visited.iter().any(|seen| seen == pointer) {
            debug!(
                "{}: circular reference {} cut after {}",
                self.schema.type_name(),
                pointer,
                visited.join(" -> ")
            );
            return local;
        }
        if visited.len() >= MAX_REFERENCE_DEPTH {
            debug!(
                "{}: reference chain at {} exceeds {} links",
                self.schema.type_name(),
                pointer,
                MAX_REFERENCE_DEPTH
            );
            return local;
        }

        visited.push(pointer.to_string());
        match self.schema.lookup(pointer) {
            Some(referent) => self.follow(referent, visited).overlay(&local),
            None => {
                debug!(
                    "{}: unresolvable reference {}",
                    self.schema.type_name(),
                    pointer
                );
                local
            }
        }
    }

    /// Resolve `fragment` and its members.
    ///
    /// Each direct property is resolved one level, with its own chain. Item
    /// schemas continue the current chain and are resolved the same way,
    /// recursively.
    pub fn resolve_members(&self, fragment: &SchemaFragment, visited: &mut Vec<String>) -> SchemaFragment {
        let depth = visited.len();
        let mut resolved = self.follow(fragment, visited);

        if let Some(properties) = resolved.properties.take() {
            resolved.properties = Some(
                properties
                    .into_iter()
                    .map(|(name, property)| {
                        let property = self.resolve(&property, &mut Vec::new());
                        (name, property)
                    })
                    .collect(),
            );
        }
        if let Some(items) = resolved.items.take() {
            resolved.items = Some(Box::new(self.resolve_members(&items, visited)));
        }

        visited.truncate(depth);
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(definitions: serde_json::Value, properties: serde_json::Value) -> ResourceSchema {
        ResourceSchema::from_value(json!({
            "typeName": "Test::Ref::Resource",
            "description": "test",
            "additionalProperties": false,
            "primaryIdentifier": ["/properties/Id"],
            "definitions": definitions,
            "properties": properties
        }))
        .unwrap()
    }

    #[test]
    fn fragment_without_reference_is_unchanged() {
        let schema = schema(json!({}), json!({"Id": {"type": "string"}}));
        let resolver = RefResolver::new(&schema);
        let fragment = SchemaFragment::of_type("string");
        assert_eq!(resolver.resolve(&fragment, &mut Vec::new()), fragment);
    }

    #[test]
    fn local_keywords_override_referent() {
        let schema = schema(
            json!({"Name": {"type": "string", "description": "shared", "maxLength": 64}}),
            json!({"Id": {"type": "string"}}),
        );
        let resolver = RefResolver::new(&schema);
        let fragment: SchemaFragment = serde_json::from_value(json!({
            "$ref": "#/definitions/Name",
            "description": "local"
        }))
        .unwrap();

        let resolved = resolver.resolve(&fragment, &mut Vec::new());
        assert_eq!(resolved.reference, None);
        assert_eq!(resolved.description.as_deref(), Some("local"));
        assert_eq!(resolved.max_length, Some(64));
        assert!(resolved.is_type("string"));
    }

    #[test]
    fn follows_chains() {
        let schema = schema(
            json!({
                "A": {"$ref": "#/definitions/B", "title": "a"},
                "B": {"type": "integer"}
            }),
            json!({"Id": {"type": "string"}}),
        );
        let resolver = RefResolver::new(&schema);
        let resolved = resolver.resolve(&SchemaFragment::reference_to("#/definitions/A"), &mut Vec::new());
        assert!(resolved.is_type("integer"));
        assert_eq!(resolved.title.as_deref(), Some("a"));
    }

    #[test]
    fn cycle_terminates_without_reference() {
        let schema = schema(
            json!({
                "A": {"$ref": "#/definitions/B", "description": "a"},
                "B": {"$ref": "#/definitions/A", "title": "b"}
            }),
            json!({"Id": {"type": "string"}}),
        );
        let resolver = RefResolver::new(&schema);
        let resolved = resolver.resolve(&SchemaFragment::reference_to("#/definitions/A"), &mut Vec::new());
        assert_eq!(resolved.reference, None);
        assert_eq!(resolved.description.as_deref(), Some("a"));
        assert_eq!(resolved.title.as_deref(), Some("b"));
    }

    #[test]
    fn missing_referent_keeps_local_fields() {
        let schema = schema(json!({}), json!({"Id": {"type": "string"}}));
        let resolver = RefResolver::new(&schema);
        let fragment: SchemaFragment = serde_json::from_value(json!({
            "$ref": "#/definitions/Gone",
            "description": "dangling"
        }))
        .unwrap();
        let resolved = resolver.resolve(&fragment, &mut Vec::new());
        assert_eq!(resolved.reference, None);
        assert_eq!(resolved.description.as_deref(), Some("dangling"));
    }

    #[test]
    fn visited_is_restored() {
        let schema = schema(json!({"A": {"type": "string"}}), json!({"Id": {"type": "string"}}));
        let resolver = RefResolver::new(&schema);
        let mut visited = vec!["#/definitions/Outer".to_string()];
        resolver.resolve(&SchemaFragment::reference_to("#/definitions/A"), &mut visited);
        assert_eq!(visited, ["#/definitions/Outer"]);
    }

    #[test]
    fn sibling_references_are_independent() {
        let schema = schema(
            json!({"Tag": {"type": "object", "properties": {"Key": {"type": "string"}}}}),
            json!({
                "Left": {"$ref": "#/definitions/Tag"},
                "Right": {"$ref": "#/definitions/Tag"}
            }),
        );
        let resolver = RefResolver::new(&schema);
        let resolved = resolver.resolve_members(schema.root(), &mut Vec::new());
        for name in ["Left", "Right"] {
            let property = resolved.property(name).unwrap();
            assert!(property.property("Key").is_some(), "{} not resolved", name);
        }
    }

    #[test]
    fn members_resolve_items_and_one_level_of_properties() {
        let schema = schema(
            json!({
                "Tag": {
                    "type": "object",
                    "properties": {
                        "Key": {"$ref": "#/definitions/Key"},
                        "Nested": {"$ref": "#/definitions/Tag"}
                    }
                },
                "Key": {"type": "string", "maxLength": 128}
            }),
            json!({"Tags": {"type": "array", "items": {"$ref": "#/definitions/Tag"}}}),
        );
        let resolver = RefResolver::new(&schema);
        let tags = resolver.resolve_members(schema.property("Tags").unwrap(), &mut Vec::new());
        let item = tags.items.as_deref().unwrap();
        assert_eq!(item.reference, None);
        assert_eq!(item.property("Key").unwrap().max_length, Some(128));
        // One level only: the nested self reference is resolved, its children are not
        let nested = item.property("Nested").unwrap();
        assert_eq!(
            nested.property("Key").unwrap().reference.as_deref(),
            Some("#/definitions/Key")
        );
    }
}

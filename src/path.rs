//! Property path resolution.
//!
//! A path like `/properties/Tags/*/Key` is walked segment by segment through
//! the schema, following references and fanning out across composition
//! alternatives. Every fragment that may apply at the end of the path is
//! returned; when nothing applies the result is empty.

use std::borrow::Cow;

use log::{debug, trace};

use crate::fragment::{AdditionalProperties, SchemaFragment};
use crate::reference::RefResolver;
use crate::resource::ResourceSchema;
use crate::types::{
    canonical_path, escape_segment, path_segments, PathOptions, MAX_TRAVERSAL_DEPTH, WILDCARD,
};

/// Walks property paths through one resource schema.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    schema: &'a ResourceSchema,
    refs: RefResolver<'a>,
    options: PathOptions,
}

/// One branch of an in-progress walk.
struct ResolutionContext<'a, 'p> {
    remaining: &'p [String],
    fragment: Cow<'a, SchemaFragment>,
    /// Reference chain for the current position; reset when a segment is consumed.
    visited: Vec<String>,
    consumed: Vec<String>,
    /// Steps taken since the last consumed segment.
    depth: usize,
}

/// A composition alternative ready to be walked, with the chain that produced it.
struct Candidate {
    fragment: SchemaFragment,
    visited: Vec<String>,
}

impl<'a, 'p> ResolutionContext<'a, 'p> {
    fn start(remaining: &'p [String], fragment: &'a SchemaFragment) -> Self {
        Self {
            remaining,
            fragment: Cow::Borrowed(fragment),
            visited: Vec::new(),
            consumed: Vec::new(),
            depth: 0,
        }
    }

    /// Continue at the same position with a composition candidate.
    fn branch(&self, candidate: Candidate) -> Self {
        Self {
            remaining: self.remaining,
            fragment: Cow::Owned(candidate.fragment),
            visited: candidate.visited,
            consumed: self.consumed.clone(),
            depth: self.depth + 1,
        }
    }

    /// Consume the next segment and continue into `fragment`.
    fn advance(&self, fragment: Cow<'a, SchemaFragment>) -> Self {
        let mut consumed = self.consumed.clone();
        consumed.extend(self.remaining.first().cloned());
        Self {
            remaining: self.remaining.get(1..).unwrap_or_default(),
            fragment,
            visited: Vec::new(),
            consumed,
            depth: 0,
        }
    }

    fn pointer(&self) -> String {
        canonical_path(&self.consumed)
    }
}

impl<'a> PathResolver<'a> {
    pub fn new(schema: &'a ResourceSchema, options: PathOptions) -> Self {
        Self {
            schema,
            refs: RefResolver::new(schema),
            options,
        }
    }

    /// Resolve `path` to every fragment that may apply there.
    ///
    /// The empty path (or `/properties`) addresses the resource root.
    pub fn resolve(&self, path: &str) -> Vec<SchemaFragment> {
        let segments = path_segments(path);
        let query = canonical_path(&segments);

        if self.options.exclude_read_only && self.schema.is_read_only(&query) {
            trace!("{}: {} is read-only", self.schema.type_name(), query);
            return Vec::new();
        }

        let mut results = Vec::new();
        self.walk(ResolutionContext::start(&segments, self.schema.root()), &mut results);

        if self.options.exclude_read_only {
            results = results
                .into_iter()
                .map(|fragment| self.strip_read_only(fragment, &query))
                .collect();
        }
        results
    }

    fn walk(&self, mut ctx: ResolutionContext<'a, '_>, results: &mut Vec<SchemaFragment>) {
        if ctx.depth > MAX_TRAVERSAL_DEPTH {
            debug!(
                "{}: traversal at {} exceeded {} steps",
                self.schema.type_name(),
                ctx.pointer(),
                MAX_TRAVERSAL_DEPTH
            );
            return;
        }

        let fragment = match &ctx.fragment {
            Cow::Borrowed(f) if f.reference.is_none() => Cow::Borrowed(*f),
            other => Cow::Owned(self.refs.follow(other, &mut ctx.visited)),
        };

        if ctx.remaining.is_empty() {
            if fragment.has_composition() && !self.options.preserve_composition {
                for candidate in self.expand(&fragment, &ctx.visited) {
                    self.walk(ctx.branch(candidate), results);
                }
            } else {
                results.push(self.refs.resolve_members(&fragment, &mut ctx.visited));
            }
            return;
        }

        if fragment.has_composition() && !fragment.has_properties() {
            for candidate in self.expand(&fragment, &ctx.visited) {
                self.walk(ctx.branch(candidate), results);
            }
            return;
        }

        let segment = ctx.remaining[0].as_str();
        if segment == WILDCARD {
            match child(&fragment, items_of, segment) {
                Some(items) if fragment.accepts_items() => self.walk(ctx.advance(items), results),
                _ => self.unmatched(&ctx, &fragment, results),
            }
            return;
        }

        if let Some(property) = child(&fragment, property_of, segment) {
            self.walk(ctx.advance(property), results);
            return;
        }

        let patterns = self.matching_patterns(&fragment, segment);
        if !patterns.is_empty() {
            for pattern in patterns {
                if let Some(matched) = child(&fragment, pattern_property_of, &pattern) {
                    self.walk(ctx.advance(matched), results);
                }
            }
            return;
        }

        let declaring = self.alternatives_declaring(&fragment, segment, &ctx.visited);
        if !declaring.is_empty() {
            for candidate in declaring {
                self.walk(ctx.branch(candidate), results);
            }
            return;
        }

        if let Some(additional) = child(&fragment, additional_schema_of, segment) {
            self.walk(ctx.advance(additional), results);
            return;
        }

        self.unmatched(&ctx, &fragment, results);
    }

    /// Expand composition keywords into the candidates they allow.
    ///
    /// `allOf` members are merged into one candidate; members that themselves
    /// carry composition contribute one candidate per alternative they expand
    /// to. Each `oneOf`/`anyOf` alternative is laid over the surrounding
    /// fragment, so its own `type` and `description` carry into every candidate.
    fn expand(&self, fragment: &SchemaFragment, visited: &[String]) -> Vec<Candidate> {
        if let Some(members) = fragment.all_of.as_ref().filter(|m| !m.is_empty()) {
            let base = SchemaFragment {
                all_of: None,
                ..fragment.clone()
            };
            let mut chain = visited.to_vec();
            let mut plain = Vec::new();
            let mut composite = Vec::new();

            for member in members {
                let mut own = visited.to_vec();
                let resolved = self.refs.follow(member, &mut own);
                for pointer in own.into_iter().skip(visited.len()) {
                    if !chain.contains(&pointer) {
                        chain.push(pointer);
                    }
                }
                if resolved.has_composition() {
                    composite.push(resolved);
                } else {
                    plain.push(resolved);
                }
            }

            let merged = plain.iter().fold(base, |acc, member| acc.overlay(member));
            if composite.is_empty() {
                return vec![Candidate {
                    fragment: merged,
                    visited: chain,
                }];
            }

            let mut candidates = Vec::new();
            for member in &composite {
                for expansion in self.expand(member, &chain) {
                    candidates.push(Candidate {
                        fragment: merged.overlay(&expansion.fragment),
                        visited: expansion.visited,
                    });
                }
            }
            return candidates;
        }

        let base = SchemaFragment {
            one_of: None,
            any_of: None,
            ..fragment.clone()
        };
        fragment
            .one_of
            .iter()
            .flatten()
            .chain(fragment.any_of.iter().flatten())
            .map(|alternative| {
                let mut own = visited.to_vec();
                let resolved = self.refs.follow(alternative, &mut own);
                Candidate {
                    fragment: base.overlay(&resolved),
                    visited: own,
                }
            })
            .collect()
    }

    /// Alternatives that declare `segment` directly, merged with the fragment.
    fn alternatives_declaring(&self, fragment: &SchemaFragment, segment: &str, visited: &[String]) -> Vec<Candidate> {
        if !fragment.has_composition() {
            return Vec::new();
        }
        let base = fragment.without_composition();
        fragment
            .alternatives()
            .filter_map(|alternative| {
                let mut own = visited.to_vec();
                let resolved = self.refs.follow(alternative, &mut own);
                resolved.property(segment)?;
                Some(Candidate {
                    fragment: base.overlay(&resolved),
                    visited: own,
                })
            })
            .collect()
    }

    /// `patternProperties` keys whose regex matches `segment`.
    fn matching_patterns(&self, fragment: &SchemaFragment, segment: &str) -> Vec<String> {
        let Some(patterns) = &fragment.pattern_properties else {
            return Vec::new();
        };
        patterns
            .keys()
            .filter(|pattern| {
                self.schema
                    .pattern(pattern)
                    .map(|regex| regex.is_match(segment))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn unmatched(&self, ctx: &ResolutionContext<'a, '_>, fragment: &SchemaFragment, results: &mut Vec<SchemaFragment>) {
        if !self.options.require_fully_resolved && fragment.is_opaque() {
            trace!(
                "{}: {} is opaque below {}",
                self.schema.type_name(),
                ctx.remaining.join("/"),
                ctx.pointer()
            );
            results.push(SchemaFragment::default());
        } else {
            trace!(
                "{}: no match for {:?} at {}",
                self.schema.type_name(),
                ctx.remaining.first(),
                ctx.pointer()
            );
        }
    }

    /// Remove nested properties and items whose paths are read-only.
    fn strip_read_only(&self, mut fragment: SchemaFragment, path: &str) -> SchemaFragment {
        if let Some(properties) = fragment.properties.take() {
            fragment.properties = Some(
                properties
                    .into_iter()
                    .filter_map(|(name, property)| {
                        let child_path = format!("{}/{}", path, escape_segment(&name));
                        if self.schema.is_read_only(&child_path) {
                            None
                        } else {
                            Some((name, self.strip_read_only(property, &child_path)))
                        }
                    })
                    .collect(),
            );
        }
        if let Some(items) = fragment.items.take() {
            let child_path = format!("{}/{}", path, WILDCARD);
            if !self.schema.is_read_only(&child_path) {
                fragment.items = Some(Box::new(self.strip_read_only(*items, &child_path)));
            }
        }
        fragment
    }
}

type Selector = for<'x, 'k> fn(&'x SchemaFragment, &'k str) -> Option<&'x SchemaFragment>;

/// Select a child of `parent`, borrowing from the schema where possible.
fn child<'a>(parent: &Cow<'a, SchemaFragment>, select: Selector, key: &str) -> Option<Cow<'a, SchemaFragment>> {
    match parent {
        Cow::Borrowed(fragment) => select(*fragment, key).map(Cow::Borrowed),
        Cow::Owned(fragment) => select(fragment, key).cloned().map(Cow::Owned),
    }
}

fn property_of<'x>(fragment: &'x SchemaFragment, key: &str) -> Option<&'x SchemaFragment> {
    fragment.property(key)
}

fn pattern_property_of<'x>(fragment: &'x SchemaFragment, key: &str) -> Option<&'x SchemaFragment> {
    fragment.pattern_properties.as_ref()?.get(key)
}

fn items_of<'x>(fragment: &'x SchemaFragment, _: &str) -> Option<&'x SchemaFragment> {
    fragment.items.as_deref()
}

fn additional_schema_of<'x>(fragment: &'x SchemaFragment, _: &str) -> Option<&'x SchemaFragment> {
    match &fragment.additional_properties {
        Some(AdditionalProperties::Schema(schema)) => Some(&**schema),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(document: serde_json::Value) -> ResourceSchema {
        ResourceSchema::from_value(document).unwrap()
    }

    fn with_properties(definitions: serde_json::Value, properties: serde_json::Value) -> ResourceSchema {
        schema(json!({
            "typeName": "Test::Path::Resource",
            "description": "test",
            "additionalProperties": false,
            "primaryIdentifier": ["/properties/Id"],
            "readOnlyProperties": ["/properties/Id", "/properties/Config/Generated"],
            "definitions": definitions,
            "properties": properties
        }))
    }

    fn resolve(schema: &ResourceSchema, path: &str) -> Vec<SchemaFragment> {
        PathResolver::new(schema, PathOptions::default()).resolve(path)
    }

    #[test]
    fn empty_path_returns_root() {
        let schema = with_properties(json!({}), json!({"Id": {"type": "string"}}));
        for path in ["", "/", "/properties", "#/properties"] {
            let results = resolve(&schema, path);
            assert_eq!(results.len(), 1, "path {:?}", path);
            assert!(results[0].is_type("object"));
            assert!(results[0].property("Id").is_some());
        }
    }

    #[test]
    fn nested_through_reference() {
        let schema = with_properties(
            json!({"Config": {"type": "object", "properties": {"Mode": {"type": "string", "enum": ["a", "b"]}}}}),
            json!({"Config": {"$ref": "#/definitions/Config"}}),
        );
        let results = resolve(&schema, "/properties/Config/Mode");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_type("string"));
    }

    #[test]
    fn pattern_properties_match_by_regex() {
        let schema = with_properties(
            json!({}),
            json!({
                "Labels": {
                    "type": "object",
                    "patternProperties": {
                        "^[a-z]+$": {"type": "string"},
                        "^[0-9]+$": {"type": "integer"},
                        "(": {"type": "boolean"}
                    }
                }
            }),
        );
        let results = resolve(&schema, "/properties/Labels/team");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_type("string"));
        let results = resolve(&schema, "/properties/Labels/42");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_type("integer"));
    }

    #[test]
    fn additional_properties_schema_applies_to_any_key() {
        let schema = with_properties(
            json!({}),
            json!({"Env": {"type": "object", "additionalProperties": {"type": "string"}}}),
        );
        let results = resolve(&schema, "/properties/Env/ANYTHING");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_type("string"));
    }

    #[test]
    fn wildcard_requires_items() {
        let schema = with_properties(
            json!({}),
            json!({
                "List": {"type": "array", "items": {"type": "string"}},
                "Name": {"type": "string"}
            }),
        );
        let results = resolve(&schema, "/properties/List/*");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_type("string"));
        let strict = PathResolver::new(&schema, PathOptions::new().require_fully_resolved(true));
        assert!(strict.resolve("/properties/Name/*").is_empty());
    }

    #[test]
    fn opaque_fragment_yields_empty_fragment_when_lenient() {
        let schema = with_properties(json!({}), json!({"Blob": {"type": "object"}}));
        let results = resolve(&schema, "/properties/Blob/Deep/Key");
        assert_eq!(results, vec![SchemaFragment::default()]);
        let strict = PathResolver::new(&schema, PathOptions::new().require_fully_resolved(true));
        assert!(strict.resolve("/properties/Blob/Deep/Key").is_empty());
    }

    #[test]
    fn unknown_property_on_structured_fragment_is_empty() {
        let schema = with_properties(json!({}), json!({"Id": {"type": "string"}}));
        assert!(resolve(&schema, "/properties/Missing").is_empty());
    }

    #[test]
    fn one_of_alternatives_merge_with_base() {
        let schema = with_properties(
            json!({}),
            json!({
                "Target": {
                    "type": "object",
                    "properties": {"Arn": {"type": "string"}, "Name": {"type": "string"}},
                    "oneOf": [{"required": ["Arn"]}, {"required": ["Name"]}]
                }
            }),
        );
        let results = resolve(&schema, "/properties/Target");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].required_names(), ["Arn"]);
        assert_eq!(results[1].required_names(), ["Name"]);
        assert!(results.iter().all(|f| f.property("Arn").is_some() && f.one_of.is_none()));
    }

    #[test]
    fn scalar_keeps_its_type_across_alternatives() {
        let schema = with_properties(
            json!({}),
            json!({
                "GatewayId": {
                    "type": "string",
                    "description": "The gateway",
                    "anyOf": [
                        {"relationshipRef": {"typeName": "AWS::EC2::InternetGateway", "propertyPath": "/properties/InternetGatewayId"}},
                        {"relationshipRef": {"typeName": "AWS::EC2::VPNGateway", "propertyPath": "/properties/VPNGatewayId"}}
                    ]
                },
                "Mode": {"type": "string", "oneOf": [{"enum": ["a"]}, {"pattern": "^x-"}]}
            }),
        );

        let gateway = resolve(&schema, "/properties/GatewayId");
        assert_eq!(gateway.len(), 2);
        assert!(gateway.iter().all(|f| f.is_type("string")));
        assert!(gateway.iter().all(|f| f.description.as_deref() == Some("The gateway")));
        let targets: Vec<&str> = gateway
            .iter()
            .filter_map(|f| f.relationship_ref.as_ref())
            .map(|r| r.type_name.as_str())
            .collect();
        assert_eq!(targets, ["AWS::EC2::InternetGateway", "AWS::EC2::VPNGateway"]);

        let mode = resolve(&schema, "/properties/Mode");
        assert_eq!(mode.len(), 2);
        assert!(mode.iter().all(|f| f.is_type("string") && f.one_of.is_none()));
        assert_eq!(mode[1].pattern.as_deref(), Some("^x-"));
    }

    #[test]
    fn declared_type_is_always_among_results() {
        let schema = with_properties(
            json!({"Named": {"type": "object", "properties": {"Name": {"type": "string"}}}}),
            json!({
                "Id": {"type": "string"},
                "Count": {"type": "integer", "anyOf": [{"minimum": 0}, {"maximum": -1}]},
                "Target": {"type": "object", "oneOf": [{"$ref": "#/definitions/Named"}, {"required": ["Arn"]}]},
                "Flags": {"type": "array", "items": {"type": "boolean"}, "oneOf": [{"minItems": 1}]}
            }),
        );
        for (name, property) in schema.properties() {
            let declared = property.schema_type.as_ref().unwrap().names()[0];
            let results = resolve(&schema, &format!("/properties/{}", name));
            assert!(
                results.iter().any(|f| f.is_type(declared)),
                "{} lost its {} type: {:?}",
                name,
                declared,
                results
            );
        }
    }

    #[test]
    fn preserve_composition_keeps_one_of() {
        let schema = with_properties(
            json!({}),
            json!({
                "Target": {
                    "type": "object",
                    "properties": {"Arn": {"type": "string"}},
                    "oneOf": [{"required": ["Arn"]}]
                }
            }),
        );
        let resolver = PathResolver::new(&schema, PathOptions::new().preserve_composition(true));
        let results = resolver.resolve("/properties/Target");
        assert_eq!(results.len(), 1);
        assert!(results[0].one_of.is_some());
    }

    #[test]
    fn segment_found_through_alternative() {
        let schema = with_properties(
            json!({}),
            json!({
                "Source": {
                    "type": "object",
                    "properties": {"Kind": {"type": "string"}},
                    "oneOf": [
                        {"properties": {"Bucket": {"type": "string"}}},
                        {"properties": {"Url": {"type": "string", "format": "uri"}}}
                    ]
                }
            }),
        );
        let results = resolve(&schema, "/properties/Source/Url");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].format.as_deref(), Some("uri"));
    }

    #[test]
    fn exclude_read_only_filters_query_and_nested() {
        let schema = with_properties(
            json!({}),
            json!({
                "Id": {"type": "string"},
                "Config": {
                    "type": "object",
                    "properties": {"Generated": {"type": "string"}, "User": {"type": "string"}}
                }
            }),
        );
        let resolver = PathResolver::new(&schema, PathOptions::new().exclude_read_only(true));
        assert!(resolver.resolve("/properties/Id").is_empty());

        let config = resolver.resolve("/properties/Config");
        assert_eq!(config.len(), 1);
        assert!(config[0].property("Generated").is_none());
        assert!(config[0].property("User").is_some());

        let root = resolver.resolve("");
        assert!(root[0].property("Id").is_none());
        assert!(root[0].property("Config").is_some());
    }

    #[test]
    fn self_referencing_composition_terminates() {
        let schema = with_properties(
            json!({
                "Node": {"oneOf": [{"$ref": "#/definitions/Node"}, {"type": "string"}]},
                "Loop": {"anyOf": [{"$ref": "#/definitions/Other"}]},
                "Other": {"anyOf": [{"$ref": "#/definitions/Loop"}]}
            }),
            json!({
                "Tree": {"$ref": "#/definitions/Node"},
                "Ring": {"$ref": "#/definitions/Loop"}
            }),
        );
        let tree = resolve(&schema, "/properties/Tree");
        assert!(tree.iter().any(|f| f.is_type("string")));
        // Terminates; content is whatever survives the cycle cut
        resolve(&schema, "/properties/Ring");
        resolve(&schema, "/properties/Ring/Deeper/Still");
    }
}

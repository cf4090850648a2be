//! Property transformers and template normalization.
//!
//! Transformers rewrite a resource's property bag in place so that it
//! satisfies constraints the schema (or a built-in rule table) imposes on
//! which properties may appear together.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::exclusion::MutualExclusionTransformer;
use crate::registry::SchemaRegistry;
use crate::resource::ResourceSchema;
use crate::types::{escape_segment, MAX_TRANSFORM_DEPTH, WILDCARD};
use crate::xor::RequiredXorTransformer;

/// Rewrites a property bag for one resource type.
///
/// Implementations must be idempotent and must never fail: inputs they do not
/// understand are left untouched.
pub trait PropertyTransformer {
    fn transform(&self, properties: &mut Value, schema: &ResourceSchema);
}

/// Visit every object in `value`, outermost first.
///
/// `visit` receives each object with its property path: `/properties` for the
/// bag itself, `/properties/Key/...` below it and `*` for array elements.
pub(crate) fn visit_objects<F>(value: &mut Value, path: &str, depth: usize, visit: &mut F)
where
    F: FnMut(&mut Map<String, Value>, &str),
{
    if depth > MAX_TRANSFORM_DEPTH {
        warn!("stopped transforming at {}: nesting deeper than {}", path, MAX_TRANSFORM_DEPTH);
        return;
    }
    match value {
        Value::Object(map) => {
            visit(map, path);
            for (key, child) in map.iter_mut() {
                let child_path = format!("{}/{}", path, escape_segment(key));
                visit_objects(child, &child_path, depth + 1, visit);
            }
        }
        Value::Array(elements) => {
            let child_path = format!("{}/{}", path, WILDCARD);
            for element in elements {
                visit_objects(element, &child_path, depth + 1, visit);
            }
        }
        _ => {}
    }
}

/// Apply the built-in transformers to one property bag.
pub fn normalize_properties(properties: &mut Value, schema: &ResourceSchema) {
    MutualExclusionTransformer::default().transform(properties, schema);
    RequiredXorTransformer::default().transform(properties, schema);
}

/// Normalize every resource in a template whose type is registered.
///
/// Returns the logical ids of the resources that were normalized. Resources
/// of unknown type, and anything not shaped like a resource, are skipped.
pub fn normalize_template(template: &mut Value, registry: &SchemaRegistry) -> Vec<String> {
    let mut normalized = Vec::new();
    let Some(resources) = template.get_mut("Resources").and_then(Value::as_object_mut) else {
        debug!("template has no Resources section");
        return normalized;
    };

    for (logical_id, resource) in resources.iter_mut() {
        let Some(type_name) = resource.get("Type").and_then(Value::as_str) else {
            continue;
        };
        let Some(schema) = registry.get(type_name) else {
            debug!("{}: no schema registered for {}", logical_id, type_name);
            continue;
        };
        let Some(properties) = resource.get_mut("Properties") else {
            continue;
        };
        normalize_properties(properties, &schema);
        normalized.push(logical_id.clone());
    }
    normalized
}

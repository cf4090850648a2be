//! Readable attributes derived from read-only property paths.

use serde::Serialize;

use crate::resource::ResourceSchema;
use crate::types::{path_segments, PathOptions, WILDCARD};

/// An attribute a template can read from a resource (`Fn::GetAtt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    /// Dotted name, e.g. `Endpoint.Address`.
    pub name: String,
    pub description: String,
}

/// Dotted attribute name for a property path.
///
/// ```
/// assert_eq!(cfn_schema::attribute_name("/properties/Endpoint/Address"), "Endpoint.Address");
/// ```
pub fn attribute_name(path: &str) -> String {
    path_segments(path).join(".")
}

/// Derive attributes from the schema's read-only paths, in declaration order.
///
/// Any path with a `*` segment is skipped, wherever the wildcard sits: a
/// middle `/*/` step and a trailing `/*` both name per-element values of an
/// array, which `Fn::GetAtt` cannot address.
pub(crate) fn derive_attributes(schema: &ResourceSchema) -> Vec<Attribute> {
    schema
        .read_only_properties()
        .iter()
        .filter(|path| !path_segments(path).iter().any(|s| s == WILDCARD))
        .map(|path| {
            let name = attribute_name(path);
            let description = schema
                .resolve_json_pointer_path(path, &PathOptions::default())
                .into_iter()
                .find_map(|fragment| fragment.description)
                .unwrap_or_else(|| format!("{} attribute of {}", name, schema.type_name()));
            Attribute { name, description }
        })
        .collect()
}

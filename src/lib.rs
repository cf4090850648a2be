//! CloudFormation Resource Schema Resolver
//!
//! Answers questions about CloudFormation resource type schemas: which schema
//! fragments apply at a property path, which attributes a resource exposes,
//! and how to rewrite a property bag so mutually exclusive properties do not
//! appear together.
//!
//! # Example
//!
//! ```
//! use cfn_schema::{PathOptions, ResourceSchema};
//! use serde_json::json;
//!
//! let schema = ResourceSchema::from_value(json!({
//!     "typeName": "AWS::Demo::Queue",
//!     "description": "A demo queue",
//!     "additionalProperties": false,
//!     "primaryIdentifier": ["/properties/Arn"],
//!     "readOnlyProperties": ["/properties/Arn"],
//!     "definitions": {
//!         "Tag": {
//!             "type": "object",
//!             "properties": {
//!                 "Key": { "type": "string" },
//!                 "Value": { "type": "string" }
//!             },
//!             "required": ["Key", "Value"]
//!         }
//!     },
//!     "properties": {
//!         "Arn": { "type": "string", "description": "Queue ARN" },
//!         "Name": { "type": "string" },
//!         "Tags": { "type": "array", "items": { "$ref": "#/definitions/Tag" } }
//!     }
//! }))
//! .unwrap();
//!
//! // References are followed and `*` steps into array items
//! let tag = schema.resolve_json_pointer_path("/properties/Tags/*", &PathOptions::default());
//! assert_eq!(tag.len(), 1);
//! assert!(tag[0].property("Key").is_some());
//!
//! // Read-only properties can be filtered out
//! let options = PathOptions::new().exclude_read_only(true);
//! assert!(schema.resolve_json_pointer_path("/properties/Arn", &options).is_empty());
//!
//! // Read-only paths become attributes
//! assert_eq!(schema.attributes()[0].name, "Arn");
//! assert_eq!(schema.attributes()[0].description, "Queue ARN");
//! ```
//!
//! # Path Resolution
//!
//! | Segment | Matches |
//! |---------|---------|
//! | `Name` | `properties.Name`, then matching `patternProperties`, then composition alternatives declaring `Name`, then an `additionalProperties` schema |
//! | `*` | `items` of an array fragment |
//!
//! `oneOf`/`anyOf`/`allOf` fan out into one result per alternative. When
//! nothing applies the result is empty; resolution never fails.

mod attributes;
mod error;
mod exclusion;
mod fragment;
mod linter;
mod loader;
mod path;
mod reference;
mod registry;
mod resource;
mod rules;
mod transform;
mod types;
mod xor;

pub use attributes::{attribute_name, Attribute};
pub use error::SchemaError;
pub use exclusion::MutualExclusionTransformer;
pub use fragment::{AdditionalProperties, RelationshipRef, SchemaFragment, SchemaType};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    collect_json_files, load_document, load_document_str, load_resource_schema, navigate_pointer,
};
pub use path::PathResolver;
pub use reference::RefResolver;
pub use registry::SchemaRegistry;
pub use resource::{
    Handler, HandlerOperation, Handlers, ResourceLink, ResourceSchema, Tagging, REQUIRED_FIELDS,
};
pub use rules::{PathRule, RuleTable};
pub use transform::{normalize_properties, normalize_template, PropertyTransformer};
pub use types::{
    canonical_path, path_segments, PathOptions, MAX_REFERENCE_DEPTH, MAX_TRANSFORM_DEPTH,
    MAX_TRAVERSAL_DEPTH, WILDCARD,
};
pub use xor::RequiredXorTransformer;

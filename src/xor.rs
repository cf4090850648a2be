//! Required-XOR transformer.
//!
//! For rule-table groups of which at most one member may be set, the first
//! member present (in key order) is kept and the rest are removed.

use log::debug;
use serde_json::Value;

use crate::resource::ResourceSchema;
use crate::rules::RuleTable;
use crate::transform::{visit_objects, PropertyTransformer};
use crate::types::PROPERTIES_PREFIX;

/// Keeps one property out of each exclusive-or group.
#[derive(Debug, Clone, Copy)]
pub struct RequiredXorTransformer<'t> {
    rules: &'t RuleTable,
}

impl Default for RequiredXorTransformer<'static> {
    fn default() -> Self {
        Self::new(RuleTable::required_xor())
    }
}

impl<'t> RequiredXorTransformer<'t> {
    pub fn new(rules: &'t RuleTable) -> Self {
        Self { rules }
    }
}

impl PropertyTransformer for RequiredXorTransformer<'_> {
    fn transform(&self, properties: &mut Value, schema: &ResourceSchema) {
        if self.rules.rules_for(schema.type_name()).is_empty() {
            return;
        }
        visit_objects(properties, PROPERTIES_PREFIX, 0, &mut |map, path| {
            for group in self.rules.groups_at(schema.type_name(), path) {
                let Some(chosen) = map.keys().find(|key| group.contains(key)).cloned() else {
                    continue;
                };
                let before = map.len();
                map.retain(|key, _| *key == chosen || !group.contains(key));
                if map.len() < before {
                    debug!(
                        "{}: kept {} at {}, dropped {} alternative(s)",
                        schema.type_name(),
                        chosen,
                        path,
                        before - map.len()
                    );
                }
            }
        });
    }
}

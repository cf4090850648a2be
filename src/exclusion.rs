//! Mutual-exclusion transformer.
//!
//! At each object in a property bag, the groups of properties that may appear
//! together are gathered from the schema's `oneOf` alternatives at that path
//! and from the built-in rule table. Two properties are exclusive when no
//! group contains both. Walking the keys in order, a property exclusive with
//! one already kept is removed.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde_json::{Map, Value};

use crate::reference::RefResolver;
use crate::resource::ResourceSchema;
use crate::rules::RuleTable;
use crate::transform::{visit_objects, PropertyTransformer};
use crate::types::{PathOptions, PROPERTIES_PREFIX};

/// Removes properties that conflict with properties appearing earlier.
#[derive(Debug, Clone, Copy)]
pub struct MutualExclusionTransformer<'t> {
    rules: &'t RuleTable,
}

impl Default for MutualExclusionTransformer<'static> {
    fn default() -> Self {
        Self::new(RuleTable::mutual_exclusions())
    }
}

impl<'t> MutualExclusionTransformer<'t> {
    pub fn new(rules: &'t RuleTable) -> Self {
        Self { rules }
    }

    /// Groups of co-occurring property names for the object at `path`.
    pub fn groups(&self, schema: &ResourceSchema, path: &str) -> Vec<Vec<String>> {
        let mut groups = schema_groups(schema, path);
        for group in self.rules.groups_at(schema.type_name(), path) {
            let group = group.to_vec();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }
}

impl PropertyTransformer for MutualExclusionTransformer<'_> {
    fn transform(&self, properties: &mut Value, schema: &ResourceSchema) {
        visit_objects(properties, PROPERTIES_PREFIX, 0, &mut |map, path| {
            let groups = self.groups(schema, path);
            if groups.is_empty() {
                return;
            }
            let exclusions = Exclusions::from_groups(&groups);
            let removed = exclusions.apply(map);
            if !removed.is_empty() {
                debug!(
                    "{}: removed {} at {} (mutually exclusive)",
                    schema.type_name(),
                    removed.join(", "),
                    path
                );
            }
        });
    }
}

/// `oneOf` alternatives at `path` as name groups.
fn schema_groups(schema: &ResourceSchema, path: &str) -> Vec<Vec<String>> {
    let refs = RefResolver::new(schema);
    let options = PathOptions::new().preserve_composition(true);
    let mut groups = Vec::new();

    for fragment in schema.resolve_json_pointer_path(path, &options) {
        for alternative in fragment.one_of.iter().flatten() {
            let names = refs.resolve(alternative, &mut Vec::new()).declared_names();
            if !names.is_empty() && !groups.contains(&names) {
                groups.push(names);
            }
        }
    }
    groups
}

/// For each known property, the properties it may not appear with.
#[derive(Debug, Default)]
struct Exclusions {
    conflicts: HashMap<String, HashSet<String>>,
}

impl Exclusions {
    fn from_groups(groups: &[Vec<String>]) -> Self {
        let mut companions: HashMap<&str, HashSet<&str>> = HashMap::new();
        for group in groups {
            for name in group {
                companions
                    .entry(name)
                    .or_default()
                    .extend(group.iter().map(String::as_str));
            }
        }

        let mut conflicts: HashMap<String, HashSet<String>> = HashMap::new();
        for (name, allowed) in &companions {
            for other in companions.keys() {
                if !allowed.contains(other) {
                    conflicts
                        .entry(name.to_string())
                        .or_default()
                        .insert(other.to_string());
                }
            }
        }
        Self { conflicts }
    }

    /// Drop keys that conflict with an earlier kept key; returns the dropped keys.
    fn apply(&self, map: &mut Map<String, Value>) -> Vec<String> {
        let mut kept: Vec<&str> = Vec::new();
        let mut removed = Vec::new();
        for key in map.keys() {
            let Some(conflicts) = self.conflicts.get(key) else {
                continue;
            };
            if kept.iter().any(|k| conflicts.contains(*k)) {
                removed.push(key.clone());
            } else {
                kept.push(key);
            }
        }
        if !removed.is_empty() {
            map.retain(|key, _| !removed.contains(key));
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance() -> ResourceSchema {
        ResourceSchema::from_value(json!({
            "typeName": "Test::EC2::Instance",
            "description": "test",
            "additionalProperties": false,
            "primaryIdentifier": ["/properties/InstanceId"],
            "readOnlyProperties": ["/properties/InstanceId"],
            "oneOf": [
                {"required": ["NetworkInterfaces"]},
                {"required": ["SubnetId"]}
            ],
            "properties": {
                "InstanceId": {"type": "string"},
                "ImageId": {"type": "string"},
                "InstanceType": {"type": "string"},
                "SubnetId": {"type": "string"},
                "NetworkInterfaces": {"type": "array", "items": {"type": "object"}}
            }
        }))
        .unwrap()
    }

    #[test]
    fn first_seen_wins() {
        let schema = instance();
        let mut properties = json!({
            "ImageId": "ami-123",
            "InstanceType": "t3.micro",
            "SubnetId": "subnet-1",
            "NetworkInterfaces": [{"DeviceIndex": "0"}]
        });
        MutualExclusionTransformer::default().transform(&mut properties, &schema);
        assert_eq!(
            properties,
            json!({"ImageId": "ami-123", "InstanceType": "t3.micro", "SubnetId": "subnet-1"})
        );
        let keys: Vec<_> = properties.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["ImageId", "InstanceType", "SubnetId"]);
    }

    #[test]
    fn order_decides_survivor() {
        let schema = instance();
        let mut properties = json!({"NetworkInterfaces": [], "SubnetId": "subnet-1"});
        MutualExclusionTransformer::default().transform(&mut properties, &schema);
        assert_eq!(properties, json!({"NetworkInterfaces": []}));
    }

    #[test]
    fn unrelated_properties_untouched() {
        let schema = instance();
        let mut properties = json!({"ImageId": "ami-123", "Unknown": true});
        let before = properties.clone();
        MutualExclusionTransformer::default().transform(&mut properties, &schema);
        assert_eq!(properties, before);
    }

    #[test]
    fn table_rules_apply_at_nested_paths() {
        let schema = instance();
        let table = RuleTable::new().with_rule(
            "Test::EC2::Instance",
            "/properties/NetworkInterfaces/*",
            &[&["SubnetId"], &["NetworkInterfaceId"]],
        );
        let mut properties = json!({
            "NetworkInterfaces": [
                {"NetworkInterfaceId": "eni-1", "SubnetId": "subnet-1", "DeviceIndex": "0"}
            ]
        });
        MutualExclusionTransformer::new(&table).transform(&mut properties, &schema);
        assert_eq!(
            properties,
            json!({"NetworkInterfaces": [{"NetworkInterfaceId": "eni-1", "DeviceIndex": "0"}]})
        );
    }

    #[test]
    fn groups_combine_schema_and_table() {
        let schema = instance();
        let table = RuleTable::new().with_rule("Test::EC2::Instance", "/properties", &[&["SubnetId", "PrivateIpAddress"]]);
        let groups = MutualExclusionTransformer::new(&table).groups(&schema, "/properties");
        assert_eq!(
            groups,
            vec![
                vec!["NetworkInterfaces".to_string()],
                vec!["SubnetId".to_string()],
                vec!["SubnetId".to_string(), "PrivateIpAddress".to_string()],
            ]
        );
    }

    #[test]
    fn non_object_input_is_ignored() {
        let schema = instance();
        let mut properties = json!("not an object");
        MutualExclusionTransformer::default().transform(&mut properties, &schema);
        assert_eq!(properties, json!("not an object"));
    }
}

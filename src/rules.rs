//! Per-type property group tables.
//!
//! Some resource types constrain which properties may appear together in ways
//! their schemas do not express. These tables carry those constraints, keyed
//! by resource type and by the property path of the object they apply to.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::{canonical_path, path_segments};

/// Property groups that apply to the object at one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    /// Canonical `/properties/...` path of the object.
    pub path: String,
    pub groups: Vec<Vec<String>>,
}

/// Property groups keyed by resource type.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, Vec<PathRule>>,
}

type Entry = (&'static str, &'static str, &'static [&'static [&'static str]]);

/// Properties that may not appear together, as groups of mutually compatible
/// names. A property is exclusive with every property no group shares with it.
const MUTUAL_EXCLUSION_ENTRIES: &[Entry] = &[
    (
        "AWS::EC2::Instance",
        "/properties",
        &[
            &["NetworkInterfaces"],
            &[
                "SubnetId",
                "SecurityGroupIds",
                "SecurityGroups",
                "PrivateIpAddress",
                "Ipv6AddressCount",
                "Ipv6Addresses",
            ],
        ],
    ),
    (
        "AWS::Lambda::Function",
        "/properties/Code",
        &[&["ZipFile"], &["S3Bucket", "S3Key", "S3ObjectVersion"], &["ImageUri"]],
    ),
    (
        "AWS::EC2::SecurityGroup",
        "/properties/SecurityGroupIngress/*",
        &[
            &["CidrIp"],
            &["CidrIpv6"],
            &["SourcePrefixListId"],
            &[
                "SourceSecurityGroupId",
                "SourceSecurityGroupName",
                "SourceSecurityGroupOwnerId",
            ],
        ],
    ),
    (
        "AWS::EC2::SecurityGroup",
        "/properties/SecurityGroupEgress/*",
        &[
            &["CidrIp"],
            &["CidrIpv6"],
            &["DestinationPrefixListId"],
            &["DestinationSecurityGroupId"],
        ],
    ),
    (
        "AWS::AutoScaling::AutoScalingGroup",
        "/properties",
        &[
            &["LaunchConfigurationName"],
            &["LaunchTemplate"],
            &["MixedInstancesPolicy"],
            &["InstanceId"],
        ],
    ),
];

/// Groups of which at most one member may be present.
const REQUIRED_XOR_ENTRIES: &[Entry] = &[
    (
        "AWS::EC2::Route",
        "/properties",
        &[
            &[
                "CarrierGatewayId",
                "CoreNetworkArn",
                "EgressOnlyInternetGatewayId",
                "GatewayId",
                "InstanceId",
                "LocalGatewayId",
                "NatGatewayId",
                "NetworkInterfaceId",
                "TransitGatewayId",
                "VpcEndpointId",
                "VpcPeeringConnectionId",
            ],
            &[
                "DestinationCidrBlock",
                "DestinationIpv6CidrBlock",
                "DestinationPrefixListId",
            ],
        ],
    ),
    (
        "AWS::Route53::RecordSet",
        "/properties",
        &[&["ResourceRecords", "AliasTarget"], &["HostedZoneId", "HostedZoneName"]],
    ),
    (
        "AWS::ElasticLoadBalancingV2::LoadBalancer",
        "/properties",
        &[&["Subnets", "SubnetMappings"]],
    ),
];

static MUTUAL_EXCLUSIONS: Lazy<RuleTable> = Lazy::new(|| RuleTable::from_entries(MUTUAL_EXCLUSION_ENTRIES));

static REQUIRED_XOR: Lazy<RuleTable> = Lazy::new(|| RuleTable::from_entries(REQUIRED_XOR_ENTRIES));

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in mutual-exclusion table.
    pub fn mutual_exclusions() -> &'static RuleTable {
        &MUTUAL_EXCLUSIONS
    }

    /// Built-in required-XOR table.
    pub fn required_xor() -> &'static RuleTable {
        &REQUIRED_XOR
    }

    fn from_entries(entries: &[Entry]) -> Self {
        entries
            .iter()
            .fold(Self::new(), |table, (type_name, path, groups)| {
                table.with_rule(type_name, path, groups)
            })
    }

    /// Add groups for `type_name` at `path` (builder form).
    pub fn with_rule(mut self, type_name: &str, path: &str, groups: &[&[&str]]) -> Self {
        self.add(
            type_name,
            path,
            groups
                .iter()
                .map(|group| group.iter().map(|name| name.to_string()).collect())
                .collect(),
        );
        self
    }

    /// Add groups for `type_name` at `path`.
    ///
    /// Groups for a path already present are appended to it.
    pub fn add(&mut self, type_name: &str, path: &str, groups: Vec<Vec<String>>) {
        let path = canonical_path(&path_segments(path));
        let rules = self.rules.entry(type_name.to_string()).or_default();
        match rules.iter_mut().find(|rule| rule.path == path) {
            Some(rule) => rule.groups.extend(groups),
            None => rules.push(PathRule { path, groups }),
        }
    }

    /// Every rule registered for a type.
    pub fn rules_for(&self, type_name: &str) -> &[PathRule] {
        self.rules.get(type_name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups that apply to the object at `path` of `type_name`.
    pub fn groups_at(&self, type_name: &str, path: &str) -> Vec<&[String]> {
        let path = canonical_path(&path_segments(path));
        self.rules_for(type_name)
            .iter()
            .filter(|rule| rule.path == path)
            .flat_map(|rule| rule.groups.iter().map(Vec::as_slice))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

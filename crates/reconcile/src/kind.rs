//! Statically declared resource kinds and their reference fields
//!
//! Each plural resource declares which of its item attributes hold names of
//! sibling items. The graph builder is generic over these descriptors.

use crate::types::Item;
use std::fmt;

/// An item attribute holding a list of sibling item names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceField {
    /// Attribute name inside the item
    pub attribute: &'static str,
}

impl ReferenceField {
    pub const fn new(attribute: &'static str) -> Self {
        Self { attribute }
    }

    /// Extract referenced names from an item
    ///
    /// Non-string entries are kept as their JSON text so they surface as
    /// dangling references instead of disappearing.
    pub fn names(&self, item: &Item) -> Vec<String> {
        match item.get(self.attribute) {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Descriptor of a plural resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    /// Plural name, e.g. "network_groups"
    pub name: &'static str,
    /// Attributes that reference other items of the same kind
    pub reference_fields: &'static [ReferenceField],
}

impl ResourceKind {
    pub const fn new(name: &'static str, reference_fields: &'static [ReferenceField]) -> Self {
        Self {
            name,
            reference_fields,
        }
    }

    /// Find a built-in kind by its plural name
    pub fn by_name(name: &str) -> Option<&'static Self> {
        ALL.iter().find(|k| k.name == name)
    }

    /// Whether an attribute is one of this kind's reference fields
    pub fn is_reference(&self, attribute: &str) -> bool {
        self.reference_fields.iter().any(|f| f.attribute == attribute)
    }

    /// Whether items of this kind can reference each other
    pub fn has_references(&self) -> bool {
        !self.reference_fields.is_empty()
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub const HOSTS: ResourceKind = ResourceKind::new("hosts", &[]);
pub const NETWORKS: ResourceKind = ResourceKind::new("networks", &[]);
pub const RANGES: ResourceKind = ResourceKind::new("ranges", &[]);
pub const FQDNS: ResourceKind = ResourceKind::new("fqdns", &[]);
pub const NETWORK_GROUPS: ResourceKind =
    ResourceKind::new("network_groups", &[ReferenceField::new("network_groups")]);
pub const PORTS: ResourceKind = ResourceKind::new("ports", &[]);
pub const ICMPV4_OBJECTS: ResourceKind = ResourceKind::new("icmpv4_objects", &[]);
pub const URLS: ResourceKind = ResourceKind::new("urls", &[]);
pub const VLAN_TAGS: ResourceKind = ResourceKind::new("vlan_tags", &[]);
pub const SGTS: ResourceKind = ResourceKind::new("sgts", &[]);
pub const KEY_CHAINS: ResourceKind = ResourceKind::new("key_chains", &[]);
pub const DYNAMIC_OBJECTS: ResourceKind = ResourceKind::new("dynamic_objects", &[]);

/// Every built-in kind
pub const ALL: &[ResourceKind] = &[
    HOSTS,
    NETWORKS,
    RANGES,
    FQDNS,
    NETWORK_GROUPS,
    PORTS,
    ICMPV4_OBJECTS,
    URLS,
    VLAN_TAGS,
    SGTS,
    KEY_CHAINS,
    DYNAMIC_OBJECTS,
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_by_name() {
        assert_eq!(ResourceKind::by_name("network_groups"), Some(&NETWORK_GROUPS));
        assert!(ResourceKind::by_name("nope").is_none());
    }

    #[test]
    fn test_only_network_groups_reference_siblings() {
        let with_refs: Vec<_> = ALL.iter().filter(|k| k.has_references()).collect();
        assert_eq!(with_refs, vec![&NETWORK_GROUPS]);
        assert!(NETWORK_GROUPS.is_reference("network_groups"));
        assert!(!NETWORK_GROUPS.is_reference("literals"));
    }

    #[test]
    fn test_reference_names() {
        let field = ReferenceField::new("network_groups");
        let item = Item::default().with("network_groups", json!(["g2", "g3", 7]));
        assert_eq!(field.names(&item), vec!["g2", "g3", "7"]);
        assert!(field.names(&Item::default()).is_empty());
    }
}

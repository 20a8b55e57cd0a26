//! Interface identity resolution.
//!
//! The device names physical interfaces with a type plus a compact
//! stack/port identifier ("TengigabitEthernet 1/24/1"); manifests address
//! them by the compact label alone ("1/24/1"). [`IdentityMap`] holds the
//! bidirectional mapping between the two, built from the parsed tree.

use std::collections::BTreeMap;

use crate::tree::ConfigNode;

/// Interface types that are not physical ports. They live in their own
/// namespaces (VLAN ids, port-channel ids, ...) and never enter the map.
/// Matched case-insensitively as substrings of the type token.
const EXCLUDED_INTERFACE_TYPES: &[&str] = &[
    "managementethernet",
    "vlan",
    "port-channel",
    "group",
    "loopback",
    "null",
    "tunnel",
];

/// Bidirectional compact-label / qualified-name map.
///
/// A compact label maps to exactly one qualified name at a given topology
/// snapshot; after a fanout change the map must be rebuilt (or patched by
/// the fanout planner) before dependent components run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityMap {
    forward: BTreeMap<String, String>,
    reverse: BTreeMap<String, String>,
}

impl IdentityMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from the top-level keys of a parsed tree.
    ///
    /// Only keys starting with `interface ` whose type token is not in the
    /// exclusion set participate.
    pub fn from_tree(tree: &ConfigNode) -> Self {
        let mut map = Self::new();
        for key in tree.keys_with_prefix("interface ") {
            let parts: Vec<&str> = key.split_whitespace().collect();
            if parts.len() < 3 {
                continue;
            }
            let intf_type = parts[1];
            if is_excluded_type(intf_type) {
                continue;
            }
            map.insert(parts[2], format!("{} {}", intf_type, parts[2]));
        }
        map
    }

    /// Qualified name for a compact label, if the interface exists.
    ///
    /// `None` means "interface does not exist on this device": callers must
    /// treat it as a per-item warning/skip, never a hard failure, since
    /// manifests may reference not-yet-created fanout children.
    pub fn qualified(&self, label: &str) -> Option<&str> {
        self.forward.get(label).map(String::as_str)
    }

    /// Compact label for a qualified name, if known.
    pub fn label(&self, qualified: &str) -> Option<&str> {
        self.reverse.get(qualified).map(String::as_str)
    }

    /// Inserts a label/qualified pair into both directions.
    pub fn insert(&mut self, label: impl Into<String>, qualified: impl Into<String>) {
        let label = label.into();
        let qualified = qualified.into();
        self.reverse.insert(qualified.clone(), label.clone());
        self.forward.insert(label, qualified);
    }

    /// Removes a label and its qualified name from both directions.
    pub fn remove_label(&mut self, label: &str) -> Option<String> {
        let qualified = self.forward.remove(label)?;
        self.reverse.remove(&qualified);
        Some(qualified)
    }

    /// All `(label, qualified)` pairs whose label starts with `prefix`,
    /// in label order.
    pub fn labels_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.forward
            .iter()
            .filter(|(label, _)| label.starts_with(prefix))
            .map(|(l, q)| (l.clone(), q.clone()))
            .collect()
    }

    /// Number of known interfaces.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// True if no interfaces are known.
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

fn is_excluded_type(intf_type: &str) -> bool {
    let lower = intf_type.to_ascii_lowercase();
    EXCLUDED_INTERFACE_TYPES
        .iter()
        .any(|excl| lower.contains(excl))
}

//! VLAN membership reconciliation.
//!
//! Membership is declared per interface (`untagged_vlan`, `tagged_vlans`)
//! but the device configures it from the VLAN's perspective: each
//! `interface Vlan N` block lists its member ports. This stage expands the
//! device's range syntax into per-port assignment sets, replays the
//! manifest against them, and emits one fragment per VLAN block. Membership
//! a declared port holds on the device but does not reassert is negated;
//! ports not named in the manifest are never touched.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use os9_cfgmgr_common::{
    expand_member_spec, CommandFragment, ConfigNode, IdentityMap, ReconcileWarning,
};

use crate::manifest::{InterfaceSpec, Manifest, TaggedVlans};

/// The device default VLAN; never reconciled.
const DEFAULT_VLAN_ID: u16 = 1;

/// Output of the VLAN stage.
#[derive(Debug, Clone, Default)]
pub struct VlanPass {
    /// One fragment per touched VLAN id, interface-declared order first.
    pub fragments: Vec<CommandFragment>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Current membership of one port, as reported by the device.
#[derive(Debug, Clone, Default)]
struct PortVlans {
    untagged: BTreeSet<u16>,
    tagged: BTreeSet<u16>,
}

/// Reconciles VLAN membership for every declared interface and
/// port-channel. `reset` names interfaces whose reported membership cannot
/// be trusted: their declared membership is re-added unconditionally and
/// nothing is negated for them.
pub fn run(
    manifest: &Manifest,
    tree: &ConfigNode,
    identity: &IdentityMap,
    reset: &BTreeSet<String>,
) -> VlanPass {
    let mut current = current_assignments(tree);
    let mut frags: Vec<(u16, Vec<String>)> = Vec::new();
    let mut warnings = Vec::new();

    let mut declared: Vec<(String, &InterfaceSpec)> = Vec::new();
    for (label, spec) in &manifest.interfaces {
        if spec.fanout.is_some() {
            // Split ports are handled by the fanout stage and carry no
            // membership of their own.
            continue;
        }
        match identity.qualified(label) {
            Some(q) => declared.push((q.to_string(), spec)),
            None => {
                warn!("interface '{}' does not exist on this device, skipping", label);
                warnings.push(ReconcileWarning::UnknownInterface {
                    label: label.clone(),
                });
            }
        }
    }
    for (pc_id, pc) in &manifest.port_channels {
        declared.push((format!("Port-channel {}", pc_id), &pc.interface));
    }

    for (qualified, spec) in declared {
        let mut cur = current.remove(&qualified).unwrap_or_default();
        if reset.contains(&qualified) {
            // A reset port's membership was evicted on the device; re-add
            // everything and negate nothing.
            cur = PortVlans::default();
        }

        if let Some(vlan_id) = spec.untagged_vlan {
            if vlan_id != DEFAULT_VLAN_ID && !cur.untagged.remove(&vlan_id) {
                vlan_lines(&mut frags, vlan_id).push(format!("untagged {}", qualified));
            }
        }
        for vlan_id in tagged_ids(spec, manifest) {
            if vlan_id != DEFAULT_VLAN_ID && !cur.tagged.remove(&vlan_id) {
                vlan_lines(&mut frags, vlan_id).push(format!("tagged {}", qualified));
            }
        }

        // Whatever the manifest did not reassert comes off the device.
        for vlan_id in cur.untagged {
            if vlan_id != DEFAULT_VLAN_ID {
                vlan_lines(&mut frags, vlan_id).push(format!("no untagged {}", qualified));
            }
        }
        for vlan_id in cur.tagged {
            if vlan_id != DEFAULT_VLAN_ID {
                vlan_lines(&mut frags, vlan_id).push(format!("no tagged {}", qualified));
            }
        }
    }

    // Prefix each VLAN block with its declared name/description, and emit
    // blocks for VLANs whose metadata changed even without membership work.
    for (vlan_id, vlan) in &manifest.vlans {
        if *vlan_id == DEFAULT_VLAN_ID {
            continue;
        }
        let block = tree.get(&format!("interface Vlan {}", vlan_id));
        let mut prefix = Vec::new();
        if let Some(name) = &vlan.name {
            let want = format!("name {}", name);
            if !block.is_some_and(|b| b.contains(&want)) {
                prefix.push(want);
            }
        }
        if let Some(desc) = &vlan.interface.description {
            let want = format!("description {}", desc);
            if !block.is_some_and(|b| b.contains(&want)) {
                prefix.push(want);
            }
        }
        if prefix.is_empty() {
            continue;
        }
        let lines = vlan_lines(&mut frags, *vlan_id);
        for (i, line) in prefix.into_iter().enumerate() {
            lines.insert(i, line);
        }
    }

    let fragments = frags
        .into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(id, lines)| CommandFragment::scoped(format!("interface Vlan {}", id), lines))
        .collect();

    VlanPass {
        fragments,
        warnings,
    }
}

/// Tagged VLAN ids declared for an interface; the `all` keyword expands to
/// every VLAN id declared in the manifest.
fn tagged_ids(spec: &InterfaceSpec, manifest: &Manifest) -> Vec<u16> {
    match &spec.tagged_vlans {
        Some(tagged) if tagged.is_all() => manifest.vlans.keys().copied().collect(),
        Some(TaggedVlans::List(ids)) => ids.clone(),
        _ => Vec::new(),
    }
}

/// Line list for a VLAN id, created at first touch to preserve order.
fn vlan_lines(frags: &mut Vec<(u16, Vec<String>)>, vlan_id: u16) -> &mut Vec<String> {
    let pos = match frags.iter().position(|(id, _)| *id == vlan_id) {
        Some(pos) => pos,
        None => {
            frags.push((vlan_id, Vec::new()));
            frags.len() - 1
        }
    };
    &mut frags[pos].1
}

/// Expands every `interface Vlan N` block into per-port assignment sets.
fn current_assignments(tree: &ConfigNode) -> BTreeMap<String, PortVlans> {
    let mut map: BTreeMap<String, PortVlans> = BTreeMap::new();
    for key in tree.keys_with_prefix("interface Vlan ") {
        let Some(vlan_id) = key
            .rsplit(' ')
            .next()
            .and_then(|id| id.parse::<u16>().ok())
        else {
            continue;
        };
        let Some(block) = tree.get(key) else { continue };
        for line in block.keys() {
            if let Some(rest) = line.strip_prefix("untagged ") {
                for member in expand_member_spec(rest) {
                    map.entry(member).or_default().untagged.insert(vlan_id);
                }
            } else if let Some(rest) = line.strip_prefix("tagged ") {
                for member in expand_member_spec(rest) {
                    map.entry(member).or_default().tagged.insert(vlan_id);
                }
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use os9_cfgmgr_common::parse_config;
    use pretty_assertions::assert_eq;

    fn setup(config: &str) -> (ConfigNode, IdentityMap) {
        let tree = parse_config(config);
        let identity = IdentityMap::from_tree(&tree);
        (tree, identity)
    }

    fn manifest_with(label: &str, spec: InterfaceSpec) -> Manifest {
        let mut m = Manifest::default();
        m.interfaces.insert(label.to_string(), spec);
        m
    }

    fn find<'a>(pass: &'a VlanPass, scope: &str) -> &'a CommandFragment {
        pass.fragments
            .iter()
            .find(|f| f.scope == vec![scope.to_string()])
            .unwrap_or_else(|| panic!("no fragment scoped to '{}'", scope))
    }

    #[test]
    fn test_untagged_add() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/1\n switchport\n!\n",
        );
        let manifest = manifest_with(
            "1/1",
            InterfaceSpec {
                untagged_vlan: Some(100),
                ..Default::default()
            },
        );
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert_eq!(
            find(&pass, "interface Vlan 100").lines,
            vec!["untagged TengigabitEthernet 1/1"]
        );
    }

    #[test]
    fn test_untagged_already_present_is_noop() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/1\n switchport\n!\n\
             interface Vlan 100\n untagged TengigabitEthernet 1/1\n!\n",
        );
        let manifest = manifest_with(
            "1/1",
            InterfaceSpec {
                untagged_vlan: Some(100),
                ..Default::default()
            },
        );
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert!(pass.fragments.is_empty());
    }

    #[test]
    fn test_stale_tagged_membership_is_negated() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/2\n switchport\n!\n\
             interface Vlan 200\n tagged TengigabitEthernet 1/2\n!\n",
        );
        let manifest = manifest_with("1/2", InterfaceSpec::default());
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert_eq!(
            find(&pass, "interface Vlan 200").lines,
            vec!["no tagged TengigabitEthernet 1/2"]
        );
    }

    #[test]
    fn test_range_expansion_in_current_state() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/2\n switchport\n!\n\
             interface Vlan 300\n tagged TengigabitEthernet 1/1-1/3\n!\n",
        );
        let manifest = manifest_with(
            "1/2",
            InterfaceSpec {
                tagged_vlans: Some(TaggedVlans::List(vec![300])),
                ..Default::default()
            },
        );
        // 1/2 already tagged via the range; nothing to do for it, and the
        // other range members are undeclared so they are left alone.
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert!(pass.fragments.is_empty());
    }

    #[test]
    fn test_tagged_all_expands_to_declared_vlans() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/1\n switchport\n!\n",
        );
        let mut manifest = manifest_with(
            "1/1",
            InterfaceSpec {
                tagged_vlans: Some(TaggedVlans::Keyword("all".to_string())),
                ..Default::default()
            },
        );
        manifest.vlans.insert(100, Default::default());
        manifest.vlans.insert(200, Default::default());

        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert_eq!(
            find(&pass, "interface Vlan 100").lines,
            vec!["tagged TengigabitEthernet 1/1"]
        );
        assert_eq!(
            find(&pass, "interface Vlan 200").lines,
            vec!["tagged TengigabitEthernet 1/1"]
        );
    }

    #[test]
    fn test_default_vlan_is_skipped() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/1\n switchport\n!\n\
             interface Vlan 1\n untagged TengigabitEthernet 1/1\n!\n",
        );
        let manifest = manifest_with(
            "1/1",
            InterfaceSpec {
                untagged_vlan: Some(1),
                ..Default::default()
            },
        );
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert!(pass.fragments.is_empty());
    }

    #[test]
    fn test_reset_port_readds_unconditionally() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/1\n switchport\n!\n\
             interface Vlan 100\n untagged TengigabitEthernet 1/1\n tagged TengigabitEthernet 1/9\n!\n",
        );
        let manifest = manifest_with(
            "1/1",
            InterfaceSpec {
                untagged_vlan: Some(100),
                ..Default::default()
            },
        );
        let reset: BTreeSet<String> = ["TengigabitEthernet 1/1".to_string()].into();
        let pass = run(&manifest, &tree, &identity, &reset);
        // Re-added despite the device already reporting it, and the stale
        // report is not negated.
        assert_eq!(
            find(&pass, "interface Vlan 100").lines,
            vec!["untagged TengigabitEthernet 1/1"]
        );
    }

    #[test]
    fn test_vlan_name_and_description_prefix() {
        let (tree, identity) = setup(
            "interface TengigabitEthernet 1/1\n switchport\n!\n",
        );
        let mut manifest = manifest_with(
            "1/1",
            InterfaceSpec {
                untagged_vlan: Some(100),
                ..Default::default()
            },
        );
        manifest.vlans.insert(
            100,
            crate::manifest::VlanSpec {
                name: Some("servers".to_string()),
                interface: InterfaceSpec {
                    description: Some("server network".to_string()),
                    ..Default::default()
                },
            },
        );
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert_eq!(
            find(&pass, "interface Vlan 100").lines,
            vec![
                "name servers",
                "description server network",
                "untagged TengigabitEthernet 1/1",
            ]
        );
    }

    #[test]
    fn test_vlan_name_already_set_suppressed() {
        let (tree, identity) = setup("interface Vlan 100\n name servers\n!\n");
        let mut manifest = Manifest::default();
        manifest.vlans.insert(
            100,
            crate::manifest::VlanSpec {
                name: Some("servers".to_string()),
                interface: InterfaceSpec::default(),
            },
        );
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert!(pass.fragments.is_empty());
    }

    #[test]
    fn test_unknown_interface_warns_and_continues() {
        let (tree, identity) = setup("interface TengigabitEthernet 1/1\n switchport\n!\n");
        let mut manifest = manifest_with(
            "1/9/1",
            InterfaceSpec {
                untagged_vlan: Some(100),
                ..Default::default()
            },
        );
        manifest.interfaces.insert(
            "1/1".to_string(),
            InterfaceSpec {
                untagged_vlan: Some(100),
                ..Default::default()
            },
        );
        let pass = run(&manifest, &tree, &identity, &BTreeSet::new());
        assert_eq!(
            pass.warnings,
            vec![ReconcileWarning::UnknownInterface {
                label: "1/9/1".to_string()
            }]
        );
        // The known interface is still reconciled.
        assert_eq!(
            find(&pass, "interface Vlan 100").lines,
            vec!["untagged TengigabitEthernet 1/1"]
        );
    }
}

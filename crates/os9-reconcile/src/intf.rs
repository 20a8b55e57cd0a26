//! Interface attribute reconciliation.
//!
//! For each declared interface (physical, VLAN, or port-channel) this stage
//! diffs the manifest attributes against the interface's current block and
//! emits one command fragment scoped to `interface <name>`.
//!
//! The general rule: a field present in the manifest asserts its exact line
//! when it differs from or is absent on the device; a field absent from the
//! manifest negates the matching device line. A brand-new or just-defaulted
//! interface ("fresh") gets every desired line unconditionally, because its
//! reported state cannot be trusted. A switching-mode change marks the
//! interface "reset": attributes are re-asserted unconditionally and the
//! VLAN stage re-adds its membership from scratch.

use std::collections::BTreeSet;

use tracing::warn;

use os9_cfgmgr_common::{
    CommandFragment, ConfigNode, IdentityMap, ReconcileError, ReconcileResult, ReconcileWarning,
};

use crate::manifest::{InterfaceSpec, Manifest};

/// The three spanning-tree protocol variants; only one is live at a time,
/// so edge-port is set or cleared on all of them together.
const STP_EDGE_LINES: [&str; 3] = [
    "spanning-tree rstp edge-port",
    "spanning-tree mstp edge-port",
    "spanning-tree pvst edge-port",
];

/// Interface namespace, which controls which attribute groups apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    Physical,
    Vlan,
    PortChannel,
}

/// Commands for one interface plus the reset marker consumed by the VLAN
/// stage.
#[derive(Debug, Clone, Default)]
pub struct InterfaceCommands {
    pub lines: Vec<String>,
    /// True if the interface is fresh or its switching mode changed; its
    /// current VLAN membership must not be trusted.
    pub reset: bool,
}

/// Output of the attribute stage.
#[derive(Debug, Clone, Default)]
pub struct AttributePass {
    /// Fragments for physical interfaces, in manifest order.
    pub interface_fragments: Vec<CommandFragment>,
    /// Fragments for port-channel interfaces, in manifest order.
    pub port_channel_fragments: Vec<CommandFragment>,
    /// Fragments for VLAN interfaces; assembled into the VLAN stage output.
    pub vlan_fragments: Vec<CommandFragment>,
    /// Qualified names of reset interfaces.
    pub reset: BTreeSet<String>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Runs attribute reconciliation for every declared interface, port-channel
/// and VLAN.
pub fn run(
    manifest: &Manifest,
    tree: &ConfigNode,
    identity: &IdentityMap,
    fresh: &BTreeSet<String>,
) -> ReconcileResult<AttributePass> {
    let mut pass = AttributePass::default();

    for (label, spec) in &manifest.interfaces {
        if spec.fanout.is_some() {
            // A fanout entry describes the split itself; once split, the
            // parent port is no longer an addressable interface.
            continue;
        }
        let Some(qualified) = identity.qualified(label).map(String::from) else {
            warn!("interface '{}' does not exist on this device, skipping", label);
            pass.warnings.push(ReconcileWarning::UnknownInterface {
                label: label.clone(),
            });
            continue;
        };
        let block_key = format!("interface {}", qualified);
        let cmds = reconcile_interface(
            spec,
            &qualified,
            tree.get(&block_key),
            InterfaceKind::Physical,
            fresh.contains(&qualified),
        )?;
        if cmds.reset {
            pass.reset.insert(qualified);
        }
        if !cmds.lines.is_empty() {
            pass.interface_fragments
                .push(CommandFragment::scoped(block_key, cmds.lines));
        }
    }

    for (pc_id, pc) in &manifest.port_channels {
        let qualified = format!("Port-channel {}", pc_id);
        let block_key = format!("interface {}", qualified);
        let cmds = reconcile_interface(
            &pc.interface,
            &qualified,
            tree.get(&block_key),
            InterfaceKind::PortChannel,
            false,
        )?;
        if cmds.reset {
            pass.reset.insert(qualified);
        }
        if !cmds.lines.is_empty() {
            pass.port_channel_fragments
                .push(CommandFragment::scoped(block_key, cmds.lines));
        }
    }

    for (vlan_id, vlan) in &manifest.vlans {
        let qualified = format!("Vlan {}", vlan_id);
        let block_key = format!("interface {}", qualified);
        // The VLAN stage owns the name/description prefix of VLAN blocks.
        let spec = InterfaceSpec {
            description: None,
            ..vlan.interface.clone()
        };
        let cmds = reconcile_interface(
            &spec,
            &qualified,
            tree.get(&block_key),
            InterfaceKind::Vlan,
            false,
        )?;
        if !cmds.lines.is_empty() {
            pass.vlan_fragments
                .push(CommandFragment::scoped(block_key, cmds.lines));
        }
    }

    Ok(pass)
}

/// Reconciles one interface's attributes against its current block.
///
/// `current` is `None` when the device does not report the block at all
/// (implies fresh); `fresh_hint` is set for interfaces defaulted or created
/// earlier in the pass.
pub fn reconcile_interface(
    spec: &InterfaceSpec,
    qualified: &str,
    current: Option<&ConfigNode>,
    kind: InterfaceKind,
    fresh_hint: bool,
) -> ReconcileResult<InterfaceCommands> {
    let l2 = spec.has_l2_fields();
    let l3 = spec.has_l3_fields();
    if l2 && l3 {
        return Err(ReconcileError::manifest(
            qualified,
            "cannot operate in both L2 and L3 mode",
        ));
    }
    if kind == InterfaceKind::Vlan && l2 {
        return Err(ReconcileError::manifest(
            qualified,
            "VLAN interfaces are L3-only and cannot carry L2 fields",
        ));
    }

    let fresh = fresh_hint || current.is_none();
    let has = |line: &str| current.is_some_and(|c| c.contains(line));
    let prefixed = |prefix: &str| -> Vec<String> {
        current
            .map(|c| c.keys_with_prefix(prefix).map(String::from).collect())
            .unwrap_or_default()
    };

    let transition = mode_transition_needed(spec, kind, l2, l3, &has);
    // Once the mode changes, the device's reported state is stale: assert
    // every declared line unconditionally.
    let assert_all = fresh || transition;
    let mut lines: Vec<String> = Vec::new();

    if l2 {
        if !fresh {
            for line in prefixed("ip address ") {
                lines.push(format!("no {}", line));
            }
            for line in prefixed("ipv6 address ") {
                lines.push(format!("no {}", line));
            }
        }
        let hybrid = spec.wants_hybrid();
        let has_sw = has("switchport");
        let has_hybrid = has("portmode hybrid");
        if fresh {
            if hybrid {
                lines.push("portmode hybrid".to_string());
            }
            lines.push("switchport".to_string());
        } else if hybrid && !has_hybrid {
            // portmode hybrid cannot be applied while already in plain
            // switchport mode.
            if has_sw {
                lines.push("no switchport".to_string());
            }
            lines.push("portmode hybrid".to_string());
            lines.push("switchport".to_string());
        } else if !hybrid && has_hybrid {
            lines.push("no switchport".to_string());
            lines.push("no portmode hybrid".to_string());
            lines.push("switchport".to_string());
        } else if !has_sw {
            lines.push("switchport".to_string());
        }
    } else if l3 {
        if kind != InterfaceKind::Vlan && !fresh {
            if has("portmode hybrid") {
                lines.push("no switchport".to_string());
                lines.push("no portmode hybrid".to_string());
            } else if has("switchport") {
                lines.push("no switchport".to_string());
            }
        }
        match &spec.ip4 {
            // An address change is an overwrite, not remove+add.
            Some(addr) => {
                let want = format!("ip address {}", addr);
                if assert_all || !has(&want) {
                    lines.push(want);
                }
            }
            None => {
                if !fresh {
                    for line in prefixed("ip address ") {
                        lines.push(format!("no {}", line));
                    }
                }
            }
        }
        match &spec.ip6 {
            Some(addr) => {
                let want = format!("ipv6 address {}", addr);
                if assert_all || !has(&want) {
                    lines.push(want);
                }
            }
            None => {
                if !fresh {
                    for line in prefixed("ipv6 address ") {
                        lines.push(format!("no {}", line));
                    }
                }
            }
        }
        match spec.keepalive {
            Some(true) => {
                if assert_all || !has("keepalive") {
                    lines.push("keepalive".to_string());
                }
            }
            Some(false) => {
                if assert_all || !has("no keepalive") {
                    lines.push("no keepalive".to_string());
                }
            }
            None => {}
        }
    }

    match &spec.description {
        Some(desc) => {
            if desc.is_empty() {
                return Err(ReconcileError::manifest(
                    qualified,
                    "description must not be an empty string",
                ));
            }
            let want = format!("description {}", desc);
            if assert_all || !has(&want) {
                lines.push(want);
            }
        }
        None => {
            if !fresh {
                for line in prefixed("description ") {
                    lines.push(format!("no {}", line));
                }
            }
        }
    }

    if let Some(admin) = spec.admin {
        let want = admin.command();
        if assert_all || !has(want) {
            lines.push(want.to_string());
        }
    }

    match spec.mtu {
        Some(mtu) => {
            let want = format!("mtu {}", mtu);
            if assert_all || !has(&want) {
                lines.push(want);
            }
        }
        None => {
            if !fresh {
                for line in prefixed("mtu ") {
                    lines.push(format!("no {}", line));
                }
            }
        }
    }

    if kind != InterfaceKind::Vlan {
        if spec.stp_edge == Some(true) {
            for variant in STP_EDGE_LINES {
                if assert_all || !has(variant) {
                    lines.push(variant.to_string());
                }
            }
        } else if !fresh {
            for variant in STP_EDGE_LINES {
                if has(variant) {
                    lines.push(format!("no {}", variant));
                }
            }
        }
    }

    for custom in &spec.additional {
        if assert_all || !has(custom) {
            lines.push(custom.clone());
        }
    }

    Ok(InterfaceCommands {
        lines,
        reset: assert_all,
    })
}

/// Whether applying the manifest changes the interface's switching mode.
fn mode_transition_needed(
    spec: &InterfaceSpec,
    kind: InterfaceKind,
    l2: bool,
    l3: bool,
    has: &impl Fn(&str) -> bool,
) -> bool {
    if kind == InterfaceKind::Vlan {
        return false;
    }
    let has_sw = has("switchport");
    let has_hybrid = has("portmode hybrid");
    if l2 {
        let hybrid = spec.wants_hybrid();
        (hybrid && !has_hybrid) || (!hybrid && has_hybrid) || !has_sw
    } else if l3 {
        has_sw || has_hybrid
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use os9_cfgmgr_common::parse_config;
    use pretty_assertions::assert_eq;

    fn block(text: &str) -> ConfigNode {
        parse_config(text)
    }

    fn reconcile(
        spec: &InterfaceSpec,
        current: Option<&ConfigNode>,
    ) -> InterfaceCommands {
        reconcile_interface(
            spec,
            "TengigabitEthernet 1/1",
            current,
            InterfaceKind::Physical,
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_l2_mode_already_correct_emits_nothing() {
        let cur = block("switchport\nno shutdown\n");
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(cmds.lines, Vec::<String>::new());
        assert!(!cmds.reset);
    }

    #[test]
    fn test_l3_to_l2_transition() {
        let cur = block("ip address 10.0.0.1/24\nno shutdown\n");
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(
            cmds.lines,
            vec!["no ip address 10.0.0.1/24", "switchport"]
        );
        assert!(cmds.reset);
    }

    #[test]
    fn test_l2_to_hybrid_requires_mode_dance() {
        let cur = block("switchport\n");
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            tagged_vlans: Some(crate::manifest::TaggedVlans::List(vec![200])),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(
            cmds.lines,
            vec!["no switchport", "portmode hybrid", "switchport"]
        );
        assert!(cmds.reset);
    }

    #[test]
    fn test_hybrid_to_plain_l2() {
        let cur = block("portmode hybrid\nswitchport\n");
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(
            cmds.lines,
            vec!["no switchport", "no portmode hybrid", "switchport"]
        );
    }

    #[test]
    fn test_l2_to_l3_transition() {
        let cur = block("switchport\n");
        let spec = InterfaceSpec {
            ip4: Some("192.168.1.1/24".to_string()),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(
            cmds.lines,
            vec!["no switchport", "ip address 192.168.1.1/24"]
        );
        assert!(cmds.reset);
    }

    #[test]
    fn test_l3_address_overwrite_not_remove_add() {
        let cur = block("ip address 10.0.0.1/24\n");
        let spec = InterfaceSpec {
            ip4: Some("10.0.0.2/24".to_string()),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(cmds.lines, vec!["ip address 10.0.0.2/24"]);
        assert!(!cmds.reset);
    }

    #[test]
    fn test_l3_address_already_set_is_noop() {
        let cur = block("ip address 10.0.0.1/24\n");
        let spec = InterfaceSpec {
            ip4: Some("10.0.0.1/24".to_string()),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert!(cmds.lines.is_empty());
    }

    #[test]
    fn test_l3_absent_address_is_negated() {
        let cur = block("ip address 10.0.0.1/24\nipv6 address 2001:db8::1/64\n");
        let spec = InterfaceSpec {
            ip4: Some("10.0.0.1/24".to_string()),
            keepalive: Some(true),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(
            cmds.lines,
            vec!["no ipv6 address 2001:db8::1/64", "keepalive"]
        );
    }

    #[test]
    fn test_both_modes_is_fatal() {
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            ip4: Some("10.0.0.1/24".to_string()),
            ..Default::default()
        };
        let err = reconcile_interface(
            &spec,
            "TengigabitEthernet 1/1",
            None,
            InterfaceKind::Physical,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both L2 and L3"));
    }

    #[test]
    fn test_l2_fields_on_vlan_is_fatal() {
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let err =
            reconcile_interface(&spec, "Vlan 200", None, InterfaceKind::Vlan, false).unwrap_err();
        assert!(err.to_string().contains("L3-only"));
    }

    #[test]
    fn test_description_admin_mtu_diffing() {
        let cur = block("description uplink\nmtu 9216\nshutdown\n");
        let spec = InterfaceSpec {
            description: Some("uplink".to_string()),
            mtu: Some(1500),
            admin: Some(crate::manifest::AdminState::Up),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(cmds.lines, vec!["no shutdown", "mtu 1500"]);
    }

    #[test]
    fn test_absent_fields_negate_existing_lines() {
        let cur = block("description old uplink\nmtu 9216\n");
        let cmds = reconcile(&InterfaceSpec::default(), Some(&cur));
        assert_eq!(
            cmds.lines,
            vec!["no description old uplink", "no mtu 9216"]
        );
    }

    #[test]
    fn test_empty_description_is_fatal() {
        let spec = InterfaceSpec {
            description: Some(String::new()),
            ..Default::default()
        };
        let err = reconcile_interface(
            &spec,
            "TengigabitEthernet 1/1",
            None,
            InterfaceKind::Physical,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_stp_edge_sets_all_three_variants() {
        let cur = block("switchport\n");
        let spec = InterfaceSpec {
            stp_edge: Some(true),
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(
            cmds.lines,
            vec![
                "spanning-tree rstp edge-port",
                "spanning-tree mstp edge-port",
                "spanning-tree pvst edge-port",
            ]
        );
    }

    #[test]
    fn test_stp_edge_absent_clears_present_variants() {
        let cur = block("switchport\nspanning-tree rstp edge-port\n");
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(cmds.lines, vec!["no spanning-tree rstp edge-port"]);
    }

    #[test]
    fn test_fresh_interface_emits_everything_unconditionally() {
        let spec = InterfaceSpec {
            description: Some("server".to_string()),
            admin: Some(crate::manifest::AdminState::Up),
            mtu: Some(9216),
            untagged_vlan: Some(100),
            ..Default::default()
        };
        let cmds = reconcile_interface(
            &spec,
            "TengigabitEthernet 1/5/1",
            None,
            InterfaceKind::Physical,
            true,
        )
        .unwrap();
        assert_eq!(
            cmds.lines,
            vec!["switchport", "description server", "no shutdown", "mtu 9216"]
        );
        assert!(cmds.reset);
    }

    #[test]
    fn test_custom_lines_asserted_never_negated() {
        let cur = block("switchport\nrate-interval 30\n");
        let spec = InterfaceSpec {
            untagged_vlan: Some(100),
            additional: vec!["rate-interval 30".to_string(), "flowcontrol rx on".to_string()],
            ..Default::default()
        };
        let cmds = reconcile(&spec, Some(&cur));
        assert_eq!(cmds.lines, vec!["flowcontrol rx on"]);
    }
}

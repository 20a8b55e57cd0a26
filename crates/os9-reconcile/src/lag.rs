//! Link-aggregation reconciliation.
//!
//! Static ("normal") port-channels list members as `channel-member` lines
//! inside their own block. LACP port-channels are configured from the
//! member's side instead: each member interface carries a
//! `port-channel-protocol LACP` block with a `port-channel N mode active`
//! line. Removal uses `no port-channel N` directly in the member's block,
//! matching the device's removal syntax.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use os9_cfgmgr_common::{
    expand_member_spec, CommandFragment, ConfigNode, IdentityMap, ReconcileWarning,
};

use crate::manifest::{LacpRate, LagMode, Manifest};

const LACP_PROTOCOL_BLOCK: &str = "port-channel-protocol LACP";

/// Output of the LAG stage.
#[derive(Debug, Clone, Default)]
pub struct LagPass {
    pub fragments: Vec<CommandFragment>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Per-interface view of existing LACP attachment: port-channel id → the
/// full mode line as reported.
type LacpIndex = BTreeMap<String, BTreeMap<u32, String>>;

/// Reconciles membership for every declared port-channel.
pub fn run(manifest: &Manifest, tree: &ConfigNode, identity: &IdentityMap) -> LagPass {
    let mut pass = LagPass::default();
    let lacp_index = build_lacp_index(tree);
    // Lines removed from each interface's LACP block this pass, for the
    // empty-block cleanup afterwards.
    let mut lacp_removed: BTreeMap<String, usize> = BTreeMap::new();

    for (pc_id, pc) in &manifest.port_channels {
        let pc_block_key = format!("interface Port-channel {}", pc_id);
        let block = tree.get(&pc_block_key);

        let mut declared: Vec<String> = Vec::new();
        for label in &pc.members {
            match identity.qualified(label) {
                Some(q) => declared.push(q.to_string()),
                None => {
                    warn!("interface '{}' does not exist on this device, skipping", label);
                    pass.warnings.push(ReconcileWarning::UnknownInterface {
                        label: label.clone(),
                    });
                }
            }
        }

        match pc.mode {
            LagMode::Normal => {
                let current: BTreeSet<String> = block
                    .map(|b| {
                        b.keys()
                            .filter_map(|line| line.strip_prefix("channel-member "))
                            .flat_map(expand_member_spec)
                            .collect()
                    })
                    .unwrap_or_default();

                let mut lines = Vec::new();
                for member in &current {
                    if !declared.contains(member) {
                        lines.push(format!("no channel-member {}", member));
                    }
                }
                for member in &declared {
                    if !current.contains(member) {
                        lines.push(format!("channel-member {}", member));
                    }
                }
                if !lines.is_empty() {
                    pass.fragments
                        .push(CommandFragment::scoped(pc_block_key.clone(), lines));
                }
            }
            LagMode::Lacp => {
                let active_line = format!("port-channel {} mode active", pc_id);
                for member in &declared {
                    let already_active = lacp_index
                        .get(member)
                        .and_then(|attached| attached.get(pc_id))
                        .is_some_and(|line| *line == active_line);
                    if !already_active {
                        pass.fragments.push(CommandFragment {
                            scope: vec![
                                format!("interface {}", member),
                                LACP_PROTOCOL_BLOCK.to_string(),
                            ],
                            lines: vec![active_line.clone()],
                        });
                    }
                }

                // Previously-attached members no longer declared come off
                // with the device's removal syntax, in the member's own
                // block rather than under the protocol block.
                for (member, attached) in &lacp_index {
                    if attached.contains_key(pc_id) && !declared.contains(member) {
                        pass.fragments.push(CommandFragment::scoped(
                            format!("interface {}", member),
                            vec![format!("no port-channel {}", pc_id)],
                        ));
                        *lacp_removed.entry(member.clone()).or_default() += 1;
                    }
                }

                if let Some(rate) = pc.lacp_rate {
                    let has_long_timeout =
                        block.is_some_and(|b| b.contains("lacp long-timeout"));
                    let line = match rate {
                        LacpRate::Slow if !has_long_timeout => {
                            Some("lacp long-timeout".to_string())
                        }
                        LacpRate::Fast if has_long_timeout => {
                            Some("no lacp long-timeout".to_string())
                        }
                        _ => None,
                    };
                    if let Some(line) = line {
                        pass.fragments
                            .push(CommandFragment::scoped(pc_block_key.clone(), vec![line]));
                    }
                }
            }
        }
    }

    // Drop the protocol block from any interface left with no LACP lines.
    for (member, removed) in lacp_removed {
        let total = lacp_index.get(&member).map_or(0, BTreeMap::len);
        if removed >= total {
            pass.fragments.push(CommandFragment::scoped(
                format!("interface {}", member),
                vec![format!("no {}", LACP_PROTOCOL_BLOCK)],
            ));
        }
    }

    pass
}

/// Indexes every interface currently reporting a `port-channel-protocol
/// LACP` block with mode lines.
fn build_lacp_index(tree: &ConfigNode) -> LacpIndex {
    let mut index = LacpIndex::new();
    for (key, block) in tree.iter() {
        let Some(qualified) = key.strip_prefix("interface ") else {
            continue;
        };
        let Some(lacp) = block.get(LACP_PROTOCOL_BLOCK) else {
            continue;
        };
        for line in lacp.keys() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() == 4 && parts[0] == "port-channel" && parts[2] == "mode" {
                if let Ok(id) = parts[1].parse::<u32>() {
                    index
                        .entry(qualified.to_string())
                        .or_default()
                        .insert(id, line.to_string());
                }
            }
        }
    }
    index
}

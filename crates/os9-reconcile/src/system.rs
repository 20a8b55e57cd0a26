//! System-wide configuration reconciliation.
//!
//! Covers the global, non-interface settings: spanning-tree protocol
//! selection and the multi-chassis link-aggregation (VLT) domain. Settings
//! the manifest does not declare are left untouched.

use os9_cfgmgr_common::{
    CommandFragment, ConfigNode, ReconcileError, ReconcileResult,
};

use crate::manifest::{Manifest, SpanningTreeSpec, VltSpec};

/// Reconciles the manifest's system section against the device.
pub fn run(manifest: &Manifest, tree: &ConfigNode) -> ReconcileResult<Vec<CommandFragment>> {
    let Some(system) = &manifest.system else {
        return Ok(Vec::new());
    };

    let mut fragments = Vec::new();
    if let Some(stp) = &system.spanning_tree {
        reconcile_spanning_tree(stp, tree, &mut fragments)?;
    }
    if let Some(vlt) = &system.vlt {
        reconcile_vlt(vlt, tree, &mut fragments)?;
    }
    Ok(fragments)
}

/// Exactly one protocol may be active; selecting one disables the other
/// two if they were previously enabled.
fn reconcile_spanning_tree(
    stp: &SpanningTreeSpec,
    tree: &ConfigNode,
    fragments: &mut Vec<CommandFragment>,
) -> ReconcileResult<()> {
    if stp.active_count() > 1 {
        return Err(ReconcileError::structural(
            "more than one spanning-tree protocol declared active",
        ));
    }

    for protocol in SpanningTreeSpec::PROTOCOLS {
        let block_key = format!("protocol spanning-tree {}", protocol);
        let enabled = tree
            .get(&block_key)
            .is_some_and(|b| b.contains("no disable"));
        let active = stp.is_active(protocol);

        if active && !enabled {
            fragments.push(CommandFragment::scoped(
                block_key,
                vec!["no disable".to_string()],
            ));
        } else if !active && enabled {
            fragments.push(CommandFragment::scoped(
                block_key,
                vec!["disable".to_string()],
            ));
        }
    }
    Ok(())
}

fn reconcile_vlt(
    vlt: &VltSpec,
    tree: &ConfigNode,
    fragments: &mut Vec<CommandFragment>,
) -> ReconcileResult<()> {
    let existing: Vec<String> = tree.keys_with_prefix("vlt domain ").map(String::from).collect();
    if existing.len() > 1 {
        return Err(ReconcileError::structural(format!(
            "found {} VLT domain configurations, expected at most one",
            existing.len()
        )));
    }

    let block_key = format!("vlt domain {}", vlt.domain);
    let mut current = None;
    if let Some(key) = existing.first() {
        if *key == block_key {
            current = tree.get(key);
        } else {
            // A different domain id must be torn down before the declared
            // one can exist.
            fragments.push(CommandFragment::global(vec![format!("no {}", key)]));
        }
    }

    let has = |line: &str| current.is_some_and(|c: &ConfigNode| c.contains(line));
    let prefixed = |prefix: &str| -> Vec<String> {
        current
            .map(|c| c.keys_with_prefix(prefix).map(String::from).collect())
            .unwrap_or_default()
    };

    let mut lines = Vec::new();
    let fields: [(Option<String>, &str); 4] = [
        (
            vlt.priority.map(|v| format!("primary-priority {}", v)),
            "primary-priority ",
        ),
        (
            vlt.peer_link_port_channel
                .map(|v| format!("peer-link port-channel {}", v)),
            "peer-link ",
        ),
        (
            vlt.backup_destination
                .as_ref()
                .map(|v| format!("back-up destination {}", v)),
            "back-up destination ",
        ),
        (vlt.unit_id.map(|v| format!("unit-id {}", v)), "unit-id "),
    ];

    for (want, prefix) in fields {
        match want {
            Some(want) => {
                if !has(&want) {
                    lines.push(want);
                }
            }
            None => {
                for line in prefixed(prefix) {
                    lines.push(format!("no {}", line));
                }
            }
        }
    }

    if lines.is_empty() && current.is_none() {
        // Brand-new domain with no sub-settings: entering the block is
        // itself the declaration.
        fragments.push(CommandFragment::global(vec![block_key]));
    } else if !lines.is_empty() {
        fragments.push(CommandFragment::scoped(block_key, lines));
    }
    Ok(())
}

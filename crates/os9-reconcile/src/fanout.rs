//! Fanout planning.
//!
//! Splitting a port rewrites the device topology: the parent interface
//! disappears and new sub-interfaces take its place. This stage therefore
//! runs first, emits the `stack-unit` / `default interface` commands, and
//! hands every later stage an updated snapshot of the tree and identity map
//! reflecting the post-split topology.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use os9_cfgmgr_common::{
    CommandFragment, ConfigNode, IdentityMap, ReconcileError, ReconcileResult, ReconcileWarning,
};

use crate::manifest::Manifest;

/// Result of the fanout stage: commands plus the post-split snapshots the
/// remaining stages must use.
#[derive(Debug, Clone)]
pub struct FanoutPlan {
    /// Global-scope fanout commands (may be empty).
    pub fragments: Vec<CommandFragment>,
    /// Identity map with synthesized children merged in.
    pub identity: IdentityMap,
    /// Tree with synthetic child interface nodes injected.
    pub tree: ConfigNode,
    /// Qualified names whose current state cannot be trusted (brand-new or
    /// just-defaulted interfaces). Downstream diffing is disabled for them.
    pub fresh: BTreeSet<String>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Plans fanout changes for every manifest interface declaring a fanout,
/// and reverts existing splits for declared parent ports that no longer
/// request one.
pub fn plan(
    manifest: &Manifest,
    tree: &ConfigNode,
    identity: &IdentityMap,
) -> ReconcileResult<FanoutPlan> {
    let mut out = Vec::new();
    let mut identity = identity.clone();
    let mut tree = tree.clone();
    let mut fresh = BTreeSet::new();
    let mut warnings = Vec::new();

    for (label, spec) in &manifest.interfaces {
        let parts: Vec<&str> = label.split('/').collect();
        if parts.len() != 2 {
            // Sub-port entries never drive fanout decisions.
            continue;
        }
        let (stack, port) = (parts[0], parts[1]);
        let prefix = format!("stack-unit {} port {} ", stack, port);

        let existing: Vec<String> = tree.keys_with_prefix(&prefix).map(String::from).collect();
        if existing.len() > 1 {
            return Err(ReconcileError::structural(format!(
                "found {} stack-unit configurations for port {}/{}",
                existing.len(),
                stack,
                port
            )));
        }
        let existing = existing.into_iter().next();

        match (spec.fanout, spec.fanout_speed) {
            (Some(mode), Some(speed)) => {
                let desired = format!(
                    "stack-unit {} port {} portmode {} speed {}",
                    stack,
                    port,
                    mode.as_str(),
                    speed.as_str()
                );

                match existing {
                    Some(line) if line == desired => {
                        debug!("fanout for {} already applied, skipping", label);
                        continue;
                    }
                    Some(line) => {
                        // Reconfigure: the existing children must be reset
                        // before the old stack-unit entry can be removed.
                        for (child_label, child_q) in
                            identity.labels_with_prefix(&format!("{}/", label))
                        {
                            out.push(format!("default interface {}", child_q));
                            identity.remove_label(&child_label);
                            tree.remove(&format!("interface {}", child_q));
                        }
                        out.push(format!("no {} no-confirm", line));
                        out.push(format!("{} no-confirm", desired));
                        tree.remove(&line);
                    }
                    None => {
                        // First split: the parent port itself is reset.
                        let Some(parent_q) = identity.qualified(label).map(String::from) else {
                            warn!("interface '{}' does not exist on this device, skipping", label);
                            warnings.push(ReconcileWarning::UnknownInterface {
                                label: label.clone(),
                            });
                            continue;
                        };
                        out.push(format!("default interface {}", parent_q));
                        out.push(format!("{} no-confirm", desired));
                        identity.remove_label(label);
                        tree.remove(&format!("interface {}", parent_q));
                    }
                }

                // Synthesize the child identities so later stages can
                // address them.
                let intf_type = speed.interface_type();
                for child in 1..=mode.child_count() {
                    let child_label = format!("{}/{}", label, child);
                    let child_q = format!("{} {}", intf_type, child_label);
                    identity.insert(child_label, child_q.clone());
                    tree.insert(format!("interface {}", child_q));
                    fresh.insert(child_q);
                }
            }
            (None, None) => {
                let Some(line) = existing else {
                    continue;
                };
                // Declared without fanout but currently split: revert.
                for (child_label, child_q) in identity.labels_with_prefix(&format!("{}/", label)) {
                    out.push(format!("default interface {}", child_q));
                    identity.remove_label(&child_label);
                    tree.remove(&format!("interface {}", child_q));
                }
                out.push(format!("no {} no-confirm", line));
                tree.remove(&line);
            }
            _ => {
                return Err(ReconcileError::manifest(
                    label,
                    "fanout and fanout_speed must be declared together",
                ))
            }
        }
    }

    let fragments = if out.is_empty() {
        Vec::new()
    } else {
        vec![CommandFragment::global(out)]
    };

    Ok(FanoutPlan {
        fragments,
        identity,
        tree,
        fresh,
        warnings,
    })
}

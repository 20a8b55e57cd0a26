//! Full reconciliation pass.
//!
//! Wires the stages together in their fixed order — fanout first (it may
//! restructure the topology every later stage depends on), then interface
//! and port-channel attributes, LACP membership, VLAN membership, and the
//! system section — and merges fragments sharing a scope path into the
//! final ordered output.

use tracing::{debug, info, instrument};

use os9_cfgmgr_common::{
    merge_fragments, parse_config, CommandFragment, IdentityMap, ReconcileResult,
    ReconcileWarning,
};

use crate::manifest::{self, Manifest};
use crate::{fanout, intf, lag, system, vlan};

/// Result of a reconciliation pass: the ordered command fragments plus any
/// non-fatal warnings collected along the way.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutput {
    pub fragments: Vec<CommandFragment>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Computes the commands that transform `running_config` into the state
/// declared by `manifest`.
///
/// Purely functional: the only inputs are the two arguments and the only
/// output is the returned value. Running the result through the device and
/// reconciling again yields an empty command list.
#[instrument(skip_all)]
pub fn reconcile(running_config: &str, manifest: &Manifest) -> ReconcileResult<ReconcileOutput> {
    manifest::validate(manifest)?;

    let tree = parse_config(running_config);
    let identity = IdentityMap::from_tree(&tree);
    debug!(interfaces = identity.len(), "resolved interface identities");

    // Fanout may rewrite the topology; every stage after it works from the
    // post-split snapshots.
    let fanout = fanout::plan(manifest, &tree, &identity)?;
    let attrs = intf::run(manifest, &fanout.tree, &fanout.identity, &fanout.fresh)?;
    let lags = lag::run(manifest, &fanout.tree, &fanout.identity);
    let vlans = vlan::run(manifest, &fanout.tree, &fanout.identity, &attrs.reset);
    let system = system::run(manifest, &fanout.tree)?;

    let mut fragments = Vec::new();
    fragments.extend(fanout.fragments);
    fragments.extend(attrs.interface_fragments);
    fragments.extend(attrs.port_channel_fragments);
    fragments.extend(lags.fragments);
    fragments.extend(vlans.fragments);
    fragments.extend(attrs.vlan_fragments);
    fragments.extend(system);
    let fragments = merge_fragments(fragments);

    let mut warnings: Vec<ReconcileWarning> = Vec::new();
    for warning in fanout
        .warnings
        .into_iter()
        .chain(attrs.warnings)
        .chain(lags.warnings)
        .chain(vlans.warnings)
    {
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
    }

    info!(
        fragments = fragments.len(),
        warnings = warnings.len(),
        "reconciliation pass complete"
    );
    Ok(ReconcileOutput {
        fragments,
        warnings,
    })
}

//! os9-reconcile - declarative configuration reconciliation for OS9 switches
//!
//! Computes the CLI commands required to transform a switch's running
//! configuration into the target state described by a manifest: interface
//! attributes, VLAN membership, link aggregation, port fanout splits, and
//! system-wide protocol settings.
//!
//! The engine is a pure function over two in-memory values — the raw
//! running-configuration text and the parsed [`Manifest`] — and returns an
//! ordered list of [`CommandFragment`]s plus non-fatal warnings. Fetching
//! the configuration from the device and delivering the commands back are
//! caller responsibilities.

pub mod engine;
pub mod fanout;
pub mod intf;
pub mod lag;
pub mod manifest;
pub mod system;
pub mod vlan;

pub use engine::{reconcile, ReconcileOutput};
pub use manifest::{
    AdminState, FanoutMode, FanoutSpeed, InterfaceSpec, LacpRate, LagMode, Manifest,
    PortChannelSpec, SpanningTreeSpec, SystemSpec, TaggedVlans, VlanSpec, VltSpec,
};

// Re-export the shared infrastructure callers need to consume the output.
pub use os9_cfgmgr_common::{
    render_fragments, CommandFragment, ReconcileError, ReconcileResult, ReconcileWarning,
};

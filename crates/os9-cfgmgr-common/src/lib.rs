//! Common infrastructure for the OS9 configuration reconciliation engine.
//!
//! This crate provides the pieces shared by every reconciliation stage:
//!
//! - [`tree`]: the indentation parser and the [`ConfigNode`] running-config tree
//! - [`identity`]: compact-label / qualified-name resolution
//! - [`fragment`]: [`CommandFragment`] plus scope-path merging and rendering
//! - [`ranges`]: device range-syntax expansion
//! - [`error`]: error and warning types
//!
//! The engine itself lives in the `os9-reconcile` crate; everything here is
//! purely functional over in-memory values — no I/O, no device session.

pub mod error;
pub mod fragment;
pub mod identity;
pub mod ranges;
pub mod tree;

// Re-export commonly used items at crate root
pub use error::{ReconcileError, ReconcileResult, ReconcileWarning};
pub use fragment::{merge_fragments, render_fragments, CommandFragment};
pub use identity::IdentityMap;
pub use ranges::expand_member_spec;
pub use tree::{parse_config, ConfigNode};

//! Command fragments and assembly.
//!
//! Reconcilers emit [`CommandFragment`] values: a scope path (the parent
//! commands identifying a nested configuration block, empty for global
//! commands) plus the lines to apply inside that scope. The assembler
//! merges fragments sharing a scope path before emission; a caller-side
//! collaborator renders the result into literal device syntax.

use serde::{Deserialize, Serialize};

/// An ordered block of commands targeting one configuration scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFragment {
    /// Parent commands identifying the nested block, outermost first.
    /// Empty for commands at global configuration scope.
    pub scope: Vec<String>,
    /// Command lines to apply within the scope, in order.
    pub lines: Vec<String>,
}

impl CommandFragment {
    /// Creates an empty fragment for a scope path.
    pub fn new(scope: Vec<String>) -> Self {
        Self {
            scope,
            lines: Vec::new(),
        }
    }

    /// Creates a global-scope fragment from lines.
    pub fn global(lines: Vec<String>) -> Self {
        Self {
            scope: Vec::new(),
            lines,
        }
    }

    /// Creates a fragment scoped to a single parent command.
    pub fn scoped(scope: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            scope: vec![scope.into()],
            lines,
        }
    }

    /// Appends a command line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// True if the fragment carries no command lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Merges fragments with identical scope paths.
///
/// Line lists are concatenated in first-seen order and the merged fragment
/// keeps the position of its first occurrence; empty fragments are dropped.
pub fn merge_fragments(fragments: Vec<CommandFragment>) -> Vec<CommandFragment> {
    let mut out: Vec<CommandFragment> = Vec::new();
    for frag in fragments {
        if frag.is_empty() {
            continue;
        }
        match out.iter_mut().find(|f| f.scope == frag.scope) {
            Some(existing) => existing.lines.extend(frag.lines),
            None => out.push(frag),
        }
    }
    out
}

/// Renders fragments as nested command text, one space of indentation per
/// scope level — the device's own running-configuration style.
pub fn render_fragments(fragments: &[CommandFragment]) -> String {
    let mut out = String::new();
    for frag in fragments {
        for (depth, parent) in frag.scope.iter().enumerate() {
            out.push_str(&" ".repeat(depth));
            out.push_str(parent);
            out.push('\n');
        }
        let indent = " ".repeat(frag.scope.len());
        for line in &frag.lines {
            out.push_str(&indent);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frag(scope: &[&str], lines: &[&str]) -> CommandFragment {
        CommandFragment {
            scope: scope.iter().map(|s| s.to_string()).collect(),
            lines: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_merge_same_scope_concatenates() {
        let merged = merge_fragments(vec![
            frag(&["interface Vlan 100"], &["untagged TengigabitEthernet 1/1"]),
            frag(&["interface TengigabitEthernet 1/2"], &["switchport"]),
            frag(&["interface Vlan 100"], &["tagged TengigabitEthernet 1/3"]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].scope, vec!["interface Vlan 100"]);
        assert_eq!(
            merged[0].lines,
            vec![
                "untagged TengigabitEthernet 1/1",
                "tagged TengigabitEthernet 1/3",
            ]
        );
    }

    #[test]
    fn test_merge_drops_empty_fragments() {
        let merged = merge_fragments(vec![
            frag(&["interface Vlan 100"], &[]),
            frag(&[], &["stack-unit 1 port 5 portmode quad speed 10G no-confirm"]),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].scope.is_empty());
    }

    #[test]
    fn test_merge_distinguishes_nested_scopes() {
        let merged = merge_fragments(vec![
            frag(&["interface TengigabitEthernet 1/1"], &["no shutdown"]),
            frag(
                &["interface TengigabitEthernet 1/1", "port-channel-protocol LACP"],
                &["port-channel 10 mode active"],
            ),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_render_nested() {
        let text = render_fragments(&[
            frag(&[], &["default interface TengigabitEthernet 1/5"]),
            frag(
                &["interface TengigabitEthernet 1/1", "port-channel-protocol LACP"],
                &["port-channel 10 mode active"],
            ),
        ]);
        assert_eq!(
            text,
            "default interface TengigabitEthernet 1/5\n\
             interface TengigabitEthernet 1/1\n \
             port-channel-protocol LACP\n  \
             port-channel 10 mode active\n"
        );
    }
}

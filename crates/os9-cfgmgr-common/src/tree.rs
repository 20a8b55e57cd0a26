//! Running-configuration tree.
//!
//! The device dumps its configuration as newline-separated command text with
//! significant leading-whitespace indentation and `!` section separators.
//! [`parse_config`] turns that text into a [`ConfigNode`] tree: each line
//! becomes a key whose children are exactly the contiguous following lines
//! with strictly greater indentation.

use indexmap::IndexMap;
use tracing::debug;

/// One configuration line plus its nested sub-lines.
///
/// Sibling order is preserved — device command ordering sometimes matters
/// when re-reading the tree. Duplicate identical lines at the same level
/// collapse into one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigNode {
    children: IndexMap<String, ConfigNode>,
}

impl ConfigNode {
    /// Creates an empty node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sub-tree for an exact line, if present.
    pub fn get(&self, line: &str) -> Option<&ConfigNode> {
        self.children.get(line)
    }

    /// Returns a mutable sub-tree for an exact line, if present.
    pub fn get_mut(&mut self, line: &str) -> Option<&mut ConfigNode> {
        self.children.get_mut(line)
    }

    /// Inserts a child line (empty sub-tree if new) and returns its node.
    pub fn insert(&mut self, line: impl Into<String>) -> &mut ConfigNode {
        self.children.entry(line.into()).or_default()
    }

    /// Removes a child line and its entire sub-tree.
    ///
    /// Uses a shifting removal so the order of the remaining siblings is
    /// unchanged.
    pub fn remove(&mut self, line: &str) -> Option<ConfigNode> {
        self.children.shift_remove(line)
    }

    /// True if an exact child line is present.
    pub fn contains(&self, line: &str) -> bool {
        self.children.contains_key(line)
    }

    /// Iterates child lines in original order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Iterates child lines starting with `prefix`, in original order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.keys().filter(move |k| k.starts_with(prefix))
    }

    /// Iterates `(line, sub-tree)` pairs in original order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if the node has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Number of leading space characters on a raw line.
fn leading_spaces(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parses raw running-configuration text into a tree.
///
/// A line with greater indentation than its predecessor opens a nested
/// scope; equal indentation is a sibling; lesser indentation closes scopes
/// back up to the nearest enclosing one (inconsistent indentation therefore
/// attaches to the nearest ancestor rather than failing). Blank lines and
/// `!` separator lines are dropped. Single pass, O(n) in total lines.
pub fn parse_config(text: &str) -> ConfigNode {
    struct Frame {
        indent: usize,
        line: String,
        node: ConfigNode,
    }

    fn close(stack: &mut Vec<Frame>, root: &mut ConfigNode) {
        let frame = stack.pop().expect("close on empty parse stack");
        let parent = match stack.last_mut() {
            Some(f) => &mut f.node,
            None => root,
        };
        *parent.insert(frame.line) = frame.node;
    }

    let mut root = ConfigNode::new();
    let mut stack: Vec<Frame> = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        let indent = leading_spaces(raw);

        while stack.last().is_some_and(|f| indent <= f.indent) {
            close(&mut stack, &mut root);
        }
        stack.push(Frame {
            indent,
            line: line.to_string(),
            node: ConfigNode::new(),
        });
    }
    while !stack.is_empty() {
        close(&mut stack, &mut root);
    }

    debug!("parsed running configuration: {} top-level blocks", root.len());
    root
}

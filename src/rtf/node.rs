//! Node model for the RTF tree.
//!
//! Nodes live in an arena owned by [`RtfTree`](super::RtfTree) and are
//! addressed by [`NodeId`]. Ownership flows strictly downwards through each
//! node's child list; the parent link is a plain index and never keeps a node
//! alive.

use super::lexer::{Token, TokenKind};
use std::fmt;

/// Handle of a node inside one [`RtfTree`](super::RtfTree).
///
/// Handles are only meaningful for the tree that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Entry point of the tree
    Root,
    /// A `{ ... }` scope
    Group,
    /// Control word
    Keyword,
    /// Control symbol
    Control,
    /// Literal text
    Text,
}

impl NodeKind {
    /// Whether nodes of this kind may own children.
    #[inline]
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Group)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Root => "Root",
            NodeKind::Group => "Group",
            NodeKind::Keyword => "Keyword",
            NodeKind::Control => "Control",
            NodeKind::Text => "Text",
        };
        f.write_str(name)
    }
}

/// A single node of the RTF tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtfNode {
    kind: NodeKind,
    key: String,
    parameter: Option<i32>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Option<Vec<NodeId>>,
}

impl RtfNode {
    /// Create a detached node.
    pub fn new(kind: NodeKind, key: impl Into<String>, parameter: Option<i32>) -> Self {
        Self {
            kind,
            key: key.into(),
            parameter,
            parent: None,
            children: None,
        }
    }

    /// Create an empty group node.
    #[inline]
    pub fn group() -> Self {
        Self::new(NodeKind::Group, String::new(), None)
    }

    /// Create a keyword node.
    #[inline]
    pub fn keyword(key: impl Into<String>, parameter: Option<i32>) -> Self {
        Self::new(NodeKind::Keyword, key, parameter)
    }

    /// Create a control symbol node.
    #[inline]
    pub fn control(key: impl Into<String>, parameter: Option<i32>) -> Self {
        Self::new(NodeKind::Control, key, parameter)
    }

    /// Create a text node.
    #[inline]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Text, text, None)
    }

    pub(crate) fn root() -> Self {
        Self::new(NodeKind::Root, String::new(), None)
    }

    /// Create the node a leaf token maps onto.
    ///
    /// Returns `None` for group delimiters and end of input.
    pub fn from_token(token: &Token<'_>) -> Option<Self> {
        let kind = match token.kind {
            TokenKind::Keyword => NodeKind::Keyword,
            TokenKind::Control => NodeKind::Control,
            TokenKind::Text => NodeKind::Text,
            TokenKind::GroupStart | TokenKind::GroupEnd | TokenKind::EndOfInput => return None,
        };
        Some(Self::new(kind, token.key.as_ref(), token.parameter))
    }

    /// Node variant.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Keyword name, control symbol or literal text.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the key.
    #[inline]
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    pub(crate) fn key_mut(&mut self) -> &mut String {
        &mut self.key
    }

    /// Numeric parameter.
    #[inline]
    pub fn parameter(&self) -> Option<i32> {
        self.parameter
    }

    /// Whether the node has a parameter.
    #[inline]
    pub fn has_parameter(&self) -> bool {
        self.parameter.is_some()
    }

    /// Replace the parameter.
    #[inline]
    pub fn set_parameter(&mut self, parameter: Option<i32>) {
        self.parameter = parameter;
    }

    /// Parent handle, `None` for the root and for detached nodes.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child handles. `None` until the first child is attached.
    #[inline]
    pub fn children(&self) -> Option<&[NodeId]> {
        self.children.as_deref()
    }

    /// Whether the node is a keyword with the given name.
    #[inline]
    pub fn is_keyword(&self, name: &str) -> bool {
        self.kind == NodeKind::Keyword && self.key == name
    }

    /// Whether the node is a `\'hh` escape.
    #[inline]
    pub fn is_hex_escape(&self) -> bool {
        self.kind == NodeKind::Control && self.key == "'"
    }

    /// Whether a search by keyword name should match this node.
    #[inline]
    pub(crate) fn matches_key(&self, key: &str) -> bool {
        matches!(self.kind, NodeKind::Keyword | NodeKind::Control) && self.key == key
    }

    /// Copy of the scalar fields with no links to any other node.
    pub(crate) fn detached_copy(&self) -> Self {
        Self::new(self.kind, self.key.clone(), self.parameter)
    }
}

impl fmt::Display for RtfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}", self.kind, self.key)?;
        if let Some(parameter) = self.parameter {
            write!(f, ", {}", parameter)?;
        }
        f.write_str("]")
    }
}

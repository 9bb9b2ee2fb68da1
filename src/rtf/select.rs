//! Navigation and search over borrowed nodes.
//!
//! [`NodeRef`] pairs a node handle with the tree that owns it, so lookups can
//! walk children, siblings and ancestors without touching the arena
//! directly. Every operation here is read-only.

use super::node::{NodeId, NodeKind, RtfNode};
use super::tree::RtfTree;
use super::{text, writer};
use std::fmt;
use std::slice;

/// A node borrowed from an [`RtfTree`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a RtfTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    #[inline]
    pub(crate) fn new(tree: &'a RtfTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    #[inline]
    fn at(&self, id: NodeId) -> NodeRef<'a> {
        NodeRef::new(self.tree, id)
    }

    /// Node handle.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Tree owning the node.
    #[inline]
    pub fn tree(&self) -> &'a RtfTree {
        self.tree
    }

    /// Node data.
    #[inline]
    pub fn data(&self) -> &'a RtfNode {
        self.tree.raw(self.id)
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data().kind()
    }

    #[inline]
    pub fn key(&self) -> &'a str {
        self.data().key()
    }

    #[inline]
    pub fn parameter(&self) -> Option<i32> {
        self.data().parameter()
    }

    #[inline]
    pub fn has_parameter(&self) -> bool {
        self.data().has_parameter()
    }

    // ---- Navigation ----

    /// Containing node, `None` for the root and detached nodes.
    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data().parent().map(|id| self.at(id))
    }

    /// Root of the tree.
    pub fn root(&self) -> NodeRef<'a> {
        self.at(self.tree.root_id())
    }

    /// Direct children in order.
    pub fn children(&self) -> Children<'a> {
        Children {
            tree: self.tree,
            ids: self.child_ids().iter(),
        }
    }

    #[inline]
    fn child_ids(&self) -> &'a [NodeId] {
        self.data().children().unwrap_or(&[])
    }

    /// All nodes below this one in pre-order, excluding the node itself.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants {
            tree: self.tree,
            stack: self.child_ids().iter().rev().copied().collect(),
        }
    }

    #[inline]
    pub fn child_count(&self) -> usize {
        self.child_ids().len()
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.child_ids().is_empty()
    }

    pub fn first_child(&self) -> Option<NodeRef<'a>> {
        self.child_ids().first().map(|&id| self.at(id))
    }

    pub fn last_child(&self) -> Option<NodeRef<'a>> {
        self.child_ids().last().map(|&id| self.at(id))
    }

    /// Child at position `index`.
    pub fn child(&self, index: usize) -> Option<NodeRef<'a>> {
        self.child_ids().get(index).map(|&id| self.at(id))
    }

    /// First direct child that is the keyword `keyword`.
    pub fn child_by_keyword(&self, keyword: &str) -> Option<NodeRef<'a>> {
        self.children().find(|n| n.data().is_keyword(keyword))
    }

    /// Position among the parent's children.
    pub fn index(&self) -> Option<usize> {
        self.tree.child_index(self.id)
    }

    fn siblings(&self) -> &'a [NodeId] {
        self.parent().map_or(&[], |p| p.child_ids())
    }

    pub fn next_sibling(&self) -> Option<NodeRef<'a>> {
        let index = self.index()?;
        self.siblings().get(index + 1).map(|&id| self.at(id))
    }

    pub fn previous_sibling(&self) -> Option<NodeRef<'a>> {
        let index = self.index()?;
        let prev = index.checked_sub(1)?;
        self.siblings().get(prev).map(|&id| self.at(id))
    }

    /// Following node in document (pre-order) order.
    pub fn next_node(&self) -> Option<NodeRef<'a>> {
        if let Some(first) = self.first_child() {
            return Some(first);
        }
        let mut cursor = *self;
        loop {
            if let Some(next) = cursor.next_sibling() {
                return Some(next);
            }
            cursor = cursor.parent()?;
        }
    }

    /// Preceding node in document (pre-order) order.
    pub fn previous_node(&self) -> Option<NodeRef<'a>> {
        let Some(mut cursor) = self.previous_sibling() else {
            return self.parent();
        };
        while let Some(last) = cursor.last_child() {
            cursor = last;
        }
        Some(cursor)
    }

    /// Keyword naming the group as a destination, skipping a leading `\*`.
    pub fn destination(&self) -> Option<&'a str> {
        if self.kind() != NodeKind::Group {
            return None;
        }
        let mut children = self.children();
        let first = children.next()?;
        let named = if first.kind() == NodeKind::Control && first.key() == "*" {
            children.next()?
        } else {
            first
        };
        (named.kind() == NodeKind::Keyword).then(|| named.key())
    }

    /// Whether this is a group whose first child is `keyword`.
    #[inline]
    fn is_group_of(&self, keyword: &str) -> bool {
        self.kind() == NodeKind::Group
            && self
                .first_child()
                .is_some_and(|first| first.data().matches_key(keyword))
    }

    // ---- Single-result lookups: direct children ----

    /// First direct child matching `keyword`.
    pub fn select_single_child_node(&self, keyword: &str) -> Option<NodeRef<'a>> {
        self.children().find(|n| n.data().matches_key(keyword))
    }

    /// First direct child of the given kind.
    pub fn select_single_child_node_by_type(&self, kind: NodeKind) -> Option<NodeRef<'a>> {
        self.children().find(|n| n.kind() == kind)
    }

    /// First direct child matching `keyword` with parameter `parameter`.
    pub fn select_single_child_node_with_param(
        &self,
        keyword: &str,
        parameter: i32,
    ) -> Option<NodeRef<'a>> {
        self.children()
            .find(|n| n.data().matches_key(keyword) && n.parameter() == Some(parameter))
    }

    /// First direct child group whose first child is `keyword`.
    pub fn select_single_child_group(&self, keyword: &str) -> Option<NodeRef<'a>> {
        self.children().find(|n| n.is_group_of(keyword))
    }

    // ---- Single-result lookups: whole subtree ----

    /// First descendant matching `keyword`.
    pub fn select_single_node(&self, keyword: &str) -> Option<NodeRef<'a>> {
        self.descendants().find(|n| n.data().matches_key(keyword))
    }

    /// First descendant of the given kind.
    pub fn select_single_node_by_type(&self, kind: NodeKind) -> Option<NodeRef<'a>> {
        self.descendants().find(|n| n.kind() == kind)
    }

    /// First descendant matching `keyword` with parameter `parameter`.
    pub fn select_single_node_with_param(
        &self,
        keyword: &str,
        parameter: i32,
    ) -> Option<NodeRef<'a>> {
        self.descendants()
            .find(|n| n.data().matches_key(keyword) && n.parameter() == Some(parameter))
    }

    /// First descendant group whose first child is `keyword`.
    pub fn select_single_group(&self, keyword: &str) -> Option<NodeRef<'a>> {
        self.descendants().find(|n| n.is_group_of(keyword))
    }

    // ---- Multi-result lookups ----

    /// All descendants matching `keyword`.
    pub fn select_nodes(&self, keyword: &str) -> Vec<NodeRef<'a>> {
        self.descendants()
            .filter(|n| n.data().matches_key(keyword))
            .collect()
    }

    /// All descendants of the given kind.
    pub fn select_nodes_by_type(&self, kind: NodeKind) -> Vec<NodeRef<'a>> {
        self.descendants().filter(|n| n.kind() == kind).collect()
    }

    /// All descendants matching `keyword` with parameter `parameter`.
    pub fn select_nodes_with_param(&self, keyword: &str, parameter: i32) -> Vec<NodeRef<'a>> {
        self.descendants()
            .filter(|n| n.data().matches_key(keyword) && n.parameter() == Some(parameter))
            .collect()
    }

    /// All descendant groups whose first child is `keyword`.
    pub fn select_groups(&self, keyword: &str) -> Vec<NodeRef<'a>> {
        self.descendants().filter(|n| n.is_group_of(keyword)).collect()
    }

    /// All direct children matching `keyword`.
    pub fn select_child_nodes(&self, keyword: &str) -> Vec<NodeRef<'a>> {
        self.children()
            .filter(|n| n.data().matches_key(keyword))
            .collect()
    }

    /// All direct children of the given kind.
    pub fn select_child_nodes_by_type(&self, kind: NodeKind) -> Vec<NodeRef<'a>> {
        self.children().filter(|n| n.kind() == kind).collect()
    }

    /// All direct children matching `keyword` with parameter `parameter`.
    pub fn select_child_nodes_with_param(
        &self,
        keyword: &str,
        parameter: i32,
    ) -> Vec<NodeRef<'a>> {
        self.children()
            .filter(|n| n.data().matches_key(keyword) && n.parameter() == Some(parameter))
            .collect()
    }

    /// All direct child groups whose first child is `keyword`.
    pub fn select_child_groups(&self, keyword: &str) -> Vec<NodeRef<'a>> {
        self.children().filter(|n| n.is_group_of(keyword)).collect()
    }

    // ---- Siblings ----

    fn following_siblings(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        let start = self.index().map_or(usize::MAX, |i| i + 1);
        self.siblings()
            .get(start..)
            .unwrap_or(&[])
            .iter()
            .map(move |&id| NodeRef::new(tree, id))
    }

    /// First following sibling matching `keyword`.
    pub fn select_sibling(&self, keyword: &str) -> Option<NodeRef<'a>> {
        self.following_siblings()
            .find(|n| n.data().matches_key(keyword))
    }

    /// First following sibling of the given kind.
    pub fn select_sibling_by_type(&self, kind: NodeKind) -> Option<NodeRef<'a>> {
        self.following_siblings().find(|n| n.kind() == kind)
    }

    /// First following sibling matching `keyword` with parameter `parameter`.
    pub fn select_sibling_with_param(&self, keyword: &str, parameter: i32) -> Option<NodeRef<'a>> {
        self.following_siblings()
            .find(|n| n.data().matches_key(keyword) && n.parameter() == Some(parameter))
    }

    /// Text nodes in the subtree (this node included) containing `needle`.
    pub fn find_text(&self, needle: &str) -> Vec<NodeRef<'a>> {
        std::iter::once(*self)
            .chain(self.descendants())
            .filter(|n| n.kind() == NodeKind::Text && n.key().contains(needle))
            .collect()
    }

    // ---- Content ----

    /// RTF source of this node and its subtree.
    pub fn rtf(&self) -> String {
        writer::node_to_rtf(self.tree, self.id)
    }

    /// Visible text of the subtree.
    pub fn text(&self) -> String {
        text::extract(self.tree, self.id, true)
    }

    /// Text of the subtree, destinations included.
    pub fn raw_text(&self) -> String {
        text::extract(self.tree, self.id, false)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("node", &format_args!("{}", self.data()))
            .finish()
    }
}

impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.data(), f)
    }
}

/// Iterator over the direct children of a node.
pub struct Children<'a> {
    tree: &'a RtfTree,
    ids: slice::Iter<'a, NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeRef<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next().map(|&id| NodeRef::new(self.tree, id))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl DoubleEndedIterator for Children<'_> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.ids.next_back().map(|&id| NodeRef::new(self.tree, id))
    }
}

impl ExactSizeIterator for Children<'_> {}

/// Pre-order iterator over the nodes below a node.
pub struct Descendants<'a> {
    tree: &'a RtfTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        if let Some(children) = self.tree.raw(id).children() {
            self.stack.extend(children.iter().rev());
        }
        Some(NodeRef::new(self.tree, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(rtf: &str) -> RtfTree {
        RtfTree::parse(rtf).unwrap()
    }

    #[test]
    fn test_select_nodes_in_order() {
        let tree = tree(r"{\a1\b\a2\c}");
        let main = tree.main_group().unwrap();

        let found = main.select_nodes("a");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].parameter(), Some(1));
        assert_eq!(found[1].parameter(), Some(2));

        let first = main.select_single_node("a").unwrap();
        assert_eq!(first, found[0]);
        assert_eq!(first.select_sibling("a").unwrap(), found[1]);
        assert!(found[1].select_sibling("a").is_none());
    }

    #[test]
    fn test_keyword_search_ignores_text() {
        let tree = tree(r"{\rtf1 par{\par}}");
        let main = tree.main_group().unwrap();
        let found = main.select_nodes("par");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind(), NodeKind::Keyword);
        assert!(main.select_single_child_node("par").is_none());
    }

    #[test]
    fn test_select_by_parameter() {
        let tree = tree(r"{\f0\fs20{\f1\fs24}\f1}");
        let main = tree.main_group().unwrap();
        assert_eq!(main.select_nodes_with_param("f", 1).len(), 2);
        assert_eq!(main.select_child_nodes_with_param("f", 1).len(), 1);
        assert!(main.select_single_child_node_with_param("fs", 24).is_none());
        let fs = main.select_single_node_with_param("fs", 24).unwrap();
        assert_eq!(fs.parent().unwrap().kind(), NodeKind::Group);
        assert_eq!(
            main.first_child()
                .unwrap()
                .select_sibling_with_param("f", 1)
                .unwrap()
                .index(),
            Some(3)
        );
    }

    #[test]
    fn test_select_by_type() {
        let tree = tree(r"{\rtf1{\b bold} plain}");
        let main = tree.main_group().unwrap();
        assert_eq!(main.select_nodes_by_type(NodeKind::Text).len(), 2);
        assert_eq!(main.select_child_nodes_by_type(NodeKind::Text).len(), 1);
        assert_eq!(
            main.select_single_node_by_type(NodeKind::Text).unwrap().key(),
            "bold"
        );
        assert_eq!(
            main.select_single_child_node_by_type(NodeKind::Text)
                .unwrap()
                .key(),
            " plain"
        );
        let rtf = main.first_child().unwrap();
        assert_eq!(
            rtf.select_sibling_by_type(NodeKind::Group).unwrap().index(),
            Some(1)
        );
    }

    #[test]
    fn test_select_groups() {
        let tree = tree(
            r"{\rtf1{\fonttbl{\f0 Arial;}}{\colortbl;\red255\green0\blue0;}{\*\generator x}}",
        );
        let root = tree.root();
        let fonttbl = root.select_single_group("fonttbl").unwrap();
        assert_eq!(fonttbl.child_count(), 2);
        assert!(root.select_single_child_group("fonttbl").is_none());

        let main = tree.main_group().unwrap();
        assert_eq!(main.select_single_child_group("colortbl").unwrap().index(), Some(2));
        assert_eq!(main.select_child_groups("fonttbl").len(), 1);
        assert_eq!(root.select_groups("colortbl").len(), 1);
        // The generator group starts with \*
        assert!(root.select_single_group("generator").is_none());
        assert_eq!(main.child(3).unwrap().destination(), Some("generator"));
    }

    #[test]
    fn test_navigation() {
        let tree = tree(r"{\rtf1{\ul Test\ulnone}fin}");
        let main = tree.main_group().unwrap();
        let group = main.child(1).unwrap();
        let text = group.child(1).unwrap();

        assert_eq!(text.parent().unwrap(), group);
        assert_eq!(text.root(), tree.root());
        assert_eq!(text.previous_sibling().unwrap().key(), "ul");
        assert_eq!(text.next_sibling().unwrap().key(), "ulnone");
        assert!(group.last_child().unwrap().next_sibling().is_none());
        assert!(group.first_child().unwrap().previous_sibling().is_none());
        assert_eq!(group.child_by_keyword("ulnone").unwrap().index(), Some(2));
        assert!(text.child(0).is_none());
        assert!(!text.has_children());
        assert!(tree.root().parent().is_none());
        assert!(tree.root().index().is_none());
    }

    #[test]
    fn test_document_order() {
        let tree = tree(r"{\rtf1{\ul Test\ulnone}fin}");
        let mut forward = Vec::new();
        let mut cursor = Some(tree.root());
        while let Some(node) = cursor {
            forward.push(node);
            cursor = node.next_node();
        }
        assert_eq!(forward.len(), 8);
        assert_eq!(forward.last().unwrap().key(), "fin");

        let mut backward = Vec::new();
        let mut cursor = forward.last().copied();
        while let Some(node) = cursor {
            backward.push(node);
            cursor = node.previous_node();
        }
        backward.reverse();
        assert_eq!(forward, backward);

        let pre_order: Vec<_> = tree.root().descendants().collect();
        assert_eq!(&forward[1..], &pre_order[..]);
    }

    #[test]
    fn test_find_text() {
        let tree = tree(r"{\rtf1 Dear [NAME],{\b [NAME]} bye}");
        let found = tree.root().find_text("[NAME]");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].parent().unwrap().kind(), NodeKind::Group);
    }

    #[test]
    fn test_children_iterator() {
        let tree = tree(r"{\a\b\c}");
        let main = tree.main_group().unwrap();
        assert_eq!(main.children().len(), 3);
        let keys: Vec<_> = main.children().rev().map(|n| n.key()).collect();
        assert_eq!(keys, vec!["c", "b", "a"]);
    }
}

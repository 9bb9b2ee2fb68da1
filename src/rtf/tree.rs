//! The RTF document tree.
//!
//! [`RtfTree`] owns every node of a document in a flat arena. Structure is
//! expressed through child lists (owning) and parent links (non-owning
//! indices). Nodes removed from the structure stay addressable through their
//! handles, so a detached subtree can be inspected or re-attached later.

use super::error::{RtfError, RtfResult};
use super::lexer::Lexer;
use super::node::{NodeId, NodeKind, RtfNode};
use super::parser::TreeBuilder;
use super::select::NodeRef;
use super::types::{ColorTable, FontTable};
use super::writer::RtfWriter;
use crate::common::encoding::{self, DEFAULT_CODE_PAGE, codepage_to_encoding};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Options controlling how RTF text is turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Fold `\'hh` escapes and adjacent text into single text nodes
    pub merge_special_characters: bool,
    /// Code page used when the document declares no `\ansicpg`
    pub default_code_page: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            merge_special_characters: false,
            default_code_page: DEFAULT_CODE_PAGE,
        }
    }
}

/// An RTF document held as a tree of nodes.
#[derive(Debug, Clone)]
pub struct RtfTree {
    nodes: Vec<RtfNode>,
    root: NodeId,
    options: ParseOptions,
}

impl RtfTree {
    /// Create an empty tree holding only the root node.
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Create an empty tree that will load documents with `options`.
    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            nodes: vec![RtfNode::root()],
            root: NodeId(0),
            options,
        }
    }

    /// Parse RTF text into a new tree.
    ///
    /// Fails on unbalanced groups. Use [`RtfTree::load_rtf_text`] to keep the
    /// partially built tree instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtftree::rtf::RtfTree;
    ///
    /// let tree = RtfTree::parse(r"{\rtf1\ansi Hello}")?;
    /// assert_eq!(tree.text(), "Hello");
    /// # Ok::<(), rtftree::rtf::RtfError>(())
    /// ```
    pub fn parse(text: &str) -> RtfResult<Self> {
        Self::parse_with_options(text, ParseOptions::default())
    }

    /// Parse RTF text into a new tree with explicit options.
    pub fn parse_with_options(text: &str, options: ParseOptions) -> RtfResult<Self> {
        let mut tree = Self::with_options(options);
        tree.load_rtf_text(text)?;
        Ok(tree)
    }

    /// Replace the contents of this tree with the document in `text`.
    ///
    /// On malformed input the tree keeps everything built before the failure
    /// and the error is returned alongside it.
    pub fn load_rtf_text(&mut self, text: &str) -> RtfResult<()> {
        if codepage_to_encoding(self.options.default_code_page).is_none() {
            return Err(RtfError::UnsupportedCodePage(self.options.default_code_page));
        }

        self.reset();
        let result = TreeBuilder::new(self).build(Lexer::new(text));

        log::debug!(
            "loaded RTF tree: {} nodes, code page {}",
            self.nodes.len(),
            self.code_page()
        );
        result
    }

    /// Replace the contents of this tree with the document stored at `path`.
    ///
    /// I/O failures leave the tree untouched.
    pub fn load_rtf_file<P: AsRef<Path>>(&mut self, path: P) -> RtfResult<()> {
        let bytes = std::fs::read(path)?;
        let text = encoding::decode_source(&bytes, self.options.default_code_page);
        self.load_rtf_text(&text)
    }

    /// Write the serialized document to `path`.
    pub fn save_rtf<P: AsRef<Path>>(&self, path: P) -> RtfResult<()> {
        let file = File::create(path)?;
        let mut writer = RtfWriter::new(BufWriter::new(file));
        writer.write_tree(self)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the serialized document to any byte sink.
    pub fn write_rtf<W: Write>(&self, writer: W) -> RtfResult<()> {
        let mut writer = RtfWriter::new(writer);
        writer.write_tree(self)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialized RTF text of the whole document.
    pub fn rtf(&self) -> String {
        self.root().rtf()
    }

    /// Visible text of the whole document.
    pub fn text(&self) -> String {
        self.root().text()
    }

    /// Text of the whole document, destinations included.
    pub fn raw_text(&self) -> String {
        self.root().raw_text()
    }

    /// Options this tree loads documents with.
    #[inline]
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Whether `\'hh` escapes are folded into text nodes when loading.
    #[inline]
    pub fn merge_special_characters(&self) -> bool {
        self.options.merge_special_characters
    }

    /// Enable or disable folding of `\'hh` escapes for subsequent loads.
    #[inline]
    pub fn set_merge_special_characters(&mut self, merge: bool) {
        self.options.merge_special_characters = merge;
    }

    /// Handle of the root node.
    #[inline]
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::new(self, self.root)
    }

    /// The document's outermost group, if any.
    pub fn main_group(&self) -> Option<NodeRef<'_>> {
        self.root().first_child()
    }

    /// Borrow a node by handle.
    ///
    /// Returns `None` for handles from another tree.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        self.contains(id).then(|| NodeRef::new(self, id))
    }

    /// Borrow a node by handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not created by this tree.
    #[inline]
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(self.contains(id), "node handle does not belong to this tree");
        NodeRef::new(self, id)
    }

    /// Node data for a handle.
    #[inline]
    pub fn data(&self, id: NodeId) -> Option<&RtfNode> {
        self.nodes.get(id.index())
    }

    /// Mutable node data for a handle.
    ///
    /// Only the key and parameter can be changed this way; structure is edited
    /// through the tree.
    #[inline]
    pub fn data_mut(&mut self, id: NodeId) -> Option<&mut RtfNode> {
        self.nodes.get_mut(id.index())
    }

    /// Set the key of a node.
    pub fn set_key(&mut self, id: NodeId, key: impl Into<String>) -> RtfResult<()> {
        self.data_mut(id).ok_or(RtfError::UnknownNode)?.set_key(key);
        Ok(())
    }

    /// Set the parameter of a node.
    pub fn set_parameter(&mut self, id: NodeId, parameter: Option<i32>) -> RtfResult<()> {
        self.data_mut(id)
            .ok_or(RtfError::UnknownNode)?
            .set_parameter(parameter);
        Ok(())
    }

    #[inline]
    fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    #[inline]
    pub(crate) fn raw(&self, id: NodeId) -> &RtfNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn raw_mut(&mut self, id: NodeId) -> &mut RtfNode {
        &mut self.nodes[id.index()]
    }

    /// Add a detached node to the arena.
    pub fn create(&mut self, mut node: RtfNode) -> NodeId {
        node.parent = None;
        node.children = None;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Create a node and attach it as the last child of `parent` without
    /// validation. Used by the builder, which only ever appends to containers.
    pub(crate) fn push_child(&mut self, parent: NodeId, node: RtfNode) -> NodeId {
        let id = self.create(node);
        self.raw_mut(id).parent = Some(parent);
        self.raw_mut(parent).children.get_or_insert_with(Vec::new).push(id);
        id
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A child that is attached elsewhere is moved.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> RtfResult<()> {
        self.check_attach(parent, child)?;
        self.detach(child)?;
        self.raw_mut(child).parent = Some(parent);
        self.raw_mut(parent).children.get_or_insert_with(Vec::new).push(child);
        Ok(())
    }

    /// Insert `child` at `index` among the children of `parent`.
    ///
    /// `index` may equal the current child count to append.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> RtfResult<()> {
        self.check_attach(parent, child)?;

        let count = self.raw(parent).children.as_ref().map_or(0, Vec::len);
        if index > count {
            return Err(RtfError::InvalidStructure(format!(
                "insertion index {} out of range for {} children",
                index, count
            )));
        }

        let mut index = index;
        if self.raw(child).parent == Some(parent)
            && let Some(current) = self.child_index(child)
            && current < index
        {
            index -= 1;
        }

        self.detach(child)?;
        self.raw_mut(child).parent = Some(parent);
        self.raw_mut(parent)
            .children
            .get_or_insert_with(Vec::new)
            .insert(index, child);
        Ok(())
    }

    /// Remove the child at `index` from `parent`, returning its handle.
    pub fn remove_child(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let children = self.data_mut(parent)?.children.as_mut()?;
        if index >= children.len() {
            return None;
        }
        let child = children.remove(index);
        self.raw_mut(child).parent = None;
        Some(child)
    }

    /// Detach a node (and its subtree) from its parent.
    ///
    /// Detaching an already detached node is a no-op.
    pub fn detach(&mut self, id: NodeId) -> RtfResult<()> {
        let parent = self.data(id).ok_or(RtfError::UnknownNode)?.parent;
        if let Some(parent) = parent {
            if let Some(children) = self.raw_mut(parent).children.as_mut() {
                children.retain(|&c| c != id);
            }
            self.raw_mut(id).parent = None;
        }
        Ok(())
    }

    fn check_attach(&self, parent: NodeId, child: NodeId) -> RtfResult<()> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(RtfError::UnknownNode);
        }

        let parent_kind = self.raw(parent).kind();
        if !parent_kind.is_container() {
            return Err(RtfError::InvalidStructure(format!(
                "{} nodes cannot have children",
                parent_kind
            )));
        }
        if self.raw(child).kind() == NodeKind::Root {
            return Err(RtfError::InvalidStructure(
                "the root node cannot be attached".to_string(),
            ));
        }

        // The child must not be the parent itself or one of its ancestors
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(RtfError::InvalidStructure(
                    "a node cannot become its own descendant".to_string(),
                ));
            }
            cursor = self.raw(id).parent;
        }
        Ok(())
    }

    pub(crate) fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.raw(id).parent?;
        self.raw(parent)
            .children
            .as_ref()?
            .iter()
            .position(|&c| c == id)
    }

    /// Deep copy of a subtree. The copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> RtfResult<NodeId> {
        let top_copy = self.data(id).ok_or(RtfError::UnknownNode)?.detached_copy();
        let top = self.create(top_copy);

        let mut stack: Vec<(NodeId, NodeId)> = vec![(id, top)];
        while let Some((from, to)) = stack.pop() {
            let Some(children) = self.raw(from).children.clone() else {
                continue;
            };
            self.raw_mut(to).children = Some(Vec::with_capacity(children.len()));
            for child in children {
                let copy = self.raw(child).detached_copy();
                let copy = self.push_child(to, copy);
                stack.push((child, copy));
            }
        }
        Ok(top)
    }

    /// Copy of a single node with no children. The copy is detached.
    pub fn shallow_clone(&mut self, id: NodeId) -> RtfResult<NodeId> {
        let copy = self.data(id).ok_or(RtfError::UnknownNode)?.detached_copy();
        Ok(self.create(copy))
    }

    /// Deep copy a subtree of another tree into this one.
    ///
    /// The returned node is detached and shares nothing with `source`.
    pub fn import_subtree(&mut self, source: &RtfTree, id: NodeId) -> NodeId {
        let top = self.create(source.raw(id).detached_copy());

        let mut stack: Vec<(NodeId, NodeId)> = vec![(id, top)];
        while let Some((from, to)) = stack.pop() {
            let Some(children) = source.raw(from).children.as_ref() else {
                continue;
            };
            self.raw_mut(to).children = Some(Vec::with_capacity(children.len()));
            for &child in children {
                let copy = self.push_child(to, source.raw(child).detached_copy());
                stack.push((child, copy));
            }
        }
        top
    }

    /// Replace every occurrence of `old` in the text nodes below `id`.
    pub fn replace_text(&mut self, id: NodeId, old: &str, new: &str) -> RtfResult<()> {
        if !self.contains(id) {
            return Err(RtfError::UnknownNode);
        }
        if old.is_empty() {
            return Ok(());
        }
        let targets: Vec<NodeId> = self
            .node(id)
            .find_text(old)
            .into_iter()
            .map(|n| n.id())
            .collect();
        for target in targets {
            let key = self.raw_mut(target).key_mut();
            *key = key.replace(old, new);
        }
        Ok(())
    }

    /// Code page declared by the document's top-level `\ansicpg`, or the
    /// configured default.
    pub fn code_page(&self) -> u32 {
        self.main_group()
            .and_then(|main| {
                main.children()
                    .filter(|n| n.data().is_keyword("ansicpg"))
                    .filter_map(|n| n.parameter())
                    .last()
            })
            .and_then(|cp| u32::try_from(cp).ok())
            .unwrap_or(self.options.default_code_page)
    }

    /// Encoding used for `\'hh` escapes in this document.
    pub fn encoding(&self) -> &'static Encoding {
        encoding::resolve_encoding(Some(self.code_page()), self.options.default_code_page)
    }

    /// Font table declared by the document (empty when absent).
    pub fn font_table(&self) -> FontTable {
        FontTable::from_tree(self)
    }

    /// Color table declared by the document (empty when absent).
    pub fn color_table(&self) -> ColorTable {
        ColorTable::from_tree(self)
    }

    /// Indented dump of the tree structure, one node per line.
    pub fn dump(&self, show_types: bool) -> String {
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(self.root, 0)];

        while let Some((id, level)) = stack.pop() {
            let node = self.raw(id);
            for _ in 0..level {
                out.push_str("  ");
            }
            match node.kind() {
                NodeKind::Root => out.push_str("ROOT"),
                NodeKind::Group => out.push_str("GROUP"),
                kind => {
                    if show_types {
                        out.push_str(&kind.to_string());
                        out.push_str(": ");
                    }
                    out.push_str(node.key());
                    if let Some(parameter) = node.parameter() {
                        out.push(' ');
                        out.push_str(itoa::Buffer::new().format(parameter));
                    }
                },
            }
            out.push('\n');

            if let Some(children) = node.children.as_ref() {
                stack.extend(children.iter().rev().map(|&c| (c, level + 1)));
            }
        }
        out
    }

    /// Number of nodes held by the arena, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every node that is no longer reachable from the root.
    ///
    /// Surviving nodes are renumbered in document order, so all handles
    /// obtained before compacting are invalidated.
    pub fn compact(&mut self) {
        let mut order: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(children) = self.raw(id).children.as_ref() {
                stack.extend(children.iter().rev().copied());
            }
        }
        if order.len() == self.nodes.len() {
            return;
        }

        let mut remap: Vec<Option<NodeId>> = vec![None; self.nodes.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.index()] = Some(NodeId(new as u32));
        }

        let dropped = self.nodes.len() - order.len();
        let mut old: Vec<Option<RtfNode>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();
        self.nodes = order
            .iter()
            .filter_map(|id| old[id.index()].take())
            .map(|mut node| {
                node.parent = node.parent.and_then(|p| remap[p.index()]);
                if let Some(children) = node.children.as_mut() {
                    for child in children.iter_mut() {
                        if let Some(id) = remap[child.index()] {
                            *child = id;
                        }
                    }
                }
                node
            })
            .collect();
        self.root = NodeId(0);

        log::debug!("compacted RTF tree: dropped {} detached nodes", dropped);
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(RtfNode::root());
        self.root = NodeId(0);
    }
}

impl Default for RtfTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RtfTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump(false))
    }
}

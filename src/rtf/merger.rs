//! Document merging.
//!
//! [`RtfMerger`] replaces placeholder strings inside a template's text with
//! the body of other RTF documents. Fonts and colors used by an inserted
//! document are renumbered against the template's tables, and any entry the
//! template lacks is appended to its `\fonttbl` or `\colortbl` group.
//!
//! Inserted content is scanned for placeholders too, so replacement documents
//! may themselves contain placeholders. Expansion stops at
//! [`MergeOptions::max_nesting`] levels, which bounds self-referencing
//! replacements.
//!
//! # Example
//!
//! ```
//! use rtftree::rtf::{RtfMerger, RtfTree};
//!
//! let template = RtfTree::parse(r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}\pard Hello [X] World\par}")?;
//! let insert = RtfTree::parse(r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}\pard\f0 middle\par}")?;
//!
//! let mut merger = RtfMerger::new(template);
//! merger.add_placeholder("[X]", insert)?;
//! let merged = merger.merge()?;
//! assert_eq!(merged.text(), "Hello middle World\n");
//! # Ok::<(), rtftree::rtf::RtfError>(())
//! ```

use super::error::{RtfError, RtfResult};
use super::keywords::{HEADER_DESTINATIONS, HEADER_KEYWORDS, IndexRole, index_role};
use super::node::{NodeId, NodeKind, RtfNode};
use super::select::NodeRef;
use super::tree::RtfTree;
use super::types::{Color, ColorTable, Font, FontFamily, FontTable};
use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default limit on how deeply inserted documents are expanded.
pub const DEFAULT_MAX_NESTING: usize = 16;

/// Options controlling how documents are merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Drop the trailing `\par` of each inserted document
    pub remove_last_par: bool,
    /// Levels of inserted content that are scanned for further placeholders.
    /// Content inserted deeper than this is left as it is.
    pub max_nesting: usize,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            remove_last_par: true,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

/// Merges RTF documents into placeholder positions of a template.
#[derive(Debug, Clone)]
pub struct RtfMerger {
    template: RtfTree,
    /// Placeholders in declaration order
    placeholders: Vec<(String, RtfTree)>,
    options: MergeOptions,
}

impl RtfMerger {
    /// Create a merger over `template`.
    pub fn new(template: RtfTree) -> Self {
        Self::with_options(template, MergeOptions::default())
    }

    /// Create a merger over `template` with explicit options.
    pub fn with_options(template: RtfTree, options: MergeOptions) -> Self {
        Self {
            template,
            placeholders: Vec::new(),
            options,
        }
    }

    /// Create a merger over the template stored at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> RtfResult<Self> {
        let mut template = RtfTree::new();
        template.load_rtf_file(path)?;
        Ok(Self::new(template))
    }

    /// Register `document` as the replacement for `placeholder`.
    ///
    /// Re-registering a placeholder replaces its document and keeps its
    /// original position in the declaration order.
    pub fn add_placeholder(
        &mut self,
        placeholder: impl Into<String>,
        document: RtfTree,
    ) -> RtfResult<()> {
        let placeholder = placeholder.into();
        if placeholder.is_empty() {
            return Err(RtfError::InvalidPlaceholder(
                "placeholder text is empty".to_string(),
            ));
        }

        match self.placeholders.iter_mut().find(|(p, _)| *p == placeholder) {
            Some((_, existing)) => *existing = document,
            None => self.placeholders.push((placeholder, document)),
        }
        Ok(())
    }

    /// Register the document stored at `path` as the replacement for
    /// `placeholder`.
    ///
    /// Nothing is registered when the file cannot be read or parsed.
    pub fn add_placeholder_file<P: AsRef<Path>>(
        &mut self,
        placeholder: impl Into<String>,
        path: P,
    ) -> RtfResult<()> {
        let mut document = RtfTree::with_options(self.template.options().clone());
        document.load_rtf_file(path)?;
        self.add_placeholder(placeholder, document)
    }

    /// Unregister a placeholder, returning its document.
    pub fn remove_placeholder(&mut self, placeholder: &str) -> Option<RtfTree> {
        let index = self.placeholders.iter().position(|(p, _)| p == placeholder)?;
        Some(self.placeholders.remove(index).1)
    }

    /// Registered placeholders in declaration order.
    pub fn placeholders(&self) -> impl Iterator<Item = (&str, &RtfTree)> {
        self.placeholders.iter().map(|(p, tree)| (p.as_str(), tree))
    }

    /// The template being merged into.
    #[inline]
    pub fn template(&self) -> &RtfTree {
        &self.template
    }

    #[inline]
    pub fn template_mut(&mut self) -> &mut RtfTree {
        &mut self.template
    }

    /// Give up the merger, returning the template.
    #[inline]
    pub fn into_template(self) -> RtfTree {
        self.template
    }

    #[inline]
    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Replace every placeholder occurrence in the template's text.
    ///
    /// When several placeholders start at the same offset, the one declared
    /// first wins. Inserted content is searched as well, up to
    /// [`MergeOptions::max_nesting`] levels deep.
    ///
    /// The template is compacted afterwards, so node handles obtained from it
    /// before merging are invalidated.
    pub fn merge(&mut self) -> RtfResult<&RtfTree> {
        if self.placeholders.is_empty() {
            return Ok(&self.template);
        }

        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(self.placeholders.iter().map(|(p, _)| p.as_str()))
            .map_err(|err| RtfError::InvalidPlaceholder(err.to_string()))?;

        // Nesting level of every group spliced in so far
        let mut spliced: HashMap<NodeId, usize> = HashMap::new();
        // (container, where scanning resumes, nesting level of its content)
        let mut stack: Vec<(NodeId, Resume, usize)> =
            vec![(self.template.root_id(), Resume::Start, 0)];

        while let Some((parent, resume, level)) = stack.pop() {
            // Positions are recomputed from handles, since splicing and table
            // creation shift the children of any container on the stack
            let index = match resume {
                Resume::Start => Some(0),
                Resume::At(id) => self.template.child_index(id),
                Resume::After(id) => self.template.child_index(id).map(|i| i + 1),
            };
            let Some(child) = index.and_then(|i| self.template.node(parent).child(i)) else {
                continue;
            };
            let id = child.id();

            match child.kind() {
                NodeKind::Text => {
                    let found = matcher.find(child.key()).map(|m| Occurrence {
                        placeholder: m.pattern().as_usize(),
                        start: m.start(),
                        end: m.end(),
                    });
                    let Some(occurrence) = found else {
                        stack.push((parent, Resume::After(id), level));
                        continue;
                    };

                    let splice = self.replace(parent, id, occurrence)?;
                    if let Some(group) = splice.group {
                        spliced.insert(group, level + 1);
                    }
                    if let Some(next) = splice.resume {
                        stack.push((parent, Resume::At(next), level));
                    }
                },
                kind if kind.is_container() => {
                    stack.push((parent, Resume::After(id), level));
                    let inner = spliced.get(&id).copied().unwrap_or(level);
                    if inner <= self.options.max_nesting {
                        stack.push((id, Resume::Start, inner));
                    } else {
                        log::warn!(
                            "placeholders nested deeper than {} levels are not expanded",
                            self.options.max_nesting
                        );
                    }
                },
                _ => stack.push((parent, Resume::After(id), level)),
            }
        }

        self.template.compact();
        Ok(&self.template)
    }

    /// Splice one placeholder occurrence found in `text_node`, a child of
    /// `parent`.
    fn replace(
        &mut self,
        parent: NodeId,
        text_node: NodeId,
        occurrence: Occurrence,
    ) -> RtfResult<Splice> {
        let (placeholder, document) = &self.placeholders[occurrence.placeholder];
        log::debug!(
            "merging placeholder {:?} at byte {}",
            placeholder,
            occurrence.start
        );

        let mut document = document.clone();
        Reconciler::new(&mut self.template)?.reconcile(&mut document)?;
        if self.options.remove_last_par {
            remove_last_par(&mut document);
        }

        // Reconciling may have inserted table groups ahead of the text node
        let index = self
            .template
            .child_index(text_node)
            .ok_or(RtfError::UnknownNode)?;
        let text = self.template.node(text_node).key().to_string();
        let (before, after) = (&text[..occurrence.start], &text[occurrence.end..]);

        let mut position = index + 1;
        let group = self.splice_group(&document)?;
        if let Some(group) = group {
            self.template.insert_child(parent, position, group)?;
            position += 1;
        }
        let rest = if after.is_empty() {
            None
        } else {
            let rest = self.template.create(RtfNode::text(after));
            self.template.insert_child(parent, position, rest)?;
            Some(rest)
        };

        // Scanning resumes at the truncated text, or at whatever follows it
        let resume = if before.is_empty() {
            self.template.remove_child(parent, index);
            group
                .or(rest)
                .or_else(|| self.template.node(parent).child(index).map(|n| n.id()))
        } else {
            self.template.set_key(text_node, before)?;
            Some(text_node)
        };
        Ok(Splice { group, resume })
    }

    /// Copy the body of `document` into a new detached template group that
    /// resets paragraph and character formatting first.
    fn splice_group(&mut self, document: &RtfTree) -> RtfResult<Option<NodeId>> {
        let Some(main) = document.main_group() else {
            return Ok(None);
        };
        let body = body_start(main);
        if body >= main.child_count() {
            return Ok(None);
        }

        let template = &mut self.template;
        let group = template.create(RtfNode::group());
        for keyword in ["pard", "plain"] {
            let node = template.create(RtfNode::keyword(keyword, None));
            template.append_child(group, node)?;
        }
        for child in main.children().skip(body) {
            let copy = template.import_subtree(document, child.id());
            template.append_child(group, copy)?;
        }
        Ok(Some(group))
    }
}

/// Where scanning of a container continues.
#[derive(Debug, Clone, Copy)]
enum Resume {
    Start,
    At(NodeId),
    After(NodeId),
}

/// Outcome of splicing one occurrence.
struct Splice {
    /// Group holding the inserted body
    group: Option<NodeId>,
    /// Node scanning continues from, `None` at the end of the container
    resume: Option<NodeId>,
}

#[derive(Debug, Clone, Copy)]
struct Occurrence {
    placeholder: usize,
    start: usize,
    end: usize,
}

/// Index of the first body node of a main group: the node after its first
/// `\pard`, or the first node that is not part of the document header.
fn body_start(main: NodeRef<'_>) -> usize {
    if let Some(pard) = main
        .children()
        .position(|n| n.data().is_keyword("pard"))
    {
        return pard + 1;
    }

    main.children()
        .position(|n| match n.kind() {
            NodeKind::Keyword => !HEADER_KEYWORDS.contains(n.key()),
            NodeKind::Group => !is_header_group(n),
            _ => true,
        })
        .unwrap_or(main.child_count())
}

fn is_header_group(group: NodeRef<'_>) -> bool {
    let starts_with_star = group
        .first_child()
        .is_some_and(|n| n.kind() == NodeKind::Control && n.key() == "*");
    starts_with_star
        || group
            .destination()
            .is_some_and(|d| HEADER_DESTINATIONS.contains(d))
}

fn remove_last_par(document: &mut RtfTree) {
    let Some(main) = document.main_group() else {
        return;
    };
    let Some(last) = main.last_child() else {
        return;
    };
    if last.data().is_keyword("par") {
        let (main, index) = (main.id(), main.child_count() - 1);
        document.remove_child(main, index);
    }
}

/// Renumbers font and color references of an inserted document against the
/// template's tables, extending the template where needed.
struct Reconciler<'t> {
    template: &'t mut RtfTree,
    fonts: FontTable,
    colors: ColorTable,
}

impl<'t> Reconciler<'t> {
    fn new(template: &'t mut RtfTree) -> RtfResult<Self> {
        if template.main_group().is_none() {
            return Err(RtfError::InvalidStructure(
                "template has no main group".to_string(),
            ));
        }
        Ok(Self {
            fonts: template.font_table(),
            colors: template.color_table(),
            template,
        })
    }

    fn reconcile(&mut self, document: &mut RtfTree) -> RtfResult<()> {
        let fonts = document.font_table();
        let colors = document.color_table();

        let targets: Vec<(NodeId, IndexRole, i32)> = document
            .root()
            .descendants()
            .filter(|n| n.kind() == NodeKind::Keyword)
            .filter_map(|n| Some((n.id(), index_role(n.key())?, n.parameter()?)))
            .collect();

        // Colors first, then fonts
        for (id, _, index) in targets.iter().filter(|t| t.1 == IndexRole::Color) {
            let color = usize::try_from(*index).ok().and_then(|i| colors.get(i));
            let Some(color) = color else {
                log::warn!("merged document references missing color {}", index);
                continue;
            };
            let mapped = self.color_index(color)?;
            document.set_parameter(*id, Some(mapped))?;
        }

        for (id, _, index) in targets.iter().filter(|t| t.1 == IndexRole::Font) {
            let Some(font) = fonts.get(*index) else {
                log::warn!("merged document references missing font {}", index);
                continue;
            };
            let mapped = self.font_index(&font.name)?;
            document.set_parameter(*id, Some(mapped))?;
        }
        Ok(())
    }

    /// Template index for `name`, appending a new font entry if needed.
    fn font_index(&mut self, name: &str) -> RtfResult<i32> {
        if let Some(index) = self.fonts.index_of(name) {
            return Ok(index);
        }

        let index = self.fonts.next_index();
        let table = self.table_group("fonttbl", &[])?;
        let t = &mut *self.template;
        let entry = t.create(RtfNode::group());
        for node in [
            RtfNode::keyword("f", Some(index)),
            RtfNode::keyword(FontFamily::Nil.keyword(), None),
            RtfNode::text(format!("{};", name)),
        ] {
            let id = t.create(node);
            t.append_child(entry, id)?;
        }
        t.append_child(table, entry)?;

        self.fonts.insert(index, Font::new(name, FontFamily::Nil, 0));
        log::debug!("added font {:?} to template as \\f{}", name, index);
        Ok(index)
    }

    /// Template index for `color`, appending a new color entry if needed.
    fn color_index(&mut self, color: Color) -> RtfResult<i32> {
        if let Some(index) = self.colors.index_of(color) {
            return Ok(index as i32);
        }

        // A new table starts with the automatic color entry
        if self.colors.is_empty()
            && self
                .template
                .root()
                .select_single_group("colortbl")
                .is_none()
        {
            self.table_group("colortbl", &[RtfNode::text(";")])?;
            self.colors.add(Color::black());
            if color == Color::black() {
                return Ok(0);
            }
        }

        let table = self.table_group("colortbl", &[])?;
        let t = &mut *self.template;
        for node in [
            RtfNode::keyword("red", Some(i32::from(color.red))),
            RtfNode::keyword("green", Some(i32::from(color.green))),
            RtfNode::keyword("blue", Some(i32::from(color.blue))),
            RtfNode::text(";"),
        ] {
            let id = t.create(node);
            t.append_child(table, id)?;
        }

        let index = self.colors.add(color) as i32;
        log::debug!(
            "added color ({}, {}, {}) to template as index {}",
            color.red,
            color.green,
            color.blue,
            index
        );
        Ok(index)
    }

    /// The template's `keyword` table group. A missing group is created
    /// after the header keywords of the main group, with the color table
    /// following the font table.
    fn table_group(&mut self, keyword: &str, initial: &[RtfNode]) -> RtfResult<NodeId> {
        if let Some(group) = self.template.root().select_single_group(keyword) {
            return Ok(group.id());
        }

        let main = self
            .template
            .main_group()
            .ok_or(RtfError::UnknownNode)?;
        let position = main
            .children()
            .position(|n| match n.kind() {
                NodeKind::Keyword => !HEADER_KEYWORDS.contains(n.key()),
                NodeKind::Group => keyword == "fonttbl" || n.destination() != Some("fonttbl"),
                _ => true,
            })
            .unwrap_or(main.child_count());
        let main = main.id();

        let t = &mut *self.template;
        let group = t.create(RtfNode::group());
        let nodes = std::iter::once(RtfNode::keyword(keyword, None)).chain(initial.iter().cloned());
        for node in nodes {
            let id = t.create(node);
            t.append_child(group, id)?;
        }
        t.insert_child(main, position, group)?;
        Ok(group)
    }
}

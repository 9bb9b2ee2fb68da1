//! Font and color tables read from a document tree.
//!
//! Tables are computed on demand from the `\fonttbl` and `\colortbl`
//! groups; editing the tree does not update a table read earlier.

use super::node::NodeKind;
use super::select::NodeRef;
use super::tree::RtfTree;
use crate::common::encoding;
use encoding_rs::Encoding;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// RTF color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// Red component (0-255)
    pub red: u8,
    /// Green component (0-255)
    pub green: u8,
    /// Blue component (0-255)
    pub blue: u8,
}

impl Color {
    /// Create a new color.
    #[inline]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Black color.
    #[inline]
    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// White color.
    #[inline]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }
}

#[inline]
fn component(parameter: Option<i32>) -> u8 {
    parameter.unwrap_or(0).clamp(0, 255) as u8
}

/// Color table containing document colors.
///
/// Entry `i` answers `\cf i`; the empty leading entry of a typical
/// `{\colortbl;...}` reads as black.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTable {
    colors: Vec<Color>,
}

impl ColorTable {
    /// Create a new color table.
    #[inline]
    pub fn new() -> Self {
        Self { colors: Vec::new() }
    }

    /// Read the color table of a document. Empty when there is none.
    pub fn from_tree(tree: &RtfTree) -> Self {
        tree.root()
            .select_single_group("colortbl")
            .map(Self::from_group)
            .unwrap_or_default()
    }

    /// Read a `{\colortbl ...}` group.
    pub fn from_group(group: NodeRef<'_>) -> Self {
        let mut table = Self::new();
        let mut current = Color::black();

        for node in group.children().skip(1) {
            match node.kind() {
                NodeKind::Keyword => match node.key() {
                    "red" => current.red = component(node.parameter()),
                    "green" => current.green = component(node.parameter()),
                    "blue" => current.blue = component(node.parameter()),
                    _ => {},
                },
                NodeKind::Text => {
                    for _ in node.key().matches(';') {
                        table.add(current);
                        current = Color::black();
                    }
                },
                _ => {},
            }
        }
        table
    }

    /// Add a color to the table and return its index.
    #[inline]
    pub fn add(&mut self, color: Color) -> usize {
        self.colors.push(color);
        self.colors.len() - 1
    }

    /// Get a color by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Color> {
        self.colors.get(index).copied()
    }

    /// Index of the first entry equal to `color`.
    #[inline]
    pub fn index_of(&self, color: Color) -> Option<usize> {
        self.colors.iter().position(|&c| c == color)
    }

    /// Get all colors in the table.
    #[inline]
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Font family categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFamily {
    /// Nil (unknown or default)
    #[default]
    Nil,
    /// Roman (serif) fonts
    Roman,
    /// Swiss (sans-serif) fonts
    Swiss,
    /// Modern (monospace) fonts
    Modern,
    /// Script fonts
    Script,
    /// Decorative fonts
    Decor,
    /// Technical, symbol, and mathematical fonts
    Tech,
    /// Bidirectional fonts
    Bidi,
}

impl FontFamily {
    /// Family for a font family keyword such as `fswiss`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let family = match keyword {
            "fnil" => FontFamily::Nil,
            "froman" => FontFamily::Roman,
            "fswiss" => FontFamily::Swiss,
            "fmodern" => FontFamily::Modern,
            "fscript" => FontFamily::Script,
            "fdecor" => FontFamily::Decor,
            "ftech" => FontFamily::Tech,
            "fbidi" => FontFamily::Bidi,
            _ => return None,
        };
        Some(family)
    }

    /// Keyword written for this family.
    pub fn keyword(self) -> &'static str {
        match self {
            FontFamily::Nil => "fnil",
            FontFamily::Roman => "froman",
            FontFamily::Swiss => "fswiss",
            FontFamily::Modern => "fmodern",
            FontFamily::Script => "fscript",
            FontFamily::Decor => "fdecor",
            FontFamily::Tech => "ftech",
            FontFamily::Bidi => "fbidi",
        }
    }
}

/// Font definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    /// Font name
    pub name: String,
    /// Font family category
    pub family: FontFamily,
    /// Character set (`\fcharset`)
    pub charset: u8,
}

impl Font {
    /// Create a new font.
    #[inline]
    pub fn new(name: impl Into<String>, family: FontFamily, charset: u8) -> Self {
        Self {
            name: name.into(),
            family,
            charset,
        }
    }
}

/// Font table containing document fonts, keyed by `\fN` index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontTable {
    fonts: BTreeMap<i32, Font>,
}

impl FontTable {
    /// Create a new font table.
    #[inline]
    pub fn new() -> Self {
        Self {
            fonts: BTreeMap::new(),
        }
    }

    /// Read the font table of a document. Empty when there is none.
    pub fn from_tree(tree: &RtfTree) -> Self {
        tree.root()
            .select_single_group("fonttbl")
            .map(|group| Self::from_group(group, tree.encoding()))
            .unwrap_or_default()
    }

    /// Read a `{\fonttbl ...}` group.
    ///
    /// Entries may be grouped (`{\f0 Arial;}`) or written flat
    /// (`\f0 Arial;\f1 Times;`). Nested groups such as `{\*\panose ...}` are
    /// ignored.
    pub fn from_group(group: NodeRef<'_>, encoding: &'static Encoding) -> Self {
        let mut table = Self::new();
        let mut flat = FontEntry::default();

        for node in group.children().skip(1) {
            match node.kind() {
                NodeKind::Group => {
                    let mut entry = FontEntry::default();
                    for child in node.children() {
                        entry.feed(child, encoding);
                    }
                    entry.finish(&mut table, encoding);
                },
                _ => {
                    if flat.feed(node, encoding) {
                        flat.finish(&mut table, encoding);
                        flat = FontEntry::default();
                    }
                },
            }
        }
        table
    }

    /// Add a font at `index`, replacing any previous entry.
    #[inline]
    pub fn insert(&mut self, index: i32, font: Font) {
        self.fonts.insert(index, font);
    }

    /// Get a font by index.
    #[inline]
    pub fn get(&self, index: i32) -> Option<&Font> {
        self.fonts.get(&index)
    }

    /// Index of the first font named `name`, ignoring ASCII case.
    pub fn index_of(&self, name: &str) -> Option<i32> {
        self.fonts
            .iter()
            .find(|(_, font)| font.name.eq_ignore_ascii_case(name))
            .map(|(&index, _)| index)
    }

    /// Index a newly appended font should use.
    pub fn next_index(&self) -> i32 {
        self.fonts
            .last_key_value()
            .map_or(0, |(&index, _)| index.saturating_add(1))
    }

    /// Fonts in index order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &Font)> {
        self.fonts.iter().map(|(&index, font)| (index, font))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// Font entry being read.
#[derive(Default)]
struct FontEntry {
    index: Option<i32>,
    family: FontFamily,
    charset: u8,
    name: String,
    bytes: SmallVec<[u8; 16]>,
}

impl FontEntry {
    /// Take one node of the entry. Returns `true` once the name's
    /// terminating `;` has been seen.
    fn feed(&mut self, node: NodeRef<'_>, encoding: &'static Encoding) -> bool {
        match node.kind() {
            NodeKind::Keyword => {
                match node.key() {
                    "f" => self.index = node.parameter(),
                    "fcharset" => self.charset = component(node.parameter()),
                    key => {
                        if let Some(family) = FontFamily::from_keyword(key) {
                            self.family = family;
                        }
                    },
                }
                false
            },
            NodeKind::Control if node.data().is_hex_escape() => {
                if let Some(byte) = node.parameter().and_then(|p| u8::try_from(p).ok()) {
                    self.bytes.push(byte);
                }
                false
            },
            NodeKind::Text => {
                self.flush(encoding);
                self.name.push_str(node.key());
                node.key().contains(';')
            },
            _ => false,
        }
    }

    fn flush(&mut self, encoding: &'static Encoding) {
        if !self.bytes.is_empty() {
            self.name.push_str(&encoding::decode_bytes(&self.bytes, encoding));
            self.bytes.clear();
        }
    }

    fn finish(mut self, table: &mut FontTable, encoding: &'static Encoding) {
        self.flush(encoding);
        let Some(index) = self.index else {
            return;
        };
        let name = self
            .name
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        table.insert(index, Font::new(name, self.family, self.charset));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_font_table() {
        let tree = RtfTree::parse(
            r"{\rtf1{\fonttbl{\f0\fswiss\fcharset0 Arial;}{\f2\froman{\*\panose 02020603050405020304}Times New Roman;}}}",
        )
        .unwrap();
        let fonts = tree.font_table();
        assert_eq!(fonts.len(), 2);
        assert_eq!(fonts.get(0).unwrap().name, "Arial");
        assert_eq!(fonts.get(0).unwrap().family, FontFamily::Swiss);
        assert_eq!(fonts.get(2).unwrap().name, "Times New Roman");
        assert_eq!(fonts.get(2).unwrap().family, FontFamily::Roman);
        assert!(fonts.get(1).is_none());
        assert_eq!(fonts.next_index(), 3);
        assert_eq!(fonts.index_of("times new roman"), Some(2));
    }

    #[test]
    fn test_flat_font_table() {
        let tree =
            RtfTree::parse(r"{\rtf1{\fonttbl\f0\fmodern Courier;\f1\fcharset204 Arial;}}").unwrap();
        let fonts = tree.font_table();
        assert_eq!(fonts.len(), 2);
        assert_eq!(fonts.get(0).unwrap().name, "Courier");
        assert_eq!(fonts.get(1).unwrap().charset, 204);
    }

    #[test]
    fn test_hex_escaped_font_name() {
        let tree = RtfTree::parse(r"{\rtf1\ansicpg936{\fonttbl{\f1 \'cb\'ce\'cc\'e5;}}}").unwrap();
        assert_eq!(tree.font_table().get(1).unwrap().name, "宋体");
    }

    #[test]
    fn test_missing_tables_are_empty() {
        let tree = RtfTree::parse(r"{\rtf1 plain}").unwrap();
        assert!(tree.font_table().is_empty());
        assert_eq!(tree.font_table().next_index(), 0);
        assert!(tree.color_table().is_empty());
    }

    #[test]
    fn test_color_table() {
        let tree = RtfTree::parse(
            r"{\rtf1{\colortbl;\red255\green0\blue0;\red0\green0\blue255;}}",
        )
        .unwrap();
        let colors = tree.color_table();
        assert_eq!(colors.len(), 3);
        assert_eq!(colors.get(0), Some(Color::black()));
        assert_eq!(colors.get(1), Some(Color::new(255, 0, 0)));
        assert_eq!(colors.index_of(Color::new(0, 0, 255)), Some(2));
        assert_eq!(colors.index_of(Color::white()), None);
    }

    #[test]
    fn test_color_components_clamped() {
        let tree = RtfTree::parse(r"{\colortbl\red300\green-5\blue7;}").unwrap();
        assert_eq!(tree.color_table().get(0), Some(Color::new(255, 0, 7)));
    }
}

//! Plain text extraction.
//!
//! Walks a subtree in document order and collects the characters it would
//! display: literal text, character keywords, `\uN` escapes and `\'hh`
//! bytes decoded through the tree's code page.

use super::keywords::{CHARACTER_KEYWORDS, CHARACTER_SYMBOLS, HIDDEN_DESTINATIONS};
use super::node::{NodeId, NodeKind, RtfNode};
use super::tree::RtfTree;
use crate::common::encoding;
use encoding_rs::Encoding;
use smallvec::SmallVec;

/// Fallback characters skipped after `\uN` when no `\uc` is in effect.
const DEFAULT_UNICODE_SKIP: usize = 1;

/// Extract text below `id`. With `skip_destinations`, groups holding
/// non-visible content are left out.
pub(crate) fn extract(tree: &RtfTree, id: NodeId, skip_destinations: bool) -> String {
    let Some(top) = tree.data(id) else {
        return String::new();
    };
    let mut extractor = Extractor::new(tree.encoding());

    if !top.kind().is_container() {
        extractor.leaf(top);
        return extractor.finish();
    }

    // (container, next child position, \uc value to restore on exit)
    let mut stack: Vec<(NodeId, usize, usize)> = vec![(id, 0, extractor.unicode_skip)];
    while let Some((parent, pos, saved_skip)) = stack.pop() {
        let children = tree.raw(parent).children().unwrap_or(&[]);
        let Some(&child) = children.get(pos) else {
            extractor.flush();
            extractor.unicode_skip = saved_skip;
            extractor.pending_skip = 0;
            continue;
        };
        stack.push((parent, pos + 1, saved_skip));

        let node = tree.raw(child);
        if node.kind().is_container() {
            if skip_destinations && is_hidden_destination(tree, node) {
                continue;
            }
            extractor.flush();
            extractor.pending_skip = 0;
            stack.push((child, 0, extractor.unicode_skip));
        } else {
            extractor.leaf(node);
        }
    }
    extractor.finish()
}

/// Whether a group holds content that is never displayed.
fn is_hidden_destination(tree: &RtfTree, group: &RtfNode) -> bool {
    let Some(&first) = group.children().and_then(|c| c.first()) else {
        return false;
    };
    let first = tree.raw(first);
    match first.kind() {
        NodeKind::Control => first.key() == "*",
        NodeKind::Keyword => HIDDEN_DESTINATIONS.contains(first.key()),
        _ => false,
    }
}

struct Extractor {
    out: String,
    encoding: &'static Encoding,
    /// Undecoded `\'hh` bytes
    bytes: SmallVec<[u8; 8]>,
    /// High surrogate waiting for its pair
    high_surrogate: Option<u16>,
    /// Current `\uc` value
    unicode_skip: usize,
    /// Fallback characters still to drop
    pending_skip: usize,
}

impl Extractor {
    fn new(encoding: &'static Encoding) -> Self {
        Self {
            out: String::new(),
            encoding,
            bytes: SmallVec::new(),
            high_surrogate: None,
            unicode_skip: DEFAULT_UNICODE_SKIP,
            pending_skip: 0,
        }
    }

    fn leaf(&mut self, node: &RtfNode) {
        if node.is_hex_escape() {
            if let Some(byte) = node.parameter().and_then(|p| u8::try_from(p).ok()) {
                if self.pending_skip > 0 {
                    self.pending_skip -= 1;
                } else {
                    self.bytes.push(byte);
                }
            }
            return;
        }
        self.flush();

        match node.kind() {
            NodeKind::Text => {
                let text = node.key();
                let skipped = text
                    .char_indices()
                    .nth(self.pending_skip)
                    .map_or(text.len(), |(i, _)| i);
                self.pending_skip = self.pending_skip.saturating_sub(text.chars().count());
                self.out.push_str(&text[skipped..]);
            },
            NodeKind::Keyword => self.keyword(node),
            NodeKind::Control => {
                self.pending_skip = 0;
                if let Some(&ch) = CHARACTER_SYMBOLS.get(node.key()) {
                    self.out.push(ch);
                }
            },
            NodeKind::Root | NodeKind::Group => {},
        }
    }

    fn keyword(&mut self, node: &RtfNode) {
        let key = node.key();
        if key == "u" {
            if let Some(code) = node.parameter() {
                self.unicode(code);
                self.pending_skip = self.unicode_skip;
            }
            return;
        }

        self.pending_skip = 0;
        if key == "uc" {
            self.unicode_skip = node
                .parameter()
                .and_then(|p| usize::try_from(p).ok())
                .unwrap_or(DEFAULT_UNICODE_SKIP);
        } else if let Some(&ch) = CHARACTER_KEYWORDS.get(key) {
            self.out.push(ch);
        }
    }

    /// Append a `\uN` code unit, pairing surrogates.
    fn unicode(&mut self, code: i32) {
        let unit = if code < 0 { code + 65536 } else { code };
        let Ok(unit) = u16::try_from(unit) else {
            self.out.push(char::REPLACEMENT_CHARACTER);
            return;
        };

        match (self.high_surrogate.take(), unit) {
            (None, 0xD800..=0xDBFF) => self.high_surrogate = Some(unit),
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined =
                    0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(unit) - 0xDC00);
                self.out
                    .push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
            },
            (Some(_), 0xD800..=0xDBFF) => {
                self.out.push(char::REPLACEMENT_CHARACTER);
                self.high_surrogate = Some(unit);
            },
            (high, _) => {
                if high.is_some() {
                    self.out.push(char::REPLACEMENT_CHARACTER);
                }
                self.out
                    .push(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER));
            },
        }
    }

    fn flush(&mut self) {
        if self.bytes.is_empty() {
            return;
        }
        let decoded = encoding::decode_bytes(&self.bytes, self.encoding);
        self.out.push_str(&decoded);
        self.bytes.clear();
    }

    fn finish(mut self) -> String {
        self.flush();
        if self.high_surrogate.is_some() {
            self.out.push(char::REPLACEMENT_CHARACTER);
        }
        self.out
    }
}

#[cfg(test)]
mod tests {
    use crate::rtf::tree::RtfTree;

    fn text(rtf: &str) -> String {
        RtfTree::parse(rtf).unwrap().text()
    }

    #[test]
    fn test_paragraphs_and_tabs() {
        assert_eq!(text(r"{\rtf1\pard One\par Two\tab 3\line}"), "One\nTwo\t3\n");
    }

    #[test]
    fn test_destinations_skipped() {
        let rtf = r"{\rtf1{\fonttbl{\f0 Arial;}}{\colortbl;\red1\green2\blue3;}{\*\generator Writer;}{\info{\title T}}\pard Body}";
        let tree = RtfTree::parse(rtf).unwrap();
        assert_eq!(tree.text(), "Body");
        assert!(tree.raw_text().contains("Arial;"));
        assert!(tree.raw_text().contains("Writer;"));
    }

    #[test]
    fn test_hex_escapes_decoded() {
        assert_eq!(text(r"{\rtf1 caf\'e9}"), "café");
        assert_eq!(text(r"{\rtf1\ansicpg1251 \'cf\'f0}"), "Пр");
    }

    #[test]
    fn test_unicode_with_fallback() {
        assert_eq!(text(r"{\rtf1 a\u8364?b}"), "a\u{20ac}b");
        assert_eq!(text(r"{\rtf1\uc2 \u8364\'80\'80 x}"), "\u{20ac} x");
        assert_eq!(text(r"{\rtf1\uc0 \u8364 x}"), "\u{20ac}x");
        assert_eq!(text(r"{\rtf1 \u-4064?}"), "\u{f020}");
    }

    #[test]
    fn test_unicode_skip_is_group_scoped() {
        assert_eq!(text(r"{\rtf1{\uc0 \u233}\u233?}"), "éé");
    }

    #[test]
    fn test_surrogate_pairs() {
        assert_eq!(text(r"{\rtf1 \u-10179?\u-8704?}"), "😀");
    }

    #[test]
    fn test_typographic_keywords() {
        assert_eq!(
            text(r"{\rtf1 a\emdash b\endash\bullet\ldblquote q\rdblquote\lquote\rquote}"),
            "a\u{2014}b\u{2013}\u{2022}\u{201c}q\u{201d}\u{2018}\u{2019}"
        );
        assert_eq!(text(r"{\rtf1 a\~b\_c}"), "a\u{a0}b\u{2011}c");
    }

    #[test]
    fn test_node_text() {
        let tree = RtfTree::parse(r"{\rtf1{\b bold} plain}").unwrap();
        let group = tree.main_group().unwrap().child(1).unwrap();
        assert_eq!(group.text(), "bold");
        assert_eq!(group.first_child().unwrap().next_sibling().unwrap().text(), "bold");
    }
}

//! Tree builder that assembles lexer tokens into an [`RtfTree`].
//!
//! The builder is a single left-to-right pass with an explicit cursor: the
//! current container node and the group depth. Malformed nesting is recorded
//! and reported once the stream ends, after everything that could be built
//! has been attached to the tree.

use super::error::{RtfError, RtfResult};
use super::lexer::{Lexer, Token, TokenKind};
use super::node::{NodeId, NodeKind, RtfNode};
use super::tree::RtfTree;
use crate::common::encoding;
use encoding_rs::Encoding;
use smallvec::SmallVec;

/// Builder state for one load.
pub(crate) struct TreeBuilder<'t> {
    tree: &'t mut RtfTree,
    /// Container receiving new nodes
    current: NodeId,
    /// Number of open groups
    depth: usize,
    /// Fold hex escapes and text into single text nodes
    merge_special: bool,
    /// Code page fallback when the document declares none
    default_code_page: u32,
    /// Encoding for hex escapes, set by top-level `\ansicpg`
    encoding: &'static Encoding,
    /// Consecutive `\'hh` bytes awaiting decoding
    pending: SmallVec<[u8; 8]>,
    /// First structural error seen
    error: Option<RtfError>,
}

impl<'t> TreeBuilder<'t> {
    pub(crate) fn new(tree: &'t mut RtfTree) -> Self {
        let options = tree.options().clone();
        let current = tree.root_id();
        Self {
            tree,
            current,
            depth: 0,
            merge_special: options.merge_special_characters,
            default_code_page: options.default_code_page,
            encoding: encoding::resolve_encoding(None, options.default_code_page),
            pending: SmallVec::new(),
            error: None,
        }
    }

    /// Consume the token stream.
    pub(crate) fn build(mut self, lexer: Lexer<'_>) -> RtfResult<()> {
        for token in lexer {
            if token.kind == TokenKind::EndOfInput {
                break;
            }
            self.process(&token);
        }
        self.flush_pending();

        if self.depth != 0 && self.error.is_none() {
            log::warn!("RTF input ended with {} open group(s)", self.depth);
            self.error = Some(RtfError::UnbalancedGroups { depth: self.depth });
        }

        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn process(&mut self, token: &Token<'_>) {
        if self.merge_special && token.is_hex_escape() {
            if let Some(byte) = token.parameter.and_then(|p| u8::try_from(p).ok()) {
                self.pending.push(byte);
                return;
            }
        }
        self.flush_pending();

        match token.kind {
            TokenKind::GroupStart => {
                self.current = self.tree.push_child(self.current, RtfNode::group());
                self.depth += 1;
            },
            TokenKind::GroupEnd => {
                if self.depth == 0 {
                    log::warn!("unexpected group end at byte {}", token.offset);
                    if self.error.is_none() {
                        self.error = Some(RtfError::UnexpectedGroupEnd {
                            offset: token.offset,
                        });
                    }
                    return;
                }
                if let Some(parent) = self.tree.raw(self.current).parent() {
                    self.current = parent;
                }
                self.depth -= 1;
            },
            TokenKind::Text if self.merge_special => self.append_text(&token.key),
            TokenKind::Keyword | TokenKind::Control | TokenKind::Text => {
                if let Some(node) = RtfNode::from_token(token) {
                    self.tree.push_child(self.current, node);
                }
                if self.depth == 1 && token.kind == TokenKind::Keyword && token.key == "ansicpg" {
                    self.set_code_page(token.parameter);
                }
            },
            TokenKind::EndOfInput => {},
        }
    }

    fn set_code_page(&mut self, parameter: Option<i32>) {
        let codepage = parameter.and_then(|p| u32::try_from(p).ok());
        self.encoding = encoding::resolve_encoding(codepage, self.default_code_page);
    }

    /// Decode buffered escape bytes into the current text run.
    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut self.pending);
        let decoded = encoding::decode_bytes(&bytes, self.encoding);
        self.append_text(&decoded);
    }

    /// Extend the current container's trailing text node, or start a new one.
    fn append_text(&mut self, text: &str) {
        let last = self
            .tree
            .raw(self.current)
            .children()
            .and_then(|children| children.last().copied());

        match last {
            Some(last) if self.tree.raw(last).kind() == NodeKind::Text => {
                self.tree.raw_mut(last).key_mut().push_str(text);
            },
            _ => {
                self.tree.push_child(self.current, RtfNode::text(text));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtf::tree::ParseOptions;

    fn merged(text: &str) -> RtfTree {
        let options = ParseOptions {
            merge_special_characters: true,
            ..ParseOptions::default()
        };
        RtfTree::parse_with_options(text, options).unwrap()
    }

    #[test]
    fn test_builds_nested_groups() {
        let tree = RtfTree::parse(r"{\rtf1{\fonttbl{\f0 Arial;}}\pard Hi\par}").unwrap();
        let main = tree.main_group().unwrap();
        assert_eq!(main.kind(), NodeKind::Group);
        assert_eq!(main.child_count(), 5);

        let fonttbl = main.child(1).unwrap();
        assert_eq!(fonttbl.first_child().unwrap().key(), "fonttbl");
        let entry = fonttbl.child(1).unwrap();
        assert_eq!(entry.kind(), NodeKind::Group);
        assert_eq!(entry.last_child().unwrap().key(), "Arial;");
    }

    #[test]
    fn test_unbalanced_open_group_keeps_partial_tree() {
        let mut tree = RtfTree::new();
        let err = tree.load_rtf_text(r"{\rtf1{\b bold").unwrap_err();
        assert!(matches!(err, RtfError::UnbalancedGroups { depth: 2 }));
        assert!(err.is_malformed_input());
        assert_eq!(tree.text(), "bold");
    }

    #[test]
    fn test_unexpected_group_end() {
        let mut tree = RtfTree::new();
        let err = tree.load_rtf_text(r"{\rtf1 a}}{b}").unwrap_err();
        assert!(matches!(err, RtfError::UnexpectedGroupEnd { offset: 9 }));
        // Building continued after the stray brace
        assert_eq!(tree.root().child_count(), 2);
    }

    #[test]
    fn test_balanced_input_succeeds() {
        assert!(RtfTree::parse(r"{{}{{}}}").is_ok());
        assert!(RtfTree::parse("").is_ok());
    }

    #[test]
    fn test_without_merging_hex_escapes_stay_controls() {
        let tree = RtfTree::parse(r"{\rtf1 caf\'e9 au lait}").unwrap();
        let main = tree.main_group().unwrap();
        assert_eq!(main.child_count(), 4);
        assert_eq!(main.child(2).unwrap().kind(), NodeKind::Control);
        assert_eq!(main.child(2).unwrap().parameter(), Some(0xe9));
    }

    #[test]
    fn test_merging_folds_escapes_into_text() {
        let tree = merged(r"{\rtf1 caf\'e9 au lait}");
        let main = tree.main_group().unwrap();
        assert_eq!(main.child_count(), 2);
        assert_eq!(main.child(1).unwrap().key(), "café au lait");
    }

    #[test]
    fn test_merging_starts_text_at_leading_escape() {
        let tree = merged(r"{\rtf1\b\'e9t\'e9}");
        let main = tree.main_group().unwrap();
        assert_eq!(main.last_child().unwrap().kind(), NodeKind::Text);
        assert_eq!(main.last_child().unwrap().key(), "été");
    }

    #[test]
    fn test_merging_uses_top_level_code_page() {
        let tree = merged(r"{\rtf1\ansi\ansicpg1251 \'cf\'f0\'e8}");
        assert_eq!(tree.main_group().unwrap().last_child().unwrap().key(), "При");

        // Nested \ansicpg does not change the document code page
        let tree = merged(r"{\rtf1{\ansicpg1251}\'e9}");
        assert_eq!(tree.main_group().unwrap().last_child().unwrap().key(), "é");
    }

    #[test]
    fn test_merging_decodes_double_byte_sequences() {
        let tree = merged(r"{\rtf1\ansi\ansicpg936 \'c4\'e3\'ba\'c3}");
        assert_eq!(tree.main_group().unwrap().last_child().unwrap().key(), "你好");
    }

    #[test]
    fn test_merging_respects_default_code_page() {
        let options = ParseOptions {
            merge_special_characters: true,
            default_code_page: 1251,
        };
        let tree = RtfTree::parse_with_options(r"{\'cf}", options).unwrap();
        assert_eq!(tree.main_group().unwrap().last_child().unwrap().key(), "П");
    }
}

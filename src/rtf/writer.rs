//! RTF serializer.
//!
//! Walks a tree and regenerates RTF source. Output for a tree built without
//! special-character merging reproduces the parsed source byte for byte,
//! given the source used a single delimiter space after keywords.

use super::node::{NodeId, NodeKind, RtfNode};
use super::tree::RtfTree;
use crate::common::encoding;
use encoding_rs::Encoding;
use std::io::{self, Write};

/// Characters written literally inside text.
#[inline]
fn is_plain(ch: char) -> bool {
    matches!(ch, ' '..='\u{7f}')
}

/// RTF serializer over any byte sink.
pub struct RtfWriter<W: Write> {
    /// Output writer
    writer: W,
}

impl<W: Write> RtfWriter<W> {
    /// Create a new RTF writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write the whole document.
    pub fn write_tree(&mut self, tree: &RtfTree) -> io::Result<()> {
        self.write_node(tree, tree.root_id())
    }

    /// Write a node and its subtree.
    ///
    /// Text is encoded with the tree's code page.
    pub fn write_node(&mut self, tree: &RtfTree, id: NodeId) -> io::Result<()> {
        let Some(top) = tree.data(id) else {
            return Ok(());
        };
        let encoding = tree.encoding();

        self.write_single(top, None, encoding)?;
        if !top.kind().is_container() {
            return Ok(());
        }

        // (container, position of the next child to write)
        let mut stack: Vec<(NodeId, usize)> = vec![(id, 0)];
        while let Some((parent, pos)) = stack.pop() {
            let container = tree.raw(parent);
            let children = container.children().unwrap_or(&[]);

            let Some(&child) = children.get(pos) else {
                if container.kind() == NodeKind::Group {
                    self.write_str("}")?;
                }
                continue;
            };

            let previous = pos.checked_sub(1).map(|p| tree.raw(children[p]).kind());
            let node = tree.raw(child);
            self.write_single(node, previous, encoding)?;

            stack.push((parent, pos + 1));
            if node.kind().is_container() {
                stack.push((child, 0));
            }
        }
        Ok(())
    }

    /// Write one node without its children. Groups only get their opening brace.
    fn write_single(
        &mut self,
        node: &RtfNode,
        previous: Option<NodeKind>,
        encoding: &'static Encoding,
    ) -> io::Result<()> {
        match node.kind() {
            NodeKind::Root => Ok(()),
            NodeKind::Group => self.write_str("{"),
            NodeKind::Keyword => self.write_control_word(node.key(), node.parameter()),
            NodeKind::Control => {
                self.write_str("\\")?;
                self.write_str(node.key())?;
                match node.parameter() {
                    // An escape carries exactly one byte
                    Some(p) if node.is_hex_escape() => {
                        write!(self.writer, "{:02x}", p.clamp(0, 0xff))
                    },
                    _ => Ok(()),
                }
            },
            NodeKind::Text => {
                let after_keyword = previous == Some(NodeKind::Keyword);
                if after_keyword && node.key().chars().next().is_some_and(is_plain) {
                    self.write_str(" ")?;
                }
                self.write_text(node.key(), encoding)
            },
        }
    }

    /// Write a control word with its optional decimal parameter.
    pub fn write_control_word(&mut self, word: &str, param: Option<i32>) -> io::Result<()> {
        self.write_str("\\")?;
        self.write_str(word)?;
        if let Some(p) = param {
            self.write_str(itoa::Buffer::new().format(p))?;
        }
        Ok(())
    }

    /// Write literal text, escaping metacharacters and hex-encoding
    /// everything outside printable ASCII.
    pub fn write_text(&mut self, text: &str, encoding: &'static Encoding) -> io::Result<()> {
        let mut run_start = 0;
        for (i, ch) in text.char_indices() {
            let plain = is_plain(ch) && !matches!(ch, '\\' | '{' | '}');
            if plain {
                continue;
            }
            self.write_str(&text[run_start..i])?;
            run_start = i + ch.len_utf8();

            if is_plain(ch) {
                self.write_str("\\")?;
                self.write_str(&text[i..run_start])?;
            } else {
                for byte in encoding::encode_char(ch, encoding) {
                    write!(self.writer, "\\'{:02x}", byte)?;
                }
            }
        }
        self.write_str(&text[run_start..])
    }

    #[inline]
    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(s.as_bytes())
    }

    /// Flush the writer
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Serialize a node and its subtree to a string.
pub(crate) fn node_to_rtf(tree: &RtfTree, id: NodeId) -> String {
    let mut writer = RtfWriter::new(Vec::new());
    if let Err(err) = writer.write_node(tree, id) {
        log::warn!("failed to serialize RTF node: {}", err);
    }
    // Keys come from `&str` input or callers, so the bytes are valid UTF-8
    String::from_utf8(writer.into_inner())
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtf::tree::ParseOptions;
    use proptest::prelude::*;

    fn text_tree(text: &str) -> (RtfTree, NodeId) {
        let mut tree = RtfTree::new();
        let group = tree.create(RtfNode::group());
        tree.append_child(tree.root_id(), group).unwrap();
        let node = tree.create(RtfNode::text(text));
        tree.append_child(group, node).unwrap();
        (tree, node)
    }

    #[test]
    fn test_control_words() {
        let mut output = Vec::new();
        let mut writer = RtfWriter::new(&mut output);

        writer.write_control_word("test", Some(42)).unwrap();
        writer.write_control_word("flag", None).unwrap();
        writer.write_control_word("li", Some(-720)).unwrap();

        let result = String::from_utf8(output).unwrap();
        assert_eq!(result, "\\test42\\flag\\li-720");
    }

    #[test]
    fn test_metacharacters_escaped() {
        let (tree, node) = text_tree("{}\\");
        assert_eq!(tree.node(node).rtf(), r"\{\}\\");
        assert_eq!(tree.rtf(), r"{\{\}\\}");
    }

    #[test]
    fn test_non_ascii_hex_escaped() {
        let (tree, node) = text_tree("caf\u{e9}\u{1}");
        assert_eq!(tree.node(node).rtf(), r"caf\'e9\'01");
    }

    #[test]
    fn test_unmappable_character_becomes_question_mark() {
        let (tree, node) = text_tree("\u{4e2d}");
        assert_eq!(tree.node(node).rtf(), r"\'3f");
    }

    #[test]
    fn test_double_byte_code_page() {
        let tree = RtfTree::parse_with_options(
            r"{\rtf1\ansi\ansicpg936 \'c4\'e3}",
            ParseOptions {
                merge_special_characters: true,
                ..ParseOptions::default()
            },
        )
        .unwrap();
        assert_eq!(tree.rtf(), r"{\rtf1\ansi\ansicpg936\'c4\'e3}");
    }

    #[test]
    fn test_space_after_keyword() {
        let tree = RtfTree::parse(r"{\b bold\b0\'e9{\i x}y}").unwrap();
        assert_eq!(tree.rtf(), r"{\b bold\b0\'e9{\i x}y}");

        let tree = RtfTree::parse(r"{\colortbl;}").unwrap();
        assert_eq!(tree.rtf(), r"{\colortbl ;}");
    }

    #[test]
    fn test_hex_parameter_zero_padded() {
        let tree = RtfTree::parse(r"{\'0a\'ff}").unwrap();
        assert_eq!(tree.rtf(), r"{\'0a\'ff}");
    }

    #[test]
    fn test_hex_parameter_clamped_to_byte() {
        let mut tree = RtfTree::new();
        let group = tree.create(RtfNode::group());
        tree.append_child(tree.root_id(), group).unwrap();
        for parameter in [-1, 300] {
            let node = tree.create(RtfNode::control("'", Some(parameter)));
            tree.append_child(group, node).unwrap();
        }
        assert_eq!(tree.rtf(), r"{\'00\'ff}");
    }

    #[test]
    fn test_leaf_node_rtf() {
        let tree = RtfTree::parse(r"{\rtf1\fs24 x}").unwrap();
        let fs = tree.root().select_single_node("fs").unwrap();
        assert_eq!(fs.rtf(), r"\fs24");
        assert_eq!(tree.main_group().unwrap().rtf(), r"{\rtf1\fs24 x}");
    }

    #[test]
    fn test_write_rtf_to_sink() {
        let tree = RtfTree::parse(r"{\rtf1 Hi}").unwrap();
        let mut out = Vec::new();
        tree.write_rtf(&mut out).unwrap();
        assert_eq!(out, br"{\rtf1 Hi}");
    }

    #[derive(Debug, Clone)]
    enum Piece {
        Keyword(String),
        Text(String),
        Symbol(String),
        Group(Vec<Piece>),
    }

    fn render(pieces: &[Piece], out: &mut String) {
        let mut after_keyword = false;
        for piece in pieces {
            match piece {
                Piece::Keyword(word) => out.push_str(word),
                Piece::Text(text) => {
                    if after_keyword {
                        out.push(' ');
                    }
                    out.push_str(text);
                },
                Piece::Symbol(symbol) => out.push_str(symbol),
                Piece::Group(children) => {
                    out.push('{');
                    render(children, out);
                    out.push('}');
                },
            }
            after_keyword = matches!(piece, Piece::Keyword(_));
        }
    }

    fn document() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            "\\\\[a-z]{1,8}(-?[1-9][0-9]{0,3}|0)?".prop_map(Piece::Keyword),
            "[a-zA-Z0-9 ,.;:]{1,12}".prop_map(Piece::Text),
            "\\\\'[0-9a-f]{2}".prop_map(Piece::Symbol),
            prop_oneof![
                Just(r"\~"),
                Just(r"\*"),
                Just(r"\-"),
                Just(r"\_"),
                Just(r"\{"),
                Just(r"\}"),
                Just(r"\\"),
            ]
            .prop_map(|s| {
                // Escaped metacharacters are text and take a delimiter space
                if matches!(s, r"\{" | r"\}" | r"\\") {
                    Piece::Text(s.to_string())
                } else {
                    Piece::Symbol(s.to_string())
                }
            }),
        ];
        let piece = leaf.prop_recursive(4, 48, 6, |inner| {
            prop::collection::vec(inner, 0..6).prop_map(Piece::Group)
        });
        prop::collection::vec(piece, 0..8).prop_map(|pieces| {
            let mut out = String::new();
            render(&[Piece::Group(pieces)], &mut out);
            out
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip(source in document()) {
            let tree = RtfTree::parse(&source).unwrap();
            prop_assert_eq!(tree.rtf(), source);
        }

        #[test]
        fn prop_reparse_is_idempotent(source in document()) {
            let options = ParseOptions {
                merge_special_characters: true,
                ..ParseOptions::default()
            };
            let tree = RtfTree::parse_with_options(&source, options.clone()).unwrap();
            let again = RtfTree::parse_with_options(&tree.rtf(), options).unwrap();
            prop_assert_eq!(again.text(), tree.text());
            prop_assert_eq!(again.raw_text(), tree.raw_text());
            prop_assert_eq!(again.font_table(), tree.font_table());
            prop_assert_eq!(again.color_table(), tree.color_table());
        }
    }
}

//! RTF (Rich Text Format) document trees.
//!
//! A document is parsed into an arena-backed tree that keeps every group,
//! control word, control symbol and text run of the source. The tree can be
//! navigated, searched, edited and written back out; a tree built without
//! special-character merging serializes to the exact source it came from.
//!
//! # Architecture
//!
//! - **Lexer**: Tokenizes RTF input into groups, control words, symbols and text
//! - **Parser**: Builds a tree from the token stream
//! - **Tree**: Owns the nodes and provides editing, loading and saving
//! - **Select**: Borrowed node handles for navigation and search
//! - **Writer**: Serializes a tree or subtree back to RTF
//! - **Merger**: Replaces placeholders in a template with other documents
//!
//! # Example
//!
//! ```rust
//! use rtftree::rtf::RtfTree;
//!
//! let tree = RtfTree::parse(r"{\rtf1\ansi{\fonttbl{\f0 Arial;}}\f0\pard Hello World!\par}")?;
//! assert_eq!(tree.text(), "Hello World!\n");
//! assert_eq!(tree.font_table().get(0).map(|f| f.name.as_str()), Some("Arial"));
//! # Ok::<(), rtftree::rtf::RtfError>(())
//! ```

mod error;
mod keywords;
mod lexer;
mod merger;
mod node;
mod parser;
mod select;
mod text;
mod tree;
mod types;
mod writer;

// Re-exports
pub use error::{RtfError, RtfResult};
pub use keywords::{IndexRole, index_role};
pub use lexer::{Lexer, Token, TokenKind};
pub use merger::{DEFAULT_MAX_NESTING, MergeOptions, RtfMerger};
pub use node::{NodeId, NodeKind, RtfNode};
pub use select::{Children, Descendants, NodeRef};
pub use tree::{ParseOptions, RtfTree};
pub use types::{Color, ColorTable, Font, FontFamily, FontTable};
pub use writer::RtfWriter;

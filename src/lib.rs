//! rtftree - Lossless RTF document trees
//!
//! This library parses RTF documents into a tree that mirrors the source
//! structure, writes trees back to RTF byte for byte, and merges documents
//! into placeholder positions of a template.
//!
//! # Features
//!
//! - **Tree Parser**: Every group, control word, symbol and text run becomes a node
//! - **Serializer**: Regenerates the source exactly for unmerged trees
//! - **Navigation**: Parent, sibling and document-order traversal plus keyword search
//! - **Code Pages**: `\'hh` escapes decoded and encoded through `\ansicpg`
//! - **Merging**: Placeholder substitution with font and color table reconciliation
//!
//! # Example - Reading a document
//!
//! ```
//! use rtftree::rtf::RtfTree;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = RtfTree::parse(r"{\rtf1\ansi\deff0{\fonttbl{\f0 Arial;}}\pard\b Bold\b0 text\par}")?;
//!
//! // Walk the main group
//! let main = tree.main_group().ok_or("no main group")?;
//! for child in main.children() {
//!     println!("{}: {}", child.kind(), child.key());
//! }
//!
//! // Find nodes by keyword
//! assert_eq!(tree.root().select_nodes("b").len(), 2);
//! assert_eq!(tree.text(), "Boldtext\n");
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Merging documents
//!
//! ```no_run
//! use rtftree::rtf::RtfMerger;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut merger = RtfMerger::from_file("template.rtf")?;
//! merger.add_placeholder_file("[SIGNATURE]", "signature.rtf")?;
//! merger.merge()?.save_rtf("merged.rtf")?;
//! # Ok(())
//! # }
//! ```

/// Shared code page handling
pub mod common;

/// RTF tree model, parser, serializer and merger
pub mod rtf;

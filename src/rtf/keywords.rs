//! Static keyword tables.
//!
//! Keyword families the engine dispatches on are kept here as compile-time
//! perfect-hash tables, so each family is a single data structure.

use phf::{phf_map, phf_set};

/// Table a keyword's parameter indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexRole {
    /// Parameter is a font table index
    Font,
    /// Parameter is a color table index
    Color,
}

/// Keywords whose parameter references a font or color table entry.
pub static INDEX_KEYWORDS: phf::Map<&'static str, IndexRole> = phf_map! {
    // Fonts
    "f" => IndexRole::Font,
    "af" => IndexRole::Font,
    "deff" => IndexRole::Font,
    "stshfdbch" => IndexRole::Font,
    "stshfloch" => IndexRole::Font,
    "stshfhich" => IndexRole::Font,
    "stshfbi" => IndexRole::Font,
    // Character colors
    "cf" => IndexRole::Color,
    "cb" => IndexRole::Color,
    "highlight" => IndexRole::Color,
    "ulc" => IndexRole::Color,
    "chcfpat" => IndexRole::Color,
    "chcbpat" => IndexRole::Color,
    // Paragraph, border and numbering colors
    "pncf" => IndexRole::Color,
    "brdrcf" => IndexRole::Color,
    "cfpat" => IndexRole::Color,
    "cbpat" => IndexRole::Color,
    // Table cell colors
    "clcfpat" => IndexRole::Color,
    "clcbpat" => IndexRole::Color,
    "clcfpatraw" => IndexRole::Color,
    "clcbpatraw" => IndexRole::Color,
};

/// Role of a keyword parameter, if it indexes a document table.
#[inline]
pub fn index_role(keyword: &str) -> Option<IndexRole> {
    INDEX_KEYWORDS.get(keyword).copied()
}

/// Destination keywords whose groups hold no visible text.
pub static HIDDEN_DESTINATIONS: phf::Set<&'static str> = phf_set! {
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "generator",
    "pict",
    "object",
    "fldinst",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "themedata",
    "latentstyles",
    "datastore",
    "xmlnstbl",
    "colorschememapping",
};

/// Destinations that belong to a document header rather than its body.
pub static HEADER_DESTINATIONS: phf::Set<&'static str> = phf_set! {
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "generator",
    "filetbl",
    "revtbl",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "themedata",
    "latentstyles",
    "datastore",
    "xmlnstbl",
    "colorschememapping",
};

/// Keywords that stand for a single character.
pub static CHARACTER_KEYWORDS: phf::Map<&'static str, char> = phf_map! {
    "par" => '\n',
    "line" => '\n',
    "tab" => '\t',
    "emdash" => '\u{2014}',
    "endash" => '\u{2013}',
    "bullet" => '\u{2022}',
    "lquote" => '\u{2018}',
    "rquote" => '\u{2019}',
    "ldblquote" => '\u{201c}',
    "rdblquote" => '\u{201d}',
    "emspace" => '\u{2003}',
    "enspace" => '\u{2002}',
    "qmspace" => '\u{2005}',
};

/// Control symbols that stand for a single character.
pub static CHARACTER_SYMBOLS: phf::Map<&'static str, char> = phf_map! {
    "~" => '\u{a0}',
    "_" => '\u{2011}',
};

/// Document-level keywords that open a main group before its content.
pub static HEADER_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "rtf",
    "ansi",
    "mac",
    "pc",
    "pca",
    "ansicpg",
    "deflang",
    "deflangfe",
    "deff",
    "uc",
};

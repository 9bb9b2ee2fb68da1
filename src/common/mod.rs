//! Utilities shared by the RTF modules.

pub mod encoding;

pub use encoding::{DEFAULT_CODE_PAGE, codepage_to_encoding};

//! Code page handling for RTF documents.
//!
//! RTF declares its byte encoding with `\ansicpgN`, where `N` is a Windows code
//! page identifier. Characters outside 7-bit ASCII travel through the document
//! as `\'hh` escapes whose bytes are interpreted in that code page. This module
//! maps code page numbers onto `encoding_rs` encodings and converts between
//! escape bytes and Unicode text.

use encoding_rs::Encoding;
use smallvec::SmallVec;
use std::borrow::Cow;

/// Code page assumed when a document carries no `\ansicpg` keyword.
pub const DEFAULT_CODE_PAGE: u32 = 1252;

/// Byte written for characters the active code page cannot represent.
const UNMAPPABLE_BYTE: u8 = b'?';

/// Windows code pages with an `encoding_rs` equivalent, sorted by number.
///
/// ISO-8859-1 is read as its Windows-1252 superset. DOS pages 437 and 850
/// have no counterpart and are left out, so the default code page applies.
static CODE_PAGES: &[(u32, &Encoding)] = &[
    (866, encoding_rs::IBM866),
    (874, encoding_rs::WINDOWS_874),
    (932, encoding_rs::SHIFT_JIS),
    (936, encoding_rs::GBK),
    (949, encoding_rs::EUC_KR),
    (950, encoding_rs::BIG5),
    (1250, encoding_rs::WINDOWS_1250),
    (1251, encoding_rs::WINDOWS_1251),
    (1252, encoding_rs::WINDOWS_1252),
    (1253, encoding_rs::WINDOWS_1253),
    (1254, encoding_rs::WINDOWS_1254),
    (1255, encoding_rs::WINDOWS_1255),
    (1256, encoding_rs::WINDOWS_1256),
    (1257, encoding_rs::WINDOWS_1257),
    (1258, encoding_rs::WINDOWS_1258),
    (10000, encoding_rs::MACINTOSH),
    (10001, encoding_rs::SHIFT_JIS),
    (10007, encoding_rs::X_MAC_CYRILLIC),
    (20866, encoding_rs::KOI8_R),
    (20932, encoding_rs::EUC_JP),
    (20936, encoding_rs::GBK),
    (21866, encoding_rs::KOI8_U),
    (28591, encoding_rs::WINDOWS_1252),
    (28592, encoding_rs::ISO_8859_2),
    (28593, encoding_rs::ISO_8859_3),
    (28594, encoding_rs::ISO_8859_4),
    (28595, encoding_rs::ISO_8859_5),
    (28596, encoding_rs::ISO_8859_6),
    (28597, encoding_rs::ISO_8859_7),
    (28598, encoding_rs::ISO_8859_8),
    (28603, encoding_rs::ISO_8859_13),
    (28605, encoding_rs::ISO_8859_15),
    (54936, encoding_rs::GB18030),
    (65001, encoding_rs::UTF_8),
];

/// Look up the encoding for a Windows code page number.
///
/// Returns `None` for code pages without a supported equivalent.
///
/// # Examples
/// ```
/// use rtftree::common::encoding::codepage_to_encoding;
///
/// assert_eq!(codepage_to_encoding(936).map(|e| e.name()), Some("GBK"));
/// assert!(codepage_to_encoding(42).is_none());
/// ```
pub fn codepage_to_encoding(codepage: u32) -> Option<&'static Encoding> {
    CODE_PAGES
        .binary_search_by_key(&codepage, |&(number, _)| number)
        .ok()
        .map(|i| CODE_PAGES[i].1)
}

/// Resolve `codepage`, falling back to `default_codepage` and finally to
/// Windows-1252 when neither is known.
#[inline]
pub fn resolve_encoding(codepage: Option<u32>, default_codepage: u32) -> &'static Encoding {
    codepage
        .and_then(codepage_to_encoding)
        .or_else(|| codepage_to_encoding(default_codepage))
        .unwrap_or(encoding_rs::WINDOWS_1252)
}

/// Decode escape bytes (the payload of consecutive `\'hh` sequences).
#[inline]
pub fn decode_bytes<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    encoding.decode_without_bom_handling(bytes).0
}

/// Encode a single character into the bytes that represent it in `encoding`.
///
/// Characters the encoding cannot represent come back as a single `?`.
/// Multi-byte code pages yield every byte of the sequence.
pub fn encode_char(ch: char, encoding: &'static Encoding) -> SmallVec<[u8; 4]> {
    let mut utf8 = [0u8; 4];
    let (bytes, _, had_errors) = encoding.encode(ch.encode_utf8(&mut utf8));
    if had_errors || bytes.is_empty() {
        let mut fallback = SmallVec::new();
        fallback.push(UNMAPPABLE_BYTE);
        return fallback;
    }
    SmallVec::from_slice(&bytes)
}

/// Decode the raw bytes of an RTF source file.
///
/// RTF is 7-bit clean at the syntax level, so valid UTF-8 is taken as-is and
/// anything else is read through the fallback code page.
pub fn decode_source(bytes: &[u8], default_codepage: u32) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => resolve_encoding(None, default_codepage)
            .decode_without_bom_handling(bytes)
            .0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_page_table_sorted() {
        assert!(CODE_PAGES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_known_codepages() {
        assert_eq!(codepage_to_encoding(1252).unwrap().name(), "windows-1252");
        assert_eq!(codepage_to_encoding(1251).unwrap().name(), "windows-1251");
        assert!(codepage_to_encoding(99999).is_none());
    }

    #[test]
    fn test_dos_latin_pages_use_default() {
        assert!(codepage_to_encoding(437).is_none());
        assert!(codepage_to_encoding(850).is_none());
        assert_eq!(codepage_to_encoding(866).unwrap().name(), "IBM866");
        assert_eq!(resolve_encoding(Some(437), 1252).name(), "windows-1252");
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        assert_eq!(resolve_encoding(Some(99999), 1251).name(), "windows-1251");
        assert_eq!(resolve_encoding(None, 99999).name(), "windows-1252");
    }

    #[test]
    fn test_decode_single_byte() {
        assert_eq!(decode_bytes(&[0xe9], encoding_rs::WINDOWS_1252), "é");
        assert_eq!(decode_bytes(&[0x80], encoding_rs::WINDOWS_1252), "€");
        assert_eq!(decode_bytes(&[0xc4, 0xe3], encoding_rs::GBK), "你");
    }

    #[test]
    fn test_encode_char() {
        assert_eq!(encode_char('é', encoding_rs::WINDOWS_1252).as_slice(), &[0xe9]);
        assert_eq!(encode_char('你', encoding_rs::GBK).as_slice(), &[0xc4, 0xe3]);
        assert_eq!(encode_char('你', encoding_rs::WINDOWS_1252).as_slice(), b"?");
    }

    #[test]
    fn test_decode_source_fallback() {
        assert_eq!(decode_source(b"plain", 1252), "plain");
        assert_eq!(decode_source(&[b'a', 0xe9], 1252), "aé");
    }
}

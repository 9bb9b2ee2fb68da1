//! RTF lexer/tokenizer.
//!
//! The lexer turns RTF source into a flat stream of [`Token`]s: group
//! delimiters, control words (keywords), control symbols and literal text.
//! It keeps no document state; interpretation of tokens is left to the tree
//! builder. Text runs are borrowed from the input whenever they contain no
//! skipped characters.

use memchr::memchr3;
use std::borrow::Cow;

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Opening brace
    GroupStart,
    /// Closing brace
    GroupEnd,
    /// Control word such as `\par` or `\fs24`
    Keyword,
    /// Control symbol such as `\'e9` or `\~`
    Control,
    /// Literal text
    Text,
    /// End of the input; produced exactly once
    EndOfInput,
}

/// A lexical unit of RTF source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token kind
    pub kind: TokenKind,
    /// Keyword name, control symbol or literal text
    pub key: Cow<'a, str>,
    /// Numeric parameter, if any
    pub parameter: Option<i32>,
    /// Byte offset of the token in the source
    pub offset: usize,
}

impl<'a> Token<'a> {
    #[inline]
    fn new(kind: TokenKind, key: Cow<'a, str>, parameter: Option<i32>, offset: usize) -> Self {
        Self {
            kind,
            key,
            parameter,
            offset,
        }
    }

    /// Whether the token carries a parameter.
    #[inline]
    pub fn has_parameter(&self) -> bool {
        self.parameter.is_some()
    }

    /// Whether this is a `\'hh` escape.
    #[inline]
    pub fn is_hex_escape(&self) -> bool {
        self.kind == TokenKind::Control && self.key == "'"
    }
}

/// Characters dropped from the input wherever they appear outside control words.
#[inline]
fn is_skipped(ch: u8) -> bool {
    matches!(ch, b'\r' | b'\n' | b'\t' | b'\0')
}

/// RTF Lexer.
pub struct Lexer<'a> {
    /// Source input
    input: &'a str,
    /// Current position in bytes
    pos: usize,
    /// Whether `EndOfInput` has been produced
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer.
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            finished: false,
        }
    }

    /// Tokenize the entire input, including the final `EndOfInput` token.
    pub fn tokenize(&mut self) -> Vec<Token<'a>> {
        self.by_ref().collect()
    }

    /// Get the next token.
    ///
    /// Once the input is exhausted every call returns `EndOfInput`.
    pub fn next_token(&mut self) -> Token<'a> {
        self.skip_ignorable();

        let start = self.pos;
        let Some(ch) = self.current_byte() else {
            self.finished = true;
            return Token::new(TokenKind::EndOfInput, Cow::Borrowed(""), None, start);
        };

        match ch {
            b'{' => {
                self.pos += 1;
                Token::new(TokenKind::GroupStart, Cow::Borrowed(""), None, start)
            },
            b'}' => {
                self.pos += 1;
                Token::new(TokenKind::GroupEnd, Cow::Borrowed(""), None, start)
            },
            b'\\' => self.parse_control(),
            _ => self.parse_text(),
        }
    }

    /// Parse a control word or control symbol.
    fn parse_control(&mut self) -> Token<'a> {
        let start = self.pos;
        self.pos += 1; // Skip '\'

        let Some(ch) = self.current_char() else {
            // A lone trailing backslash carries no information
            self.finished = true;
            return Token::new(TokenKind::EndOfInput, Cow::Borrowed(""), None, start);
        };

        if ch.is_ascii_alphabetic() {
            return self.parse_keyword(start);
        }

        let symbol_start = self.pos;
        self.pos += ch.len_utf8();
        let symbol = &self.input[symbol_start..self.pos];

        match ch {
            // Escaped metacharacters are literal text
            '\\' | '{' | '}' => Token::new(TokenKind::Text, Cow::Borrowed(symbol), None, start),
            '\'' => {
                let parameter = self.parse_hex_byte();
                Token::new(TokenKind::Control, Cow::Borrowed(symbol), parameter, start)
            },
            _ => Token::new(TokenKind::Control, Cow::Borrowed(symbol), None, start),
        }
    }

    /// Parse a control word starting after its backslash.
    fn parse_keyword(&mut self, start: usize) -> Token<'a> {
        let word_start = self.pos;
        while self
            .current_byte()
            .is_some_and(|b| b.is_ascii_alphabetic())
        {
            self.pos += 1;
        }
        let word = &self.input[word_start..self.pos];

        let parameter = self.parse_numeric_parameter();

        // A single space delimits the control word and is not part of the text
        if self.current_byte() == Some(b' ') {
            self.pos += 1;
        }

        Token::new(TokenKind::Keyword, Cow::Borrowed(word), parameter, start)
    }

    /// Parse an optional signed decimal parameter after a control word.
    fn parse_numeric_parameter(&mut self) -> Option<i32> {
        let bytes = self.input.as_bytes();
        let negative = self.current_byte() == Some(b'-');
        let digits_start = if negative { self.pos + 1 } else { self.pos };

        if !bytes.get(digits_start).is_some_and(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut value: i32 = 0;
        let mut end = digits_start;
        while let Some(&b) = bytes.get(end) {
            if !b.is_ascii_digit() {
                break;
            }
            let digit = i32::from(b - b'0');
            value = if negative {
                value.saturating_mul(10).saturating_sub(digit)
            } else {
                value.saturating_mul(10).saturating_add(digit)
            };
            end += 1;
        }

        self.pos = end;
        Some(value)
    }

    /// Parse the two hex digits of a `\'hh` escape.
    ///
    /// Leaves the input untouched when the digits are missing or invalid.
    fn parse_hex_byte(&mut self) -> Option<i32> {
        let hex = self.input.get(self.pos..self.pos + 2)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let byte = u8::from_str_radix(hex, 16).ok()?;
        self.pos += 2;
        Some(i32::from(byte))
    }

    /// Parse plain text until the next metacharacter.
    fn parse_text(&mut self) -> Token<'a> {
        let start = self.pos;
        let rest = &self.input.as_bytes()[start..];
        let len = memchr3(b'\\', b'{', b'}', rest).unwrap_or(rest.len());
        self.pos = start + len;

        let raw = &self.input[start..self.pos];
        let text = if raw.bytes().any(is_skipped) {
            Cow::Owned(
                raw.chars()
                    .filter(|&c| !(c.is_ascii() && is_skipped(c as u8)))
                    .collect(),
            )
        } else {
            Cow::Borrowed(raw)
        };

        Token::new(TokenKind::Text, text, None, start)
    }

    /// Current byte position in the source.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    fn current_byte(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    #[inline]
    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Skip line breaks, tabs and NULs between tokens.
    #[inline]
    fn skip_ignorable(&mut self) {
        while self.current_byte().is_some_and(is_skipped) {
            self.pos += 1;
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_tokenization() {
        let tokens = Lexer::new(r"{\rtf1\ansi Hello}").tokenize();

        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0].kind, TokenKind::GroupStart);
        assert_eq!(tokens[1].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].key, "rtf");
        assert_eq!(tokens[1].parameter, Some(1));
        assert_eq!(tokens[2].key, "ansi");
        assert_eq!(tokens[2].parameter, None);
        assert_eq!(tokens[3].kind, TokenKind::Text);
        assert_eq!(tokens[3].key, "Hello");
        assert_eq!(tokens[4].kind, TokenKind::GroupEnd);
        assert_eq!(tokens[5].kind, TokenKind::EndOfInput);
    }

    #[test]
    fn test_end_of_input_once() {
        let mut lexer = Lexer::new("{}");
        assert_eq!(lexer.by_ref().count(), 3);
        assert!(lexer.next().is_none());
        assert_eq!(kinds(""), vec![TokenKind::EndOfInput]);
    }

    #[test]
    fn test_negative_parameter() {
        let tokens = Lexer::new(r"\li-720\fi-").tokenize();
        assert_eq!(tokens[0].parameter, Some(-720));
        assert_eq!(tokens[1].key, "fi");
        assert_eq!(tokens[1].parameter, None);
        assert_eq!(tokens[2].key, "-");
    }

    #[test]
    fn test_parameter_saturates() {
        let tokens = Lexer::new(r"\bin99999999999").tokenize();
        assert_eq!(tokens[0].parameter, Some(i32::MAX));
    }

    #[test]
    fn test_hex_escape() {
        let tokens = Lexer::new(r"caf\'e9\'zz").tokenize();
        assert_eq!(tokens[0].key, "caf");
        assert!(tokens[1].is_hex_escape());
        assert_eq!(tokens[1].parameter, Some(0xe9));
        assert!(tokens[2].is_hex_escape());
        assert_eq!(tokens[2].parameter, None);
        assert_eq!(tokens[3].key, "zz");
    }

    #[test]
    fn test_escaped_metacharacters_are_text() {
        let tokens = Lexer::new(r"\{\}\\").tokenize();
        let texts: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Text)
            .map(|t| t.key.as_ref())
            .collect();
        assert_eq!(texts, vec!["{", "}", "\\"]);
    }

    #[test]
    fn test_control_symbols() {
        let tokens = Lexer::new(r"{\*\generator x}\~").tokenize();
        assert_eq!(tokens[1].kind, TokenKind::Control);
        assert_eq!(tokens[1].key, "*");
        assert_eq!(tokens[2].key, "generator");
        assert_eq!(tokens[5].kind, TokenKind::Control);
        assert_eq!(tokens[5].key, "~");
    }

    #[test]
    fn test_line_breaks_are_skipped() {
        let tokens = Lexer::new("{\\b\r\nbold\ttext\r\n}").tokenize();
        assert_eq!(tokens[1].key, "b");
        assert_eq!(tokens[2].key, "boldtext");
        assert_eq!(tokens[3].kind, TokenKind::GroupEnd);
    }

    #[test]
    fn test_only_one_delimiter_space_consumed() {
        let tokens = Lexer::new(r"\b  two").tokenize();
        assert_eq!(tokens[1].key, " two");
    }

    #[test]
    fn test_offsets() {
        let tokens = Lexer::new(r"{\b x}").tokenize();
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 1, 4, 5, 6]);
    }
}

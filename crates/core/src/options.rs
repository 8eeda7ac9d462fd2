//! # Overview
//!
//! Parser for option-string descriptors, the `name;key=value;key=value`
//! grammar used to name encodings and server sources together with their
//! parameters.
//!
//! # Design
//!
//! [`parse_option_string`] returns an [`OptionString`] splitting the leading
//! identifier from the key/value mapping. Failures return a structured
//! [`OptionStringError`] carrying the byte offset of the first offending
//! character; there is no process-global error state, so concurrent parsers
//! never observe each other.
//!
//! Whitespace around tokens is insignificant. Unquoted values terminate at
//! the next `;`; double-quoted values may contain `;` and use `\"` / `\\`
//! escapes. A key without `=` maps to an empty value.
//!
//! # Examples
//!
//! ```
//! use svr_core::options::parse_option_string;
//!
//! let parsed = parse_option_string("test;width=640;height=480").unwrap();
//! assert_eq!(parsed.name(), "test");
//! assert_eq!(parsed.get("width"), Some("640"));
//!
//! let err = parse_option_string(";;;").unwrap_err();
//! assert_eq!(err.position(), 0);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A parsed option-string descriptor: the leading identifier plus its
/// key/value options.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OptionString {
    name: String,
    options: BTreeMap<String, String>,
}

impl OptionString {
    /// Builds a descriptor from parts, normally only useful in tests and
    /// server-side defaults.
    #[must_use]
    pub fn from_parts(name: impl Into<String>, options: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    /// Returns the leading identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an option value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Returns the full option mapping.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Re-renders the canonical descriptor form.
    ///
    /// Options appear in key order; values needing protection are quoted.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let mut out = self.name.clone();
        for (key, value) in &self.options {
            out.push(';');
            out.push_str(key);
            if !value.is_empty() {
                out.push('=');
                if needs_quoting(value) {
                    out.push('"');
                    for ch in value.chars() {
                        if ch == '"' || ch == '\\' {
                            out.push('\\');
                        }
                        out.push(ch);
                    }
                    out.push('"');
                } else {
                    out.push_str(value);
                }
            }
        }
        out
    }
}

impl fmt::Display for OptionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl FromStr for OptionString {
    type Err = OptionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_option_string(s)
    }
}

fn needs_quoting(value: &str) -> bool {
    value.contains([';', '"', '\\'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
}

/// The ways an option string can be malformed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OptionStringErrorKind {
    /// The leading identifier is missing.
    EmptyName,
    /// A `;` introduced a pair whose key is missing.
    EmptyKey,
    /// A character appeared where the grammar does not allow one, e.g. `=`
    /// inside the leading identifier or trailing text after a quoted value.
    UnexpectedCharacter,
    /// A quoted value was never closed.
    UnterminatedQuote,
}

impl OptionStringErrorKind {
    fn message(self) -> &'static str {
        match self {
            Self::EmptyName => "empty name",
            Self::EmptyKey => "empty option key",
            Self::UnexpectedCharacter => "unexpected character",
            Self::UnterminatedQuote => "unterminated quoted value",
        }
    }
}

/// Parse failure with the byte offset of the first offending character.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("{} at byte {position}", .kind.message())]
pub struct OptionStringError {
    kind: OptionStringErrorKind,
    position: usize,
}

impl OptionStringError {
    const fn new(kind: OptionStringErrorKind, position: usize) -> Self {
        Self { kind, position }
    }

    /// Returns what went wrong.
    #[must_use]
    pub const fn kind(&self) -> OptionStringErrorKind {
        self.kind
    }

    /// Returns the byte offset of the first offending character. For errors
    /// detected at end of input this is the input length.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }
}

/// Parses a `name;key=value` descriptor into an [`OptionString`].
pub fn parse_option_string(text: &str) -> Result<OptionString, OptionStringError> {
    let mut cursor = Cursor { text, pos: 0 };

    cursor.skip_whitespace();
    let name = cursor.take_until(&[';', '=']);
    if name.is_empty() {
        return Err(OptionStringError::new(
            OptionStringErrorKind::EmptyName,
            cursor.pos,
        ));
    }
    if cursor.peek() == Some('=') {
        return Err(OptionStringError::new(
            OptionStringErrorKind::UnexpectedCharacter,
            cursor.pos,
        ));
    }

    let mut options = BTreeMap::new();
    while cursor.peek() == Some(';') {
        cursor.bump();
        cursor.skip_whitespace();
        let key = cursor.take_until(&[';', '=']);
        if key.is_empty() {
            return Err(OptionStringError::new(
                OptionStringErrorKind::EmptyKey,
                cursor.pos,
            ));
        }

        let value = if cursor.peek() == Some('=') {
            cursor.bump();
            cursor.skip_whitespace();
            if cursor.peek() == Some('"') {
                cursor.parse_quoted()?
            } else {
                cursor.take_until(&[';']).to_string()
            }
        } else {
            String::new()
        };

        // Duplicate keys keep the last occurrence.
        options.insert(key.to_string(), value);
    }

    Ok(OptionString {
        name: name.to_string(),
        options,
    })
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Consumes characters up to (excluding) any of `stops` or end of input,
    /// returning the slice with trailing whitespace removed.
    fn take_until(&mut self, stops: &[char]) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if stops.contains(&ch) {
                break;
            }
            self.bump();
        }
        self.text[start..self.pos].trim_end()
    }

    /// Parses a double-quoted value; the cursor sits on the opening quote.
    fn parse_quoted(&mut self) -> Result<String, OptionStringError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(OptionStringError::new(
                        OptionStringErrorKind::UnterminatedQuote,
                        self.pos,
                    ));
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some(escaped @ ('"' | '\\')) => {
                            value.push(escaped);
                            self.bump();
                        }
                        _ => {
                            return Err(OptionStringError::new(
                                OptionStringErrorKind::UnexpectedCharacter,
                                self.pos,
                            ));
                        }
                    }
                }
                Some(ch) => {
                    value.push(ch);
                    self.bump();
                }
            }
        }

        // Only whitespace may follow a closing quote before `;` or the end.
        self.skip_whitespace();
        match self.peek() {
            None | Some(';') => Ok(value),
            Some(_) => Err(OptionStringError::new(
                OptionStringErrorKind::UnexpectedCharacter,
                self.pos,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_bare_name() {
        let parsed = parse_option_string("raw").unwrap();
        assert_eq!(parsed.name(), "raw");
        assert!(parsed.options().is_empty());
    }

    #[test]
    fn parses_key_value_pairs() {
        let parsed = parse_option_string("jpeg;quality=90;progressive").unwrap();
        assert_eq!(parsed.name(), "jpeg");
        assert_eq!(parsed.get("quality"), Some("90"));
        assert_eq!(parsed.get("progressive"), Some(""));
        assert_eq!(parsed.get("missing"), None);
    }

    #[test]
    fn whitespace_outside_values_is_insignificant() {
        let parsed = parse_option_string("  jpeg ; quality = 90 ; gop = 12 ").unwrap();
        assert_eq!(parsed.name(), "jpeg");
        assert_eq!(parsed.get("quality"), Some("90"));
        assert_eq!(parsed.get("gop"), Some("12"));
    }

    #[test]
    fn quoted_values_may_contain_semicolons() {
        let parsed = parse_option_string(r#"test;label="a;b";x=1"#).unwrap();
        assert_eq!(parsed.get("label"), Some("a;b"));
        assert_eq!(parsed.get("x"), Some("1"));
    }

    #[test]
    fn quoted_values_support_escapes() {
        let parsed = parse_option_string(r#"test;label="say \"hi\" \\ bye""#).unwrap();
        assert_eq!(parsed.get("label"), Some(r#"say "hi" \ bye"#));
    }

    #[test]
    fn empty_name_reports_position_of_first_semicolon() {
        let err = parse_option_string(";;;").unwrap_err();
        assert_eq!(err.kind(), OptionStringErrorKind::EmptyName);
        assert_eq!(err.position(), 0);
    }

    #[test]
    fn empty_input_reports_position_zero() {
        let err = parse_option_string("").unwrap_err();
        assert_eq!(err.kind(), OptionStringErrorKind::EmptyName);
        assert_eq!(err.position(), 0);
    }

    #[test]
    fn equals_in_name_is_rejected() {
        let err = parse_option_string("na=me;k=v").unwrap_err();
        assert_eq!(err.kind(), OptionStringErrorKind::UnexpectedCharacter);
        assert_eq!(err.position(), 2);
    }

    #[test]
    fn trailing_semicolon_is_rejected() {
        let err = parse_option_string("jpeg;").unwrap_err();
        assert_eq!(err.kind(), OptionStringErrorKind::EmptyKey);
        assert_eq!(err.position(), 5);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let err = parse_option_string(r#"test;label="oops"#).unwrap_err();
        assert_eq!(err.kind(), OptionStringErrorKind::UnterminatedQuote);
        assert_eq!(err.position(), 16);
    }

    #[test]
    fn text_after_closing_quote_is_rejected() {
        let err = parse_option_string(r#"test;label="ok"junk"#).unwrap_err();
        assert_eq!(err.kind(), OptionStringErrorKind::UnexpectedCharacter);
        assert_eq!(err.position(), 15);
    }

    #[test]
    fn duplicate_keys_keep_last_value() {
        let parsed = parse_option_string("e;k=1;k=2").unwrap();
        assert_eq!(parsed.get("k"), Some("2"));
    }

    #[test]
    fn descriptor_round_trips_simple_forms() {
        let parsed = parse_option_string("jpeg;quality=90").unwrap();
        assert_eq!(parsed.descriptor(), "jpeg;quality=90");
        let reparsed = parse_option_string(&parsed.descriptor()).unwrap();
        assert_eq!(reparsed, parsed);
    }

    #[test]
    fn descriptor_quotes_values_that_need_it() {
        let parsed = parse_option_string(r#"test;label="a;b""#).unwrap();
        assert_eq!(parsed.descriptor(), r#"test;label="a;b""#);
    }

    proptest! {
        #[test]
        fn descriptor_round_trips(
            name in "[a-z][a-z0-9_]{0,11}",
            keys in proptest::collection::btree_map(
                "[a-z][a-z0-9_]{0,7}",
                "[ -~&&[^;\"\\\\]]{0,12}",
                0..5,
            ),
        ) {
            let original = OptionString::from_parts(
                name,
                keys.into_iter()
                    .map(|(k, v)| (k, v.trim().to_string()))
                    .collect(),
            );
            let reparsed = parse_option_string(&original.descriptor()).unwrap();
            prop_assert_eq!(reparsed, original);
        }
    }
}

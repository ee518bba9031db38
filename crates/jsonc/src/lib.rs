//! # Strata JSONC
//!
//! The parser capability for configuration documents: JSON with `//`
//! and `/* */` comments and trailing commas. Parsing never panics and
//! never returns a partial value - a malformed document produces a list
//! of syntax errors so the caller can keep its previous good state.

use serde_json::Value;

/// One syntax error, positioned by byte offset into the original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

/// Result of a tolerant parse
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// The parsed document, absent when any syntax error was found
    pub value: Option<Value>,
    pub errors: Vec<SyntaxError>,
}

impl ParseOutcome {
    pub fn is_ok(&self) -> bool {
        self.value.is_some() && self.errors.is_empty()
    }
}

/// Replace comments with spaces
///
/// Comments become whitespace instead of being removed so that byte
/// offsets in later parse errors still point into the original text.
/// String contents and escapes are respected; newlines inside block
/// comments survive so line numbers stay stable too.
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let b = bytes[i];

        if in_string {
            out.push(b);
            if b == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' => {
                in_string = true;
                out.push(b);
                i += 1;
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                out.push(b' ');
                out.push(b' ');
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                        out.push(b' ');
                        out.push(b' ');
                        i += 2;
                        break;
                    }
                    out.push(if bytes[i] == b'\n' { b'\n' } else { b' ' });
                    i += 1;
                }
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Only ASCII bytes were ever replaced, so this is still valid UTF-8.
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Blank out trailing commas before `}` or `]`
fn blank_trailing_commas(bytes: &mut [u8]) {
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => in_string = true,
            b',' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && (bytes[j] == b'}' || bytes[j] == b']') {
                    bytes[i] = b' ';
                }
            }
            _ => {}
        }
        i += 1;
    }
}

/// Parse a JSONC document
///
/// Strips comments and trailing commas, then parses. On failure the
/// outcome carries no value and one [`SyntaxError`] whose offset is the
/// byte position of the failure in the original text.
pub fn parse(text: &str) -> ParseOutcome {
    let mut bytes = strip_comments(text).into_bytes();
    blank_trailing_commas(&mut bytes);
    // Comma blanking only touches ASCII bytes.
    let cleaned = String::from_utf8(bytes).unwrap_or_else(|_| text.to_string());

    if cleaned.trim().is_empty() {
        return ParseOutcome {
            value: None,
            errors: vec![SyntaxError {
                message: "empty document".to_string(),
                offset: 0,
            }],
        };
    }

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => ParseOutcome {
            value: Some(value),
            errors: Vec::new(),
        },
        Err(err) => ParseOutcome {
            value: None,
            errors: vec![SyntaxError {
                message: err.to_string(),
                offset: byte_offset(&cleaned, err.line(), err.column()),
            }],
        },
    }
}

/// Translate serde_json's 1-based line/column into a byte offset
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut offset = 0;
    for (n, l) in text.split('\n').enumerate() {
        if n + 1 == line {
            return offset + column.saturating_sub(1).min(l.len());
        }
        offset += l.len() + 1;
    }
    text.len()
}

//! Quoting utilities for SQL identifiers and literals.
//!
//! SQLite delimits identifiers with double quotes and string literals with
//! single quotes; in both cases an embedded delimiter is escaped by doubling it.

/// Escape a string for use between the given quote characters.
///
/// # Arguments
/// * `s` - The string to escape
/// * `quote_char` - The delimiter to double ('"' for identifiers, '\'' for literals)
pub fn escape_string_for_quote(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if c == quote_char {
            result.push(c);
        }
        result.push(c);
    }
    result
}

/// Quote an identifier: `name` becomes `"name"`.
#[inline]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", escape_string_for_quote(name, '"'))
}

/// Quote a possibly schema-qualified identifier (`"main"."users"`).
pub fn quote_qualified(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(name)),
        None => quote_identifier(name),
    }
}

/// Quote a text literal: `it's` becomes `'it''s'`.
#[inline]
pub fn quote_string(s: &str) -> String {
    format!("'{}'", escape_string_for_quote(s, '\''))
}

/// Render a blob as an `x'..'` hex literal.
pub fn quote_blob(bytes: &[u8]) -> String {
    format!("x'{}'", hex::encode(bytes))
}

//! Quote-aware splitting of command lines.
//!
//! A token is either a single-quoted run (quotes kept, so the marshaling
//! layer can tell `'42'` from `42`) or a maximal run of non-whitespace.
//! Quotes are only special at the start of a token; an apostrophe inside a
//! word stays part of the word.

/// Splits `line` into tokens.
///
/// An unterminated quote swallows the rest of the line, opening quote
/// included.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = line.trim_start();
    while !rest.is_empty() {
        let token_len = if rest.starts_with('\'') {
            match rest[1..].find('\'') {
                Some(close) => close + 2,
                None => rest.len(),
            }
        } else {
            rest.find(char::is_whitespace).unwrap_or(rest.len())
        };
        tokens.push(rest[..token_len].to_owned());
        rest = rest[token_len..].trim_start();
    }
    tokens
}

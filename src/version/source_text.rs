//! Lexical helpers over raw Solidity source text.

use super::VersionConstraint;
use lazy_static::lazy_static;
use regex::Regex;
use std::str::FromStr;

lazy_static! {
    static ref PRAGMA_SOLIDITY: Regex =
        Regex::new(r"\bpragma\s+solidity\s+([^;]*);").expect("valid regex");
    static ref IMPORT: Regex =
        Regex::new(r#"\bimport\s+(?:[^;"']*?\bfrom\s+)?["']([^"']+)["']"#).expect("valid regex");
}

/// Replaces comments with whitespace, keeping line structure and string literals.
pub fn strip_comments(source: &str) -> String {
    enum State {
        Code,
        Line,
        Block,
        Str(char),
    }

    let mut result = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Code => match (c, chars.peek()) {
                ('/', Some('/')) => {
                    chars.next();
                    result.push_str("  ");
                    state = State::Line;
                }
                ('/', Some('*')) => {
                    chars.next();
                    result.push_str("  ");
                    state = State::Block;
                }
                ('"' | '\'', _) => {
                    result.push(c);
                    state = State::Str(c);
                }
                _ => result.push(c),
            },
            State::Line => {
                if c == '\n' {
                    result.push(c);
                    state = State::Code;
                } else {
                    result.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    result.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    result.push(c);
                } else {
                    result.push(' ');
                }
            }
            State::Str(quote) => {
                result.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        result.push(escaped);
                    }
                } else if c == quote || c == '\n' {
                    state = State::Code;
                }
            }
        }
    }
    result
}

/// Parses the constraint of the first `pragma solidity` directive.
///
/// A directive whose constraint cannot be parsed counts as no directive.
pub fn extract_constraint(source: &str) -> Option<VersionConstraint> {
    let source = strip_comments(source);
    let captures = PRAGMA_SOLIDITY.captures(&source)?;
    let raw = captures.get(1)?.as_str().trim();
    match VersionConstraint::from_str(raw) {
        Ok(constraint) => Some(constraint),
        Err(err) => {
            tracing::debug!("{err}");
            None
        }
    }
}

/// Returns import paths in source order, duplicates included.
pub fn extract_import_paths(source: &str) -> Vec<String> {
    let source = strip_comments(source);
    IMPORT
        .captures_iter(&source)
        .filter_map(|captures| captures.get(1))
        .map(|path| path.as_str().to_string())
        .collect()
}

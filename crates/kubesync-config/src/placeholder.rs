//! `${...}` placeholder parsing.
//!
//! - `${name}` is replaced by whatever the resolver callback returns
//! - `$${name}` is an escape and is emitted verbatim
//! - A string that is exactly one placeholder keeps the resolved value's type

use crate::{ConfigError, ConfigResult};
use kubesync_core::Document;
use regex::Regex;
use std::sync::LazyLock;

// Regex for matching ${...} placeholders, with an optional escaping `$`
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\$?)\$\{([^{}]*)\}").unwrap());

/// Replace every placeholder in `input` using `resolve`.
///
/// The accumulator is handed to each `resolve` call and returned alongside
/// the result. Names are passed untrimmed.
pub fn parse_string<A, F>(input: &str, init: A, mut resolve: F) -> ConfigResult<(A, Document)>
where
    F: FnMut(A, &str) -> ConfigResult<(A, Document)>,
{
    let mut acc = init;
    let mut output = String::with_capacity(input.len());
    let mut last = 0;

    for caps in PLACEHOLDER_REGEX.captures_iter(input) {
        let Some(token) = caps.get(0) else {
            continue;
        };

        let literal = &input[last..token.start()];
        check_literal(input, literal)?;
        output.push_str(literal);
        last = token.end();

        if !caps[1].is_empty() {
            output.push_str(token.as_str());
            continue;
        }

        let name = &caps[2];
        if name.trim().is_empty() {
            return Err(syntax_error(input, "empty placeholder"));
        }

        let (next, value) = resolve(acc, name)?;
        acc = next;

        if token.start() == 0 && token.end() == input.len() {
            return Ok((acc, value));
        }
        match value.as_str() {
            Some(s) => output.push_str(s),
            None => output.push_str(&value.to_string()),
        }
    }

    let rest = &input[last..];
    check_literal(input, rest)?;
    output.push_str(rest);

    Ok((acc, Document::string(output)))
}

fn check_literal(input: &str, literal: &str) -> ConfigResult<()> {
    if literal.contains("${") {
        return Err(syntax_error(input, "unterminated placeholder"));
    }
    Ok(())
}

fn syntax_error(input: &str, message: &str) -> ConfigError {
    ConfigError::PlaceholderSyntax {
        input: input.to_string(),
        message: message.to_string(),
    }
}

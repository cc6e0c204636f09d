//! # Type-Reference Parsing
//!
//! A raw config value may name its inherited asset with a compact string
//! grammar instead of a full mapping:
//!
//! ```text
//! crud
//! crud(size=5, paged)
//! crud + timestamped + ownable(field=owner)
//! ```
//!
//! This module parses that micro-DSL into a typed [`TypeReference`] record
//! (`head`, `mixins`, `vars`) so edge cases (nested parentheses inside
//! argument values, separators inside arguments) are handled in one place
//! and testable in isolation.
//!
//! Argument rules:
//! - `key=value` parses the value through a structured literal parser
//!   (booleans, integers, floats, `null`, quoted strings; anything else
//!   stays a string);
//! - a bare positional token sets the reserved var key `default`, kept as
//!   a string.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::value::Fragment;

/// A parsed type reference: bare asset name, appended mixin references and
/// variables seeded from parenthesized arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReference {
    /// Asset lookup key.
    pub head: String,
    /// Mixin references declared with the `+` separator, in declared order.
    /// Each may itself carry `(args)`.
    pub mixins: Vec<String>,
    /// Variables parsed from `head(...)` arguments.
    pub vars: Fragment,
}

fn head_args_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^(]+)\((.*)\)$").unwrap())
}

impl TypeReference {
    /// Parse a full reference string, including `+`-separated mixins.
    pub fn parse(raw: &str) -> Result<TypeReference> {
        let mut segments = split_top_level(raw, '+');
        if segments.is_empty() {
            segments.push(String::new());
        }
        let mixins = segments.split_off(1);
        let (head, vars) = parse_head(raw, segments[0].trim())?;
        Ok(TypeReference {
            head,
            mixins: mixins.iter().map(|m| m.trim().to_string()).collect(),
            vars,
        })
    }
}

/// Parse one `name` or `name(args)` segment into its bare name and vars.
fn parse_head(raw: &str, segment: &str) -> Result<(String, Fragment)> {
    if !segment.contains('(') {
        if segment.contains(')') {
            return Err(Error::TypeReference {
                reference: raw.to_string(),
                message: "unbalanced parentheses".to_string(),
            });
        }
        return Ok((segment.to_string(), Fragment::new()));
    }
    let captures = head_args_re()
        .captures(segment)
        .ok_or_else(|| Error::TypeReference {
            reference: raw.to_string(),
            message: "unbalanced parentheses".to_string(),
        })?;
    let head = captures[1].trim().to_string();
    let args = captures[2].to_string();
    let mut vars = Fragment::new();
    for token in split_top_level(&args, ',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.split_once('=') {
            // Bare positional token: reserved key, kept as a string.
            None => {
                vars.insert("default".to_string(), Value::String(token.to_string()));
            }
            Some((key, value)) => {
                vars.insert(key.trim().to_string(), parse_literal(value.trim()));
            }
        }
    }
    Ok((head, vars))
}

/// Split on `separator` occurrences outside any parentheses.
fn split_top_level(input: &str, separator: char) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;
    for ch in input.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth -= 1;
                current.push(ch);
            }
            c if c == separator && depth == 0 => {
                segments.push(current.trim().to_string());
                current = String::new();
            }
            c => current.push(c),
        }
    }
    segments.push(current.trim().to_string());
    segments
}

/// Parse a structured literal: booleans, `null`, integers, floats and
/// quoted strings are recognized; unrecognized tokens stay as strings.
pub fn parse_literal(token: &str) -> Value {
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" | "~" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = token.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = token.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    let quoted = (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
        || (token.starts_with('"') && token.ends_with('"') && token.len() >= 2);
    if quoted {
        return Value::String(token[1..token.len() - 1].to_string());
    }
    Value::String(token.to_string())
}

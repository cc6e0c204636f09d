//! # Locked-Path Table
//!
//! Generated files the user has taken ownership of are declared in the
//! project configuration and never overwritten. The table is built once
//! per run and read-only afterwards.
//!
//! An entry is either an exact relative path (`src/index.js`) or a
//! directory prefix with a trailing slash (`src/handlers/`). Matching
//! walks the path's directory ancestry, so a directory entry covers files
//! at any depth below it, but never sibling paths that merely share a
//! string prefix.

use std::collections::HashSet;

use serde_json::Value;

/// Immutable set of output paths excluded from generation.
#[derive(Debug, Clone, Default)]
pub struct LockedPaths {
    entries: HashSet<String>,
}

impl LockedPaths {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a JSON list, ignoring non-string elements.
    pub fn from_value(value: &Value) -> Self {
        let entries = value
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a relative output path is locked, either exactly or by any
    /// ancestor directory entry.
    pub fn is_locked(&self, path: &str) -> bool {
        if self.entries.contains(path) {
            return true;
        }
        let mut ancestor = path;
        while let Some(pos) = ancestor.rfind('/') {
            ancestor = &ancestor[..pos];
            if self.entries.contains(&format!("{}/", ancestor)) {
                return true;
            }
        }
        false
    }
}

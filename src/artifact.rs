//! # Artifacts and File Sinks
//!
//! A package's `generate` call returns a mapping from package-relative
//! keys to artifacts. An artifact is a literal string, a raw JSON value
//! (serialized on render), or a boxed [`Template`] whose rendering the
//! caller owns.
//!
//! Rendering may request side-channel file copies (source path to
//! package-relative target); the orchestrator resolves those against the
//! same computed target directory as the textual output.
//!
//! Writing goes through the [`FileSink`] capability. [`DiskSink`] creates
//! parent directories and writes to the host filesystem; [`MemorySink`]
//! records writes for tests and dry-run inspection.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::error::{Error, Result};

/// A renderable output value.
pub enum Artifact {
    /// Literal text, written as-is.
    Text(String),
    /// Raw value, serialized as pretty JSON on render.
    Value(Value),
    /// Caller-owned template.
    Template(Box<dyn Template>),
}

impl Artifact {
    pub fn text(content: impl Into<String>) -> Self {
        Artifact::Text(content.into())
    }

    /// Render to final content. `None` means the artifact produced no
    /// textual output (copy-only templates).
    pub fn render(&self, ctx: &mut RenderContext) -> Result<Option<String>> {
        match self {
            Artifact::Text(content) => Ok(Some(content.clone())),
            Artifact::Value(value) => {
                let rendered =
                    serde_json::to_string_pretty(value).map_err(|err| Error::Render {
                        path: ctx.key.clone(),
                        message: err.to_string(),
                    })?;
                Ok(Some(rendered))
            }
            Artifact::Template(template) => template.render(ctx),
        }
    }
}

impl std::fmt::Debug for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Artifact::Text(content) => f.debug_tuple("Text").field(content).finish(),
            Artifact::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Artifact::Template(_) => f.debug_tuple("Template").finish(),
        }
    }
}

impl From<String> for Artifact {
    fn from(content: String) -> Self {
        Artifact::Text(content)
    }
}

impl From<&str> for Artifact {
    fn from(content: &str) -> Self {
        Artifact::Text(content.to_string())
    }
}

/// Caller-owned rendering seam.
pub trait Template: Send + Sync {
    fn render(&self, ctx: &mut RenderContext) -> Result<Option<String>>;
}

/// A requested side-channel file copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub source: PathBuf,
    /// Package-relative target path.
    pub target: String,
}

/// Context handed to template rendering.
pub struct RenderContext {
    /// Output key being rendered (for error messages).
    pub key: String,
    copies: Vec<CopyRequest>,
}

impl RenderContext {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            copies: Vec::new(),
        }
    }

    /// Request a file copy alongside the textual output.
    pub fn copy(&mut self, source: impl Into<PathBuf>, target: impl Into<String>) {
        self.copies.push(CopyRequest {
            source: source.into(),
            target: target.into(),
        });
    }

    pub fn take_copies(&mut self) -> Vec<CopyRequest> {
        std::mem::take(&mut self.copies)
    }
}

/// Capability to persist generated output.
pub trait FileSink {
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    fn copy(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Sink writing to the host filesystem, creating parent directories.
#[derive(Default)]
pub struct DiskSink;

impl DiskSink {
    pub fn new() -> Self {
        Self
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Sink {
                path: parent.display().to_string(),
                message: format!("failed to create directory: {}", err),
            })?;
        }
        Ok(())
    }
}

impl FileSink for DiskSink {
    fn write(&self, path: &Path, content: &str) -> Result<()> {
        Self::ensure_parent(path)?;
        fs::write(path, content).map_err(|err| Error::Sink {
            path: path.display().to_string(),
            message: format!("failed to write file: {}", err),
        })
    }

    fn copy(&self, source: &Path, target: &Path) -> Result<()> {
        Self::ensure_parent(target)?;
        fs::copy(source, target).map_err(|err| Error::Sink {
            path: target.display().to_string(),
            message: format!("failed to copy from '{}': {}", source.display(), err),
        })?;
        Ok(())
    }
}

/// Sink recording writes and copies in memory.
#[derive(Default)]
pub struct MemorySink {
    writes: Mutex<BTreeMap<String, String>>,
    copies: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> BTreeMap<String, String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn copied(&self) -> Vec<(PathBuf, PathBuf)> {
        self.copies.lock().unwrap().clone()
    }
}

impl FileSink for MemorySink {
    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .insert(path.display().to_string(), content.to_string());
        Ok(())
    }

    fn copy(&self, source: &Path, target: &Path) -> Result<()> {
        self.copies
            .lock()
            .unwrap()
            .push((source.to_path_buf(), target.to_path_buf()));
        Ok(())
    }
}

//! # Operation Pipelines and Event Listeners
//!
//! Types produced by the hook synthesizer: an ordered pipeline of named
//! steps per operation, and a process-scoped registry of event listeners
//! for cross-entity consistency (reference integrity, stat aggregation).
//!
//! Pipelines are built once at composition time and never mutated after
//! generation begins for their operation. The listener registry lives for
//! one full generation run.

use serde::Serialize;

use crate::value::Fragment;

/// One of the five built-in CRUD-like behaviors, or a caller-declared
/// alias that drives no automatic synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Update,
    Get,
    Find,
    Delete,
    Other(String),
}

impl OperationKind {
    /// Parse an operation's effective kind from its `as` alias or name.
    pub fn parse(kind: &str) -> OperationKind {
        match kind {
            "create" => OperationKind::Create,
            "update" => OperationKind::Update,
            "get" => OperationKind::Get,
            "find" => OperationKind::Find,
            "delete" => OperationKind::Delete,
            other => OperationKind::Other(other.to_string()),
        }
    }

    /// Suffix used to qualify stat triggers and reference events
    /// (`_create`, `_update`, ...).
    pub fn suffix(&self) -> &str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Get => "get",
            OperationKind::Find => "find",
            OperationKind::Delete => "delete",
            OperationKind::Other(name) => name,
        }
    }
}

/// One named step of an operation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStep {
    /// Named point in the operation's execution order.
    pub phase: String,
    /// Step implementation identifier.
    pub step_type: String,
    /// Step configuration.
    pub config: Fragment,
    /// When set, the step is applied per item of the named result
    /// collection instead of to a single result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_over: Option<String>,
}

impl PipelineStep {
    pub fn new(phase: &str, step_type: &str, config: Fragment) -> Self {
        Self {
            phase: phase.to_string(),
            step_type: step_type.to_string(),
            config,
            loop_over: None,
        }
    }

    pub fn looped(mut self, collection: &str) -> Self {
        self.loop_over = Some(collection.to_string());
        self
    }
}

/// Ordered steps attached to one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationPipeline {
    pub operation: String,
    pub steps: Vec<PipelineStep>,
}

impl OperationPipeline {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, step: PipelineStep) {
        self.steps.push(step);
    }

    /// Phases present in order, for assertions and debug output.
    pub fn phases(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.phase.as_str()).collect()
    }
}

/// A registration triggered by a named event, performing a cross-entity
/// side effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerDescriptor {
    /// Action verb (`update-references`, `create-stats`, ...).
    pub action: String,
    /// Join key linking the triggering entity to the listening one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    /// Extra listener configuration.
    pub config: Fragment,
}

/// Process-scoped mapping from event name to ordered listener descriptors.
///
/// Ordered map so re-synthesis from identical input yields an identical
/// registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenerRegistry {
    listeners: std::collections::BTreeMap<String, Vec<ListenerDescriptor>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, event: &str, descriptor: ListenerDescriptor) {
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(descriptor);
    }

    pub fn get(&self, event: &str) -> &[ListenerDescriptor] {
        self.listeners.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.listeners.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

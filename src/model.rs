//! # Entity Model
//!
//! The merged configuration of a microservice type, viewed through the
//! sub-maps the hook synthesizer cares about. Presence or absence of each
//! sub-map is the *sole* signal used to decide whether a pipeline step is
//! needed: an empty or absent sub-map means "no such step".

use serde::Deserialize;
use serde_json::Value;

use crate::pipeline::OperationKind;
use crate::value::Fragment;

/// Declarative sub-maps of one entity type.
///
/// Built from a composed config fragment; unknown fields of the fragment
/// are simply ignored here (the full fragment stays available elsewhere).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntityModel {
    /// Microservice this type belongs to (used for listener naming).
    pub microservice: String,
    /// Type name within the microservice.
    pub name: String,

    pub authorizers: Fragment,
    #[serde(alias = "prefetchs")]
    pub prefetches: Fragment,
    pub fields: Fragment,
    pub pretransformers: Fragment,
    pub transformers: Fragment,
    pub converters: Fragment,
    pub default_values: Fragment,
    pub update_default_values: Fragment,
    pub cascade_values: Fragment,
    pub values: Fragment,
    pub update_values: Fragment,
    pub dynamics: Fragment,
    pub requires: Fragment,
    pub volatile_fields: Fragment,
    pub auto_transitions: Fragment,
    pub reference_fields: Fragment,
    pub owned_reference_list_fields: Fragment,
    pub stat_fields: Fragment,
}

impl EntityModel {
    /// Deserialize a model from a composed config fragment.
    pub fn from_fragment(
        microservice: &str,
        name: &str,
        fragment: &Fragment,
    ) -> crate::error::Result<Self> {
        let mut model: EntityModel =
            serde_json::from_value(Value::Object(fragment.clone()))?;
        model.microservice = microservice.to_string();
        model.name = name.to_string();
        Ok(model)
    }

    /// Whether the model calls for a synthesized step of the given kind on
    /// the given operation. Presence rule: the backing sub-map is non-empty.
    pub fn wants(&self, step: StepTrigger, kind: &OperationKind) -> bool {
        match step {
            StepTrigger::Authorize => !self.authorizers.is_empty(),
            StepTrigger::Prefetch => !self.prefetches.is_empty(),
            StepTrigger::Validate => !self.fields.is_empty(),
            StepTrigger::Pretransform => !self.pretransformers.is_empty(),
            StepTrigger::Transform => !self.transformers.is_empty(),
            StepTrigger::Convert => !self.converters.is_empty(),
            StepTrigger::Prepopulate => match kind {
                OperationKind::Create => {
                    !self.default_values.is_empty() || !self.cascade_values.is_empty()
                }
                OperationKind::Update => {
                    !self.update_default_values.is_empty() || !self.cascade_values.is_empty()
                }
                _ => false,
            },
            StepTrigger::Populate => match kind {
                OperationKind::Create => !self.values.is_empty(),
                OperationKind::Update => !self.update_values.is_empty(),
                _ => false,
            },
            StepTrigger::Dynamics => !self.dynamics.is_empty(),
            StepTrigger::Requires => !self.requires.is_empty(),
            StepTrigger::Prepare => !self.volatile_fields.is_empty(),
            StepTrigger::After => !self.volatile_fields.is_empty(),
            StepTrigger::AutoTransitions => !self.auto_transitions.is_empty(),
        }
    }
}

/// The model sub-map conditions a synthesized step may hang on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTrigger {
    Authorize,
    Prefetch,
    Validate,
    Pretransform,
    Transform,
    Convert,
    Prepopulate,
    Populate,
    Dynamics,
    Requires,
    Prepare,
    After,
    AutoTransitions,
}

//! # Hook Synthesizer
//!
//! Inspects a composed entity model and derives, for each supported
//! operation kind, the ordered pipeline of processing steps plus the
//! side-channel event-listener registrations for cross-entity consistency
//! (reference integrity on update/delete, stat aggregation).
//!
//! The derivation is deterministic and total: given the same model and
//! operation kind it produces the same pipeline and listener set every
//! time. No randomness, no external I/O, no hidden counters.
//!
//! Phase orders per kind are fixed; a phase is included only when the
//! corresponding model sub-map is non-empty (see [`EntityModel::wants`]).
//! Caller-declared explicit hooks are always appended last, per declared
//! phase key, after every automatically synthesized step: explicit hooks
//! follow automatic ones, they never replace them.

use serde_json::Value;

use crate::model::{EntityModel, StepTrigger};
use crate::pipeline::{
    ListenerDescriptor, ListenerRegistry, OperationKind, OperationPipeline, PipelineStep,
};
use crate::value::{as_fragment, get_str, Fragment};

/// Derive the pipeline for one operation and register its listeners.
pub fn synthesize(
    operation_name: &str,
    kind: &OperationKind,
    model: &EntityModel,
    explicit_hooks: &Fragment,
    listeners: &mut ListenerRegistry,
) -> OperationPipeline {
    let mut pipeline = OperationPipeline::new(operation_name);
    match kind {
        OperationKind::Create => synthesize_create(&mut pipeline, kind, model, listeners),
        OperationKind::Update => synthesize_update(&mut pipeline, kind, model, listeners),
        OperationKind::Get => synthesize_read(&mut pipeline, model, false),
        OperationKind::Find => synthesize_read(&mut pipeline, model, true),
        OperationKind::Delete => synthesize_delete(&mut pipeline, kind, model, listeners),
        OperationKind::Other(_) => {}
    }
    append_explicit_hooks(&mut pipeline, explicit_hooks);
    pipeline
}

fn synthesize_create(
    pipeline: &mut OperationPipeline,
    kind: &OperationKind,
    model: &EntityModel,
    listeners: &mut ListenerRegistry,
) {
    push_if(pipeline, model, kind, StepTrigger::Authorize, "authorize", "authorize", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Pretransform, "pretransform", "pretransform", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Validate, "validate", "validate", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Transform, "transform", "transform", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Prepopulate, "prepopulate", "prepopulate", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Populate, "populate", "populate", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Prepare, "prepare", "prepare", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::After, "after", "after", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Convert, "convert", "convert", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::AutoTransitions, "end", "auto-transitions", Fragment::new());
    push_owned_item_steps(pipeline, model, "create-owned-items");
    push_if(pipeline, model, kind, StepTrigger::Dynamics, "postpopulate", "dynamics", Fragment::new());
    register_stat_listeners(model, kind, listeners);
}

fn synthesize_update(
    pipeline: &mut OperationPipeline,
    kind: &OperationKind,
    model: &EntityModel,
    listeners: &mut ListenerRegistry,
) {
    push_if(pipeline, model, kind, StepTrigger::Authorize, "authorize", "authorize", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Prefetch, "init", "prefetch", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Pretransform, "pretransform", "pretransform", Fragment::new());
    push_if(
        pipeline,
        model,
        kind,
        StepTrigger::Validate,
        "validate",
        "validate",
        as_fragment(&serde_json::json!({"required": false})),
    );
    push_if(pipeline, model, kind, StepTrigger::Transform, "transform", "transform", Fragment::new());
    push_if(
        pipeline,
        model,
        kind,
        StepTrigger::Prepopulate,
        "prepopulate",
        "prepopulate",
        as_fragment(&serde_json::json!({"prefix": "update"})),
    );
    push_if(
        pipeline,
        model,
        kind,
        StepTrigger::Populate,
        "populate",
        "populate",
        as_fragment(&serde_json::json!({"prefix": "update"})),
    );
    push_if(pipeline, model, kind, StepTrigger::Prepare, "prepare", "prepare", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::After, "after", "after", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Convert, "convert", "convert", Fragment::new());
    register_reference_listeners(model, kind, "update-references", listeners);
    push_owned_item_steps(pipeline, model, "update-owned-items");
    register_stat_listeners(model, kind, listeners);
}

fn synthesize_read(pipeline: &mut OperationPipeline, model: &EntityModel, per_item: bool) {
    let kind = if per_item { OperationKind::Find } else { OperationKind::Get };
    if model.wants(StepTrigger::Convert, &kind) {
        let step = PipelineStep::new("convert", "convert", Fragment::new());
        // On find, conversion applies per result item, not to one result.
        pipeline.push(if per_item { step.looped("items") } else { step });
    }
    if model.wants(StepTrigger::Dynamics, &kind) {
        pipeline.push(PipelineStep::new("postpopulate", "dynamics", Fragment::new()));
    }
    if model.wants(StepTrigger::Requires, &kind) {
        pipeline.push(PipelineStep::new("init", "requires", Fragment::new()));
    }
}

fn synthesize_delete(
    pipeline: &mut OperationPipeline,
    kind: &OperationKind,
    model: &EntityModel,
    listeners: &mut ListenerRegistry,
) {
    push_if(pipeline, model, kind, StepTrigger::Authorize, "authorize", "authorize", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Prefetch, "init", "prefetch", Fragment::new());
    push_if(pipeline, model, kind, StepTrigger::Convert, "convert", "convert", Fragment::new());
    register_reference_listeners(model, kind, "delete-references", listeners);
    push_owned_item_steps(pipeline, model, "delete-owned-items");
    register_stat_listeners(model, kind, listeners);
}

#[allow(clippy::too_many_arguments)]
fn push_if(
    pipeline: &mut OperationPipeline,
    model: &EntityModel,
    kind: &OperationKind,
    trigger: StepTrigger,
    phase: &str,
    step_type: &str,
    config: Fragment,
) {
    if model.wants(trigger, kind) {
        pipeline.push(PipelineStep::new(phase, step_type, config));
    }
}

/// Unconditionally emit an `after`-phase step (mode `post`) for every
/// owned-reference-list field.
fn push_owned_item_steps(pipeline: &mut OperationPipeline, model: &EntityModel, step_type: &str) {
    for (field, decl) in &model.owned_reference_list_fields {
        let mut config = as_fragment(decl);
        config.insert("field".to_string(), Value::String(field.clone()));
        config.insert("mode".to_string(), Value::String("post".to_string()));
        pipeline.push(PipelineStep::new("after", step_type, config));
    }
}

/// Register one listener per reference field on the derived event name.
///
/// Event name: the reference's dotted target with dots replaced by
/// underscores; dotless targets get the current microservice name appended;
/// then the operation suffix.
fn register_reference_listeners(
    model: &EntityModel,
    kind: &OperationKind,
    action: &str,
    listeners: &mut ListenerRegistry,
) {
    for (field, decl) in &model.reference_fields {
        let decl = as_fragment(decl);
        let target = get_str(&decl, "reference").unwrap_or_default();
        let mut event = target.replace('.', "_");
        if !target.contains('.') {
            event.push('_');
            event.push_str(&model.microservice);
        }
        event.push('_');
        event.push_str(kind.suffix());

        let mut config = Fragment::new();
        config.insert("name".to_string(), Value::String(model.name.clone()));
        config.insert("key".to_string(), Value::String(field.clone()));
        if let Some(id_field) = get_str(&decl, "target_id_field").or(get_str(&decl, "id_field")) {
            config.insert("id_field".to_string(), Value::String(id_field.to_string()));
        }
        listeners.register(
            &event,
            ListenerDescriptor {
                action: action.to_string(),
                join: None,
                config,
            },
        );
    }
}

/// Register stat listeners for every `track` entry whose trigger name ends
/// with the current operation suffix.
fn register_stat_listeners(
    model: &EntityModel,
    kind: &OperationKind,
    listeners: &mut ListenerRegistry,
) {
    let wanted_suffix = format!("_{}", kind.suffix());
    let action = format!("{}-stats", kind.suffix());
    for (field, decl) in &model.stat_fields {
        let decl = as_fragment(decl);
        let tracks = match decl.get("track") {
            Some(Value::Array(list)) => list.clone(),
            _ => Vec::new(),
        };
        for track in tracks {
            let track = as_fragment(&track);
            let trigger = get_str(&track, "on").unwrap_or_default().to_string();
            if !trigger.ends_with(&wanted_suffix) {
                continue;
            }
            let mut config = Fragment::new();
            config.insert("name".to_string(), Value::String(model.name.clone()));
            config.insert("key".to_string(), Value::String(field.clone()));
            if let Some(aggregate) = get_str(&track, "action") {
                config.insert("aggregate".to_string(), Value::String(aggregate.to_string()));
            }
            listeners.register(
                &trigger,
                ListenerDescriptor {
                    action: action.clone(),
                    join: get_str(&track, "join").map(str::to_string),
                    config,
                },
            );
        }
    }
}

/// Append caller-declared hooks, per declared phase key, after all
/// synthesized steps.
fn append_explicit_hooks(pipeline: &mut OperationPipeline, hooks: &Fragment) {
    for (phase, declared) in hooks {
        let entries: Vec<Value> = match declared {
            Value::Array(list) => list.clone(),
            other => vec![other.clone()],
        };
        for entry in entries {
            let step = match &entry {
                Value::String(step_type) => PipelineStep::new(phase, step_type, Fragment::new()),
                Value::Object(map) => {
                    let step_type = get_str(map, "type").unwrap_or("custom").to_string();
                    let mut config = map.clone();
                    config.remove("type");
                    PipelineStep::new(phase, &step_type, config)
                }
                _ => continue,
            };
            pipeline.push(step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(value: serde_json::Value) -> EntityModel {
        EntityModel::from_fragment("library", "book", &as_fragment(&value)).unwrap()
    }

    fn run(kind: &str, m: &EntityModel) -> (OperationPipeline, ListenerRegistry) {
        let mut listeners = ListenerRegistry::new();
        let pipeline = synthesize(
            kind,
            &OperationKind::parse(kind),
            m,
            &Fragment::new(),
            &mut listeners,
        );
        (pipeline, listeners)
    }

    #[test]
    fn test_create_phase_order_for_full_model() {
        let m = model(json!({
            "authorizers": {"a": {}},
            "pretransformers": {"p": {}},
            "fields": {"f": {}},
            "transformers": {"t": {}},
            "default_values": {"d": 1},
            "values": {"v": 1},
            "volatile_fields": {"tmp": {}},
            "converters": {"c": {}},
            "auto_transitions": {"draft": "live"},
        }));
        let (pipeline, _) = run("create", &m);
        assert_eq!(
            pipeline.phases(),
            vec![
                "authorize",
                "pretransform",
                "validate",
                "transform",
                "prepopulate",
                "populate",
                "prepare",
                "after",
                "convert",
                "end",
            ]
        );
        assert_eq!(pipeline.steps.last().unwrap().step_type, "auto-transitions");
    }

    #[test]
    fn test_get_never_synthesizes_validate() {
        // Non-empty fields map, no converters, no dynamics.
        let m = model(json!({"fields": {"title": {}}}));
        let (pipeline, _) = run("get", &m);
        assert!(pipeline.steps.is_empty());

        let (pipeline, _) = run("create", &m);
        assert_eq!(pipeline.phases(), vec!["validate"]);
    }

    #[test]
    fn test_find_convert_is_per_item() {
        let m = model(json!({"converters": {"c": {}}}));
        let (get_pipeline, _) = run("get", &m);
        assert_eq!(get_pipeline.steps[0].loop_over, None);

        let (find_pipeline, _) = run("find", &m);
        assert_eq!(find_pipeline.steps[0].loop_over.as_deref(), Some("items"));
    }

    #[test]
    fn test_update_validate_is_not_required() {
        let m = model(json!({"fields": {"title": {}}}));
        let (pipeline, _) = run("update", &m);
        let validate = &pipeline.steps[0];
        assert_eq!(validate.step_type, "validate");
        assert_eq!(validate.config["required"], json!(false));
    }

    #[test]
    fn test_update_prepopulate_carries_update_prefix() {
        let m = model(json!({"update_default_values": {"at": "now"}}));
        let (pipeline, _) = run("update", &m);
        assert_eq!(pipeline.steps[0].phase, "prepopulate");
        assert_eq!(pipeline.steps[0].config["prefix"], json!("update"));
    }

    #[test]
    fn test_owned_reference_lists_emit_after_steps_unconditionally() {
        let m = model(json!({
            "owned_reference_list_fields": {"chapters": {"target": "chapter"}}
        }));
        for (kind, step_type) in [
            ("create", "create-owned-items"),
            ("update", "update-owned-items"),
            ("delete", "delete-owned-items"),
        ] {
            let (pipeline, _) = run(kind, &m);
            let step = pipeline
                .steps
                .iter()
                .find(|s| s.step_type == step_type)
                .unwrap();
            assert_eq!(step.phase, "after");
            assert_eq!(step.config["field"], json!("chapters"));
            assert_eq!(step.config["mode"], json!("post"));
        }
    }

    #[test]
    fn test_reference_listener_event_naming() {
        let m = model(json!({
            "reference_fields": {
                "author_id": {"reference": "people.author", "id_field": "id"},
                "shelf_id": {"reference": "shelf"},
            }
        }));
        let (_, listeners) = run("update", &m);
        // Dotted target: dots become underscores.
        let dotted = listeners.get("people_author_update");
        assert_eq!(dotted.len(), 1);
        assert_eq!(dotted[0].action, "update-references");
        assert_eq!(dotted[0].config["key"], json!("author_id"));
        assert_eq!(dotted[0].config["id_field"], json!("id"));
        // Dotless target: current microservice appended.
        let local = listeners.get("shelf_library_update");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].config["name"], json!("book"));
    }

    #[test]
    fn test_reference_listeners_only_on_update_and_delete() {
        let m = model(json!({
            "reference_fields": {"shelf_id": {"reference": "shelf"}}
        }));
        let (_, listeners) = run("create", &m);
        assert!(listeners.is_empty());
        let (_, listeners) = run("delete", &m);
        assert_eq!(listeners.get("shelf_library_delete")[0].action, "delete-references");
    }

    #[test]
    fn test_stat_listeners_filter_on_trigger_suffix() {
        let m = model(json!({
            "stat_fields": {
                "count": {"track": [
                    {"on": "chapter_library_create", "join": "book_id", "action": "inc"},
                    {"on": "chapter_library_delete", "join": "book_id", "action": "dec"},
                ]}
            }
        }));
        let (_, listeners) = run("create", &m);
        let created = listeners.get("chapter_library_create");
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].action, "create-stats");
        assert_eq!(created[0].join.as_deref(), Some("book_id"));
        assert_eq!(created[0].config["aggregate"], json!("inc"));
        assert!(listeners.get("chapter_library_delete").is_empty());
    }

    #[test]
    fn test_explicit_hooks_append_after_synthesized_steps() {
        let m = model(json!({"fields": {"title": {}}}));
        let hooks = as_fragment(&json!({
            "validate": [{"type": "custom-check", "strict": true}],
        }));
        let mut listeners = ListenerRegistry::new();
        let pipeline = synthesize("create", &OperationKind::Create, &m, &hooks, &mut listeners);
        assert_eq!(pipeline.steps[0].step_type, "validate");
        let last = pipeline.steps.last().unwrap();
        assert_eq!(last.phase, "validate");
        assert_eq!(last.step_type, "custom-check");
        assert_eq!(last.config["strict"], json!(true));
    }

    #[test]
    fn test_unknown_kind_synthesizes_nothing_automatic() {
        let m = model(json!({"fields": {"title": {}}, "authorizers": {"a": {}}}));
        let (pipeline, listeners) = run("publish", &m);
        assert!(pipeline.steps.is_empty());
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_resynthesis_is_structurally_identical() {
        let m = model(json!({
            "fields": {"title": {}},
            "converters": {"c": {}},
            "reference_fields": {"shelf_id": {"reference": "shelf"}},
            "stat_fields": {"count": {"track": [{"on": "x_update", "join": "j", "action": "set"}]}},
        }));
        let (p1, l1) = run("update", &m);
        let (p2, l2) = run("update", &m);
        assert_eq!(p1, p2);
        assert_eq!(l1, l2);
    }
}

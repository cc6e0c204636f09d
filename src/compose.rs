//! # Config Composer
//!
//! The composer resolves a raw config value into a fully merged
//! configuration fragment. A raw value is one of:
//!
//! - a plain string, parsed as a type reference (`"crud(size=5) + audit"`);
//! - a mapping containing a `type` field, where `type` is the reference and
//!   the remainder is the caller's override fragment;
//! - a mapping without `type`, used verbatim as the override with no asset
//!   lookup at all.
//!
//! Composition fetches the named asset, validates the caller's vars against
//! the asset's declared input contract, merges the override over the asset
//! under the category's merge style, and then resolves mixins: every mixin
//! in the merged config's `mixins` list is itself composed (from the
//! `{category}-mixin` category) and merged, in declared order, into an
//! accumulator that starts empty; the accumulator is finally merged *under*
//! the base, so mixins fill gaps but never override explicit caller fields.
//!
//! Mixin resolution carries a visited set of `(category, head)` pairs and
//! fails with [`Error::MixinCycle`] when a reference chain revisits an
//! asset, instead of looping forever.
//!
//! The composer is side-effect free: it never mutates the fetcher or any
//! external state, and identical inputs always produce structurally
//! identical output. Compositions are re-derived whenever mixins reference
//! each other, so this referential transparency is load-bearing.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::AssetFetcher;
use crate::typeref::TypeReference;
use crate::value::{
    as_fragment, get_map, merge_hooks_key, merge_list_key, merge_map_key, shallow_merge, Fragment,
};

/// Merge rules per composition category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStyle {
    /// Microservice roots: shallow merge plus `mixins` concat+dedup and
    /// `types` map merge.
    Microservice,
    /// Type/function roots: shallow merge plus deep handling of
    /// `handlers`, `middlewares`, `backends`, `mixins`, `attributes`,
    /// `operations` and `functions`.
    Entity,
    /// Operations: shallow merge plus `mixins` concat+dedup, `hooks`
    /// merge-by-key-append and `vars` map merge.
    Operation,
}

/// Merge an override fragment over a base fragment under one style.
///
/// General keys shallow-merge (override wins); the style's reserved keys
/// are recomputed with their dedicated rules.
pub fn merge_fragments(base: &Fragment, over: &Fragment, style: MergeStyle) -> Fragment {
    let mut out = shallow_merge(base, over);
    merge_list_key(&mut out, base, over, "mixins", false);
    match style {
        MergeStyle::Microservice => {
            merge_map_key(&mut out, base, over, "types");
        }
        MergeStyle::Entity => {
            merge_map_key(&mut out, base, over, "handlers");
            merge_list_key(&mut out, base, over, "middlewares", true);
            merge_list_key(&mut out, base, over, "backends", true);
            merge_map_key(&mut out, base, over, "attributes");
            merge_map_key(&mut out, base, over, "operations");
            merge_map_key(&mut out, base, over, "functions");
        }
        MergeStyle::Operation => {
            merge_hooks_key(&mut out, base, over);
            merge_map_key(&mut out, base, over, "vars");
        }
    }
    out
}

/// The composition engine. Holds only the asset-fetching capability.
pub struct Composer<'a> {
    fetcher: &'a dyn AssetFetcher,
}

impl<'a> Composer<'a> {
    pub fn new(fetcher: &'a dyn AssetFetcher) -> Self {
        Self { fetcher }
    }

    /// Compose a raw value against a category under one merge style.
    pub fn compose(&self, category: &str, style: MergeStyle, raw: &Value) -> Result<Fragment> {
        let mut visited = Vec::new();
        self.compose_inner(category, style, raw, &mut visited)
    }

    fn compose_inner(
        &self,
        category: &str,
        style: MergeStyle,
        raw: &Value,
        visited: &mut Vec<(String, String)>,
    ) -> Result<Fragment> {
        let (head, mut override_frag) = parse_raw_value(raw)?;

        let asset = match head.as_deref() {
            Some(name) if !name.is_empty() => {
                let entry = (category.to_string(), name.to_string());
                if visited.contains(&entry) {
                    let mut chain: Vec<&str> =
                        visited.iter().map(|(_, h)| h.as_str()).collect();
                    chain.push(name);
                    return Err(Error::MixinCycle {
                        cycle: chain.join(" -> "),
                    });
                }
                visited.push(entry);
                self.fetch_asset(category, name)?
            }
            _ => Fragment::new(),
        };
        let pushed = head.as_deref().is_some_and(|h| !h.is_empty());

        if let Some(inputs) = get_map(&asset, "inputs") {
            let reference = head.as_deref().unwrap_or_default();
            let vars = override_frag.get("vars").map(as_fragment).unwrap_or_default();
            let prepared = prepare_vars_from_inputs(&vars, inputs, reference)?;
            override_frag.insert("vars".to_string(), Value::Object(prepared));
        }

        let base = merge_fragments(&asset, &override_frag, style);
        let result = self.resolve_mixins(category, style, base, visited)?;

        if pushed {
            visited.pop();
        }
        Ok(result)
    }

    fn fetch_asset(&self, category: &str, name: &str) -> Result<Fragment> {
        self.fetcher.fetch(category, name).map_err(|err| match err {
            Error::AssetNotFound { category, name } => Error::AssetResolution {
                message: format!("unknown asset '{}'", name),
                reference: name,
                category,
            },
            other => other,
        })
    }

    /// Resolve the merged base's mixins: accumulate resolved mixin
    /// fragments in declared order into an empty accumulator, then merge
    /// the base on top. A later mixin can override an earlier mixin's
    /// contribution, but no mixin overrides the explicit base.
    fn resolve_mixins(
        &self,
        category: &str,
        style: MergeStyle,
        base: Fragment,
        visited: &mut Vec<(String, String)>,
    ) -> Result<Fragment> {
        let mixins = match base.get("mixins") {
            Some(Value::Array(list)) if !list.is_empty() => list.clone(),
            _ => return Ok(base),
        };
        let mixin_category = mixin_category(category);
        let mut accumulator = Fragment::new();
        for mixin in &mixins {
            let resolved = self.compose_inner(&mixin_category, style, mixin, visited)?;
            accumulator = merge_fragments(&accumulator, &resolved, style);
        }
        Ok(merge_fragments(&accumulator, &base, style))
    }
}

/// Mixin assets live in the `-mixin` sibling category; nested mixins stay
/// in that same category.
fn mixin_category(category: &str) -> String {
    if category.ends_with("-mixin") {
        category.to_string()
    } else {
        format!("{}-mixin", category)
    }
}

/// Split a raw value into an optional asset head and an override fragment.
fn parse_raw_value(raw: &Value) -> Result<(Option<String>, Fragment)> {
    match raw {
        Value::String(reference) => {
            let tr = TypeReference::parse(reference)?;
            Ok((Some(tr.head.clone()), override_from_reference(tr, Fragment::new())))
        }
        Value::Object(map) => {
            let mut cfg = map.clone();
            match cfg.remove("type") {
                Some(Value::String(reference)) => {
                    let tr = TypeReference::parse(&reference)?;
                    Ok((Some(tr.head.clone()), override_from_reference(tr, cfg)))
                }
                Some(other) => Err(Error::TypeReference {
                    reference: other.to_string(),
                    message: "type must be a string".to_string(),
                }),
                None => Ok((None, cfg)),
            }
        }
        _ => Ok((None, Fragment::new())),
    }
}

/// Fold a parsed type reference into the caller's override fragment:
/// `+`-declared mixins are prepended before mixins already present, and
/// parenthesized-argument vars sit under explicit vars (explicit wins).
fn override_from_reference(tr: TypeReference, mut cfg: Fragment) -> Fragment {
    if !tr.mixins.is_empty() {
        let declared = Fragment::from_iter([(
            "mixins".to_string(),
            Value::Array(tr.mixins.iter().map(|m| Value::String(m.clone())).collect()),
        )]);
        let existing = cfg.clone();
        merge_list_key(&mut cfg, &declared, &existing, "mixins", false);
    }
    if !tr.vars.is_empty() {
        let explicit = cfg.get("vars").map(as_fragment).unwrap_or_default();
        cfg.insert(
            "vars".to_string(),
            Value::Object(shallow_merge(&tr.vars, &explicit)),
        );
    }
    cfg
}

/// Validate and coerce caller vars against an asset's declared inputs.
///
/// Declared inputs default to `{required: true, type: "string"}`. A
/// `main`-flagged input takes its value from the reserved `default` var
/// when the caller supplied one positionally. Caller vars not named by any
/// declared input are preserved as-is.
fn prepare_vars_from_inputs(
    vars: &Fragment,
    inputs: &Fragment,
    reference: &str,
) -> Result<Fragment> {
    let mut out = vars.clone();
    let mut consumed_default = false;
    for (name, decl) in inputs {
        let decl = match decl {
            Value::Object(map) => map.clone(),
            _ => Fragment::new(),
        };
        let required = decl.get("required").and_then(Value::as_bool).unwrap_or(true);
        let input_type = decl
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("string")
            .to_string();
        let main = decl.get("main").and_then(Value::as_bool).unwrap_or(false);

        let mut value = vars.get(name).filter(|v| !v.is_null()).cloned();
        if main {
            if let Some(positional) = vars.get("default").filter(|v| !v.is_null()) {
                value = Some(positional.clone());
                consumed_default = true;
            }
        }
        if value.is_none() {
            value = decl.get("default").filter(|v| !v.is_null()).cloned();
        }
        let value = match value {
            Some(v) => v,
            None if required => {
                return Err(Error::MissingRequiredInput {
                    input: name.clone(),
                    reference: reference.to_string(),
                })
            }
            None => continue,
        };
        let coerced = coerce_input(&value, &input_type, name, reference)?;
        out.insert(name.clone(), coerced);
    }
    if consumed_default {
        out.remove("default");
    }
    Ok(out)
}

fn coerce_input(value: &Value, input_type: &str, name: &str, reference: &str) -> Result<Value> {
    if let Some(item_type) = input_type.strip_suffix("[]") {
        let items: Vec<Value> = match value {
            Value::Array(list) => list.clone(),
            Value::String(s) => s
                .split('|')
                .map(|part| Value::String(part.trim().to_string()))
                .collect(),
            other => vec![other.clone()],
        };
        let coerced = items
            .iter()
            .map(|item| coerce_scalar(item, item_type, name, reference))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::Array(coerced));
    }
    coerce_scalar(value, input_type, name, reference)
}

fn coerce_scalar(value: &Value, input_type: &str, name: &str, reference: &str) -> Result<Value> {
    match input_type {
        "string" => Ok(Value::String(match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        })),
        "boolean" => Ok(Value::Bool(match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
            Value::Null => false,
            _ => true,
        })),
        "number" => match value {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => {
                if let Ok(i) = s.trim().parse::<i64>() {
                    Ok(Value::Number(i.into()))
                } else if let Some(n) = s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                {
                    Ok(Value::Number(n))
                } else {
                    Err(Error::InvalidInput {
                        input: name.to_string(),
                        reference: reference.to_string(),
                        expected: "number".to_string(),
                    })
                }
            }
            Value::Bool(b) => Ok(Value::Number(i64::from(*b).into())),
            _ => Err(Error::InvalidInput {
                input: name.to_string(),
                reference: reference.to_string(),
                expected: "number".to_string(),
            }),
        },
        // Unrecognized declared types pass the value through untouched.
        _ => Ok(value.clone()),
    }
}

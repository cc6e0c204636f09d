//! # Generation Orchestrator
//!
//! ## Lifecycle
//!
//! One `generate` run walks every declared group and package through a
//! fixed lifecycle:
//!
//! 1. **prepare**: per group in declared order, every package is
//!    instantiated through the packager registry (with the
//!    `default_package_type` fallback) and `created` fires. Any failure
//!    here aborts the run before a single byte of output exists.
//! 2. **describe**: strictly sequential across all groups. Every package
//!    passes through the describe transitions; the ones declaring the
//!    capability contribute to one shared description object, and
//!    mutations made by hooks or earlier packages are visible to later
//!    ones.
//! 3. **generate**: per group, every package passes through the hydrate
//!    transitions (each under a fresh `projectData` namespace in the
//!    description), hydratable ones absorbing the finalized description;
//!    then the group's `generate` calls run as one parallel batch. Hooks
//!    always fire sequentially, outside the parallel region.
//!
//! ## Output
//!
//! Each package's artifacts flatten into one map keyed
//! `{package}/{key}`, iterated in lexicographic order. Keys matching the
//! locked table are skipped entirely, never rendered. The remainder is
//! rendered into the returned map and, when [`RunOptions::write`] is set,
//! persisted through the sink under
//! `{root_dir}/{group.dir}/{package}/{key}`.
//!
//! Failures are fatal for the whole run: no partial output is written for
//! a group whose composition or generation failed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info};
use rayon::prelude::*;
use serde_json::Value;

use crate::artifact::{Artifact, FileSink, RenderContext};
use crate::config::{PackageDecl, ProjectConfig};
use crate::error::{Error, Result};
use crate::hooks::{GlobalEvent, GroupEvent, HookRegistry, PackageEvent};
use crate::package::{PackageHandle, PackageSpec, PackagerRegistry};
use crate::value::{populate_data, shallow_merge, Fragment};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Persist rendered artifacts through the sink. When unset the run is
    /// a dry run: the full rendered map is returned, nothing is written.
    pub write: bool,
    /// Overrides the configured `root_dir` as the output base.
    pub target_dir: Option<PathBuf>,
}

/// Summary of one declared package, for inspection without generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub package_type: String,
    pub group: String,
    pub dir: String,
}

struct PreparedPackage {
    name: String,
    target_dir: String,
    vars: Fragment,
    handle: Box<dyn PackageHandle>,
}

struct GroupRun {
    name: String,
    packages: Vec<PreparedPackage>,
}

/// The generation engine. Owns nothing global: configuration, packagers,
/// hooks and the sink are all handed in at construction.
pub struct Generator<'a> {
    config: ProjectConfig,
    packagers: &'a PackagerRegistry,
    hooks: &'a HookRegistry,
    sink: &'a dyn FileSink,
}

impl<'a> Generator<'a> {
    pub fn new(
        config: ProjectConfig,
        packagers: &'a PackagerRegistry,
        hooks: &'a HookRegistry,
        sink: &'a dyn FileSink,
    ) -> Self {
        Self {
            config,
            packagers,
            hooks,
            sink,
        }
    }

    /// Run the full lifecycle and return the rendered output map.
    pub fn generate(&mut self, opts: &RunOptions) -> Result<BTreeMap<String, String>> {
        info!(
            "starting generation: {} group(s), write={}",
            self.config.groups.len(),
            opts.write
        );
        let mut global = Fragment::new();
        let mut runs = self.prepare(&mut global)?;
        let mut description = self.describe(&mut runs, &mut global)?;
        self.hooks
            .fire_global(GlobalEvent::BeforeGenerate, &mut description, &mut global)?;

        let base = opts
            .target_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.config.root_dir));
        let group_dirs: Vec<String> = self.config.groups.iter().map(|g| g.dir.clone()).collect();

        let mut output: BTreeMap<String, String> = BTreeMap::new();
        for (run, dir) in runs.iter_mut().zip(&group_dirs) {
            self.hooks
                .fire_group(GroupEvent::Before, &run.name, &mut global)?;
            self.hydrate(run, &mut description, &mut global)?;
            let artifacts = self.generate_group(run, &mut global)?;
            self.hooks
                .fire_group(GroupEvent::After, &run.name, &mut global)?;

            for (flat_key, (package_index, artifact)) in &artifacts {
                if self.config.locked.is_locked(flat_key) {
                    debug!("skipping locked path '{}'", flat_key);
                    continue;
                }
                let package = &run.packages[*package_index];
                let output_key = if dir == "." {
                    flat_key.clone()
                } else {
                    format!("{}/{}", dir, flat_key)
                };
                let mut ctx = RenderContext::new(&output_key);
                let rendered = artifact.render(&mut ctx)?;
                if opts.write {
                    let package_base = base.join(&package.target_dir);
                    if let Some(content) = &rendered {
                        self.sink.write(&base.join(&output_key), content)?;
                    }
                    for copy in ctx.take_copies() {
                        self.sink
                            .copy(&copy.source, &package_base.join(&copy.target))?;
                    }
                }
                if let Some(content) = rendered {
                    output.insert(output_key, content);
                }
            }
        }

        let mut payload = Value::Object(
            output
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        self.hooks
            .fire_global(GlobalEvent::Generated, &mut payload, &mut global)?;
        if let Value::Object(map) = payload {
            output = map
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect();
        }
        info!("generation finished: {} file(s)", output.len());
        Ok(output)
    }

    /// Summaries of every declared package, without running generation.
    pub fn describe_packages(&self) -> Result<Vec<PackageInfo>> {
        let mut infos = Vec::new();
        for group in &self.config.groups {
            for decl in &group.packages {
                infos.push(PackageInfo {
                    name: decl.name.clone(),
                    package_type: self.resolve_type(decl)?,
                    group: group.name.clone(),
                    dir: group.dir.clone(),
                });
            }
        }
        Ok(infos)
    }

    fn resolve_type(&self, decl: &PackageDecl) -> Result<String> {
        decl.package_type
            .clone()
            .or_else(|| {
                self.config
                    .vars
                    .get("default_package_type")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .ok_or_else(|| Error::MissingPackageType {
                package: decl.name.clone(),
            })
    }

    fn prepare(&self, global: &mut Fragment) -> Result<Vec<GroupRun>> {
        let mut runs = Vec::with_capacity(self.config.groups.len());
        for group in &self.config.groups {
            self.hooks
                .fire_group(GroupEvent::BeforePrepare, &group.name, global)?;
            let mut packages = Vec::with_capacity(group.packages.len());
            for decl in &group.packages {
                let package_type = self.resolve_type(decl)?;
                let target_dir = if group.dir == "." {
                    decl.name.clone()
                } else {
                    format!("{}/{}", group.dir, decl.name)
                };
                let vars = shallow_merge(&self.config.vars, &decl.vars);
                let spec = PackageSpec {
                    name: decl.name.clone(),
                    package_type,
                    target_dir: target_dir.clone(),
                    vars: vars.clone(),
                    config: decl.config.clone(),
                };
                let handle = self.packagers.instantiate(&spec)?;
                debug!(
                    "prepared package '{}' ({}) in group '{}'",
                    decl.name,
                    handle.package_type(),
                    group.name
                );
                let mut payload = Value::Null;
                self.hooks.fire_package(
                    PackageEvent::Created,
                    &group.name,
                    handle.as_ref(),
                    &mut payload,
                    global,
                )?;
                packages.push(PreparedPackage {
                    name: decl.name.clone(),
                    target_dir,
                    vars,
                    handle,
                });
            }
            self.hooks
                .fire_group(GroupEvent::Prepared, &group.name, global)?;
            runs.push(GroupRun {
                name: group.name.clone(),
                packages,
            });
        }
        Ok(runs)
    }

    /// Build the shared description. Strictly sequential in declaration
    /// order: each package (and each hook) sees every earlier mutation.
    /// The describe transitions fire for every package; only the
    /// `describe` call itself is gated on the capability.
    fn describe(&self, runs: &mut [GroupRun], global: &mut Fragment) -> Result<Value> {
        let mut description = Value::Object(Fragment::new());
        for run in runs.iter() {
            for package in &run.packages {
                let handle = package.handle.as_ref();
                self.hooks.fire_package(
                    PackageEvent::BeforeDescribe,
                    &run.name,
                    handle,
                    &mut description,
                    global,
                )?;
                if handle.capabilities().describable {
                    let contribution = handle.describe()?;
                    populate_data(&mut description, &contribution);
                }
                self.hooks.fire_package(
                    PackageEvent::Described,
                    &run.name,
                    handle,
                    &mut description,
                    global,
                )?;
                self.hooks.fire_package(
                    PackageEvent::AfterDescribe,
                    &run.name,
                    handle,
                    &mut description,
                    global,
                )?;
            }
        }
        Ok(description)
    }

    /// Hydrate pass for one group. Each package gets a fresh
    /// `projectData` namespace in the description for the duration of its
    /// own transitions. The hydrate transitions fire for every package;
    /// only the `hydrate` call itself is gated on the capability.
    fn hydrate(
        &self,
        run: &mut GroupRun,
        description: &mut Value,
        global: &mut Fragment,
    ) -> Result<()> {
        for package in &mut run.packages {
            if let Value::Object(map) = &mut *description {
                map.insert("projectData".to_string(), Value::Object(Fragment::new()));
            }
            self.hooks.fire_package(
                PackageEvent::BeforeHydrate,
                &run.name,
                package.handle.as_ref(),
                description,
                global,
            )?;
            if package.handle.capabilities().hydratable {
                package.handle.hydrate(description)?;
            }
            self.hooks.fire_package(
                PackageEvent::Hydrated,
                &run.name,
                package.handle.as_ref(),
                description,
                global,
            )?;
            self.hooks.fire_package(
                PackageEvent::AfterHydrate,
                &run.name,
                package.handle.as_ref(),
                description,
                global,
            )?;
            if let Value::Object(map) = &mut *description {
                map.remove("projectData");
            }
        }
        Ok(())
    }

    /// Generate one group as a parallel batch and flatten the results.
    /// The returned map carries each artifact with the index of its
    /// producing package.
    fn generate_group(
        &self,
        run: &GroupRun,
        global: &mut Fragment,
    ) -> Result<BTreeMap<String, (usize, Artifact)>> {
        for package in &run.packages {
            let mut payload = Value::Null;
            self.hooks.fire_package(
                PackageEvent::BeforeGenerate,
                &run.name,
                package.handle.as_ref(),
                &mut payload,
                global,
            )?;
        }

        // Packages must not share mutable state inside this batch.
        let results: Vec<BTreeMap<String, Artifact>> = run
            .packages
            .par_iter()
            .map(|package| {
                if package.handle.capabilities().generatable {
                    package.handle.generate(&package.vars)
                } else {
                    Ok(BTreeMap::new())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut flattened = BTreeMap::new();
        for (index, (package, artifacts)) in run.packages.iter().zip(results).enumerate() {
            let mut payload = Value::Array(
                artifacts
                    .keys()
                    .map(|k| Value::String(k.clone()))
                    .collect(),
            );
            self.hooks.fire_package(
                PackageEvent::Generated,
                &run.name,
                package.handle.as_ref(),
                &mut payload,
                global,
            )?;
            self.hooks.fire_package(
                PackageEvent::AfterGenerate,
                &run.name,
                package.handle.as_ref(),
                &mut payload,
                global,
            )?;
            debug!(
                "package '{}' produced {} artifact(s)",
                package.name,
                artifacts.len()
            );
            for (key, artifact) in artifacts {
                flattened.insert(format!("{}/{}", package.name, key), (index, artifact));
            }
        }
        Ok(flattened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemorySink;
    use serde_json::json;

    struct StaticPackage {
        name: String,
        package_type: String,
        files: Vec<(String, String)>,
    }

    impl PackageHandle for StaticPackage {
        fn name(&self) -> &str {
            &self.name
        }
        fn package_type(&self) -> &str {
            &self.package_type
        }
        fn generate(&self, _vars: &Fragment) -> Result<BTreeMap<String, Artifact>> {
            Ok(self
                .files
                .iter()
                .map(|(k, v)| (k.clone(), Artifact::text(v.clone())))
                .collect())
        }
    }

    fn static_registry() -> PackagerRegistry {
        let mut registry = PackagerRegistry::new();
        registry.register("static", |spec| {
            let files = spec
                .config
                .get("files")
                .and_then(Value::as_object)
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| {
                            v.as_str().map(|s| (k.clone(), s.to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Box::new(StaticPackage {
                name: spec.name.clone(),
                package_type: spec.package_type.clone(),
                files,
            }) as Box<dyn PackageHandle>)
        });
        registry
    }

    fn config(source: &str) -> ProjectConfig {
        ProjectConfig::from_yaml(source).unwrap()
    }

    #[test]
    fn test_output_keys_sort_lexicographically() {
        let source = "groups:\n  packages:\n    dir: .\npackages:\n  p2:\n    type: static\n    files:\n      b: two\n  p1:\n    type: static\n    files:\n      a: one\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let output = generator.generate(&RunOptions::default()).unwrap();
        let keys: Vec<&str> = output.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["p1/a", "p2/b"]);
    }

    #[test]
    fn test_dry_run_returns_map_without_writing() {
        let source = "packages:\n  api:\n    type: static\n    files:\n      index.js: content\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let output = generator.generate(&RunOptions::default()).unwrap();
        assert_eq!(output["packages/api/index.js"], "content");
        assert!(sink.written().is_empty());
    }

    #[test]
    fn test_write_persists_through_sink() {
        let source = "root_dir: out\npackages:\n  api:\n    type: static\n    files:\n      index.js: content\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let opts = RunOptions {
            write: true,
            target_dir: None,
        };
        generator.generate(&opts).unwrap();
        let written = sink.written();
        assert_eq!(written["out/packages/api/index.js"], "content");
    }

    #[test]
    fn test_locked_paths_are_skipped() {
        let source = "groups:\n  packages:\n    dir: out\nlocked:\n  - sub/\npackages:\n  sub:\n    type: static\n    files:\n      file.txt: generated\n  keep:\n    type: static\n    files:\n      subsequent.txt: kept\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let output = generator.generate(&RunOptions::default()).unwrap();
        assert!(!output.contains_key("out/sub/file.txt"));
        assert_eq!(output["out/keep/subsequent.txt"], "kept");
    }

    #[test]
    fn test_missing_package_type_falls_back_to_default_var() {
        let source = "vars:\n  default_package_type: static\npackages:\n  api:\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let generator = Generator::new(config(source), &registry, &hooks, &sink);
        let infos = generator.describe_packages().unwrap();
        assert_eq!(infos[0].package_type, "static");
    }

    #[test]
    fn test_missing_package_type_without_default_is_fatal() {
        let source = "packages:\n  api:\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let err = generator.generate(&RunOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingPackageType { .. }));
        assert!(sink.written().is_empty());
    }

    #[test]
    fn test_unknown_package_type_aborts_before_output() {
        let source = "packages:\n  good:\n    type: static\n    files:\n      a: one\n  bad:\n    type: ghost\n";
        let registry = static_registry();
        let hooks = HookRegistry::new();
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let opts = RunOptions {
            write: true,
            target_dir: None,
        };
        let err = generator.generate(&opts).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPackageType { .. }));
        assert!(sink.written().is_empty());
    }

    #[test]
    fn test_generated_global_hook_amends_final_map() {
        let source = "groups:\n  packages:\n    dir: .\npackages:\n  p:\n    type: static\n    files:\n      a: one\n";
        let registry = static_registry();
        let mut hooks = HookRegistry::new();
        hooks.on_global(GlobalEvent::Generated, |ctx| {
            assert_eq!(ctx.payload["p/a"], json!("one"));
            if let Value::Object(map) = ctx.payload {
                map.insert("MANIFEST".to_string(), json!("p/a"));
            }
            Ok(())
        });
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        let output = generator.generate(&RunOptions::default()).unwrap();
        assert_eq!(output["MANIFEST"], "p/a");
        assert_eq!(output["p/a"], "one");
    }

    #[test]
    fn test_describe_and_hydrate_transitions_fire_for_generate_only_packages() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let source = "groups:\n  packages:\n    dir: .\npackages:\n  p:\n    type: static\n    files:\n      a: one\n";
        let registry = static_registry();
        let mut hooks = HookRegistry::new();
        let describes = Arc::new(AtomicUsize::new(0));
        let hydrates = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&describes);
        hooks.on_every_package(PackageEvent::BeforeDescribe, move |ctx| {
            assert!(ctx.payload.is_object());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let counter = Arc::clone(&hydrates);
        hooks.on_every_package(PackageEvent::BeforeHydrate, move |ctx| {
            // The per-package namespace is present even when the package
            // never consumes the description.
            assert!(ctx.payload["projectData"].is_object());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let sink = MemorySink::new();
        let mut generator = Generator::new(config(source), &registry, &hooks, &sink);
        generator.generate(&RunOptions::default()).unwrap();
        assert_eq!(describes.load(Ordering::SeqCst), 1);
        assert_eq!(hydrates.load(Ordering::SeqCst), 1);
    }
}

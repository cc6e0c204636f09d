//! # Packgen
//!
//! A declarative project and code generator core: package trees described
//! in configuration are composed through type inheritance and mixins,
//! per-operation processing pipelines are derived from declarative entity
//! models, and named output artifacts are generated while previously
//! hand-edited files stay protected from being overwritten.
//!
//! ## Quick Example
//!
//! ```
//! use packgen::compose::{Composer, MergeStyle};
//! use packgen::registry::{MemoryRegistry, RegistryChain};
//! use packgen::value::as_fragment;
//! use serde_json::json;
//!
//! // Register a reusable asset with a declared input contract
//! let mut registry = MemoryRegistry::new();
//! registry.insert(
//!     "microservice/type",
//!     "widget",
//!     as_fragment(&json!({
//!         "inputs": {"size": {"type": "number", "default": 10, "required": false}}
//!     })),
//! );
//! let mut chain = RegistryChain::new();
//! chain.push(Box::new(registry));
//!
//! // Compose a reference with a parenthesized argument
//! let composer = Composer::new(&chain);
//! let composed = composer
//!     .compose("microservice/type", MergeStyle::Entity, &json!("widget(size=5)"))
//!     .unwrap();
//! assert_eq!(composed["vars"]["size"], json!(5));
//! ```
//!
//! ## Core Concepts
//!
//! The library is built around a few key concepts:
//!
//! - **Composition (`compose`, `typeref`, `registry`)**: Raw package and
//!   type declarations reference named assets (`"crud(size=5) + audit"`);
//!   the composer fetches them, validates declared inputs, merges caller
//!   overrides and recursively resolves mixins with gap-filling semantics.
//! - **Synthesis (`model`, `pipeline`, `synth`)**: A composed entity model
//!   drives the derivation of per-operation step pipelines and
//!   cross-entity event listeners, purely from which declarative sub-maps
//!   are present.
//! - **Generation (`package`, `hooks`, `generator`)**: Packagers turn
//!   declarations into package handles; the orchestrator walks them
//!   through describe, hydrate and generate with typed lifecycle hooks
//!   firing along the way.
//! - **Output (`artifact`, `locking`)**: Generated artifacts are rendered
//!   and flattened into one lexicographically ordered map; locked paths
//!   are filtered out before anything touches the file sink.
//!
//! ## Execution Flow
//!
//! The main entry point is `generator::Generator`, which executes the
//! following high-level steps:
//!
//! 1.  **Prepare**: Instantiate every declared package through the
//!     packager registry; any failure aborts before output exists.
//! 2.  **Describe**: Build one shared description object sequentially
//!     across all packages.
//! 3.  **Hydrate**: Let each package absorb the finalized description.
//! 4.  **Generate**: Run each group's package batch in parallel, flatten
//!     and sort the artifact maps.
//! 5.  **Filter & Write**: Skip locked paths, render the remainder and
//!     persist it through the configured sink (or return it as a dry run).

pub mod artifact;
pub mod compose;
pub mod config;
pub mod error;
pub mod generator;
pub mod hooks;
pub mod locking;
pub mod model;
pub mod package;
pub mod pipeline;
pub mod registry;
pub mod synth;
pub mod typeref;
pub mod value;

#[cfg(test)]
mod locking_proptest;

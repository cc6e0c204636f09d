//! # Error Handling
//!
//! This module defines the centralized error handling mechanism for the
//! `packgen` library. It uses the `thiserror` library to create a
//! comprehensive `Error` enum that covers all anticipated failure modes,
//! providing clear and descriptive error messages.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum that represents all possible errors that can
//!   occur within the library. Each variant corresponds to a specific
//!   type of error and includes contextual information to aid in debugging.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`, used
//!   throughout the library to simplify function signatures.
//!
//! All composition-time errors (asset resolution, input contracts, mixin
//! cycles, packager lookup) are fatal for the whole generation run: they
//! surface immediately with the offending name in the message and are never
//! retried. There is no per-package recovery mode, because later packages
//! may depend on shared description state the failed package would have
//! contributed.

use thiserror::Error;

/// Main error type for packgen operations
#[derive(Error, Debug)]
pub enum Error {
    /// No registry in the chain claims the requested asset.
    #[error("Unknown asset '{name}' of category '{category}'")]
    AssetNotFound { category: String, name: String },

    /// A type or mixin reference could not be resolved against the asset
    /// registries while composing a configuration.
    #[error("Failed to resolve '{reference}' in category '{category}': {message}")]
    AssetResolution {
        category: String,
        reference: String,
        message: String,
    },

    /// An asset's input contract declared a required input that the caller
    /// neither supplied nor the asset defaulted.
    #[error("Required input '{input}' is missing for '{reference}'")]
    MissingRequiredInput { input: String, reference: String },

    /// A supplied input value could not be coerced to the declared type.
    #[error("Input '{input}' for '{reference}' is not a valid {expected}")]
    InvalidInput {
        input: String,
        reference: String,
        expected: String,
    },

    /// Mixin resolution revisited a type that is already being composed.
    #[error("Mixin cycle detected: {cycle}")]
    MixinCycle { cycle: String },

    /// A type-reference string could not be parsed.
    #[error("Invalid type reference '{reference}': {message}")]
    TypeReference { reference: String, message: String },

    /// A package declares a type no packager is registered for.
    #[error("Unsupported package type '{package_type}'")]
    UnsupportedPackageType { package_type: String },

    /// A package declares no type and no default package type is configured.
    #[error("No type specified for package '{package}'")]
    MissingPackageType { package: String },

    /// A registry was requested from a factory type that is not registered.
    #[error("No registered registry factory for type '{registry_type}'")]
    UnknownRegistryType { registry_type: String },

    /// An error occurred while parsing the declarative project configuration.
    ///
    /// This error includes the specific parsing issue and optionally a hint
    /// about how to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An artifact failed to render.
    #[error("Render error for '{path}': {message}")]
    Render { path: String, message: String },

    /// A file sink operation failed.
    #[error("Sink error for '{path}': {message}")]
    Sink { path: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

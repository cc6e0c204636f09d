//! # Asset Registries
//!
//! Assets are named, reusable configuration fragments, resolved by
//! `(category, name)` against a chain of registries. The composer only
//! depends on the [`AssetFetcher`] capability; concrete registries live
//! behind the [`Registry`] trait so on-disk or remote backends can be
//! plugged in by callers.
//!
//! A [`RegistryChain`] asks each registry in registration order whether it
//! has the asset; the first one claiming it wins. Registry construction
//! goes through a string-keyed [`RegistryFactories`] table where hyphens
//! and underscores in the factory type are treated as equivalent aliases
//! of the same registration.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::Fragment;

/// Capability to resolve `(category, name)` into a config fragment.
pub trait AssetFetcher {
    /// Resolve an asset, failing with [`Error::AssetNotFound`] when absent.
    fn fetch(&self, category: &str, name: &str) -> Result<Fragment>;
}

/// One source of assets.
pub trait Registry {
    /// Whether this registry can serve the asset.
    fn has_asset(&self, category: &str, name: &str) -> bool;
    /// Fetch the asset; only called after `has_asset` returned true.
    fn get_asset(&self, category: &str, name: &str) -> Result<Fragment>;
}

/// In-memory registry backed by a category/name table.
#[derive(Default)]
pub struct MemoryRegistry {
    assets: HashMap<String, HashMap<String, Fragment>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one asset fragment under a category and name.
    pub fn insert(&mut self, category: &str, name: &str, fragment: Fragment) -> &mut Self {
        self.assets
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string(), fragment);
        self
    }
}

impl Registry for MemoryRegistry {
    fn has_asset(&self, category: &str, name: &str) -> bool {
        self.assets
            .get(category)
            .is_some_and(|names| names.contains_key(name))
    }

    fn get_asset(&self, category: &str, name: &str) -> Result<Fragment> {
        self.assets
            .get(category)
            .and_then(|names| names.get(name))
            .cloned()
            .ok_or_else(|| Error::AssetNotFound {
                category: category.to_string(),
                name: name.to_string(),
            })
    }
}

/// Ordered chain of registries; the first one claiming an asset wins.
#[derive(Default)]
pub struct RegistryChain {
    registries: Vec<Box<dyn Registry>>,
}

impl RegistryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, registry: Box<dyn Registry>) {
        self.registries.push(registry);
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

impl AssetFetcher for RegistryChain {
    fn fetch(&self, category: &str, name: &str) -> Result<Fragment> {
        let registry = self
            .registries
            .iter()
            .find(|r| r.has_asset(category, name))
            .ok_or_else(|| Error::AssetNotFound {
                category: category.to_string(),
                name: name.to_string(),
            })?;
        registry.get_asset(category, name)
    }
}

/// String-keyed registry factory table with `-`/`_` aliasing.
#[derive(Default)]
pub struct RegistryFactories {
    factories: HashMap<String, std::rc::Rc<dyn Fn(&Fragment) -> Result<Box<dyn Registry>>>>,
}

impl RegistryFactories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a type name. The underscore spelling of a
    /// hyphenated name is registered as an alias of the same factory.
    pub fn register<F>(&mut self, registry_type: &str, factory: F)
    where
        F: Fn(&Fragment) -> Result<Box<dyn Registry>> + 'static,
    {
        let factory = std::rc::Rc::new(factory);
        let alias = registry_type.replace('-', "_");
        self.factories
            .insert(registry_type.to_string(), factory.clone());
        if alias != registry_type {
            self.factories.insert(alias, factory);
        }
    }

    /// Build a registry, failing with [`Error::UnknownRegistryType`] when
    /// no factory is registered for the type.
    pub fn build(&self, registry_type: &str, config: &Fragment) -> Result<Box<dyn Registry>> {
        let factory =
            self.factories
                .get(registry_type)
                .ok_or_else(|| Error::UnknownRegistryType {
                    registry_type: registry_type.to_string(),
                })?;
        factory(config)
    }
}

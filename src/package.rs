//! # Packager Capability
//!
//! A packager turns a composed package configuration into a
//! [`PackageHandle`]: the object the orchestrator walks through the
//! describe/hydrate/generate lifecycle. Concrete per-technology builders
//! live outside this crate; they plug in through [`PackagerRegistry`].
//!
//! A package type declares an explicit capability set instead of being
//! inspected for method presence: the orchestrator checks
//! [`Capabilities::describable`] / [`Capabilities::hydratable`] before
//! calling the optional lifecycle methods.

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde_json::Value;

use crate::artifact::Artifact;
use crate::error::{Error, Result};
use crate::value::Fragment;

/// Declared optional-capability set of a package type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub describable: bool,
    pub hydratable: bool,
    pub generatable: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            describable: false,
            hydratable: false,
            generatable: true,
        }
    }
}

/// Everything a packager needs to instantiate a package.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Package name within its group.
    pub name: String,
    /// Declared (or defaulted) package type.
    pub package_type: String,
    /// Group-relative output directory for the package's artifacts.
    pub target_dir: String,
    /// Generator vars shallow-merged with the package's own vars.
    pub vars: Fragment,
    /// Remaining declaration fields, verbatim.
    pub config: Fragment,
}

/// One instantiated package walking the generation lifecycle.
pub trait PackageHandle: Send + Sync {
    fn name(&self) -> &str;
    fn package_type(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Contribute to the shared description object. Only called when
    /// `capabilities().describable` is set.
    fn describe(&self) -> Result<Value> {
        Ok(Value::Object(Fragment::new()))
    }

    /// Absorb the finalized shared description. Only called when
    /// `capabilities().hydratable` is set. The description carries a
    /// package-local `projectData` namespace for the duration of the call.
    fn hydrate(&mut self, _description: &Value) -> Result<()> {
        Ok(())
    }

    /// Produce the package's artifact map, keyed by package-relative path.
    fn generate(&self, vars: &Fragment) -> Result<BTreeMap<String, Artifact>>;
}

/// Factory building a package handle from its spec.
pub type Packager = Box<dyn Fn(&PackageSpec) -> Result<Box<dyn PackageHandle>>>;

/// Registry of packagers keyed by declared package type.
///
/// Hyphens and underscores in a type name are aliases of the same
/// registration: registering `js-lambda` also answers for `js_lambda`.
#[derive(Default)]
pub struct PackagerRegistry {
    packagers: HashMap<String, std::rc::Rc<dyn Fn(&PackageSpec) -> Result<Box<dyn PackageHandle>>>>,
}

impl PackagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, package_type: &str, packager: F)
    where
        F: Fn(&PackageSpec) -> Result<Box<dyn PackageHandle>> + 'static,
    {
        let packager = std::rc::Rc::new(packager);
        let alias = package_type.replace('-', "_");
        self.packagers
            .insert(package_type.to_string(), packager.clone());
        if alias != package_type {
            self.packagers.insert(alias, packager);
        }
    }

    pub fn supports(&self, package_type: &str) -> bool {
        self.packagers.contains_key(package_type)
    }

    /// Instantiate a package, failing with
    /// [`Error::UnsupportedPackageType`] when no packager is registered.
    pub fn instantiate(&self, spec: &PackageSpec) -> Result<Box<dyn PackageHandle>> {
        let packager =
            self.packagers
                .get(&spec.package_type)
                .ok_or_else(|| Error::UnsupportedPackageType {
                    package_type: spec.package_type.clone(),
                })?;
        packager(spec)
    }
}

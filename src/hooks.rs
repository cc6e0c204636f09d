//! # Event-Hook Registry
//!
//! A typed event bus for the generation lifecycle. Hooks are registered
//! per package type (or as wildcards covering every type), per group name
//! (or every group), or globally for the run. Dispatch order is fixed:
//! specific registrations fire before wildcard ones, each list in
//! registration order.
//!
//! Callbacks are trusted: an error returned by a hook propagates and
//! aborts the run. Hooks are fired sequentially, never inside a parallel
//! region, so they may freely mutate the shared payload and the
//! run-scoped global context.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;
use crate::package::PackageHandle;
use crate::value::Fragment;

/// Per-package lifecycle points, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageEvent {
    Created,
    BeforeDescribe,
    Described,
    AfterDescribe,
    BeforeHydrate,
    Hydrated,
    AfterHydrate,
    BeforeGenerate,
    Generated,
    AfterGenerate,
}

/// Per-group lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupEvent {
    BeforePrepare,
    Prepared,
    Before,
    After,
}

/// Run-wide lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalEvent {
    BeforeGenerate,
    Generated,
}

/// Context handed to a per-package hook.
pub struct PackageHookContext<'a> {
    pub event: PackageEvent,
    pub group: &'a str,
    pub package: &'a dyn PackageHandle,
    /// Event payload: the shared description for describe/hydrate events,
    /// the package's produced artifact-key list for generate events.
    pub payload: &'a mut Value,
    /// Run-scoped scratch space shared by all hooks.
    pub global: &'a mut Fragment,
}

/// Context handed to a group hook.
pub struct GroupHookContext<'a> {
    pub event: GroupEvent,
    pub group: &'a str,
    pub global: &'a mut Fragment,
}

/// Context handed to a global hook.
pub struct GlobalHookContext<'a> {
    pub event: GlobalEvent,
    /// The shared description (`before_generate`) or the final output map
    /// (`generated`).
    pub payload: &'a mut Value,
    pub global: &'a mut Fragment,
}

pub type PackageHook = Box<dyn Fn(&mut PackageHookContext) -> Result<()>>;
pub type GroupHook = Box<dyn Fn(&mut GroupHookContext) -> Result<()>>;
pub type GlobalHook = Box<dyn Fn(&mut GlobalHookContext) -> Result<()>>;

fn normalize(key: &str) -> String {
    key.replace('-', "_")
}

/// All hook registrations for one generation run.
#[derive(Default)]
pub struct HookRegistry {
    package: HashMap<PackageEvent, HashMap<String, Vec<PackageHook>>>,
    package_wildcard: HashMap<PackageEvent, Vec<PackageHook>>,
    group: HashMap<GroupEvent, HashMap<String, Vec<GroupHook>>>,
    group_wildcard: HashMap<GroupEvent, Vec<GroupHook>>,
    global: HashMap<GlobalEvent, Vec<GlobalHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook for one package type. Hyphens and underscores in
    /// the type name are interchangeable.
    pub fn on_package<F>(&mut self, event: PackageEvent, package_type: &str, hook: F)
    where
        F: Fn(&mut PackageHookContext) -> Result<()> + 'static,
    {
        self.package
            .entry(event)
            .or_default()
            .entry(normalize(package_type))
            .or_default()
            .push(Box::new(hook));
    }

    /// Register a hook fired for every package type.
    pub fn on_every_package<F>(&mut self, event: PackageEvent, hook: F)
    where
        F: Fn(&mut PackageHookContext) -> Result<()> + 'static,
    {
        self.package_wildcard
            .entry(event)
            .or_default()
            .push(Box::new(hook));
    }

    pub fn on_group<F>(&mut self, event: GroupEvent, group: &str, hook: F)
    where
        F: Fn(&mut GroupHookContext) -> Result<()> + 'static,
    {
        self.group
            .entry(event)
            .or_default()
            .entry(group.to_string())
            .or_default()
            .push(Box::new(hook));
    }

    pub fn on_every_group<F>(&mut self, event: GroupEvent, hook: F)
    where
        F: Fn(&mut GroupHookContext) -> Result<()> + 'static,
    {
        self.group_wildcard
            .entry(event)
            .or_default()
            .push(Box::new(hook));
    }

    pub fn on_global<F>(&mut self, event: GlobalEvent, hook: F)
    where
        F: Fn(&mut GlobalHookContext) -> Result<()> + 'static,
    {
        self.global.entry(event).or_default().push(Box::new(hook));
    }

    /// Fire all hooks registered for one package event: type-specific
    /// registrations first, then wildcards.
    pub fn fire_package(
        &self,
        event: PackageEvent,
        group: &str,
        package: &dyn PackageHandle,
        payload: &mut Value,
        global: &mut Fragment,
    ) -> Result<()> {
        let type_key = normalize(package.package_type());
        if let Some(per_type) = self.package.get(&event) {
            if let Some(hooks) = per_type.get(&type_key) {
                for hook in hooks {
                    let mut ctx = PackageHookContext {
                        event,
                        group,
                        package,
                        payload: &mut *payload,
                        global: &mut *global,
                    };
                    hook(&mut ctx)?;
                }
            }
        }
        if let Some(hooks) = self.package_wildcard.get(&event) {
            for hook in hooks {
                let mut ctx = PackageHookContext {
                    event,
                    group,
                    package,
                    payload: &mut *payload,
                    global: &mut *global,
                };
                hook(&mut ctx)?;
            }
        }
        Ok(())
    }

    pub fn fire_group(
        &self,
        event: GroupEvent,
        group: &str,
        global: &mut Fragment,
    ) -> Result<()> {
        if let Some(per_group) = self.group.get(&event) {
            if let Some(hooks) = per_group.get(group) {
                for hook in hooks {
                    let mut ctx = GroupHookContext {
                        event,
                        group,
                        global: &mut *global,
                    };
                    hook(&mut ctx)?;
                }
            }
        }
        if let Some(hooks) = self.group_wildcard.get(&event) {
            for hook in hooks {
                let mut ctx = GroupHookContext {
                    event,
                    group,
                    global: &mut *global,
                };
                hook(&mut ctx)?;
            }
        }
        Ok(())
    }

    pub fn fire_global(
        &self,
        event: GlobalEvent,
        payload: &mut Value,
        global: &mut Fragment,
    ) -> Result<()> {
        if let Some(hooks) = self.global.get(&event) {
            for hook in hooks {
                let mut ctx = GlobalHookContext {
                    event,
                    payload: &mut *payload,
                    global: &mut *global,
                };
                hook(&mut ctx)?;
            }
        }
        Ok(())
    }
}

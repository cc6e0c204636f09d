//! # Project Configuration
//!
//! ## Shape
//!
//! The declarative input is one YAML document:
//!
//! ```yaml
//! root_dir: out
//! vars:
//!   default_package_type: js-lambda
//! locked:
//!   - packages/api/src/custom.js
//! groups:
//!   services:
//!     dir: svc
//! services:
//!   api:
//!     type: js-lambda
//!     vars:
//!       runtime: node20
//! ```
//!
//! `groups` names the package groups; each group reads its package
//! declarations from the top-level key named by its `in` field (defaulting
//! to the group name). When no `groups` mapping is present a single
//! `packages` group is assumed. Declaration order of groups and packages
//! is preserved throughout.
//!
//! ## Defaults
//!
//! Base vars are seeded (`generator`, `license`, `root_dir`) before the
//! document's own `vars` merge over them. A package without a `type` falls
//! back to the `default_package_type` var at generation time.

use serde_json::Value;
use serde_yaml::Value as Yaml;

use crate::error::{Error, Result};
use crate::locking::LockedPaths;
use crate::value::Fragment;

/// One declared package group.
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub name: String,
    /// Top-level key the group's package declarations live under.
    pub key: String,
    /// Group output directory, relative to `root_dir`.
    pub dir: String,
    pub packages: Vec<PackageDecl>,
}

/// One package declaration inside a group.
#[derive(Debug, Clone)]
pub struct PackageDecl {
    pub name: String,
    pub package_type: Option<String>,
    pub vars: Fragment,
    /// Remaining declaration fields, verbatim.
    pub config: Fragment,
}

/// Parsed project configuration.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root_dir: String,
    pub vars: Fragment,
    pub locked: LockedPaths,
    pub groups: Vec<GroupConfig>,
}

impl ProjectConfig {
    pub fn from_yaml(source: &str) -> Result<Self> {
        let document: Yaml = serde_yaml::from_str(source)?;
        let root = match document {
            Yaml::Mapping(map) => map,
            Yaml::Null => serde_yaml::Mapping::new(),
            _ => {
                return Err(Error::ConfigParse {
                    message: "expected a YAML mapping at the document root".to_string(),
                    hint: None,
                })
            }
        };

        let root_dir = root
            .get("root_dir")
            .and_then(Yaml::as_str)
            .unwrap_or(".")
            .to_string();

        let mut vars = base_vars(&root_dir);
        if let Some(declared) = root.get("vars") {
            let declared = yaml_fragment(declared, "vars")?;
            for (key, value) in declared {
                vars.insert(key, value);
            }
        }

        let mut locked_entries: Vec<String> = Vec::new();
        if let Some(Yaml::Sequence(list)) = root.get("locked") {
            locked_entries.extend(list.iter().filter_map(Yaml::as_str).map(str::to_string));
        }
        if let Some(Value::Array(list)) = vars.get("locked") {
            locked_entries.extend(list.iter().filter_map(Value::as_str).map(str::to_string));
        }
        let locked = LockedPaths::new(locked_entries);

        let group_specs = parse_group_specs(&root)?;
        let mut groups = Vec::with_capacity(group_specs.len());
        for (name, key, dir) in group_specs {
            let packages = parse_group_packages(&root, &key)?;
            groups.push(GroupConfig {
                name,
                key,
                dir,
                packages,
            });
        }

        Ok(ProjectConfig {
            root_dir,
            vars,
            locked,
            groups,
        })
    }
}

fn base_vars(root_dir: &str) -> Fragment {
    let mut vars = Fragment::new();
    vars.insert("generator".to_string(), Value::String("packgen".to_string()));
    vars.insert("license".to_string(), Value::String("MIT".to_string()));
    vars.insert("root_dir".to_string(), Value::String(root_dir.to_string()));
    vars
}

/// `(name, in-key, dir)` for every group, in declaration order. Absent
/// `groups` means a single `packages` group.
fn parse_group_specs(root: &serde_yaml::Mapping) -> Result<Vec<(String, String, String)>> {
    let declared = match root.get("groups") {
        None => {
            return Ok(vec![(
                "packages".to_string(),
                "packages".to_string(),
                "packages".to_string(),
            )])
        }
        Some(Yaml::Mapping(map)) => map,
        Some(_) => {
            return Err(Error::ConfigParse {
                message: "'groups' must be a mapping of group name to settings".to_string(),
                hint: None,
            })
        }
    };

    let mut specs = Vec::with_capacity(declared.len());
    for (name, settings) in declared {
        let name = name.as_str().ok_or_else(|| Error::ConfigParse {
            message: "group names must be strings".to_string(),
            hint: None,
        })?;
        let (key, dir) = match settings {
            Yaml::Null => (name.to_string(), name.to_string()),
            Yaml::Mapping(map) => {
                let key = map
                    .get("in")
                    .and_then(Yaml::as_str)
                    .unwrap_or(name)
                    .to_string();
                let dir = map
                    .get("dir")
                    .and_then(Yaml::as_str)
                    .unwrap_or(name)
                    .to_string();
                (key, dir)
            }
            _ => {
                return Err(Error::ConfigParse {
                    message: format!("group '{}' settings must be a mapping", name),
                    hint: None,
                })
            }
        };
        specs.push((name.to_string(), key, dir));
    }
    Ok(specs)
}

fn parse_group_packages(root: &serde_yaml::Mapping, key: &str) -> Result<Vec<PackageDecl>> {
    let declared = match root.get(key) {
        None | Some(Yaml::Null) => return Ok(Vec::new()),
        Some(Yaml::Mapping(map)) => map,
        Some(_) => {
            return Err(Error::ConfigParse {
                message: format!("'{}' must be a mapping of package name to declaration", key),
                hint: None,
            })
        }
    };

    let mut packages = Vec::with_capacity(declared.len());
    for (name, decl) in declared {
        let name = name.as_str().ok_or_else(|| Error::ConfigParse {
            message: format!("package names under '{}' must be strings", key),
            hint: None,
        })?;
        let mut config = match decl {
            Yaml::Null => Fragment::new(),
            other => yaml_fragment(other, name)?,
        };
        let package_type = match config.remove("type") {
            None => None,
            Some(Value::String(t)) => Some(t),
            Some(_) => {
                return Err(Error::ConfigParse {
                    message: format!("package '{}': 'type' must be a string", name),
                    hint: None,
                })
            }
        };
        let vars = match config.remove("vars") {
            None => Fragment::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(Error::ConfigParse {
                    message: format!("package '{}': 'vars' must be a mapping", name),
                    hint: None,
                })
            }
        };
        packages.push(PackageDecl {
            name: name.to_string(),
            package_type,
            vars,
            config,
        });
    }
    Ok(packages)
}

/// Convert a YAML mapping node into a JSON fragment, preserving key order.
fn yaml_fragment(value: &Yaml, context: &str) -> Result<Fragment> {
    match yaml_to_json(value) {
        Value::Object(map) => Ok(map),
        _ => Err(Error::ConfigParse {
            message: format!("'{}' must be a mapping", context),
            hint: None,
        }),
    }
}

fn yaml_to_json(value: &Yaml) -> Value {
    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64().map(Value::from).unwrap_or(Value::Null)
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(seq) => Value::Array(seq.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => {
            let mut out = Fragment::new();
            for (key, value) in map {
                let key = match key {
                    Yaml::String(s) => s.clone(),
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    _ => continue,
                };
                out.insert(key, yaml_to_json(value));
            }
            Value::Object(out)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document_gets_default_group() {
        let config = ProjectConfig::from_yaml("packages:\n  api:\n    type: js\n").unwrap();
        assert_eq!(config.groups.len(), 1);
        let group = &config.groups[0];
        assert_eq!(group.name, "packages");
        assert_eq!(group.dir, "packages");
        assert_eq!(group.packages[0].name, "api");
        assert_eq!(group.packages[0].package_type.as_deref(), Some("js"));
    }

    #[test]
    fn test_base_vars_are_seeded_then_overridden() {
        let config = ProjectConfig::from_yaml("vars:\n  license: Apache-2.0\n").unwrap();
        assert_eq!(config.vars["license"], json!("Apache-2.0"));
        assert_eq!(config.vars["generator"], json!("packgen"));
        assert_eq!(config.vars["root_dir"], json!("."));
    }

    #[test]
    fn test_group_in_and_dir_default_to_name() {
        let source = "groups:\n  services:\nservices:\n  api:\n    type: js\n";
        let config = ProjectConfig::from_yaml(source).unwrap();
        let group = &config.groups[0];
        assert_eq!(group.key, "services");
        assert_eq!(group.dir, "services");
        assert_eq!(group.packages.len(), 1);
    }

    #[test]
    fn test_group_reads_packages_from_in_key() {
        let source = "groups:\n  services:\n    in: svc\n    dir: out/svc\nsvc:\n  api:\n    type: js\n";
        let config = ProjectConfig::from_yaml(source).unwrap();
        let group = &config.groups[0];
        assert_eq!(group.dir, "out/svc");
        assert_eq!(group.packages[0].name, "api");
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let source = "packages:\n  zeta:\n    type: js\n  alpha:\n    type: js\n  mid:\n    type: js\n";
        let config = ProjectConfig::from_yaml(source).unwrap();
        let names: Vec<&str> = config.groups[0]
            .packages
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_locked_merges_top_level_and_vars() {
        let source = "locked:\n  - a.txt\nvars:\n  locked:\n    - b/\n";
        let config = ProjectConfig::from_yaml(source).unwrap();
        assert!(config.locked.is_locked("a.txt"));
        assert!(config.locked.is_locked("b/c.txt"));
    }

    #[test]
    fn test_package_extra_fields_stay_in_config() {
        let source = "packages:\n  api:\n    type: js\n    vars:\n      runtime: node20\n    entities:\n      - book\n";
        let config = ProjectConfig::from_yaml(source).unwrap();
        let package = &config.groups[0].packages[0];
        assert_eq!(package.vars["runtime"], json!("node20"));
        assert_eq!(package.config["entities"], json!(["book"]));
        assert!(!package.config.contains_key("type"));
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        let err = ProjectConfig::from_yaml("- just\n- a\n- list\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }
}

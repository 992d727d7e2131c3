//! Package metadata as held by the coordinator, and the mutations the client
//! may request against it.
//!
//! The client never edits a local copy and saves it back: every change is one
//! [`MetaMutation`] sent to the coordinator, which owns the document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const START_COMMAND: &str = "START_COMMAND";
pub const START_PATH: &str = "START_PATH";

pub const DEFAULT_LEFT_DELIMITER: &str = "{{";
pub const DEFAULT_RIGHT_DELIMITER: &str = "}}";

/// A `{type, name}` pair, used for both provides and dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl Resource {
    pub fn new(kind: &str, name: &str) -> Self {
        Self {
            kind: kind.to_owned(),
            name: name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub path: String,
    #[serde(default = "default_left")]
    pub left_delimiter: String,
    #[serde(default = "default_right")]
    pub right_delimiter: String,
}

impl Template {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            left_delimiter: default_left(),
            right_delimiter: default_right(),
        }
    }

    #[must_use]
    pub fn with_delimiters(mut self, left: &str, right: &str) -> Self {
        self.left_delimiter = left.to_owned();
        self.right_delimiter = right.to_owned();
        self
    }
}

fn default_left() -> String {
    DEFAULT_LEFT_DELIMITER.to_owned()
}

fn default_right() -> String {
    DEFAULT_RIGHT_DELIMITER.to_owned()
}

/// The coordinator's metadata document.
///
/// The four known categories are typed; anything else the coordinator sends is
/// kept verbatim in `extra` so it survives a fetch-and-print.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub provides: Vec<Resource>,
    #[serde(default)]
    pub dependencies: Vec<Resource>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageMetadata {
    pub fn start_command(&self) -> Option<&str> {
        self.environment.get(START_COMMAND).map(String::as_str)
    }

    pub fn start_path(&self) -> Option<&str> {
        self.environment.get(START_PATH).map(String::as_str)
    }

    pub fn has_dependency(&self, kind: &str, name: &str) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.kind == kind && d.name == name)
    }

    pub fn has_provision(&self, kind: &str, name: &str) -> bool {
        self.provides.iter().any(|p| p.kind == kind && p.name == name)
    }

    /// Apply one mutation in place. Returns `false` when the document already
    /// had the requested state (add of a present entry, remove of an absent one).
    pub fn apply(&mut self, mutation: &MetaMutation) -> bool {
        match mutation {
            MetaMutation::Environment { action, key, value } => match action {
                MetaAction::Add => {
                    let value = value.clone().unwrap_or_default();
                    self.environment.insert(key.clone(), value.clone()) != Some(value)
                }
                MetaAction::Remove => self.environment.remove(key).is_some(),
            },
            MetaMutation::Provides { action, kind, name } => {
                apply_resource(&mut self.provides, *action, Resource::new(kind, name))
            }
            MetaMutation::Dependencies { action, kind, name } => {
                apply_resource(&mut self.dependencies, *action, Resource::new(kind, name))
            }
            MetaMutation::Templates {
                action,
                path,
                left_delimiter,
                right_delimiter,
            } => {
                let template = Template::new(path).with_delimiters(left_delimiter, right_delimiter);
                let present = self.templates.contains(&template);
                match action {
                    MetaAction::Add if !present => {
                        self.templates.push(template);
                        true
                    }
                    MetaAction::Remove if present => {
                        self.templates.retain(|t| *t != template);
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}

fn apply_resource(list: &mut Vec<Resource>, action: MetaAction, entry: Resource) -> bool {
    let present = list.contains(&entry);
    match action {
        MetaAction::Add if !present => {
            list.push(entry);
            true
        }
        MetaAction::Remove if present => {
            list.retain(|r| *r != entry);
            true
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaAction {
    Add,
    Remove,
}

/// One change request against the metadata document.
///
/// Serialized as a flat object: `{"resource": "...", "action": "...", ...fields}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum MetaMutation {
    Environment {
        action: MetaAction,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Provides {
        action: MetaAction,
        #[serde(rename = "type")]
        kind: String,
        name: String,
    },
    Dependencies {
        action: MetaAction,
        #[serde(rename = "type")]
        kind: String,
        name: String,
    },
    Templates {
        action: MetaAction,
        path: String,
        left_delimiter: String,
        right_delimiter: String,
    },
}

impl MetaMutation {
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Environment { .. } => "environment",
            Self::Provides { .. } => "provides",
            Self::Dependencies { .. } => "dependencies",
            Self::Templates { .. } => "templates",
        }
    }

    pub fn action(&self) -> MetaAction {
        match self {
            Self::Environment { action, .. }
            | Self::Provides { action, .. }
            | Self::Dependencies { action, .. }
            | Self::Templates { action, .. } => *action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_categories_and_keeps_unknown_fields() {
        let doc: PackageMetadata = serde_json::from_value(json!({
            "environment": {"START_COMMAND": "./run", "START_PATH": "/app"},
            "provides": [{"type": "os", "name": "linux"}],
            "dependencies": [{"type": "runtime", "name": "ruby"}],
            "templates": [{"path": "config.yml"}],
            "package_id": "pkg-1234"
        }))
        .unwrap();

        assert_eq!(doc.start_command(), Some("./run"));
        assert_eq!(doc.start_path(), Some("/app"));
        assert!(doc.has_provision("os", "linux"));
        assert!(doc.has_dependency("runtime", "ruby"));
        assert!(!doc.has_dependency("runtime", "python"));
        assert_eq!(doc.templates[0].left_delimiter, "{{");
        assert_eq!(doc.templates[0].right_delimiter, "}}");
        assert_eq!(doc.extra.get("package_id"), Some(&json!("pkg-1234")));
    }

    #[test]
    fn missing_categories_default_to_empty() {
        let doc: PackageMetadata = serde_json::from_str("{}").unwrap();
        assert!(doc.environment.is_empty());
        assert!(doc.dependencies.is_empty());
        assert_eq!(doc.start_command(), None);
    }

    #[test]
    fn mutation_wire_shape_is_flat() {
        let m = MetaMutation::Dependencies {
            action: MetaAction::Add,
            kind: "os".to_owned(),
            name: "linux".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({"resource": "dependencies", "action": "add", "type": "os", "name": "linux"})
        );

        let m = MetaMutation::Environment {
            action: MetaAction::Remove,
            key: "TEST_VAR".to_owned(),
            value: None,
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            json!({"resource": "environment", "action": "remove", "key": "TEST_VAR"})
        );
        assert_eq!(m.resource(), "environment");
        assert_eq!(m.action(), MetaAction::Remove);
    }

    #[test]
    fn mutation_parses_from_wire() {
        let m: MetaMutation = serde_json::from_value(json!({
            "resource": "templates",
            "action": "remove",
            "path": "conf/app.tmpl",
            "left_delimiter": "<%",
            "right_delimiter": "%>"
        }))
        .unwrap();
        assert_eq!(
            m,
            MetaMutation::Templates {
                action: MetaAction::Remove,
                path: "conf/app.tmpl".to_owned(),
                left_delimiter: "<%".to_owned(),
                right_delimiter: "%>".to_owned(),
            }
        );
    }

    #[test]
    fn apply_is_idempotent_for_resources() {
        let mut doc = PackageMetadata::default();
        let add = MetaMutation::Provides {
            action: MetaAction::Add,
            kind: "os".to_owned(),
            name: "linux".to_owned(),
        };
        assert!(doc.apply(&add));
        assert!(!doc.apply(&add));
        assert_eq!(doc.provides.len(), 1);

        let remove = MetaMutation::Provides {
            action: MetaAction::Remove,
            kind: "os".to_owned(),
            name: "linux".to_owned(),
        };
        assert!(doc.apply(&remove));
        assert!(!doc.apply(&remove));
        assert!(doc.provides.is_empty());
    }

    #[test]
    fn apply_environment_overwrites_value() {
        let mut doc = PackageMetadata::default();
        let set = |value: &str| MetaMutation::Environment {
            action: MetaAction::Add,
            key: START_COMMAND.to_owned(),
            value: Some(value.to_owned()),
        };
        assert!(doc.apply(&set("./a")));
        assert!(!doc.apply(&set("./a")));
        assert!(doc.apply(&set("./b")));
        assert_eq!(doc.start_command(), Some("./b"));
    }

    #[test]
    fn apply_templates_matches_on_delimiters() {
        let mut doc = PackageMetadata::default();
        let add = MetaMutation::Templates {
            action: MetaAction::Add,
            path: "app.conf".to_owned(),
            left_delimiter: "{{".to_owned(),
            right_delimiter: "}}".to_owned(),
        };
        assert!(doc.apply(&add));

        let remove_other = MetaMutation::Templates {
            action: MetaAction::Remove,
            path: "app.conf".to_owned(),
            left_delimiter: "<%".to_owned(),
            right_delimiter: "%>".to_owned(),
        };
        assert!(!doc.apply(&remove_other));
        assert_eq!(doc.templates.len(), 1);
    }
}

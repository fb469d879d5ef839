use std::{collections::BTreeMap, fmt};

use nodescan_repository::TargetConfiguration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

pub const RELEASE_PUBLISH_TARGET: &str = "nx-release-publish";

const RUN_SCRIPT_EXECUTOR: &str = "nx:run-script";
const RELEASE_PUBLISH_EXECUTOR: &str = "@nx/js:release-publish";
const RUN_COMMANDS_EXECUTOR: &str = "nx:run-commands";
const NOOP_EXECUTOR: &str = "nx:noop";

/// Identifier of the executor that runs a target. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Executor(String);

impl Executor {
    pub fn new(id: impl Into<String>) -> Result<Self, Error> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::EmptyExecutor);
        }
        Ok(Self(id))
    }

    pub fn run_script() -> Self {
        Self(RUN_SCRIPT_EXECUTOR.to_string())
    }

    pub fn release_publish() -> Self {
        Self(RELEASE_PUBLISH_EXECUTOR.to_string())
    }

    pub fn run_commands() -> Self {
        Self(RUN_COMMANDS_EXECUTOR.to_string())
    }

    pub fn noop() -> Self {
        Self(NOOP_EXECUTOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Executor {
    type Error = Error;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<Executor> for String {
    fn from(executor: Executor) -> Self {
        executor.0
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized runnable target of a project node.
// Fields are declared in alphabetical order so serialized output has sorted
// keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configurations: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    pub executor: Executor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

impl TargetDefinition {
    pub fn new(executor: Executor) -> Self {
        Self {
            cache: None,
            configurations: None,
            depends_on: None,
            executor,
            inputs: None,
            metadata: None,
            options: Map::new(),
            outputs: None,
        }
    }

    /// A target running the package script `script`.
    pub fn run_script(script: &str, command: &str, run_command: String) -> Self {
        let mut options = Map::new();
        options.insert("script".to_string(), Value::from(script));
        let mut metadata = Map::new();
        metadata.insert("runCommand".to_string(), Value::from(run_command));
        metadata.insert("scriptContent".to_string(), Value::from(command));
        Self {
            metadata: Some(metadata),
            options,
            ..Self::new(Executor::run_script())
        }
    }

    /// The publish target every package gets, running after the same target
    /// in each of its dependencies.
    pub fn release_publish() -> Self {
        Self {
            depends_on: Some(vec![format!("^{RELEASE_PUBLISH_TARGET}")]),
            ..Self::new(Executor::release_publish())
        }
    }

    /// Builds a target from a hand-written declaration.
    ///
    /// A declaration with a `command` and no executor runs that command. One
    /// with neither does nothing by itself and only exists to carry
    /// dependencies.
    pub fn from_declared(declared: &TargetConfiguration) -> Result<Self, Error> {
        let mut options = declared.options.clone().unwrap_or_default();
        let executor = match (&declared.executor, &declared.command) {
            (Some(executor), _) => Executor::new(executor.as_str())?,
            (None, Some(command)) => {
                options.insert("command".to_string(), Value::from(command.as_str()));
                Executor::run_commands()
            }
            (None, None) => Executor::noop(),
        };
        Ok(Self {
            cache: declared.cache,
            configurations: declared.configurations.clone(),
            depends_on: declared.depends_on.clone(),
            executor,
            inputs: declared.inputs.clone(),
            metadata: declared.metadata.clone().map(sorted),
            options: sorted(options),
            outputs: declared.outputs.clone(),
        })
    }

    /// Layers the fields of `overrides` onto an inferred target. The executor
    /// is kept. Options and metadata are merged key by key, with the keys this
    /// target already has taking precedence.
    pub fn apply_overrides(&mut self, overrides: &TargetConfiguration) {
        if let Some(outputs) = &overrides.outputs {
            self.outputs = Some(outputs.clone());
        }
        if let Some(depends_on) = &overrides.depends_on {
            self.depends_on = Some(depends_on.clone());
        }
        if let Some(inputs) = &overrides.inputs {
            self.inputs = Some(inputs.clone());
        }
        if let Some(cache) = overrides.cache {
            self.cache = Some(cache);
        }
        if let Some(configurations) = &overrides.configurations {
            self.configurations = Some(configurations.clone());
        }
        if let Some(options) = &overrides.options {
            let mut merged = options.clone();
            merged.extend(std::mem::take(&mut self.options));
            self.options = sorted(merged);
        }
        if let Some(metadata) = &overrides.metadata {
            let mut merged = metadata.clone();
            merged.extend(self.metadata.take().unwrap_or_default());
            self.metadata = Some(sorted(merged));
        }
    }
}

// Maps keep insertion order, re-key them so serialized output is sorted.
fn sorted(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .collect::<BTreeMap<_, _>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn declared(value: Value) -> TargetConfiguration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_run_script_shape() {
        let target = TargetDefinition::run_script("build", "tsc", "npm run build".into());
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({
                "executor": "nx:run-script",
                "metadata": {
                    "runCommand": "npm run build",
                    "scriptContent": "tsc",
                },
                "options": {"script": "build"},
            })
        );
    }

    #[test]
    fn test_release_publish_shape() {
        assert_eq!(
            serde_json::to_value(TargetDefinition::release_publish()).unwrap(),
            json!({
                "dependsOn": ["^nx-release-publish"],
                "executor": "@nx/js:release-publish",
                "options": {},
            })
        );
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "whitespace")]
    fn test_empty_executor_rejected(id: &str) {
        assert!(matches!(Executor::new(id), Err(Error::EmptyExecutor)));
        assert!(serde_json::from_value::<TargetDefinition>(json!({"executor": id})).is_err());
    }

    #[test]
    fn test_overrides() {
        let mut target = TargetDefinition::run_script("build", "tsc", "npm run build".into());
        target.apply_overrides(&declared(json!({
            "executor": "ignored",
            "outputs": ["{projectRoot}/dist"],
            "dependsOn": ["^build"],
            "inputs": ["production"],
            "cache": true,
            "options": {"script": "other", "args": ["--verbose"]},
            "metadata": {"description": "compile", "scriptContent": "ignored"},
        })));

        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({
                "cache": true,
                "dependsOn": ["^build"],
                "executor": "nx:run-script",
                "inputs": ["production"],
                "metadata": {
                    "description": "compile",
                    "runCommand": "npm run build",
                    "scriptContent": "tsc",
                },
                "options": {"args": ["--verbose"], "script": "build"},
                "outputs": ["{projectRoot}/dist"],
            })
        );
    }

    #[test]
    fn test_merged_keys_are_sorted() {
        let mut target = TargetDefinition::run_script("build", "tsc", "npm run build".into());
        target.apply_overrides(&declared(json!({
            "options": {"watch": false, "cwd": "src"},
            "metadata": {"description": "compile"},
        })));
        let serialized = serde_json::to_string(&target).unwrap();
        assert_eq!(
            serialized,
            concat!(
                r#"{"executor":"nx:run-script","#,
                r#""metadata":{"description":"compile","runCommand":"npm run build","scriptContent":"tsc"},"#,
                r#""options":{"cwd":"src","script":"build","watch":false}}"#
            )
        );

        let lint = TargetDefinition::from_declared(&declared(json!({
            "command": "eslint .",
            "options": {"fix": true},
        })))
        .unwrap();
        assert_eq!(
            serde_json::to_string(&lint.options).unwrap(),
            r#"{"command":"eslint .","fix":true}"#
        );
    }

    #[test]
    fn test_outputs_only_override() {
        let mut target = TargetDefinition::run_script("build", "tsc", "npm run build".into());
        let expected = TargetDefinition {
            outputs: Some(vec!["{projectRoot}/dist".to_string()]),
            ..target.clone()
        };
        target.apply_overrides(&declared(json!({"outputs": ["{projectRoot}/dist"]})));
        assert_eq!(target, expected);
    }

    #[test_case(json!({"command": "echo hi"}), json!({"executor": "nx:run-commands", "options": {"command": "echo hi"}}) ; "command shorthand")]
    #[test_case(json!({"dependsOn": ["build"]}), json!({"dependsOn": ["build"], "executor": "nx:noop", "options": {}}) ; "no executor")]
    #[test_case(
        json!({"executor": "@nx/js:tsc", "command": "unused", "options": {"main": "src/index.ts"}}),
        json!({"executor": "@nx/js:tsc", "options": {"main": "src/index.ts"}})
        ; "explicit executor"
    )]
    fn test_from_declared(input: Value, expected: Value) {
        let target = TargetDefinition::from_declared(&declared(input)).unwrap();
        assert_eq!(serde_json::to_value(target).unwrap(), expected);
    }

    #[test]
    fn test_from_declared_empty_executor() {
        assert!(matches!(
            TargetDefinition::from_declared(&declared(json!({"executor": ""}))),
            Err(Error::EmptyExecutor)
        ));
    }
}

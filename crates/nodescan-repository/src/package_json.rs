use std::collections::BTreeMap;

use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::target::TargetConfiguration;

pub const PACKAGE_JSON: &str = "package.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
    /// Script order is preserved, it decides the order of the inferred
    /// target group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<IndexMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Workspaces>,
    // Unstructured fields kept for round trip capabilities
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// The `workspaces` field accepts both the array form used by npm and bun
/// and the object form used by yarn.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(untagged)]
pub enum Workspaces {
    TopLevel(Vec<String>),
    Nested {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl From<Workspaces> for Vec<String> {
    fn from(value: Workspaces) -> Self {
        match value {
            Workspaces::TopLevel(packages) => packages,
            Workspaces::Nested { packages } => packages,
        }
    }
}

/// The tool section of a package.json, e.g. `"nx": { ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included_scripts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<IndexMap<String, TargetConfiguration>>,
}

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("unable to parse package.json: {0}")]
    #[diagnostic(code(package_json_parse_error))]
    Json(#[from] serde_json::Error),
    #[error("invalid \"{key}\" section in package.json: {err}")]
    #[diagnostic(code(package_json_tool_config_error))]
    ToolConfig {
        key: String,
        #[source]
        err: serde_json::Error,
    },
}

impl PackageJson {
    pub fn load_from_str(contents: &str, path: &str) -> Result<PackageJson, Error> {
        tracing::trace!("parsing package.json from {}", path);
        Ok(serde_json::from_str(contents)?)
    }

    // Utility method for easy construction of package.json during testing
    pub fn from_value(value: serde_json::Value) -> Result<PackageJson, Error> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reads the tool section stored under `key`. Absent sections are
    /// `Ok(None)`, malformed ones are an error.
    pub fn tool_config(&self, key: &str) -> Result<Option<ToolConfig>, Error> {
        self.other
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|err| Error::ToolConfig {
                    key: key.to_string(),
                    err,
                })
            })
            .transpose()
    }
}

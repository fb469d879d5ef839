use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use nodescan_fs::FileSystem;
use serde::{Deserialize, Serialize};

use crate::target::TargetConfiguration;

pub const PROJECT_JSON: &str = "project.json";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Application,
    #[default]
    Library,
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectType::Application => write!(f, "application"),
            ProjectType::Library => write!(f, "library"),
        }
    }
}

/// Explicit, hand-authored project configuration living next to a
/// package.json.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_type: Option<ProjectType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<IndexMap<String, TargetConfiguration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implicit_dependencies: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] nodescan_fs::Error),
    #[error("unable to parse {path}: {err}")]
    #[diagnostic(code(project_json_parse_error))]
    Json {
        path: Utf8PathBuf,
        #[source]
        err: serde_json::Error,
    },
}

impl ProjectJson {
    /// Loads the file at `path`. A missing file is `Ok(None)`.
    pub fn load(fs: &dyn FileSystem, path: &Utf8Path) -> Result<Option<ProjectJson>, Error> {
        let Some(contents) = fs.read_optional(path)? else {
            return Ok(None);
        };
        tracing::trace!("loading project configuration from {}", path);
        Self::load_from_str(&contents, path).map(Some)
    }

    pub fn load_from_str(contents: &str, path: &Utf8Path) -> Result<ProjectJson, Error> {
        serde_json::from_str(contents).map_err(|err| Error::Json {
            path: path.to_owned(),
            err,
        })
    }

    pub fn declares_target(&self, name: &str) -> bool {
        self.targets
            .as_ref()
            .map_or(false, |targets| targets.contains_key(name))
    }
}

#[cfg(test)]
mod test {
    use nodescan_fs::MemoryFileSystem;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_missing_file() {
        let fs = MemoryFileSystem::new();
        assert_eq!(
            ProjectJson::load(&fs, Utf8Path::new("/root/project.json")).unwrap(),
            None
        );
    }

    #[test]
    fn test_declared_targets() {
        let fs = MemoryFileSystem::from_files(
            "/root",
            [(
                "packages/a/project.json",
                r#"{"targets": {"build": {"command": "echo \"build from project.json\""}}}"#,
            )],
        );
        let project = ProjectJson::load(&fs, Utf8Path::new("/root/packages/a/project.json"))
            .unwrap()
            .unwrap();
        assert!(project.declares_target("build"));
        assert!(!project.declares_target("test"));
    }

    #[test]
    fn test_project_type() {
        let project = ProjectJson::load_from_str(
            r#"{"projectType": "application"}"#,
            Utf8Path::new("project.json"),
        )
        .unwrap();
        assert_eq!(project.project_type, Some(ProjectType::Application));
        assert_eq!(ProjectType::default().to_string(), "library");
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            ProjectJson::load_from_str("{", Utf8Path::new("project.json")),
            Err(Error::Json { .. })
        ));
    }
}

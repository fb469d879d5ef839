use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use miette::Diagnostic;
use nodescan_fs::FileSystem;

use crate::{
    package_json::{self, PackageJson},
    target::TargetConfiguration,
};

/// The parts of a package.json that project inference reads.
///
/// Optional fields keep the difference between "absent" and "empty": an
/// absent `included_scripts` means every script is inferred, an empty one
/// means none are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectManifest {
    pub name: Option<String>,
    pub scripts: Option<IndexMap<String, String>>,
    pub declared_targets: Option<IndexMap<String, TargetConfiguration>>,
    pub implicit_dependencies: Option<Vec<String>>,
    pub included_scripts: Option<Vec<String>>,
}

/// Why a candidate file did not produce a manifest. None of these abort a
/// scan; callers skip the file.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum NotAManifest {
    #[error("unable to read {path}: {err}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        err: nodescan_fs::Error,
    },
    #[error("unable to parse {path}: {err}")]
    #[diagnostic(code(manifest_parse_error))]
    Malformed {
        path: Utf8PathBuf,
        #[source]
        err: package_json::Error,
    },
    #[error("{path} has neither a name nor any scripts")]
    Anonymous {
        path: Utf8PathBuf,
        manifest: Box<ProjectManifest>,
    },
}

impl NotAManifest {
    /// Recovers the parsed manifest of a file that only lacked an identity.
    /// Any other failure is handed back.
    pub fn into_anonymous(self) -> Result<ProjectManifest, NotAManifest> {
        match self {
            NotAManifest::Anonymous { manifest, .. } => Ok(*manifest),
            err => Err(err),
        }
    }
}

impl ProjectManifest {
    /// Reads and parses the package.json at `path`. The tool section is
    /// looked up under `manifest_key`.
    pub fn load(
        fs: &dyn FileSystem,
        path: &Utf8Path,
        manifest_key: &str,
    ) -> Result<ProjectManifest, NotAManifest> {
        tracing::trace!("loading manifest from {}", path);
        let contents = fs
            .read_to_string(path)
            .map_err(|err| NotAManifest::Unreadable {
                path: path.to_owned(),
                err,
            })?;
        let malformed = |err| NotAManifest::Malformed {
            path: path.to_owned(),
            err,
        };
        let package_json = PackageJson::load_from_str(&contents, path.as_str()).map_err(malformed)?;
        let manifest = Self::from_package_json(package_json, manifest_key).map_err(malformed)?;

        if !manifest.has_identity() {
            return Err(NotAManifest::Anonymous {
                path: path.to_owned(),
                manifest: Box::new(manifest),
            });
        }
        Ok(manifest)
    }

    pub fn from_package_json(
        package_json: PackageJson,
        manifest_key: &str,
    ) -> Result<ProjectManifest, package_json::Error> {
        let tool = package_json.tool_config(manifest_key)?.unwrap_or_default();
        Ok(ProjectManifest {
            name: package_json.name,
            scripts: package_json.scripts,
            declared_targets: tool.targets,
            implicit_dependencies: tool.implicit_dependencies,
            included_scripts: tool.included_scripts,
        })
    }

    /// A manifest is identifiable when it has a name or at least one
    /// script.
    pub fn has_identity(&self) -> bool {
        self.name.is_some() || self.scripts.as_ref().map_or(false, |s| !s.is_empty())
    }

    pub fn scripts(&self) -> impl Iterator<Item = (&str, &str)> {
        self.scripts
            .iter()
            .flatten()
            .map(|(name, command)| (name.as_str(), command.as_str()))
    }

    pub fn declared_target(&self, name: &str) -> Option<&TargetConfiguration> {
        self.declared_targets.as_ref()?.get(name)
    }

    /// Whether `script` passes the `includedScripts` allow-list.
    pub fn includes_script(&self, script: &str) -> bool {
        match &self.included_scripts {
            Some(included) => included.iter().any(|s| s == script),
            None => true,
        }
    }
}

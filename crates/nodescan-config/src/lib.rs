mod env;
mod file;

use std::{collections::HashMap, ffi::OsString};

use camino::{Utf8Path, Utf8PathBuf};
use derive_setters::Setters;
use env::EnvVars;
use file::ConfigFile;
use merge::Merge;
use miette::Diagnostic;
use nodescan_fs::FileSystem;
use nodescan_repository::PackageManager;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MANIFEST_KEY: &str = "nx";
pub const DEFAULT_SIBLING_CONFIG_FILE: &str = "project.json";

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Encountered an I/O error while attempting to read {config_path}: {error}")]
    FailedToReadConfig {
        config_path: Utf8PathBuf,
        #[source]
        error: nodescan_fs::Error,
    },
    #[error("unable to parse {config_path}: {error}")]
    #[diagnostic(code(config_parse_error))]
    ParseConfig {
        config_path: Utf8PathBuf,
        #[source]
        error: serde_json::Error,
    },
    #[error("Environment variable {0} is not valid UTF-8.")]
    Encoding(String),
    #[error("NODESCAN_PARALLEL should be either 1, 0, true or false. Received {0}.")]
    InvalidParallel(String),
    #[error(transparent)]
    #[diagnostic(transparent)]
    PackageManager(#[from] nodescan_repository::package_manager::Error),
}

// Fields are all optional so that sources can be layered with `merge`.
// Use the getters below to read values with their defaults applied.
#[derive(Deserialize, Default, Debug, PartialEq, Eq, Clone, Merge, Setters)]
#[serde(rename_all = "camelCase")]
#[setters(
    prefix = "with_",
    generate_delegates(ty = "NodescanConfigBuilder", field = "override_config")
)]
pub struct ConfigurationOptions {
    /// corresponds to env var NODESCAN_PACKAGE_MANAGER
    pub package_manager: Option<PackageManager>,
    /// key inside package.json holding per-project tool configuration
    pub manifest_key: Option<String>,
    pub sibling_config_file: Option<String>,
    pub parallel: Option<bool>,
}

#[derive(Debug, Default)]
pub struct NodescanConfigBuilder {
    repo_root: Utf8PathBuf,
    override_config: ConfigurationOptions,
    environment: Option<HashMap<OsString, OsString>>,
}

// Getters
impl ConfigurationOptions {
    /// Explicitly configured package manager. Detection from the workspace
    /// happens at scan time when this is unset.
    pub fn package_manager(&self) -> Option<PackageManager> {
        self.package_manager
    }

    pub fn manifest_key(&self) -> &str {
        non_empty_str(self.manifest_key.as_deref()).unwrap_or(DEFAULT_MANIFEST_KEY)
    }

    pub fn sibling_config_file(&self) -> &str {
        non_empty_str(self.sibling_config_file.as_deref()).unwrap_or(DEFAULT_SIBLING_CONFIG_FILE)
    }

    pub fn parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }
}

fn non_empty_str(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

pub(crate) trait ResolvedConfigurationOptions {
    fn get_configuration_options(
        &self,
        fs: &dyn FileSystem,
    ) -> Result<ConfigurationOptions, Error>;
}

impl<'a> ResolvedConfigurationOptions for &'a ConfigurationOptions {
    fn get_configuration_options(
        &self,
        _fs: &dyn FileSystem,
    ) -> Result<ConfigurationOptions, Error> {
        Ok((*self).clone())
    }
}

fn get_lowercased_env_vars() -> HashMap<OsString, OsString> {
    std::env::vars_os()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}

impl NodescanConfigBuilder {
    pub fn new(repo_root: &Utf8Path) -> Self {
        Self {
            repo_root: repo_root.to_owned(),
            override_config: Default::default(),
            environment: None,
        }
    }

    /// Replaces the process environment. Keys are matched case-insensitively.
    pub fn with_environment(mut self, environment: HashMap<OsString, OsString>) -> Self {
        self.environment = Some(
            environment
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
        );
        self
    }

    fn get_environment(&self) -> HashMap<OsString, OsString> {
        self.environment
            .clone()
            .unwrap_or_else(get_lowercased_env_vars)
    }

    pub fn build(&self, fs: &dyn FileSystem) -> Result<ConfigurationOptions, Error> {
        // Priority, from least significant to most significant:
        // - shared configuration (nodescan.json)
        // - local configuration (<REPO_ROOT>/.nodescan/config.json)
        // - environment variables
        // - builder overrides, usually coming from CLI arguments
        let shared_config = ConfigFile::shared_config(&self.repo_root);
        let local_config = ConfigFile::local_config(&self.repo_root);
        let env_var_config = EnvVars::new(&self.get_environment())?;

        // These are ordered from highest to lowest priority
        let sources: [Box<dyn ResolvedConfigurationOptions>; 4] = [
            Box::new(&self.override_config),
            Box::new(env_var_config),
            Box::new(local_config),
            Box::new(shared_config),
        ];

        let config = sources.into_iter().try_fold(
            ConfigurationOptions::default(),
            |mut acc, current_source| {
                let current_source_config = current_source.get_configuration_options(fs)?;
                acc.merge(current_source_config);
                Ok(acc)
            },
        );

        tracing::debug!("resolved configuration: {:?}", config);

        #[allow(clippy::let_and_return)]
        config
    }
}

#[cfg(test)]
mod test {
    use nodescan_fs::MemoryFileSystem;
    use pretty_assertions::assert_eq;

    use super::*;

    fn builder(env: &[(&str, &str)]) -> NodescanConfigBuilder {
        NodescanConfigBuilder::new(Utf8Path::new("/repo")).with_environment(
            env.iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v)))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let fs = MemoryFileSystem::new();
        let config = builder(&[]).build(&fs).unwrap();
        assert_eq!(config, ConfigurationOptions::default());
        assert_eq!(config.package_manager(), None);
        assert_eq!(config.manifest_key(), "nx");
        assert_eq!(config.sibling_config_file(), "project.json");
        assert!(config.parallel());
    }

    #[test]
    fn test_empty_strings_fall_back_to_defaults() {
        let config = ConfigurationOptions::default()
            .with_manifest_key(Some(String::new()))
            .with_sibling_config_file(Some(String::new()));
        assert_eq!(config.manifest_key(), "nx");
        assert_eq!(config.sibling_config_file(), "project.json");
    }

    #[test]
    fn test_priority() {
        let fs = MemoryFileSystem::from_files(
            "/repo",
            [
                (
                    "nodescan.json",
                    r#"{"packageManager": "yarn", "manifestKey": "shared", "siblingConfigFile": "workspace.json", "parallel": false}"#,
                ),
                (
                    ".nodescan/config.json",
                    r#"{"packageManager": "pnpm", "manifestKey": "local"}"#,
                ),
            ],
        );
        let config = builder(&[("NODESCAN_MANIFEST_KEY", "from-env")])
            .with_package_manager(Some(PackageManager::Bun))
            .build(&fs)
            .unwrap();

        assert_eq!(config.package_manager(), Some(PackageManager::Bun));
        assert_eq!(config.manifest_key(), "from-env");
        assert_eq!(config.sibling_config_file(), "workspace.json");
        assert!(!config.parallel());
    }

    #[test]
    fn test_local_config_beats_shared() {
        let fs = MemoryFileSystem::from_files(
            "/repo",
            [
                ("nodescan.json", r#"{"packageManager": "yarn"}"#),
                (".nodescan/config.json", r#"{"packageManager": "pnpm"}"#),
            ],
        );
        let config = builder(&[]).build(&fs).unwrap();
        assert_eq!(config.package_manager(), Some(PackageManager::Pnpm));
    }

    #[test]
    fn test_empty_config_file_is_ignored() {
        let fs = MemoryFileSystem::from_files("/repo", [(".nodescan/config.json", "")]);
        let config = builder(&[]).build(&fs).unwrap();
        assert_eq!(config, ConfigurationOptions::default());
    }

    #[test]
    fn test_malformed_config_file() {
        let fs = MemoryFileSystem::from_files("/repo", [("nodescan.json", "{")]);
        let err = builder(&[]).build(&fs).unwrap_err();
        assert!(matches!(err, Error::ParseConfig { config_path, .. } if config_path == "/repo/nodescan.json"));
    }

    #[test]
    fn test_invalid_package_manager_in_file() {
        let fs = MemoryFileSystem::from_files(
            "/repo",
            [(".nodescan/config.json", r#"{"packageManager": "cargo"}"#)],
        );
        assert!(matches!(
            builder(&[]).build(&fs),
            Err(Error::ParseConfig { .. })
        ));
    }
}

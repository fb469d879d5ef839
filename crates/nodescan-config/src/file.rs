use camino::{Utf8Path, Utf8PathBuf};
use nodescan_fs::FileSystem;

use crate::{ConfigurationOptions, Error, ResolvedConfigurationOptions};

pub struct ConfigFile {
    path: Utf8PathBuf,
}

impl ConfigFile {
    pub fn local_config(repo_root: &Utf8Path) -> Self {
        let path = repo_root.join(".nodescan").join("config.json");
        Self { path }
    }

    pub fn shared_config(repo_root: &Utf8Path) -> Self {
        let path = repo_root.join("nodescan.json");
        Self { path }
    }
}

impl ResolvedConfigurationOptions for ConfigFile {
    fn get_configuration_options(
        &self,
        fs: &dyn FileSystem,
    ) -> Result<ConfigurationOptions, Error> {
        let contents = fs
            .read_optional(&self.path)
            .map_err(|error| Error::FailedToReadConfig {
                config_path: self.path.clone(),
                error,
            })?
            .filter(|s| !s.trim().is_empty());

        let Some(contents) = contents else {
            return Ok(ConfigurationOptions::default());
        };
        tracing::trace!("reading configuration from {}", self.path);
        serde_json::from_str(&contents).map_err(|error| Error::ParseConfig {
            config_path: self.path.clone(),
            error,
        })
    }
}

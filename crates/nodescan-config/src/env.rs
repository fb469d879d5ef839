use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
};

use nodescan_fs::FileSystem;

use crate::{ConfigurationOptions, Error, ResolvedConfigurationOptions};

const NODESCAN_MAPPING: &[(&str, &str)] = [
    ("nodescan_package_manager", "package_manager"),
    ("nodescan_manifest_key", "manifest_key"),
    ("nodescan_sibling_config_file", "sibling_config_file"),
    ("nodescan_parallel", "parallel"),
]
.as_slice();

pub struct EnvVars {
    output_map: HashMap<&'static str, String>,
}

impl EnvVars {
    pub fn new(environment: &HashMap<OsString, OsString>) -> Result<Self, Error> {
        let output_map = map_environment(NODESCAN_MAPPING, environment)?;
        Ok(Self { output_map })
    }

    fn non_empty(&self, key: &str) -> Option<&str> {
        self.output_map
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }
}

impl ResolvedConfigurationOptions for EnvVars {
    fn get_configuration_options(
        &self,
        _fs: &dyn FileSystem,
    ) -> Result<ConfigurationOptions, Error> {
        let parallel = self
            .non_empty("parallel")
            .map(|value| truth_env_var(value).ok_or_else(|| Error::InvalidParallel(value.into())))
            .transpose()?;

        let package_manager = self
            .non_empty("package_manager")
            .map(|value| value.parse())
            .transpose()?;

        Ok(ConfigurationOptions {
            package_manager,
            manifest_key: self.non_empty("manifest_key").map(String::from),
            sibling_config_file: self.non_empty("sibling_config_file").map(String::from),
            parallel,
        })
    }
}

pub fn truth_env_var(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn map_environment(
    // keys are environment variable names, values are the
    // ConfigurationOptions properties they populate
    mapping: &[(&str, &'static str)],
    environment: &HashMap<OsString, OsString>,
) -> Result<HashMap<&'static str, String>, Error> {
    let mut output_map = HashMap::new();
    for (mapping_key, mapped_property) in mapping {
        if let Some(value) = environment.get(OsStr::new(mapping_key)) {
            let converted = value
                .to_str()
                .ok_or_else(|| Error::Encoding(mapping_key.to_ascii_uppercase()))?;
            output_map.insert(*mapped_property, converted.to_owned());
        }
    }
    Ok(output_map)
}

#[cfg(test)]
mod test {
    use nodescan_fs::MemoryFileSystem;
    use nodescan_repository::PackageManager;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> HashMap<OsString, OsString> {
        vars.iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect()
    }

    #[test]
    fn test_env_setting() {
        let vars = env(&[
            ("nodescan_package_manager", "PNPM"),
            ("nodescan_manifest_key", "workspace"),
            ("nodescan_sibling_config_file", "workspace.json"),
            ("nodescan_parallel", "0"),
            ("unrelated", "value"),
        ]);
        let config = EnvVars::new(&vars)
            .unwrap()
            .get_configuration_options(&MemoryFileSystem::new())
            .unwrap();
        assert_eq!(
            config,
            ConfigurationOptions {
                package_manager: Some(PackageManager::Pnpm),
                manifest_key: Some("workspace".into()),
                sibling_config_file: Some("workspace.json".into()),
                parallel: Some(false),
            }
        );
    }

    #[test]
    fn test_empty_values_are_unset() {
        let vars = env(&[("nodescan_manifest_key", ""), ("nodescan_parallel", "")]);
        let config = EnvVars::new(&vars)
            .unwrap()
            .get_configuration_options(&MemoryFileSystem::new())
            .unwrap();
        assert_eq!(config, ConfigurationOptions::default());
    }

    #[test]
    fn test_invalid_parallel() {
        let vars = env(&[("nodescan_parallel", "sometimes")]);
        let result = EnvVars::new(&vars)
            .unwrap()
            .get_configuration_options(&MemoryFileSystem::new());
        assert!(matches!(result, Err(Error::InvalidParallel(v)) if v == "sometimes"));
    }

    #[test]
    fn test_unknown_package_manager() {
        let vars = env(&[("nodescan_package_manager", "cargo")]);
        let result = EnvVars::new(&vars)
            .unwrap()
            .get_configuration_options(&MemoryFileSystem::new());
        assert!(matches!(result, Err(Error::PackageManager(_))));
    }

    #[test_case("true", Some(true) ; "true")]
    #[test_case("1", Some(true) ; "one")]
    #[test_case("TRUE", Some(true) ; "uppercase")]
    #[test_case("false", Some(false) ; "false")]
    #[test_case("0", Some(false) ; "zero")]
    #[test_case("yes", None ; "unrecognized")]
    fn test_truth_env_var(input: &str, expected: Option<bool>) {
        assert_eq!(truth_env_var(input), expected);
    }
}

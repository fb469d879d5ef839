use std::{fmt, str::FromStr};

use camino::Utf8Path;
use itertools::Itertools as _;
use miette::Diagnostic;
use nodescan_fs::FileSystem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::package_json::PackageJson;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())
    }
}

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error(
        "We could not parse the packageManager field in package.json, expected: {0}, received: {1}"
    )]
    #[diagnostic(code(invalid_package_manager))]
    InvalidPackageManager(String, String),
    #[error("unknown package manager \"{0}\", expected one of: npm, pnpm, yarn, bun")]
    UnknownPackageManager(String),
}

impl FromStr for PackageManager {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npm" => Ok(PackageManager::Npm),
            "pnpm" => Ok(PackageManager::Pnpm),
            "yarn" => Ok(PackageManager::Yarn),
            "bun" => Ok(PackageManager::Bun),
            _ => Err(Error::UnknownPackageManager(s.to_string())),
        }
    }
}

static PACKAGE_MANAGER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<manager>bun|npm|pnpm|yarn)@(?P<version>\d+\.\d+\.\d+(-.+)?)")
        .expect("package manager pattern is valid")
});

impl PackageManager {
    /// Detection order when several lockfiles are present.
    pub const ALL: [PackageManager; 4] = [
        PackageManager::Npm,
        PackageManager::Pnpm,
        PackageManager::Yarn,
        PackageManager::Bun,
    ];

    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// The command line that runs `script` through this package manager.
    pub fn run_command(&self, script: &str) -> String {
        format!("{} run {}", self.command(), script)
    }

    pub fn lockfile_name(&self) -> &'static str {
        match self {
            PackageManager::Npm => "package-lock.json",
            PackageManager::Pnpm => "pnpm-lock.yaml",
            PackageManager::Yarn => "yarn.lock",
            PackageManager::Bun => "bun.lockb",
        }
    }

    /// Picks the package manager for a workspace: the `packageManager`
    /// field of the root package.json first, then lockfiles, then npm.
    pub fn get_package_manager(
        fs: &dyn FileSystem,
        repo_root: &Utf8Path,
        root_package_json: Option<&PackageJson>,
    ) -> Self {
        // We don't surface errors for `read_package_manager` as we can fall back to
        // `detect_package_manager`
        if let Some(package_json) = root_package_json {
            match Self::read_package_manager(package_json) {
                Ok(Some(package_manager)) => return package_manager,
                Ok(None) => {}
                Err(e) => debug!("{}", e),
            }
        }

        Self::detect_package_manager(fs, repo_root).unwrap_or_default()
    }

    // Attempts to read the package manager from the package.json
    pub fn read_package_manager(pkg: &PackageJson) -> Result<Option<Self>, Error> {
        let Some(package_manager) = &pkg.package_manager else {
            return Ok(None);
        };

        let (manager, _version) = Self::parse_package_manager_string(package_manager)?;
        manager.parse().map(Some)
    }

    /// Looks for lockfiles in `repo_root`.
    pub fn detect_package_manager(fs: &dyn FileSystem, repo_root: &Utf8Path) -> Option<Self> {
        let detected = Self::ALL
            .into_iter()
            .filter(|manager| fs.exists(&repo_root.join(manager.lockfile_name())))
            .collect::<Vec<_>>();

        if detected.len() > 1 {
            warn!(
                "found lockfiles for multiple package managers ({}), using {}",
                detected.iter().join(", "),
                detected[0]
            );
        }
        detected.first().copied()
    }

    pub(crate) fn parse_package_manager_string(manager: &str) -> Result<(&str, &str), Error> {
        let invalid = || {
            Error::InvalidPackageManager(
                PACKAGE_MANAGER_PATTERN.to_string(),
                manager.to_string(),
            )
        };
        let captures = PACKAGE_MANAGER_PATTERN
            .captures(manager)
            .ok_or_else(invalid)?;
        let name = captures.name("manager").ok_or_else(invalid)?.as_str();
        let version = captures.name("version").ok_or_else(invalid)?.as_str();
        Ok((name, version))
    }
}

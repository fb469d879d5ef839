//! Workspace scope: which package.json files take part in inference.
//!
//! Patterns come from up to three declaration files in the workspace root.
//! Each is an ordered list of globs, optionally prefixed with `!`. For a
//! candidate path the last pattern that matches decides, so ordering matters
//! and a positive pattern can re-include what an earlier negation excluded.

use std::fmt;

use camino::Utf8Path;
use itertools::Itertools as _;
use miette::Diagnostic;
use nodescan_fs::FileSystem;
use serde::Deserialize;
use tracing::{debug, warn};
use wax::{Glob, Pattern as _};

use crate::package_json::{Workspaces, PACKAGE_JSON};

pub const PNPM_WORKSPACE: &str = "pnpm-workspace.yaml";
pub const LERNA_JSON: &str = "lerna.json";

/// Used when a lerna.json does not list its packages.
const DEFAULT_LERNA_PACKAGES: &[&str] = &["packages/*"];

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("invalid workspace glob \"{pattern}\" in {declared_in}: {err}")]
    #[diagnostic(code(workspace_glob_error))]
    Glob {
        pattern: String,
        declared_in: String,
        #[source]
        err: Box<wax::BuildError>,
    },
    #[error("unable to read {file}: {err}")]
    Io {
        file: &'static str,
        #[source]
        err: nodescan_fs::Error,
    },
    #[error("json parsing error in {file}: {err}")]
    ParsingJson {
        file: &'static str,
        #[source]
        err: serde_json::Error,
    },
    #[error("yaml parsing error in {file}: {err}")]
    ParsingYaml {
        file: &'static str,
        #[source]
        err: serde_yaml::Error,
    },
}

/// A file that can declare workspace patterns, in the order they are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSource {
    /// The `workspaces` field of the root package.json.
    PackageJsonWorkspaces,
    /// The `packages` list of pnpm-workspace.yaml.
    PnpmWorkspace,
    /// The `packages` list of lerna.json.
    LernaJson,
}

impl PatternSource {
    pub const ALL: [PatternSource; 3] = [
        PatternSource::PackageJsonWorkspaces,
        PatternSource::PnpmWorkspace,
        PatternSource::LernaJson,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            PatternSource::PackageJsonWorkspaces => PACKAGE_JSON,
            PatternSource::PnpmWorkspace => PNPM_WORKSPACE,
            PatternSource::LernaJson => LERNA_JSON,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackageJsonWorkspaces {
    workspaces: Option<Workspaces>,
}

#[derive(Debug, Default, Deserialize)]
struct PnpmWorkspace {
    #[serde(default)]
    packages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LernaJson {
    packages: Option<Vec<String>>,
}

/// One entry of a pattern list, already rewritten to match package.json
/// files.
#[derive(Clone)]
pub struct WorkspacePattern {
    raw: String,
    glob: String,
    negated: bool,
    matcher: Glob<'static>,
}

impl fmt::Debug for WorkspacePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspacePattern")
            .field("glob", &self.glob)
            .field("negated", &self.negated)
            .finish()
    }
}

impl PartialEq for WorkspacePattern {
    fn eq(&self, other: &Self) -> bool {
        // Use the literals for comparison, not the compiled globs
        self.glob == other.glob && self.negated == other.negated
    }
}

impl Eq for WorkspacePattern {}

/// Rewrites a directory glob into a glob over package.json files:
/// `./packages/*/` becomes `packages/*/package.json`.
fn package_json_glob(pattern: &str) -> String {
    let pattern = pattern.trim();
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() || pattern == "." {
        PACKAGE_JSON.to_string()
    } else if pattern == PACKAGE_JSON || pattern.ends_with("/package.json") {
        pattern.to_string()
    } else {
        format!("{pattern}/{PACKAGE_JSON}")
    }
}

impl WorkspacePattern {
    pub fn parse(raw: &str, declared_in: &str) -> Result<Self, Error> {
        let (negated, pattern) = match raw.trim().strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let glob = package_json_glob(pattern);
        let matcher = Glob::new(&glob)
            .map(|g| g.into_owned())
            .map_err(|err| Error::Glob {
                pattern: raw.to_string(),
                declared_in: declared_in.to_string(),
                err: Box::new(err),
            })?;
        Ok(Self {
            raw: raw.to_string(),
            glob,
            negated,
            matcher,
        })
    }

    /// The pattern as it was declared.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The normalized package.json glob, without the negation marker.
    pub fn glob(&self) -> &str {
        &self.glob
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.matcher.is_match(candidate)
    }
}

/// An ordered include/exclude list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspacePatterns {
    patterns: Vec<WorkspacePattern>,
}

impl WorkspacePatterns {
    pub fn new<S: AsRef<str>>(
        globs: impl IntoIterator<Item = S>,
        declared_in: &str,
    ) -> Result<Self, Error> {
        let patterns = globs
            .into_iter()
            .map(|glob| WorkspacePattern::parse(glob.as_ref(), declared_in))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Reads the patterns declared by `source` from the file's `contents`.
    ///
    /// Returns `Ok(None)` when the file does not declare a pattern list at
    /// all, which is distinct from declaring an empty one.
    pub fn resolve(source: PatternSource, contents: &str) -> Result<Option<Self>, Error> {
        let file = source.file_name();
        let globs: Option<Vec<String>> = match source {
            PatternSource::PackageJsonWorkspaces => {
                let package_json: PackageJsonWorkspaces = serde_json::from_str(contents)
                    .map_err(|err| Error::ParsingJson { file, err })?;
                package_json.workspaces.map(Vec::from)
            }
            PatternSource::PnpmWorkspace => {
                let pnpm_workspace: PnpmWorkspace = if contents.trim().is_empty() {
                    PnpmWorkspace::default()
                } else {
                    serde_yaml::from_str(contents)
                        .map_err(|err| Error::ParsingYaml { file, err })?
                };
                Some(pnpm_workspace.packages)
            }
            PatternSource::LernaJson => {
                let lerna: LernaJson = serde_json::from_str(contents)
                    .map_err(|err| Error::ParsingJson { file, err })?;
                Some(
                    lerna
                        .packages
                        .filter(|packages| !packages.is_empty())
                        .unwrap_or_else(|| {
                            DEFAULT_LERNA_PACKAGES.iter().map(|s| s.to_string()).collect()
                        }),
                )
            }
        };
        globs.map(|globs| Self::new(globs, file)).transpose()
    }

    pub fn extend(&mut self, other: WorkspacePatterns) {
        self.patterns.extend(other.patterns);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkspacePattern> {
        self.patterns.iter()
    }

    /// The verdict of the last pattern matching `candidate`, or `None` when
    /// no pattern matches it.
    pub fn verdict(&self, candidate: &str) -> Option<bool> {
        self.patterns
            .iter()
            .rev()
            .find(|pattern| pattern.is_match(candidate))
            .map(|pattern| !pattern.is_negated())
    }

    /// Whether `candidate`, a workspace-relative unix path, is in scope.
    pub fn is_included(&self, candidate: &str) -> bool {
        self.verdict(candidate).unwrap_or(false)
    }
}

impl fmt::Display for WorkspacePatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.patterns.iter().map(|p| p.raw()).join(", "))
    }
}

/// The resolved scope of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceScope {
    /// No pattern source exists: only the manifest at the workspace root is
    /// in scope.
    RootOnly,
    /// Pattern sources exist but none declared a pattern: manifests at the
    /// root and one directory below it are in scope.
    Shallow,
    /// Scope is decided by the declared patterns.
    Declared(WorkspacePatterns),
}

impl WorkspaceScope {
    /// Reads every [`PatternSource`] present under `workspace_root` and
    /// concatenates their patterns in [`PatternSource::ALL`] order.
    ///
    /// A source file that cannot be read or parsed is skipped with a
    /// warning. An invalid glob fails the whole resolution.
    pub fn discover(fs: &dyn FileSystem, workspace_root: &Utf8Path) -> Result<Self, Error> {
        let mut declared: Option<WorkspacePatterns> = None;
        for source in PatternSource::ALL {
            let file = source.file_name();
            let contents = match fs.read_optional(&workspace_root.join(file)) {
                Ok(Some(contents)) => contents,
                Ok(None) => continue,
                Err(err) => {
                    warn!("ignoring workspace patterns: {}", Error::Io { file, err });
                    continue;
                }
            };
            match WorkspacePatterns::resolve(source, &contents) {
                Ok(Some(patterns)) => declared.get_or_insert_with(Default::default).extend(patterns),
                Ok(None) => {}
                Err(e @ Error::Glob { .. }) => return Err(e),
                Err(e) => warn!("ignoring workspace patterns: {}", e),
            }
        }

        let scope = match declared {
            None => WorkspaceScope::RootOnly,
            Some(patterns) if patterns.is_empty() => WorkspaceScope::Shallow,
            Some(patterns) => WorkspaceScope::Declared(patterns),
        };
        debug!("resolved workspace scope: {}", scope);
        Ok(scope)
    }

    /// Whether the manifest at `candidate`, a workspace-relative unix path,
    /// is in scope.
    pub fn is_included(&self, candidate: &str) -> bool {
        match self {
            WorkspaceScope::RootOnly => !candidate.contains('/'),
            WorkspaceScope::Shallow => candidate.matches('/').count() <= 1,
            WorkspaceScope::Declared(patterns) => patterns.is_included(candidate),
        }
    }

    /// Whether inclusion was decided by patterns the user wrote.
    pub fn is_declared(&self) -> bool {
        matches!(self, WorkspaceScope::Declared(_))
    }
}

impl fmt::Display for WorkspaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceScope::RootOnly => write!(f, "root only"),
            WorkspaceScope::Shallow => write!(f, "root and direct children"),
            WorkspaceScope::Declared(patterns) => write!(f, "{}", patterns),
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;

    use camino::Utf8PathBuf;
    use nodescan_fs::{DirEntry, MemoryFileSystem};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    const NEGATED: &[&str] = &[
        "packages/*",
        "!packages/fs",
        "!packages/orm-browser-example",
        "!packages/framework-examples",
    ];

    #[test_case("packages/*", "packages/*/package.json" ; "directory glob")]
    #[test_case("packages/", "packages/package.json" ; "trailing slash")]
    #[test_case("./apps/*", "apps/*/package.json" ; "leading dot slash")]
    #[test_case("packages/**", "packages/**/package.json" ; "recursive glob")]
    #[test_case("tools/package.json", "tools/package.json" ; "already a manifest")]
    #[test_case(".", "package.json" ; "root")]
    fn test_package_json_glob(pattern: &str, expected: &str) {
        assert_eq!(package_json_glob(pattern), expected);
    }

    #[test_case("packages/vite/package.json", true ; "included")]
    #[test_case("packages/fs/package.json", false ; "first negation")]
    #[test_case("packages/orm-browser-example/package.json", false ; "second negation")]
    #[test_case("packages/framework-examples/package.json", false ; "third negation")]
    #[test_case("package.json", false ; "root not declared")]
    #[test_case("apps/web/package.json", false ; "unmatched")]
    fn test_negative_patterns(candidate: &str, expected: bool) {
        let patterns = WorkspacePatterns::new(NEGATED.iter(), "test").unwrap();
        assert_eq!(patterns.is_included(candidate), expected);
    }

    #[test]
    fn test_last_match_wins() {
        let patterns =
            WorkspacePatterns::new(["!packages/legacy", "packages/*"], "test").unwrap();
        assert!(patterns.is_included("packages/legacy/package.json"));

        let patterns = WorkspacePatterns::new(
            ["packages/*", "!packages/legacy", "packages/legacy"],
            "test",
        )
        .unwrap();
        assert!(patterns.is_included("packages/legacy/package.json"));

        let patterns =
            WorkspacePatterns::new(["packages/**", "!packages/internal/**"], "test").unwrap();
        assert!(patterns.is_included("packages/a/package.json"));
        assert!(!patterns.is_included("packages/internal/b/package.json"));
    }

    #[test]
    fn test_unrelated_negations_do_not_exclude() {
        let patterns = WorkspacePatterns::new(
            ["!apps/a", "packages/*", "!apps/b", "!tools/*"],
            "test",
        )
        .unwrap();
        assert!(patterns.is_included("packages/x/package.json"));
        assert_eq!(patterns.verdict("docs/package.json"), None);
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let err = WorkspacePatterns::new(["packages/{a,b"], "pnpm-workspace.yaml").unwrap_err();
        assert!(matches!(
            err,
            Error::Glob { ref pattern, ref declared_in, .. }
                if pattern == "packages/{a,b" && declared_in == "pnpm-workspace.yaml"
        ));
    }

    #[test_case(PatternSource::PackageJsonWorkspaces, r#"{"workspaces": ["packages/*", "!packages/fs"]}"# ; "package.json array")]
    #[test_case(PatternSource::PackageJsonWorkspaces, r#"{"workspaces": {"packages": ["packages/*", "!packages/fs"]}}"# ; "package.json object")]
    #[test_case(PatternSource::PnpmWorkspace, "packages:\n- 'packages/*'\n- '!packages/fs'\n" ; "pnpm")]
    #[test_case(PatternSource::LernaJson, r#"{"packages": ["packages/*", "!packages/fs"]}"# ; "lerna")]
    fn test_formats_normalize_to_same_shape(source: PatternSource, contents: &str) {
        let patterns = WorkspacePatterns::resolve(source, contents).unwrap().unwrap();
        assert_eq!(
            patterns
                .iter()
                .map(|p| (p.glob(), p.is_negated()))
                .collect::<Vec<_>>(),
            vec![
                ("packages/*/package.json", false),
                ("packages/fs/package.json", true)
            ]
        );
    }

    #[test]
    fn test_package_json_without_workspaces() {
        assert_eq!(
            WorkspacePatterns::resolve(PatternSource::PackageJsonWorkspaces, r#"{"name": "root"}"#)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_lerna_defaults_to_packages() {
        let patterns = WorkspacePatterns::resolve(PatternSource::LernaJson, r#"{"version": "1.0.0"}"#)
            .unwrap()
            .unwrap();
        assert!(patterns.is_included("packages/a/package.json"));
    }

    #[test]
    fn test_empty_pnpm_workspace() {
        let patterns = WorkspacePatterns::resolve(PatternSource::PnpmWorkspace, "")
            .unwrap()
            .unwrap();
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_discover_root_only() {
        let fs = MemoryFileSystem::from_files("/root", [("package.json", r#"{"name": "root"}"#)]);
        let scope = WorkspaceScope::discover(&fs, Utf8Path::new("/root")).unwrap();
        assert_eq!(scope, WorkspaceScope::RootOnly);
        assert!(scope.is_included("package.json"));
        assert!(!scope.is_included("packages/a/package.json"));
    }

    #[test]
    fn test_discover_shallow() {
        let fs = MemoryFileSystem::from_files(
            "/root",
            [("package.json", r#"{"name": "root", "workspaces": []}"#)],
        );
        let scope = WorkspaceScope::discover(&fs, Utf8Path::new("/root")).unwrap();
        assert_eq!(scope, WorkspaceScope::Shallow);
        assert!(scope.is_included("package.json"));
        assert!(scope.is_included("a/package.json"));
        assert!(!scope.is_included("packages/a/package.json"));
    }

    #[test]
    fn test_discover_concatenates_sources_in_order() {
        let fs = MemoryFileSystem::from_files(
            "/root",
            [
                ("package.json", r#"{"workspaces": ["packages/*"]}"#),
                ("pnpm-workspace.yaml", "packages:\n- '!packages/fs'\n"),
                ("lerna.json", r#"{"packages": ["packages/fs"]}"#),
            ],
        );
        let scope = WorkspaceScope::discover(&fs, Utf8Path::new("/root")).unwrap();
        let WorkspaceScope::Declared(patterns) = &scope else {
            panic!("expected declared patterns, got {:?}", scope);
        };
        assert_eq!(patterns.len(), 3);
        // lerna.json is read last, so its positive pattern wins
        assert!(scope.is_included("packages/fs/package.json"));
    }

    #[test]
    fn test_discover_skips_unparsable_source() {
        let fs = MemoryFileSystem::from_files(
            "/root",
            [
                ("package.json", r#"{"name": "root""#),
                ("pnpm-workspace.yaml", "packages:\n- 'packages/*'\n"),
            ],
        );
        let scope = WorkspaceScope::discover(&fs, Utf8Path::new("/root")).unwrap();
        assert!(scope.is_declared());
        assert!(scope.is_included("packages/a/package.json"));
    }

    /// Serves files from memory but fails to decode `unreadable`.
    struct Undecodable {
        files: MemoryFileSystem,
        unreadable: Utf8PathBuf,
    }

    impl FileSystem for Undecodable {
        fn read_to_string(&self, path: &Utf8Path) -> Result<String, nodescan_fs::Error> {
            if path == self.unreadable.as_path() {
                return Err(nodescan_fs::Error::Io {
                    path: path.to_owned(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidData,
                        "stream did not contain valid UTF-8",
                    ),
                });
            }
            self.files.read_to_string(path)
        }

        fn exists(&self, path: &Utf8Path) -> bool {
            path == self.unreadable.as_path() || self.files.exists(path)
        }

        fn list_dir(&self, path: &Utf8Path) -> Result<Vec<DirEntry>, nodescan_fs::Error> {
            self.files.list_dir(path)
        }
    }

    #[test]
    fn test_discover_skips_unreadable_source() {
        let fs = Undecodable {
            files: MemoryFileSystem::from_files(
                "/root",
                [
                    ("package.json", r#"{"workspaces": ["packages/*"]}"#),
                    ("packages/a/package.json", r#"{"name": "a"}"#),
                ],
            ),
            unreadable: Utf8PathBuf::from("/root/lerna.json"),
        };
        let scope = WorkspaceScope::discover(&fs, Utf8Path::new("/root")).unwrap();
        let WorkspaceScope::Declared(patterns) = &scope else {
            panic!("expected declared patterns, got {:?}", scope);
        };
        // only the package.json patterns, lerna.json contributed nothing
        assert_eq!(patterns.len(), 1);
        assert!(scope.is_included("packages/a/package.json"));
    }

    #[test]
    fn test_discover_fails_on_invalid_glob() {
        let fs = MemoryFileSystem::from_files(
            "/root",
            [("pnpm-workspace.yaml", "packages:\n- 'packages/{a'\n")],
        );
        assert!(matches!(
            WorkspaceScope::discover(&fs, Utf8Path::new("/root")),
            Err(Error::Glob { .. })
        ));
    }
}

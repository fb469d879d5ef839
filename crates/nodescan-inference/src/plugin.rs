use camino::Utf8Path;
use nodescan_config::ConfigurationOptions;
use nodescan_fs::FileSystem;
use nodescan_repository::{package_json::PACKAGE_JSON, PackageJson, PackageManager, WorkspaceScope};
use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, trace};
use wax::{Glob, Pattern as _};

use crate::{
    graph::{ProjectGraph, ProjectGraphFragment},
    plugins::{PackageJsonPlugin, ProjectJsonPlugin},
    Error,
};

/// A handler turning one matched file into a graph fragment.
///
/// Handlers run concurrently and must not keep state between calls.
pub trait CreateNodes: Send + Sync {
    fn name(&self) -> &'static str;

    /// `file` is the workspace-relative unix path of a file matching the
    /// pattern the handler was registered with.
    fn create_nodes(
        &self,
        file: &str,
        options: Option<&Value>,
        context: &CreateNodesContext,
    ) -> Result<ProjectGraphFragment, Error>;
}

/// Facts about the workspace as a whole, resolved once per scan.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    pub scope: WorkspaceScope,
    pub package_manager: PackageManager,
}

impl WorkspaceInfo {
    pub fn discover(
        fs: &dyn FileSystem,
        workspace_root: &Utf8Path,
        configuration: &ConfigurationOptions,
    ) -> Result<Self, Error> {
        let scope = WorkspaceScope::discover(fs, workspace_root)?;
        let package_manager = match configuration.package_manager() {
            Some(package_manager) => package_manager,
            None => {
                let root_package_json = fs
                    .read_optional(&workspace_root.join(PACKAGE_JSON))
                    .ok()
                    .flatten()
                    .and_then(|contents| PackageJson::load_from_str(&contents, PACKAGE_JSON).ok());
                PackageManager::get_package_manager(fs, workspace_root, root_package_json.as_ref())
            }
        };
        debug!("using package manager {}", package_manager);
        Ok(Self {
            scope,
            package_manager,
        })
    }
}

pub struct CreateNodesContext<'a> {
    pub workspace_root: &'a Utf8Path,
    /// Every candidate file of the current scan, workspace-relative.
    pub config_files: Vec<String>,
    pub configuration: &'a ConfigurationOptions,
    pub fs: &'a dyn FileSystem,
    workspace: OnceCell<WorkspaceInfo>,
}

impl<'a> CreateNodesContext<'a> {
    pub fn new(
        workspace_root: &'a Utf8Path,
        configuration: &'a ConfigurationOptions,
        fs: &'a dyn FileSystem,
    ) -> Self {
        Self {
            workspace_root,
            config_files: Vec::new(),
            configuration,
            fs,
            workspace: OnceCell::new(),
        }
    }

    pub fn with_config_files(mut self, config_files: Vec<String>) -> Self {
        self.config_files = config_files;
        self
    }

    /// Workspace scope and package manager, discovered on first use.
    pub fn workspace(&self) -> Result<&WorkspaceInfo, Error> {
        self.workspace.get_or_try_init(|| {
            WorkspaceInfo::discover(self.fs, self.workspace_root, self.configuration)
        })
    }
}

struct RegisteredHandler {
    pattern: String,
    matcher: Glob<'static>,
    options: Option<Value>,
    handler: Box<dyn CreateNodes>,
}

/// Handlers in registration order. When fragments disagree about a root, the
/// handler registered later wins.
#[derive(Default)]
pub struct PluginRegistry {
    handlers: Vec<RegisteredHandler>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The package.json handler followed by the sibling configuration
    /// handler.
    pub fn with_defaults(configuration: &ConfigurationOptions) -> Result<Self, Error> {
        let sibling = configuration.sibling_config_file();
        let mut registry = Self::new();
        registry.register(
            &format!("{{{PACKAGE_JSON},**/{PACKAGE_JSON}}}"),
            PackageJsonPlugin,
            None,
        )?;
        registry.register(
            &format!("{{{sibling},**/{sibling}}}"),
            ProjectJsonPlugin,
            None,
        )?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        pattern: &str,
        handler: impl CreateNodes + 'static,
        options: Option<Value>,
    ) -> Result<(), Error> {
        let matcher = Glob::new(pattern)
            .map(|glob| glob.into_owned())
            .map_err(|err| Error::InvalidPluginPattern {
                pattern: pattern.to_string(),
                err: Box::new(err),
            })?;
        debug!("registered handler {} for {}", handler.name(), pattern);
        self.handlers.push(RegisteredHandler {
            pattern: pattern.to_string(),
            matcher,
            options,
            handler: Box::new(handler),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered patterns, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|h| h.pattern.as_str())
    }

    pub fn is_candidate(&self, file: &str) -> bool {
        self.handlers.iter().any(|h| h.matcher.is_match(file))
    }

    /// Applies every handler whose pattern matches `file`, returning each
    /// fragment with the index of the handler that produced it.
    pub fn dispatch(
        &self,
        file: &str,
        context: &CreateNodesContext,
    ) -> Result<Vec<(usize, ProjectGraphFragment)>, Error> {
        self.handlers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.matcher.is_match(file))
            .map(|(index, h)| {
                trace!("applying {} to {}", h.handler.name(), file);
                let fragment = h.handler.create_nodes(file, h.options.as_ref(), context)?;
                Ok((index, fragment))
            })
            .collect()
    }

    /// Workspace-relative paths of every file matching a registered pattern,
    /// sorted.
    pub fn candidate_files(
        &self,
        fs: &dyn FileSystem,
        workspace_root: &Utf8Path,
    ) -> Result<Vec<String>, Error> {
        let files = fs.walk_files(workspace_root)?;
        Ok(files
            .iter()
            .filter_map(|file| nodescan_fs::anchor(workspace_root, file))
            .filter(|file| self.is_candidate(file))
            .collect())
    }

    /// Scans the workspace and folds every fragment into one graph.
    ///
    /// Files are processed on the rayon pool when `parallel` is set.
    /// Fragments are ordered by handler registration, then by file, before
    /// folding, so the result is the same for any processing order.
    pub fn scan(
        &self,
        fs: &dyn FileSystem,
        workspace_root: &Utf8Path,
        configuration: &ConfigurationOptions,
    ) -> Result<ProjectGraph, Error> {
        let candidates = self.candidate_files(fs, workspace_root)?;
        debug!("found {} candidate files", candidates.len());
        let context = CreateNodesContext::new(workspace_root, configuration, fs)
            .with_config_files(candidates.clone());

        let process = |file: &String| -> Result<Vec<(usize, String, ProjectGraphFragment)>, Error> {
            Ok(self
                .dispatch(file, &context)?
                .into_iter()
                .map(|(index, fragment)| (index, file.clone(), fragment))
                .collect())
        };

        let results: Vec<Vec<_>> = if configuration.parallel() {
            candidates.par_iter().map(process).collect::<Result<_, _>>()?
        } else {
            candidates.iter().map(process).collect::<Result<_, _>>()?
        };

        let mut fragments = results.into_iter().flatten().collect::<Vec<_>>();
        fragments.sort_by(|(a_index, a_file, _), (b_index, b_file, _)| {
            a_index.cmp(b_index).then_with(|| a_file.cmp(b_file))
        });

        Ok(ProjectGraph::merge_all(
            fragments.into_iter().map(|(_, _, fragment)| fragment),
        ))
    }
}

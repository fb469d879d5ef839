//! Project inference: turns the manifests of a workspace into project graph
//! nodes.
//!
//! Each registered handler is applied to the workspace files matching its
//! pattern and returns a [`ProjectGraphFragment`]. Fragments are folded into a
//! [`ProjectGraph`] in registration order, so the result does not depend on
//! the order in which files were scanned.

mod graph;
mod merge;
mod node;
mod plugin;
pub mod plugins;
mod synthesize;
mod target;

use miette::Diagnostic;

pub use crate::{
    graph::{ProjectGraph, ProjectGraphFragment, RootCollision},
    merge::merge_sibling,
    node::{assemble, ProjectMetadata, ProjectNode},
    plugin::{CreateNodes, CreateNodesContext, PluginRegistry, WorkspaceInfo},
    synthesize::{add_release_publish, synthesize, SynthesizedTargets, NPM_SCRIPTS_GROUP},
    target::{Executor, TargetDefinition, RELEASE_PUBLISH_TARGET},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Workspaces(#[from] nodescan_repository::workspaces::Error),
    #[error("invalid handler pattern \"{pattern}\": {err}")]
    #[diagnostic(code(invalid_plugin_pattern))]
    InvalidPluginPattern {
        pattern: String,
        #[source]
        err: Box<wax::BuildError>,
    },
    #[error("target executor cannot be empty")]
    #[diagnostic(code(empty_executor))]
    EmptyExecutor,
    #[error("failed to scan workspace: {0}")]
    Fs(#[from] nodescan_fs::Error),
}

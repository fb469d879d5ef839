use camino::Utf8Path;
use nodescan_repository::{NotAManifest, ProjectJson, ProjectManifest};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    graph::ProjectGraphFragment,
    merge::merge_sibling,
    node::{assemble, project_root},
    plugin::{CreateNodes, CreateNodesContext},
    synthesize::{add_release_publish, synthesize},
    Error,
};

/// Infers a project from every package.json inside the workspace scope.
pub struct PackageJsonPlugin;

impl CreateNodes for PackageJsonPlugin {
    fn name(&self) -> &'static str {
        "nodescan/package-json"
    }

    fn create_nodes(
        &self,
        file: &str,
        _options: Option<&Value>,
        context: &CreateNodesContext,
    ) -> Result<ProjectGraphFragment, Error> {
        let workspace = context.workspace()?;
        if !workspace.scope.is_included(file) {
            debug!("{} is outside the workspace scope ({})", file, workspace.scope);
            return Ok(ProjectGraphFragment::default());
        }

        let path = context.workspace_root.join(file);
        let manifest_key = context.configuration.manifest_key();
        let manifest = match ProjectManifest::load(context.fs, &path, manifest_key) {
            Ok(manifest) => manifest,
            // A pattern the user wrote picked this file, so it becomes a
            // project even without a name or scripts.
            Err(NotAManifest::Anonymous { manifest, .. }) if workspace.scope.is_declared() => {
                *manifest
            }
            Err(err @ NotAManifest::Anonymous { .. }) => {
                debug!("skipping {}: {}", file, err);
                return Ok(ProjectGraphFragment::default());
            }
            Err(err) => {
                warn!("skipping {}: {}", file, err);
                return Ok(ProjectGraphFragment::default());
            }
        };

        create_node_from_manifest(manifest, file, context)
    }
}

/// Builds the fragment for the package.json at `file` regardless of the
/// workspace scope.
pub fn create_node_from_package_json(
    file: &str,
    context: &CreateNodesContext,
) -> Result<ProjectGraphFragment, Error> {
    let path = context.workspace_root.join(file);
    let manifest_key = context.configuration.manifest_key();
    let manifest = match ProjectManifest::load(context.fs, &path, manifest_key)
        .or_else(NotAManifest::into_anonymous)
    {
        Ok(manifest) => manifest,
        Err(err) => {
            warn!("skipping {}: {}", file, err);
            return Ok(ProjectGraphFragment::default());
        }
    };
    create_node_from_manifest(manifest, file, context)
}

fn create_node_from_manifest(
    manifest: ProjectManifest,
    file: &str,
    context: &CreateNodesContext,
) -> Result<ProjectGraphFragment, Error> {
    let workspace = context.workspace()?;
    let root = project_root(file);
    let sibling = load_sibling(context, file);

    let synthesized = synthesize(&manifest, workspace.package_manager);
    let mut targets = merge_sibling(synthesized, sibling.as_ref());
    add_release_publish(&mut targets, &manifest, sibling.as_ref());

    let node = assemble(manifest, targets, &root, context.workspace_root);
    Ok(ProjectGraphFragment::single(root, node))
}

/// Reads the explicit configuration next to `file`. An unparsable file is
/// reported and treated as absent.
fn load_sibling(context: &CreateNodesContext, file: &str) -> Option<ProjectJson> {
    let path = context
        .workspace_root
        .join(file)
        .with_file_name(context.configuration.sibling_config_file());
    match ProjectJson::load(context.fs, &path) {
        Ok(sibling) => sibling,
        Err(err) => {
            warn!("ignoring {}: {}", relative(context.workspace_root, &path), err);
            None
        }
    }
}

fn relative(workspace_root: &Utf8Path, path: &Utf8Path) -> String {
    nodescan_fs::anchor(workspace_root, path).unwrap_or_else(|| path.to_string())
}

use std::collections::BTreeMap;

use nodescan_repository::{package_json::PACKAGE_JSON, PackageJson, ProjectJson};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    graph::ProjectGraphFragment,
    node::{directory_name, project_root, ProjectMetadata, ProjectNode},
    plugin::{CreateNodes, CreateNodesContext},
    target::TargetDefinition,
    Error,
};

/// Emits the node described by an explicit project configuration file.
///
/// Registered after [`super::PackageJsonPlugin`] so that, for a directory
/// holding both files, the explicit targets land on top of the inferred ones.
pub struct ProjectJsonPlugin;

impl CreateNodes for ProjectJsonPlugin {
    fn name(&self) -> &'static str {
        "nodescan/project-json"
    }

    fn create_nodes(
        &self,
        file: &str,
        _options: Option<&Value>,
        context: &CreateNodesContext,
    ) -> Result<ProjectGraphFragment, Error> {
        let path = context.workspace_root.join(file);
        let project = match ProjectJson::load(context.fs, &path) {
            Ok(Some(project)) => project,
            Ok(None) => return Ok(ProjectGraphFragment::default()),
            Err(err) => {
                warn!("skipping {}: {}", file, err);
                return Ok(ProjectGraphFragment::default());
            }
        };

        let root = project_root(file);
        let name = match project.name {
            Some(name) => name,
            None => adjacent_package_name(context, file)
                .unwrap_or_else(|| directory_name(&root, context.workspace_root)),
        };

        let mut targets = BTreeMap::new();
        for (target_name, declared) in project.targets.iter().flatten() {
            match TargetDefinition::from_declared(declared) {
                Ok(target) => {
                    targets.insert(target_name.clone(), target);
                }
                Err(err) => warn!("skipping target {} of {}: {}", target_name, file, err),
            }
        }

        let node = ProjectNode {
            implicit_dependencies: project.implicit_dependencies,
            included_scripts: None,
            metadata: ProjectMetadata::default(),
            name,
            project_type: project.project_type.unwrap_or_default(),
            root: root.clone(),
            source_root: root.clone(),
            targets,
        };
        Ok(ProjectGraphFragment::single(root, node))
    }
}

/// The name of the package.json in the same directory as `file`, if any.
fn adjacent_package_name(context: &CreateNodesContext, file: &str) -> Option<String> {
    let path = context.workspace_root.join(file).with_file_name(PACKAGE_JSON);
    let contents = context.fs.read_optional(&path).ok().flatten()?;
    match PackageJson::load_from_str(&contents, path.as_str()) {
        Ok(package_json) => package_json.name,
        Err(err) => {
            debug!("unable to read name from {}: {}", path, err);
            None
        }
    }
}

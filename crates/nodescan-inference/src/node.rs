use std::collections::BTreeMap;

use camino::Utf8Path;
use nodescan_repository::{ProjectManifest, ProjectType};
use serde::{Deserialize, Serialize};

use crate::{
    synthesize::{SynthesizedTargets, NPM_SCRIPTS_GROUP},
    target::TargetDefinition,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// Presentation groups of target names, in display order.
    pub target_groups: BTreeMap<String, Vec<String>>,
}

/// A named, rooted project with its runnable targets.
// Fields are declared in alphabetical order so serialized output has sorted
// keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_dependencies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_scripts: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: ProjectMetadata,
    pub name: String,
    pub project_type: ProjectType,
    pub root: String,
    pub source_root: String,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetDefinition>,
}

/// Builds the node for the manifest whose directory is `root`, a
/// workspace-relative unix path.
pub fn assemble(
    manifest: ProjectManifest,
    targets: SynthesizedTargets,
    root: &str,
    workspace_root: &Utf8Path,
) -> ProjectNode {
    let name = manifest
        .name
        .unwrap_or_else(|| directory_name(root, workspace_root));
    let mut target_groups = BTreeMap::new();
    target_groups.insert(NPM_SCRIPTS_GROUP.to_string(), targets.group);

    ProjectNode {
        implicit_dependencies: manifest.implicit_dependencies,
        included_scripts: manifest.included_scripts,
        metadata: ProjectMetadata { target_groups },
        name,
        project_type: ProjectType::Library,
        root: root.to_string(),
        source_root: root.to_string(),
        targets: targets.targets,
    }
}

/// The name of the directory `root` points at. The workspace root itself is
/// named after its own directory.
pub(crate) fn directory_name(root: &str, workspace_root: &Utf8Path) -> String {
    let dir = if root == "." {
        workspace_root.file_name()
    } else {
        Utf8Path::new(root).file_name()
    };
    dir.unwrap_or(root).to_string()
}

/// The workspace-relative directory containing `file`, `.` for files at the
/// workspace root.
pub(crate) fn project_root(file: &str) -> String {
    match file.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ".".to_string(),
    }
}

impl ProjectNode {
    /// Folds a later node for the same project into this one. Targets of the
    /// later node replace ours by name; groups and implicit dependencies are
    /// unioned, keeping their order.
    pub fn augment(&mut self, later: ProjectNode) {
        self.targets.extend(later.targets);

        for (group, names) in later.metadata.target_groups {
            let existing = self.metadata.target_groups.entry(group).or_default();
            union_into(existing, names);
        }

        if let Some(later_deps) = later.implicit_dependencies {
            union_into(
                self.implicit_dependencies.get_or_insert_with(Vec::new),
                later_deps,
            );
        }

        self.project_type = later.project_type;
        if self.included_scripts.is_none() {
            self.included_scripts = later.included_scripts;
        }
    }

    /// Target group entries naming a target this node does not have.
    pub fn dangling_group_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .target_groups
            .iter()
            .flat_map(|(group, names)| names.iter().map(move |name| (group.as_str(), name.as_str())))
            .filter(|(_, name)| !self.targets.contains_key(*name))
    }
}

fn union_into(existing: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !existing.contains(&item) {
            existing.push(item);
        }
    }
}

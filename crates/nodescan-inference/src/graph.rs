use std::collections::{btree_map::Entry, BTreeMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::node::ProjectNode;

/// The nodes one handler produced for one file, keyed by project root. An
/// empty fragment serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGraphFragment {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub projects: BTreeMap<String, ProjectNode>,
}

impl ProjectGraphFragment {
    pub fn single(root: impl Into<String>, node: ProjectNode) -> Self {
        Self {
            projects: BTreeMap::from([(root.into(), node)]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Two differently named nodes claimed the same root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootCollision {
    pub root: String,
    pub discarded: String,
    pub kept: String,
}

/// The workspace-wide project map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectGraph {
    pub projects: BTreeMap<String, ProjectNode>,
    #[serde(skip)]
    collisions: Vec<RootCollision>,
}

impl ProjectGraph {
    /// Folds fragments in the order given. Callers are responsible for
    /// ordering fragments by handler registration.
    pub fn merge_all(fragments: impl IntoIterator<Item = ProjectGraphFragment>) -> Self {
        let mut graph = Self::default();
        for fragment in fragments {
            graph.merge(fragment);
        }
        graph
    }

    /// Adds the nodes of `fragment`. A node whose root is already taken
    /// augments the existing node when both share a name and replaces it
    /// otherwise.
    pub fn merge(&mut self, fragment: ProjectGraphFragment) {
        for (root, node) in fragment.projects {
            match self.projects.entry(root) {
                Entry::Vacant(entry) => {
                    entry.insert(node);
                }
                Entry::Occupied(mut entry) if entry.get().name == node.name => {
                    entry.get_mut().augment(node);
                }
                Entry::Occupied(mut entry) => {
                    let collision = RootCollision {
                        root: entry.key().clone(),
                        discarded: entry.get().name.clone(),
                        kept: node.name.clone(),
                    };
                    warn!(
                        "projects \"{}\" and \"{}\" both have the root {}, using \"{}\"",
                        collision.discarded, collision.kept, collision.root, collision.kept
                    );
                    entry.insert(node);
                    self.collisions.push(collision);
                }
            }
        }
    }

    pub fn collisions(&self) -> &[RootCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

pub mod manifest;
pub mod package_json;
pub mod package_manager;
pub mod project_json;
pub mod target;
pub mod workspaces;

pub use manifest::{NotAManifest, ProjectManifest};
pub use package_json::PackageJson;
pub use package_manager::PackageManager;
pub use project_json::{ProjectJson, ProjectType};
pub use target::TargetConfiguration;
pub use workspaces::{PatternSource, WorkspacePattern, WorkspacePatterns, WorkspaceScope};

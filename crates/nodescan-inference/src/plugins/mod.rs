//! The handlers registered by [`crate::PluginRegistry::with_defaults`].

mod package_json;
mod project_json;

pub use package_json::{create_node_from_package_json, PackageJsonPlugin};
pub use project_json::ProjectJsonPlugin;

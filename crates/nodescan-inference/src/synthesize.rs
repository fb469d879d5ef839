use std::collections::BTreeMap;

use nodescan_repository::{PackageManager, ProjectJson, ProjectManifest};
use tracing::trace;

use crate::target::{TargetDefinition, RELEASE_PUBLISH_TARGET};

/// Target group listing the targets inferred from package scripts.
pub const NPM_SCRIPTS_GROUP: &str = "NPM Scripts";

/// Targets inferred for one manifest, plus the names of the script targets
/// in the order the scripts were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesizedTargets {
    pub targets: BTreeMap<String, TargetDefinition>,
    pub group: Vec<String>,
}

/// Infers one target per script of `manifest`.
///
/// Scripts outside the `includedScripts` allow-list are skipped. A target
/// declared under the same name in the manifest's tool section overrides the
/// fields it sets.
pub fn synthesize(manifest: &ProjectManifest, package_manager: PackageManager) -> SynthesizedTargets {
    let mut synthesized = SynthesizedTargets::default();
    for (script, command) in manifest.scripts() {
        if !manifest.includes_script(script) {
            trace!("script {} is not in includedScripts, skipping", script);
            continue;
        }
        let mut target =
            TargetDefinition::run_script(script, command, package_manager.run_command(script));
        if let Some(overrides) = manifest.declared_target(script) {
            target.apply_overrides(overrides);
        }
        synthesized.targets.insert(script.to_string(), target);
        synthesized.group.push(script.to_string());
    }
    synthesized
}

/// Adds the publish target unless inference or the sibling configuration
/// already provides one. Must run after [`crate::merge_sibling`].
pub fn add_release_publish(
    synthesized: &mut SynthesizedTargets,
    manifest: &ProjectManifest,
    sibling: Option<&ProjectJson>,
) {
    if synthesized.targets.contains_key(RELEASE_PUBLISH_TARGET)
        || sibling.map_or(false, |sibling| sibling.declares_target(RELEASE_PUBLISH_TARGET))
    {
        return;
    }
    let mut target = TargetDefinition::release_publish();
    if let Some(overrides) = manifest.declared_target(RELEASE_PUBLISH_TARGET) {
        target.apply_overrides(overrides);
    }
    synthesized
        .targets
        .insert(RELEASE_PUBLISH_TARGET.to_string(), target);
}

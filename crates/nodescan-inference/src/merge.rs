use nodescan_repository::ProjectJson;
use tracing::debug;

use crate::synthesize::SynthesizedTargets;

/// Drops every inferred target that `sibling` declares explicitly, along with
/// its group entry. Targets only the sibling declares are left to the
/// sibling's own node.
pub fn merge_sibling(
    mut synthesized: SynthesizedTargets,
    sibling: Option<&ProjectJson>,
) -> SynthesizedTargets {
    let Some(sibling) = sibling else {
        return synthesized;
    };
    synthesized.targets.retain(|name, _| {
        let declared = sibling.declares_target(name);
        if declared {
            debug!("target {} is declared explicitly, not inferring it", name);
        }
        !declared
    });
    synthesized
        .group
        .retain(|name| !sibling.declares_target(name));
    synthesized
}

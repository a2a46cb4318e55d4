//! Sample command: pair each source with a seeded random target of its view.

use anyhow::Result;
use posebatch_core::ResolverConfig;
use tracing::info;

use super::{CommonArgs, DispatchArgs, ModeDefaults};
use crate::exit_codes::ExitCode;

/// Execute the sample command.
pub async fn execute(
    common: CommonArgs,
    dispatch: DispatchArgs,
    seed: u64,
    quiet: bool,
) -> Result<ExitCode> {
    info!(
        seed,
        targets = %dispatch.target_videos_dir.display(),
        "Sampling targets per view"
    );

    let resolver = ResolverConfig::Sample {
        target_root: dispatch.target_videos_dir.clone(),
        seed,
    };
    let config = dispatch.apply(common.to_config(resolver, ModeDefaults::STANDARD)?);

    super::execute(config, quiet, dispatch.fail_on_error).await
}

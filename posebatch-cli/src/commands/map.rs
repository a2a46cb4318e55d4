//! Map command: pair each source with the target named in a JSON video map.

use std::path::PathBuf;

use anyhow::Result;
use posebatch_core::ResolverConfig;
use tracing::info;

use super::{CommonArgs, DispatchArgs, ModeDefaults};
use crate::exit_codes::ExitCode;

/// Map runs use a narrower subject range and more workers by default.
const MAP_DEFAULTS: ModeDefaults = ModeDefaults {
    workers: 16,
    max_subject: 86,
    ..ModeDefaults::STANDARD
};

/// Execute the map command.
pub async fn execute(
    common: CommonArgs,
    dispatch: DispatchArgs,
    video_map_file: PathBuf,
    quiet: bool,
) -> Result<ExitCode> {
    info!(map = %video_map_file.display(), "Resolving targets from video map");

    let resolver = ResolverConfig::Mapped {
        target_root: dispatch.target_videos_dir.clone(),
        map_file: video_map_file,
    };
    let config = dispatch.apply(common.to_config(resolver, MAP_DEFAULTS)?);

    super::execute(config, quiet, dispatch.fail_on_error).await
}

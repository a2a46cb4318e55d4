//! Collect command: record outputs that already exist, dispatching nothing.

use anyhow::Result;
use posebatch_core::{FlushMode, ResolverConfig};
use tracing::info;

use super::{CommonArgs, ModeDefaults};
use crate::exit_codes::ExitCode;

/// Collection rewrites the manifest after every find.
const COLLECT_DEFAULTS: ModeDefaults = ModeDefaults {
    flush: FlushMode::EachRecord,
    ..ModeDefaults::STANDARD
};

/// Execute the collect command.
pub async fn execute(common: CommonArgs, quiet: bool) -> Result<ExitCode> {
    info!(results = %common.result_dir.display(), "Collecting existing outputs");

    let config = common.to_config(ResolverConfig::Existing, COLLECT_DEFAULTS)?;
    super::execute(config, quiet, false).await
}

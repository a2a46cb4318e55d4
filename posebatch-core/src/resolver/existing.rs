//! Existence policy: collect outputs produced by an earlier run.

use std::path::Path;

use tracing::info;

use super::{Resolution, ResolverPolicy, SkipReason, TargetResolver};
use crate::source::SourceVideo;

/// Accepts a source only when its output video is already on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExistingOutputResolver;

impl TargetResolver for ExistingOutputResolver {
    fn resolve(&self, _video: &SourceVideo, output_video: &Path) -> Resolution {
        if output_video.exists() {
            info!(path = %output_video.display(), "Output exists");
            Resolution::AlreadyAligned
        } else {
            Resolution::Unresolved(SkipReason::OutputMissing(output_video.to_path_buf()))
        }
    }

    fn policy(&self) -> ResolverPolicy {
        ResolverPolicy::Existing
    }
}

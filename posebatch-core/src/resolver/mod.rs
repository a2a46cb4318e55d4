//! Target resolution policies.
//!
//! Each source video is paired with at most one target clip. Three policies
//! are supported:
//!
//! - **Existing** - the expected output already exists; the item is recorded
//!   without dispatching the aligner
//! - **Sample** - a clip is drawn from `<target_root>/<view>/**/*.mp4` with a
//!   generator seeded from the run seed and the source stem
//! - **Mapped** - a JSON map names the target stem for each source stem
//!
//! ## Quick Start
//!
//! ```no_run
//! use posebatch_core::resolver::{ResolverConfig, ResolverFactory};
//!
//! # fn example() -> posebatch_core::Result<()> {
//! let resolver = ResolverFactory::create(ResolverConfig::Sample {
//!     target_root: "/data/targets".into(),
//!     seed: 42,
//! })?;
//! println!("resolving with {}", resolver.policy());
//! # Ok(())
//! # }
//! ```

mod existing;
mod mapped;
mod sample;

pub use existing::ExistingOutputResolver;
pub use mapped::{MapEntry, MappedResolver, VideoMap};
pub use sample::SampleResolver;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::source::SourceVideo;

/// Trait for target resolution policies.
///
/// Implementations must be thread-safe (`Send + Sync`); one resolver is
/// shared by every worker of a run.
pub trait TargetResolver: Send + Sync {
    /// Resolve the target clip for `video`, whose output would be written to
    /// `output_video`.
    fn resolve(&self, video: &SourceVideo, output_video: &Path) -> Resolution;

    /// Returns the policy identifier for logging and summaries.
    fn policy(&self) -> ResolverPolicy;
}

/// Outcome of resolving one source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Dispatch the aligner against this target clip.
    Target(PathBuf),
    /// The output already exists; record it without dispatching.
    AlreadyAligned,
    /// No pair is produced for this source.
    Unresolved(SkipReason),
}

/// Why a source video produced no pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Existence policy: nothing at the expected output path.
    OutputMissing(PathBuf),
    /// Sample policy: no `.mp4` clips under the view directory.
    NoCandidates(PathBuf),
    /// Map policy: the source stem has no entry.
    NotInMap(String),
    /// Map policy: the mapped clip is not on disk.
    MappedFileMissing(PathBuf),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputMissing(path) => write!(f, "no existing output at {}", path.display()),
            Self::NoCandidates(dir) => write!(f, "no .mp4 files found in {}", dir.display()),
            Self::NotInMap(stem) => write!(f, "no mapping found for video {stem}"),
            Self::MappedFileMissing(path) => {
                write!(f, "mapped .mp4 file does not exist: {}", path.display())
            }
        }
    }
}

/// Identifies a resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverPolicy {
    Existing,
    Sample,
    Mapped,
}

impl ResolverPolicy {
    /// Whether resolved items are handed to the aligner at all.
    pub fn dispatches(&self) -> bool {
        !matches!(self, Self::Existing)
    }
}

impl fmt::Display for ResolverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing => write!(f, "existing outputs"),
            Self::Sample => write!(f, "random sample"),
            Self::Mapped => write!(f, "video map"),
        }
    }
}

/// Configuration for creating a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverConfig {
    Existing,
    Sample { target_root: PathBuf, seed: u64 },
    Mapped { target_root: PathBuf, map_file: PathBuf },
}

impl ResolverConfig {
    pub fn policy(&self) -> ResolverPolicy {
        match self {
            Self::Existing => ResolverPolicy::Existing,
            Self::Sample { .. } => ResolverPolicy::Sample,
            Self::Mapped { .. } => ResolverPolicy::Mapped,
        }
    }
}

/// Factory for creating resolvers.
pub struct ResolverFactory;

impl ResolverFactory {
    /// Create a resolver from configuration.
    ///
    /// Fails only for the map policy, when the map file cannot be read or
    /// parsed.
    pub fn create(config: ResolverConfig) -> Result<Arc<dyn TargetResolver>> {
        match config {
            ResolverConfig::Existing => Ok(Arc::new(ExistingOutputResolver)),
            ResolverConfig::Sample { target_root, seed } => {
                Ok(Arc::new(SampleResolver::new(target_root, seed)))
            }
            ResolverConfig::Mapped {
                target_root,
                map_file,
            } => {
                let map = VideoMap::load(&map_file)?;
                tracing::info!(
                    path = %map_file.display(),
                    entries = map.len(),
                    "Loaded video map"
                );
                Ok(Arc::new(MappedResolver::new(target_root, map)))
            }
        }
    }
}

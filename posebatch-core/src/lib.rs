//! posebatch core - batch preparation for pose-alignment on gait datasets
//!
//! This crate turns a tree of gait-recognition clips into pose-alignment jobs
//! and records what was produced.
//!
//! # Pipeline
//!
//! - Filenames like `090-nm-05-054.avi` decode into a [`VideoIdentity`]
//!   (subject, condition, view), filtered by condition and subject range
//! - A [`TargetResolver`] pairs each source with a target clip by random
//!   sampling, by an explicit JSON map, or by collecting existing outputs
//! - A [`WorkerPool`] dispatches the external aligner for each pair with
//!   bounded concurrency
//! - A [`ManifestAggregator`] gathers reference image → output video entries
//!   from all workers and is persisted as YAML
//!
//! # Example
//!
//! ```no_run
//! use posebatch_core::{run_batch, ResolverConfig, RunConfig, SubjectRange, TreeLayout};
//!
//! # async fn example() -> posebatch_core::Result<()> {
//! let layout = TreeLayout::new("/data/videos", "/data/png", "/data/aligned");
//! let config = RunConfig::new(
//!     layout,
//!     ResolverConfig::Sample {
//!         target_root: "/data/targets".into(),
//!         seed: 42,
//!     },
//! )
//! .with_subject_range(SubjectRange::new(100, 111)?)
//! .with_workers(8);
//!
//! let report = run_batch(&config).await?;
//! println!("{} outputs recorded", report.manifest.output_count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod manifest;
pub mod pool;
pub mod resolver;
pub mod run;
pub mod source;

// Re-export main types for convenience
pub use config::{FlushMode, RunConfig, DEFAULT_DEVICE, DEFAULT_SEED, DEFAULT_WORKERS};
pub use dispatch::{Aligner, AlignerCommand, CommandAligner, DispatchOutcome};
pub use error::{PoseBatchError, Result};
pub use identity::{IdentityParser, IdentityRejection, SubjectRange, VideoIdentity};
pub use manifest::{Manifest, ManifestAggregator};
pub use pool::{ItemReport, ItemStatus, WorkerPool};
pub use resolver::{
    Resolution, ResolverConfig, ResolverFactory, ResolverPolicy, SkipReason, TargetResolver,
};
pub use run::{run_batch, run_batch_with, RunReport, RunSummary};
pub use source::{ResolvedPair, SourceVideo, TreeLayout};

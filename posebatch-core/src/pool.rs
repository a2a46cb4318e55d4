//! Bounded fan-out of per-item pipelines.
//!
//! Every source path runs parse → resolve → dispatch → record independently.
//! A semaphore caps how many items are in flight; reports stream back over a
//! channel that closes once the last item has settled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use crate::dispatch::{ensure_output_dir, Aligner, DispatchOutcome};
use crate::identity::IdentityParser;
use crate::manifest::ManifestAggregator;
use crate::resolver::{Resolution, SkipReason, TargetResolver};
use crate::source::{ResolvedPair, SourceVideo, TreeLayout};

const REPORT_CHANNEL_CAPACITY: usize = 100;

/// What happened to one source video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// The filename did not decode into an accepted identity.
    Filtered,
    Unresolved(SkipReason),
    /// The result directory could not be created.
    SetupFailed(String),
    /// The aligner succeeded and the output was recorded.
    Aligned {
        pair: ResolvedPair,
        outcome: DispatchOutcome,
    },
    /// The aligner failed; nothing was recorded.
    AlignFailed {
        pair: ResolvedPair,
        outcome: DispatchOutcome,
    },
    /// The output already existed and was recorded without dispatch.
    AlreadyAligned { output_video: PathBuf },
    /// Dry run: the pair that would have been dispatched.
    Planned(ResolvedPair),
}

impl ItemStatus {
    /// Whether this item added an entry to the manifest.
    pub fn recorded(&self) -> bool {
        matches!(self, Self::Aligned { .. } | Self::AlreadyAligned { .. })
    }
}

/// Report streamed back for each submitted source.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub source: PathBuf,
    pub status: ItemStatus,
    pub elapsed: Duration,
}

/// Per-run state shared by every item task.
struct ItemContext {
    layout: TreeLayout,
    parser: IdentityParser,
    resolver: Arc<dyn TargetResolver>,
    aligner: Arc<dyn Aligner>,
    manifest: Arc<ManifestAggregator>,
    device: u32,
    dry_run: bool,
}

/// Fixed-width pool running the item pipeline.
pub struct WorkerPool {
    layout: TreeLayout,
    parser: IdentityParser,
    resolver: Arc<dyn TargetResolver>,
    aligner: Arc<dyn Aligner>,
    manifest: Arc<ManifestAggregator>,
    workers: usize,
    device: u32,
    dry_run: bool,
}

impl WorkerPool {
    pub fn new(
        layout: TreeLayout,
        parser: IdentityParser,
        resolver: Arc<dyn TargetResolver>,
        aligner: Arc<dyn Aligner>,
    ) -> Self {
        Self {
            layout,
            parser,
            resolver,
            aligner,
            manifest: Arc::new(ManifestAggregator::new()),
            workers: crate::config::DEFAULT_WORKERS,
            device: crate::config::DEFAULT_DEVICE,
            dry_run: false,
        }
    }

    /// Set the maximum number of items in flight (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_device(mut self, device: u32) -> Self {
        self.device = device;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn manifest(&self) -> Arc<ManifestAggregator> {
        Arc::clone(&self.manifest)
    }

    /// Run every source through the pipeline.
    ///
    /// Returns a channel that streams one report per source as items settle.
    /// The channel closes after the last item, which is the barrier for
    /// finalizing the manifest.
    pub fn execute(&self, sources: Vec<PathBuf>) -> mpsc::Receiver<ItemReport> {
        let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let ctx = Arc::new(ItemContext {
            layout: self.layout.clone(),
            parser: self.parser,
            resolver: Arc::clone(&self.resolver),
            aligner: Arc::clone(&self.aligner),
            manifest: Arc::clone(&self.manifest),
            device: self.device,
            dry_run: self.dry_run,
        });

        info!(
            total = sources.len(),
            workers = self.workers,
            policy = %self.resolver.policy(),
            dry_run = self.dry_run,
            "Worker pool started"
        );

        for source in sources {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let ctx = Arc::clone(&ctx);

            tokio::spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire_owned().await;
                let start = Instant::now();

                let status = process_item(&ctx, &source).await;

                let _ = tx
                    .send(ItemReport {
                        source,
                        status,
                        elapsed: start.elapsed(),
                    })
                    .await;
            });
        }

        rx
    }
}

async fn process_item(ctx: &ItemContext, source: &std::path::Path) -> ItemStatus {
    debug!(source = %source.display(), "Processing video");

    let Some(video) = SourceVideo::from_path(source.to_path_buf(), &ctx.parser) else {
        return ItemStatus::Filtered;
    };

    let reference_image = ctx.layout.reference_image(&video);
    let output_video = ctx.layout.output_video(&video);

    if !ctx.dry_run {
        if let Err(e) = ensure_output_dir(&output_video).await {
            return ItemStatus::SetupFailed(e.to_string());
        }
    }

    // Resolvers touch the filesystem synchronously
    let resolution = {
        let resolver = Arc::clone(&ctx.resolver);
        let video = video.clone();
        let output_video = output_video.clone();
        tokio::task::spawn_blocking(move || resolver.resolve(&video, &output_video)).await
    };
    let resolution = match resolution {
        Ok(resolution) => resolution,
        Err(e) => return ItemStatus::SetupFailed(format!("resolver task failed: {e}")),
    };

    let target_video = match resolution {
        Resolution::Target(target) => target,
        Resolution::AlreadyAligned => {
            ctx.manifest.record(&reference_image, &output_video);
            return ItemStatus::AlreadyAligned { output_video };
        }
        Resolution::Unresolved(reason) => return ItemStatus::Unresolved(reason),
    };

    let pair = ResolvedPair {
        reference_image,
        target_video,
        output_video,
    };

    if ctx.dry_run {
        return ItemStatus::Planned(pair);
    }

    let outcome = ctx.aligner.align(&pair, ctx.device).await;
    if outcome.ok {
        ctx.manifest.record(&pair.reference_image, &pair.output_video);
        ItemStatus::Aligned { pair, outcome }
    } else {
        ItemStatus::AlignFailed { pair, outcome }
    }
}

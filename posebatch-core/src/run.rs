//! End-to-end batch run: validate, scan, fan out, aggregate, persist.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{FlushMode, RunConfig};
use crate::dispatch::{Aligner, CommandAligner};
use crate::error::Result;
use crate::identity::IdentityParser;
use crate::manifest::{Manifest, ManifestAggregator};
use crate::pool::{ItemReport, ItemStatus, WorkerPool};
use crate::resolver::{ResolverFactory, SkipReason};
use crate::source::scan_sources;

/// Per-status counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub filtered: usize,
    pub unresolved: usize,
    pub setup_failed: usize,
    pub aligned: usize,
    pub align_failed: usize,
    pub already_aligned: usize,
    pub planned: usize,
    /// Items whose task ended without reporting.
    pub unreported: usize,
}

impl RunSummary {
    fn tally(&mut self, status: &ItemStatus) {
        match status {
            ItemStatus::Filtered => self.filtered += 1,
            ItemStatus::Unresolved(_) => self.unresolved += 1,
            ItemStatus::SetupFailed(_) => self.setup_failed += 1,
            ItemStatus::Aligned { .. } => self.aligned += 1,
            ItemStatus::AlignFailed { .. } => self.align_failed += 1,
            ItemStatus::AlreadyAligned { .. } => self.already_aligned += 1,
            ItemStatus::Planned(_) => self.planned += 1,
        }
    }

    /// Items that were accepted but could not be completed.
    pub fn failures(&self) -> usize {
        self.setup_failed + self.align_failed + self.unreported
    }

    /// Items that added an entry to the manifest.
    pub fn recorded(&self) -> usize {
        self.aligned + self.already_aligned
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub manifest: Manifest,
    /// Where the manifest was written; `None` for dry runs.
    pub manifest_path: Option<PathBuf>,
}

/// Run a batch with the external aligner described by `config.aligner`.
pub async fn run_batch(config: &RunConfig) -> Result<RunReport> {
    let aligner = CommandAligner::new(config.aligner.clone());
    run_batch_with(config, Arc::new(aligner)).await
}

/// Run a batch with an explicit aligner back-end.
///
/// Configuration problems abort before any dispatch. Per-item problems are
/// logged and counted; they never fail the run. The manifest is written
/// once every item has settled, and additionally after each record when
/// `config.flush` is [`FlushMode::EachRecord`].
pub async fn run_batch_with(config: &RunConfig, aligner: Arc<dyn Aligner>) -> Result<RunReport> {
    config.validate()?;
    let resolver = ResolverFactory::create(config.resolver.clone())?;

    if !config.layout.reference_root.is_dir() {
        warn!(
            root = %config.layout.reference_root.display(),
            "Reference image directory does not exist"
        );
    }

    let sources = scan_sources(&config.layout.source_root)?;

    let pool = WorkerPool::new(
        config.layout.clone(),
        IdentityParser::new(config.subject_range),
        resolver,
        aligner,
    )
    .with_workers(config.workers)
    .with_device(config.device)
    .with_dry_run(config.dry_run);
    let aggregator = pool.manifest();

    let mut summary = RunSummary {
        found: sources.len(),
        ..RunSummary::default()
    };

    let mut rx = pool.execute(sources);
    let mut settled = 0usize;
    while let Some(report) = rx.recv().await {
        settled += 1;
        log_report(config, &report, settled, summary.found);
        summary.tally(&report.status);

        if config.flush == FlushMode::EachRecord && report.status.recorded() && !config.dry_run {
            if let Err(e) = persist(config, &aggregator) {
                warn!(error = %e, "Incremental manifest flush failed");
            }
        }
    }

    if settled < summary.found {
        summary.unreported = summary.found - settled;
        error!(count = summary.unreported, "Items ended without reporting");
    }

    let (manifest, manifest_path) = if config.dry_run {
        (finalize(config, &aggregator), None)
    } else {
        let manifest = persist(config, &aggregator)?;
        info!(path = %config.manifest_path.display(), "Manifest file created");
        (manifest, Some(config.manifest_path.clone()))
    };

    info!(
        found = summary.found,
        aligned = summary.aligned,
        already_aligned = summary.already_aligned,
        failed = summary.failures(),
        "Run complete"
    );

    Ok(RunReport {
        summary,
        manifest,
        manifest_path,
    })
}

fn finalize(config: &RunConfig, aggregator: &ManifestAggregator) -> Manifest {
    let snapshot = aggregator.snapshot();
    if config.dedup {
        snapshot.deduplicated()
    } else {
        snapshot
    }
}

fn persist(config: &RunConfig, aggregator: &ManifestAggregator) -> Result<Manifest> {
    let manifest = finalize(config, aggregator);
    manifest.write(&config.manifest_path)?;
    Ok(manifest)
}

fn log_report(config: &RunConfig, report: &ItemReport, settled: usize, total: usize) {
    let source = report.source.display();
    debug!(
        "[{settled}/{total}] {source} settled in {:.2}s",
        report.elapsed.as_secs_f64()
    );

    match &report.status {
        // Rejections are logged by the identity parser.
        ItemStatus::Filtered => {}
        ItemStatus::Unresolved(reason @ SkipReason::OutputMissing(_)) => {
            debug!(%source, %reason, "Skipping video");
        }
        ItemStatus::Unresolved(reason) => {
            warn!(%source, %reason, "Skipping video");
        }
        ItemStatus::SetupFailed(error) => {
            warn!(%source, %error, "Failed to prepare result directory");
        }
        ItemStatus::Aligned { pair, outcome } => {
            info!(
                output = %pair.output_video.display(),
                reference = %pair.reference_image.display(),
                stdout = %outcome.stdout_excerpt,
                "Aligned"
            );
        }
        ItemStatus::AlignFailed { pair, outcome } => {
            warn!(
                output = %pair.output_video.display(),
                exit_code = ?outcome.exit_code,
                stderr = %outcome.stderr_excerpt,
                "Aligner failed"
            );
        }
        ItemStatus::AlreadyAligned { output_video } => {
            info!(output = %output_video.display(), "Recorded existing output");
        }
        ItemStatus::Planned(pair) => {
            info!(
                command = %config.aligner.display_for(pair, config.device),
                "[DRY RUN] Would align"
            );
        }
    }
}

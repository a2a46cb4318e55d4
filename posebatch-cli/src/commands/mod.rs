//! Subcommands, one per target-resolution policy.

pub mod collect;
pub mod map;
pub mod sample;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use posebatch_core::{
    run_batch, AlignerCommand, FlushMode, ResolverConfig, RunConfig, RunReport, SubjectRange,
    TreeLayout,
};
use tracing::debug;

use crate::exit_codes::{ExitCode, DISPATCH_FAILED};
use crate::utils::job_timeout;

/// Dataset locations and run options shared by every mode.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Root of the source clips (`<subject>-<condition>-<seq>-<view>.avi`)
    #[arg(long, value_name = "DIR", env = "POSEBATCH_VIDEOS_DIR")]
    pub videos_dir: PathBuf,

    /// Root of the reference images, mirroring the source tree
    #[arg(
        long = "original-videos-png-dir",
        value_name = "DIR",
        env = "POSEBATCH_PNG_DIR"
    )]
    pub png_dir: PathBuf,

    /// Root under which aligned outputs are written, mirroring the source tree
    #[arg(long, value_name = "DIR", env = "POSEBATCH_RESULT_DIR")]
    pub result_dir: PathBuf,

    /// Manifest written at the end of the run
    #[arg(
        long,
        value_name = "FILE",
        env = "POSEBATCH_YAML_FILE",
        default_value = posebatch_core::config::DEFAULT_MANIFEST_PATH
    )]
    pub yaml_file: PathBuf,

    /// Maximum concurrent items [default: 8, 16 for map]
    #[arg(long, value_name = "N", env = "POSEBATCH_NUM_PROCESSES")]
    pub num_processes: Option<usize>,

    /// Smallest accepted subject id [default: 75]
    #[arg(long, value_name = "ID", env = "POSEBATCH_MIN_GAIT_ID")]
    pub min_gait_id: Option<u32>,

    /// Largest accepted subject id [default: 124, 86 for map]
    #[arg(long, value_name = "ID", env = "POSEBATCH_MAX_GAIT_ID")]
    pub max_gait_id: Option<u32>,

    /// Rewrite the manifest after every recorded item
    #[arg(long, env = "POSEBATCH_FLUSH_EACH")]
    pub flush_each: bool,

    /// Drop repeated outputs under the same reference image
    #[arg(long, env = "POSEBATCH_DEDUP")]
    pub dedup: bool,
}

/// Aligner invocation options for the modes that dispatch jobs.
#[derive(Args, Debug, Clone)]
pub struct DispatchArgs {
    /// Root of the target clips, one subdirectory per view
    #[arg(long, value_name = "DIR", env = "POSEBATCH_TARGET_VIDEOS_DIR")]
    pub target_videos_dir: PathBuf,

    /// Accelerator index passed to the aligner
    #[arg(
        long,
        value_name = "INDEX",
        env = "POSEBATCH_GPU",
        default_value_t = posebatch_core::DEFAULT_DEVICE
    )]
    pub gpu: u32,

    /// Aligner executable
    #[arg(
        long,
        value_name = "PROGRAM",
        env = "POSEBATCH_ALIGNER_PROGRAM",
        default_value = "python"
    )]
    pub aligner_program: String,

    /// Argument placed before the named arguments (repeatable)
    #[arg(
        long = "aligner-arg",
        value_name = "ARG",
        env = "POSEBATCH_ALIGNER_ARG",
        default_value = "mypose.py",
        allow_hyphen_values = true
    )]
    pub aligner_args: Vec<String>,

    /// Kill a job after this many seconds (0 waits indefinitely)
    #[arg(long, value_name = "SECS", env = "POSEBATCH_JOB_TIMEOUT_SECS")]
    pub job_timeout_secs: Option<u64>,

    /// Resolve and log every job without running the aligner or writing files
    #[arg(long, env = "POSEBATCH_DRY_RUN")]
    pub dry_run: bool,

    /// Exit with status 65 when any job fails
    #[arg(long, env = "POSEBATCH_FAIL_ON_ERROR")]
    pub fail_on_error: bool,
}

/// Per-mode fallbacks for the optional shared arguments.
#[derive(Debug, Clone, Copy)]
pub struct ModeDefaults {
    pub workers: usize,
    pub min_subject: u32,
    pub max_subject: u32,
    pub flush: FlushMode,
}

impl ModeDefaults {
    pub const STANDARD: Self = Self {
        workers: posebatch_core::DEFAULT_WORKERS,
        min_subject: 75,
        max_subject: 124,
        flush: FlushMode::AtEnd,
    };
}

impl CommonArgs {
    fn layout(&self) -> TreeLayout {
        TreeLayout::new(&self.videos_dir, &self.png_dir, &self.result_dir)
    }

    /// Build the run configuration, falling back to `defaults` for unset options.
    pub fn to_config(&self, resolver: ResolverConfig, defaults: ModeDefaults) -> Result<RunConfig> {
        let range = SubjectRange::new(
            self.min_gait_id.unwrap_or(defaults.min_subject),
            self.max_gait_id.unwrap_or(defaults.max_subject),
        )?;
        let flush = if self.flush_each {
            FlushMode::EachRecord
        } else {
            defaults.flush
        };

        Ok(RunConfig::new(self.layout(), resolver)
            .with_manifest_path(&self.yaml_file)
            .with_subject_range(range)
            .with_workers(self.num_processes.unwrap_or(defaults.workers))
            .with_flush(flush)
            .with_dedup(self.dedup))
    }
}

impl DispatchArgs {
    pub fn apply(&self, config: RunConfig) -> RunConfig {
        let aligner = AlignerCommand::new(&self.aligner_program)
            .with_args(self.aligner_args.iter().cloned())
            .with_timeout(job_timeout(self.job_timeout_secs));

        config
            .with_aligner(aligner)
            .with_device(self.gpu)
            .with_dry_run(self.dry_run)
    }
}

/// Run the batch, print the summary and map the outcome to an exit code.
pub async fn execute(config: RunConfig, quiet: bool, fail_on_error: bool) -> Result<ExitCode> {
    debug!(?config, "Starting batch run");
    let report = run_batch(&config).await.context("Batch run failed")?;

    if !quiet {
        print_summary(&config, &report);
    }

    let failures = report.summary.failures();
    if fail_on_error && failures > 0 {
        return Ok(ExitCode::error(
            DISPATCH_FAILED,
            format!("{failures} item(s) failed"),
        ));
    }

    Ok(ExitCode::success())
}

fn print_summary(config: &RunConfig, report: &RunReport) {
    let s = &report.summary;

    println!();
    if config.dry_run {
        println!("{}", "Dry run complete (nothing written)".yellow().bold());
    } else if s.failures() == 0 {
        println!("{}", "Batch complete".green().bold());
    } else {
        println!("{}", "Batch complete with failures".yellow().bold());
    }
    println!();
    println!("   {} {}", "Policy:".dimmed(), config.resolver.policy());
    println!("   {} {}", "Videos found:".dimmed(), s.found);
    println!("   {} {}", "Filtered:".dimmed(), s.filtered);
    println!("   {} {}", "Unresolved:".dimmed(), s.unresolved);
    if config.resolver.policy().dispatches() {
        println!("   {} {}", "Aligned:".dimmed(), s.aligned);
        if s.align_failed > 0 {
            println!(
                "   {} {}",
                "Aligner failed:".dimmed(),
                s.align_failed.to_string().red()
            );
        }
    }
    println!("   {} {}", "Already present:".dimmed(), s.already_aligned);
    if s.setup_failed > 0 {
        println!(
            "   {} {}",
            "Setup failed:".dimmed(),
            s.setup_failed.to_string().red()
        );
    }
    if config.dry_run {
        println!("   {} {}", "Planned:".dimmed(), s.planned);
    }
    println!(
        "   {} {} reference(s), {} output(s)",
        "Recorded:".dimmed(),
        report.manifest.len(),
        report.manifest.output_count()
    );
    if let Some(path) = &report.manifest_path {
        println!("   {} {}", "Manifest:".dimmed(), path.display());
    }
}

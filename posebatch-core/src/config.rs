//! Run configuration.
//!
//! Assembled by the CLI from arguments and environment, then validated before
//! any source is scanned.

use std::path::PathBuf;

use crate::dispatch::AlignerCommand;
use crate::error::{PoseBatchError, Result};
use crate::identity::SubjectRange;
use crate::resolver::ResolverConfig;
use crate::source::TreeLayout;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_DEVICE: u32 = 0;
pub const DEFAULT_MANIFEST_PATH: &str = "./myconfig/test.yaml";

/// When the manifest is written during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Once, after every item has settled.
    #[default]
    AtEnd,
    /// After every recorded item, and once more at the end.
    EachRecord,
}

/// Everything a batch run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub layout: TreeLayout,
    pub manifest_path: PathBuf,
    pub resolver: ResolverConfig,
    pub subject_range: SubjectRange,
    /// Accelerator index passed to the aligner.
    pub device: u32,
    /// Maximum concurrent items.
    pub workers: usize,
    pub aligner: AlignerCommand,
    pub flush: FlushMode,
    /// Drop repeated outputs per reference when writing the manifest.
    pub dedup: bool,
    /// Resolve pairs and log them without dispatching or writing.
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(layout: TreeLayout, resolver: ResolverConfig) -> Self {
        Self {
            layout,
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            resolver,
            subject_range: SubjectRange::default(),
            device: DEFAULT_DEVICE,
            workers: DEFAULT_WORKERS,
            aligner: AlignerCommand::default(),
            flush: FlushMode::default(),
            dedup: false,
            dry_run: false,
        }
    }

    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_subject_range(mut self, range: SubjectRange) -> Self {
        self.subject_range = range;
        self
    }

    pub fn with_device(mut self, device: u32) -> Self {
        self.device = device;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_aligner(mut self, aligner: AlignerCommand) -> Self {
        self.aligner = aligner;
        self
    }

    pub fn with_flush(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }

    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check required paths and bounds. Any failure here aborts the run
    /// before a single job is dispatched.
    pub fn validate(&self) -> Result<()> {
        if !self.layout.source_root.is_dir() {
            return Err(PoseBatchError::Config(format!(
                "source directory does not exist: {}",
                self.layout.source_root.display()
            )));
        }

        if self.workers == 0 {
            return Err(PoseBatchError::Config(
                "worker count must be at least 1".into(),
            ));
        }

        if self.manifest_path.as_os_str().is_empty() {
            return Err(PoseBatchError::Config("manifest path is empty".into()));
        }

        match &self.resolver {
            ResolverConfig::Existing => {}
            ResolverConfig::Sample { target_root, .. } => check_target_root(target_root)?,
            ResolverConfig::Mapped {
                target_root,
                map_file,
            } => {
                check_target_root(target_root)?;
                if !map_file.is_file() {
                    return Err(PoseBatchError::Config(format!(
                        "video map file does not exist: {}",
                        map_file.display()
                    )));
                }
            }
        }

        if self.resolver.policy().dispatches() && self.aligner.program.trim().is_empty() {
            return Err(PoseBatchError::Config("aligner program is empty".into()));
        }

        Ok(())
    }
}

fn check_target_root(target_root: &std::path::Path) -> Result<()> {
    if target_root.is_dir() {
        Ok(())
    } else {
        Err(PoseBatchError::Config(format!(
            "target directory does not exist: {}",
            target_root.display()
        )))
    }
}

//! External pose-alignment tool invocation.
//!
//! The aligner is an opaque executable invoked as
//!
//! ```text
//! <program> [leading args...] --imgfn_refer <png> --vidfn <mp4> \
//!     --outfn_align_pose_video <mp4> --gpu <index>
//! ```
//!
//! Exit status 0 means success; anything else is a failure whose stderr is
//! captured. Failures are returned as data and never raised.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{PoseBatchError, Result};
use crate::source::ResolvedPair;

pub const ARG_REFERENCE_IMAGE: &str = "--imgfn_refer";
pub const ARG_TARGET_VIDEO: &str = "--vidfn";
pub const ARG_OUTPUT_VIDEO: &str = "--outfn_align_pose_video";
pub const ARG_DEVICE: &str = "--gpu";

/// Captured output is truncated to its last `MAX_EXCERPT_CHARS` characters.
pub const MAX_EXCERPT_CHARS: usize = 4096;

/// Result of one aligner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub ok: bool,
    /// `None` when the process could not be spawned, was killed by a signal,
    /// or timed out.
    pub exit_code: Option<i32>,
    pub stdout_excerpt: String,
    pub stderr_excerpt: String,
}

impl DispatchOutcome {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            ok: true,
            exit_code: Some(0),
            stdout_excerpt: stdout.into(),
            stderr_excerpt: String::new(),
        }
    }

    pub fn failure(exit_code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            ok: false,
            exit_code,
            stdout_excerpt: String::new(),
            stderr_excerpt: stderr.into(),
        }
    }
}

/// Trait for alignment back-ends.
///
/// Implementations must be thread-safe (`Send + Sync`) and must never
/// panic or return an error for a failing job.
#[async_trait]
pub trait Aligner: Send + Sync {
    /// Align `pair.target_video` onto `pair.reference_image`, writing
    /// `pair.output_video` on accelerator `device`.
    async fn align(&self, pair: &ResolvedPair, device: u32) -> DispatchOutcome;
}

/// How to launch the external aligner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignerCommand {
    pub program: String,
    /// Arguments placed before the four named arguments, e.g. a script path.
    pub leading_args: Vec<String>,
    /// Kill the job after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for AlignerCommand {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            leading_args: vec!["mypose.py".to_string()],
            timeout: None,
        }
    }
}

impl AlignerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argument vector after the program name.
    pub fn args_for(&self, pair: &ResolvedPair, device: u32) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            ARG_REFERENCE_IMAGE.to_string(),
            pair.reference_image.display().to_string(),
            ARG_TARGET_VIDEO.to_string(),
            pair.target_video.display().to_string(),
            ARG_OUTPUT_VIDEO.to_string(),
            pair.output_video.display().to_string(),
            ARG_DEVICE.to_string(),
            device.to_string(),
        ]);
        args
    }

    /// Human-readable command line, for dry runs and logs.
    pub fn display_for(&self, pair: &ResolvedPair, device: u32) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args_for(pair, device))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs the aligner as a child process per job.
#[derive(Debug, Clone, Default)]
pub struct CommandAligner {
    command: AlignerCommand,
}

impl CommandAligner {
    pub fn new(command: AlignerCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &AlignerCommand {
        &self.command
    }
}

#[async_trait]
impl Aligner for CommandAligner {
    #[instrument(skip_all, fields(output = %pair.output_video.display()))]
    async fn align(&self, pair: &ResolvedPair, device: u32) -> DispatchOutcome {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(self.command.args_for(pair, device))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %self.command.display_for(pair, device), "Spawning aligner");

        let output = match self.command.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return DispatchOutcome::failure(
                        None,
                        format!("aligner timed out after {}s", limit.as_secs_f64()),
                    )
                }
            },
            None => cmd.output().await,
        };

        match output {
            Ok(output) if output.status.success() => {
                DispatchOutcome::success(excerpt(&output.stdout))
            }
            Ok(output) => DispatchOutcome::failure(output.status.code(), excerpt(&output.stderr)),
            Err(e) => DispatchOutcome::failure(
                None,
                format!("failed to spawn {}: {e}", self.command.program),
            ),
        }
    }
}

/// Lossy UTF-8 decode keeping the trailing `MAX_EXCERPT_CHARS` characters.
pub fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_EXCERPT_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - MAX_EXCERPT_CHARS).collect()
}

/// Create the directory that will hold `output_video`. Safe to race.
pub async fn ensure_output_dir(output_video: &Path) -> Result<()> {
    let Some(dir) = output_video.parent() else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PoseBatchError::io(dir, e))
}

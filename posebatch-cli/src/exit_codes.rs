//! Exit codes following sysexits.h conventions.
//!
//! Scripts driving long batch runs can tell a bad invocation apart from a
//! missing dataset or an unwritable manifest.

use posebatch_core::PoseBatchError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments or option combination).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// At least one alignment job failed and `--fail-on-error` was given.
/// Maps to EX_DATAERR from sysexits.h.
pub const DISPATCH_FAILED: i32 = 65;

/// Input directory or map file missing or unreadable.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write manifest or result directories).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Core errors anywhere in the chain decide first
        let core = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<PoseBatchError>());

        let code = match core {
            Some(PoseBatchError::Config(detail)) if detail.contains("does not exist") => {
                INPUT_ERROR
            }
            Some(PoseBatchError::Config(_)) => USAGE_ERROR,
            Some(PoseBatchError::VideoMap { .. }) => INPUT_ERROR,
            Some(PoseBatchError::Io { .. }) | Some(PoseBatchError::ManifestSerialization(_)) => {
                IO_ERROR
            }
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(exit: ExitCode) -> Self {
        // Codes outside u8 collapse to the catch-all
        u8::try_from(exit.code)
            .map(std::process::ExitCode::from)
            .unwrap_or(std::process::ExitCode::FAILURE)
    }
}

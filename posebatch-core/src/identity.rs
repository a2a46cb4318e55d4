//! Filename-encoded video identity.
//!
//! Gait dataset clips are named `<subject>-<cond1>-<cond2>-<view>`, e.g.
//! `090-nm-05-054.avi`. This module decomposes such names and filters them
//! against the condition allow-list and a per-deployment subject range.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PoseBatchError, Result};

/// Gait conditions accepted for alignment (normal walk, bag, clothing change).
pub const ALLOWED_CONDITIONS: [&str; 6] = ["nm-05", "nm-06", "bg-01", "bg-02", "cl-01", "cl-02"];

const NAME_TOKENS: usize = 4;

/// Structured identity decoded from a source filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VideoIdentity {
    pub subject_id: u32,
    /// Two hyphen-joined tokens, e.g. `nm-05`.
    pub condition: String,
    /// Camera view code, passed through unchanged.
    pub view: String,
}

/// Inclusive range of subject ids accepted by a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectRange {
    min: u32,
    max: u32,
}

impl SubjectRange {
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min > max {
            return Err(PoseBatchError::Config(format!(
                "subject id range is empty: min {min} > max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, subject_id: u32) -> bool {
        (self.min..=self.max).contains(&subject_id)
    }
}

impl Default for SubjectRange {
    fn default() -> Self {
        Self { min: 75, max: 124 }
    }
}

impl fmt::Display for SubjectRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Why a filename did not yield an accepted identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityRejection {
    /// The stem does not split into exactly four `-` separated tokens.
    MalformedName { stem: String },
    /// Token 0 is not an integer.
    InvalidSubjectId(String),
    ConditionNotAllowed(String),
    SubjectOutOfRange { subject_id: u32, range: SubjectRange },
}

impl fmt::Display for IdentityRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedName { stem } => write!(f, "unexpected filename format: {stem}"),
            Self::InvalidSubjectId(token) => write!(f, "invalid subject id {token}"),
            Self::ConditionNotAllowed(condition) => {
                write!(f, "condition {condition} not in allowed list")
            }
            Self::SubjectOutOfRange { subject_id, range } => {
                write!(f, "subject id {subject_id} not in allowed range ({range})")
            }
        }
    }
}

/// Parses and validates filenames against a subject range.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityParser {
    range: SubjectRange,
}

impl IdentityParser {
    pub fn new(range: SubjectRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> SubjectRange {
        self.range
    }

    /// Parse a filename, logging and discarding any rejection.
    pub fn parse(&self, filename: &str) -> Option<VideoIdentity> {
        match self.try_parse(filename) {
            Ok(identity) => {
                debug!(
                    filename,
                    subject_id = identity.subject_id,
                    condition = %identity.condition,
                    view = %identity.view,
                    "Parsed video identity"
                );
                Some(identity)
            }
            Err(rejection) => {
                warn!(filename, reason = %rejection, "Skipping video");
                None
            }
        }
    }

    /// Parse a filename, returning the reason on rejection.
    ///
    /// Only the final extension is stripped, so `a-b-c-d.avi` has stem
    /// `a-b-c-d` while `a-b-c-d.x.avi` yields the view `d.x`.
    pub fn try_parse(&self, filename: &str) -> std::result::Result<VideoIdentity, IdentityRejection> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);

        let tokens: Vec<&str> = stem.split('-').collect();
        if tokens.len() != NAME_TOKENS {
            return Err(IdentityRejection::MalformedName {
                stem: stem.to_string(),
            });
        }

        let subject_id: u32 = tokens[0]
            .parse()
            .map_err(|_| IdentityRejection::InvalidSubjectId(tokens[0].to_string()))?;

        let condition = format!("{}-{}", tokens[1], tokens[2]);
        if !ALLOWED_CONDITIONS.contains(&condition.as_str()) {
            return Err(IdentityRejection::ConditionNotAllowed(condition));
        }

        if !self.range.contains(subject_id) {
            return Err(IdentityRejection::SubjectOutOfRange {
                subject_id,
                range: self.range,
            });
        }

        Ok(VideoIdentity {
            subject_id,
            condition,
            view: tokens[3].to_string(),
        })
    }
}

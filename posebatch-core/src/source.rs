//! Source tree scanning and mirrored path derivation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{PoseBatchError, Result};
use crate::identity::{IdentityParser, VideoIdentity};

pub const SOURCE_EXTENSION: &str = "avi";
pub const REFERENCE_EXTENSION: &str = "png";
pub const OUTPUT_EXTENSION: &str = "mp4";

/// A source clip whose filename decoded into an accepted identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceVideo {
    pub path: PathBuf,
    /// Filename without extension, e.g. `090-nm-05-054`.
    pub stem: String,
    pub identity: VideoIdentity,
}

impl SourceVideo {
    /// Decode `path`'s filename; `None` when the parser rejects it.
    pub fn from_path(path: PathBuf, parser: &IdentityParser) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;
        let identity = parser.parse(file_name)?;
        let stem = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            path,
            stem,
            identity,
        })
    }
}

/// A fully determined (reference image, target clip, output path) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPair {
    pub reference_image: PathBuf,
    pub target_video: PathBuf,
    pub output_video: PathBuf,
}

/// Root directories whose structure mirrors the source tree.
#[derive(Debug, Clone)]
pub struct TreeLayout {
    pub source_root: PathBuf,
    pub reference_root: PathBuf,
    pub result_root: PathBuf,
}

impl TreeLayout {
    pub fn new(
        source_root: impl Into<PathBuf>,
        reference_root: impl Into<PathBuf>,
        result_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            reference_root: reference_root.into(),
            result_root: result_root.into(),
        }
    }

    /// Directory of `source` relative to the source root.
    ///
    /// Files sitting directly under the root map to the empty path.
    pub fn relative_dir<'a>(&self, source: &'a Path) -> &'a Path {
        source
            .strip_prefix(&self.source_root)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""))
    }

    /// `<reference_root>/<rel_dir>/<stem>.png`
    pub fn reference_image(&self, video: &SourceVideo) -> PathBuf {
        self.reference_root
            .join(self.relative_dir(&video.path))
            .join(format!("{}.{REFERENCE_EXTENSION}", video.stem))
    }

    /// `<result_root>/<rel_dir>`
    pub fn result_dir(&self, video: &SourceVideo) -> PathBuf {
        self.result_root.join(self.relative_dir(&video.path))
    }

    /// `<result_root>/<rel_dir>/<stem>.mp4`
    pub fn output_video(&self, video: &SourceVideo) -> PathBuf {
        self.result_dir(video)
            .join(format!("{}.{OUTPUT_EXTENSION}", video.stem))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == extension)
}

/// Recursively collect files with `extension` under `root`, sorted by path.
///
/// Hidden files and directories are skipped. Entries the walk cannot read
/// (permission errors, symlink loops) are logged and skipped.
pub fn find_files(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PoseBatchError::Config(format!(
            "directory does not exist: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && has_extension(entry.path(), extension) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Enumerate every `.avi` under the source root.
pub fn scan_sources(source_root: &Path) -> Result<Vec<PathBuf>> {
    let videos = find_files(source_root, SOURCE_EXTENSION)?;
    info!(root = %source_root.display(), count = videos.len(), "Found {} videos", videos.len());
    debug!(first = ?videos.first(), last = ?videos.last(), "Source enumeration bounds");
    Ok(videos)
}

//! Map policy: explicit source → target assignments from a JSON file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use super::{Resolution, ResolverPolicy, SkipReason, TargetResolver};
use crate::error::{PoseBatchError, Result};
use crate::source::{SourceVideo, OUTPUT_EXTENSION};

/// One entry of the video map. Additional fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapEntry {
    /// Target stem (no extension) chosen by the max-distance criterion.
    pub max_distance: String,
}

/// Source stem → chosen target, as produced by the distance precomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct VideoMap(HashMap<String, MapEntry>);

impl VideoMap {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| PoseBatchError::io(path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| PoseBatchError::VideoMap {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, stem: &str) -> Option<&MapEntry> {
        self.0.get(stem)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, MapEntry)> for VideoMap {
    fn from_iter<I: IntoIterator<Item = (String, MapEntry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Looks up `<target_root>/<view>/<max_distance>.mp4` for each source.
#[derive(Debug)]
pub struct MappedResolver {
    target_root: PathBuf,
    map: VideoMap,
}

impl MappedResolver {
    pub fn new(target_root: impl Into<PathBuf>, map: VideoMap) -> Self {
        Self {
            target_root: target_root.into(),
            map,
        }
    }
}

impl TargetResolver for MappedResolver {
    fn resolve(&self, video: &SourceVideo, _output_video: &Path) -> Resolution {
        let Some(entry) = self.map.get(&video.stem) else {
            return Resolution::Unresolved(SkipReason::NotInMap(video.stem.clone()));
        };

        let target = self
            .target_root
            .join(&video.identity.view)
            .join(format!("{}.{OUTPUT_EXTENSION}", entry.max_distance));

        if !target.exists() {
            return Resolution::Unresolved(SkipReason::MappedFileMissing(target));
        }

        info!(source = %video.stem, target = %target.display(), "Selected .mp4 file");
        Resolution::Target(target)
    }

    fn policy(&self) -> ResolverPolicy {
        ResolverPolicy::Mapped
    }
}

//! Reference image → output video manifest.
//!
//! Workers call [`ManifestAggregator::record`] concurrently; the coordinator
//! takes a [`Manifest`] snapshot once every job has settled (or after each
//! record when flushing incrementally) and writes it as YAML:
//!
//! ```yaml
//! test_cases:
//!   /png/090/nm-05/090-nm-05-054.png:
//!   - /out/090/nm-05/090-nm-05-054.mp4
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PoseBatchError, Result};

/// Persisted mapping from reference image path to output video paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub test_cases: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    /// Number of reference images.
    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    /// Number of output entries across all reference images.
    pub fn output_count(&self) -> usize {
        self.test_cases.values().map(Vec::len).sum()
    }

    pub fn outputs_for(&self, reference_image: &str) -> Option<&[String]> {
        self.test_cases.get(reference_image).map(Vec::as_slice)
    }

    /// Copy with repeated outputs under the same reference removed.
    pub fn deduplicated(&self) -> Self {
        let test_cases = self
            .test_cases
            .iter()
            .map(|(reference, outputs)| {
                let mut unique = outputs.clone();
                unique.sort();
                unique.dedup();
                (reference.clone(), unique)
            })
            .collect();
        Self { test_cases }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| PoseBatchError::io(path, e))?;
        Self::from_yaml(&yaml)
    }

    /// Write to `path`, creating its parent directory.
    ///
    /// The document is written to a sibling temporary file and renamed into
    /// place, so readers never observe a partial manifest.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| PoseBatchError::io(dir, e))?;
        }

        let yaml = self.to_yaml()?;
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = Path::new(&tmp_name);

        std::fs::write(tmp, yaml).map_err(|e| PoseBatchError::io(tmp, e))?;
        std::fs::rename(tmp, path).map_err(|e| PoseBatchError::io(path, e))?;

        debug!(
            path = %path.display(),
            references = self.len(),
            outputs = self.output_count(),
            "Wrote manifest"
        );
        Ok(())
    }
}

/// Concurrent accumulator for manifest entries.
///
/// `record` is an upsert-append: a new reference gets a singleton list, an
/// existing one gets the output appended. Entries are never overwritten or
/// deduplicated here.
#[derive(Default)]
pub struct ManifestAggregator {
    entries: DashMap<String, Vec<String>>,
}

impl ManifestAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, reference_image: &Path, output_video: &Path) {
        self.entries
            .entry(reference_image.display().to_string())
            .or_default()
            .push(output_video.display().to_string());
    }

    /// Copy of the current entries. Output lists are sorted so the result
    /// does not depend on the order in which workers finished.
    pub fn snapshot(&self) -> Manifest {
        let test_cases = self
            .entries
            .iter()
            .map(|entry| {
                let mut outputs = entry.value().clone();
                outputs.sort();
                (entry.key().clone(), outputs)
            })
            .collect();
        Manifest { test_cases }
    }

    /// Number of reference images recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ManifestAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestAggregator")
            .field("references", &self.entries.len())
            .finish()
    }
}

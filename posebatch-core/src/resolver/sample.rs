//! Random-sample policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use sha3::{Digest, Sha3_256};
use tracing::{debug, info, warn};

use super::{Resolution, ResolverPolicy, SkipReason, TargetResolver};
use crate::source::{find_files, SourceVideo, OUTPUT_EXTENSION};

/// Picks a target clip uniformly from the source's view directory.
///
/// The candidate pool is sorted, and every source gets its own generator
/// derived from `(seed, stem)`, so a selection depends only on the seed, the
/// pool contents and the source name. Worker scheduling and filesystem
/// listing order do not affect it.
pub struct SampleResolver {
    target_root: PathBuf,
    seed: u64,
    /// Candidate pools keyed by view, enumerated once per run.
    pools: DashMap<String, Arc<Vec<PathBuf>>>,
}

impl SampleResolver {
    pub fn new(target_root: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            target_root: target_root.into(),
            seed,
            pools: DashMap::new(),
        }
    }

    /// Directory holding the candidates for `view`.
    pub fn view_dir(&self, view: &str) -> PathBuf {
        self.target_root.join(view)
    }

    /// Sorted candidate clips for `view`. A missing or unreadable view
    /// directory yields an empty pool.
    pub fn candidates(&self, view: &str) -> Arc<Vec<PathBuf>> {
        if let Some(pool) = self.pools.get(view) {
            return Arc::clone(pool.value());
        }

        // Enumerate under the entry lock so concurrent first lookups for a
        // view wait for one walk instead of repeating it.
        let entry = self
            .pools
            .entry(view.to_string())
            .or_insert_with(|| Arc::new(self.enumerate(view)));
        Arc::clone(entry.value())
    }

    fn enumerate(&self, view: &str) -> Vec<PathBuf> {
        let dir = self.view_dir(view);
        let pool = if dir.is_dir() {
            find_files(&dir, OUTPUT_EXTENSION).unwrap_or_else(|e| {
                warn!(dir = %dir.display(), error = %e, "Failed to enumerate target clips");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        debug!(view, count = pool.len(), "Enumerated target candidates");
        pool
    }

    fn rng_for(&self, stem: &str) -> StdRng {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(stem.as_bytes());

        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hasher.finalize());
        StdRng::from_seed(seed)
    }

    /// Choose from an explicit pool using the generator for `stem`.
    pub fn choose<'a>(&self, stem: &str, pool: &'a [PathBuf]) -> Option<&'a PathBuf> {
        pool.choose(&mut self.rng_for(stem))
    }
}

impl TargetResolver for SampleResolver {
    fn resolve(&self, video: &SourceVideo, _output_video: &Path) -> Resolution {
        let pool = self.candidates(&video.identity.view);
        match self.choose(&video.stem, &pool) {
            Some(selected) => {
                info!(source = %video.stem, target = %selected.display(), "Selected .mp4 file");
                Resolution::Target(selected.clone())
            }
            None => Resolution::Unresolved(SkipReason::NoCandidates(
                self.view_dir(&video.identity.view),
            )),
        }
    }

    fn policy(&self) -> ResolverPolicy {
        ResolverPolicy::Sample
    }
}

impl std::fmt::Debug for SampleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleResolver")
            .field("target_root", &self.target_root)
            .field("seed", &self.seed)
            .field("cached_views", &self.pools.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityParser, SubjectRange};
    use std::fs;
    use tempfile::TempDir;

    fn video(name: &str) -> SourceVideo {
        let parser = IdentityParser::new(SubjectRange::new(0, 999).unwrap());
        SourceVideo::from_path(PathBuf::from(format!("/src/{name}")), &parser).unwrap()
    }

    fn target_tree(clips: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for clip in clips {
            let path = temp.path().join(clip);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"clip").unwrap();
        }
        temp
    }

    #[test]
    fn test_same_seed_same_selection() {
        let pool: Vec<PathBuf> = (0..50).map(|i| PathBuf::from(format!("c{i:02}.mp4"))).collect();

        let a = SampleResolver::new("/t", 42);
        let b = SampleResolver::new("/t", 42);
        for stem in ["090-nm-05-054", "091-bg-01-000", "100-cl-02-180"] {
            assert_eq!(a.choose(stem, &pool), b.choose(stem, &pool));
            // repeated draws on one resolver are stable too
            assert_eq!(a.choose(stem, &pool), a.choose(stem, &pool));
        }
    }

    #[test]
    fn test_different_seeds_vary_selection() {
        let pool: Vec<PathBuf> = (0..100).map(|i| PathBuf::from(format!("c{i:03}.mp4"))).collect();
        let stems: Vec<String> = (75..95).map(|i| format!("{i:03}-nm-05-054")).collect();

        let a = SampleResolver::new("/t", 1);
        let b = SampleResolver::new("/t", 2);
        let differing = stems
            .iter()
            .filter(|s| a.choose(s, &pool) != b.choose(s, &pool))
            .count();
        assert!(differing > 0, "Different seeds should change some selections");
    }

    #[test]
    fn test_selection_comes_from_view_directory() {
        let temp = target_tree(&["054/a.mp4", "054/sub/b.mp4", "054/c.avi", "090/d.mp4"]);
        let resolver = SampleResolver::new(temp.path(), 42);

        let v = video("090-nm-05-054.avi");
        match resolver.resolve(&v, Path::new("/o/unused.mp4")) {
            Resolution::Target(path) => {
                assert!(path.starts_with(temp.path().join("054")));
                assert_eq!(path.extension().unwrap(), "mp4");
            }
            other => panic!("expected a target, got {other:?}"),
        }
        assert_eq!(resolver.candidates("054").len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_keeps_valid_clips() {
        let temp = target_tree(&["054/a.mp4"]);
        fs::create_dir_all(temp.path().join("054/sub")).unwrap();
        std::os::unix::fs::symlink(temp.path().join("054"), temp.path().join("054/sub/loop"))
            .unwrap();
        let resolver = SampleResolver::new(temp.path(), 42);

        assert_eq!(*resolver.candidates("054"), vec![temp.path().join("054/a.mp4")]);
        let v = video("090-nm-05-054.avi");
        assert_eq!(
            resolver.resolve(&v, Path::new("/o/unused.mp4")),
            Resolution::Target(temp.path().join("054/a.mp4"))
        );
    }

    #[test]
    fn test_empty_pool_is_unresolved() {
        let temp = target_tree(&["090/d.mp4"]);
        let resolver = SampleResolver::new(temp.path(), 42);

        let v = video("090-nm-05-054.avi");
        assert_eq!(
            resolver.resolve(&v, Path::new("/o/unused.mp4")),
            Resolution::Unresolved(SkipReason::NoCandidates(temp.path().join("054")))
        );
    }

    #[test]
    fn test_resolution_stable_across_resolvers() {
        let temp = target_tree(&["054/a.mp4", "054/b.mp4", "054/c.mp4", "054/d.mp4"]);
        let v = video("090-nm-05-054.avi");

        let first = SampleResolver::new(temp.path(), 7).resolve(&v, Path::new("/o/x.mp4"));
        let second = SampleResolver::new(temp.path(), 7).resolve(&v, Path::new("/o/x.mp4"));
        assert_eq!(first, second);
    }
}

//! Compute-once file cache keyed by derived file names.
//!
//! An artifact is produced into a uniquely named temporary file in the
//! cache directory and renamed into place only once the producer returns
//! successfully, so a reader never sees a partial artifact. Probing never
//! touches the filesystem beyond a metadata lookup.
//!
//! Two processes racing on the same key may both compute. The first rename
//! wins; the loser discards its own output and returns the winner's path.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use uuid::Uuid;

/// Something that names exactly one artifact inside a cache directory.
pub trait CacheKey {
    fn file_name(&self) -> String;
}

/// Result of looking a key up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The artifact exists at this path.
    Present(PathBuf),
    /// The artifact would live at this path but has not been generated.
    Missing(PathBuf),
}

impl Lookup {
    pub fn path(&self) -> &Path {
        match self {
            Self::Present(p) | Self::Missing(p) => p,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// A directory of write-once artifacts.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Creates a cache rooted at `dir`. The directory is created lazily on
    /// the first write, never by a probe.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for<K: CacheKey>(&self, key: &K) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Reports whether the artifact for `key` exists, without producing it.
    pub fn probe<K: CacheKey>(&self, key: &K) -> Lookup {
        let path = self.path_for(key);
        if path.exists() {
            Lookup::Present(path)
        } else {
            Lookup::Missing(path)
        }
    }

    /// Returns the artifact path for `key`, running `produce` first if the
    /// artifact does not exist yet.
    ///
    /// `produce` receives the temporary path it must write to. On error the
    /// temporary file is removed and the error is returned unchanged.
    pub fn get_or_compute<K, F, E>(&self, key: &K, produce: F) -> Result<PathBuf, E>
    where
        K: CacheKey,
        F: FnOnce(&Path) -> Result<(), E>,
        E: From<io::Error>,
    {
        let dest = match self.probe(key) {
            Lookup::Present(path) => {
                info!(path = %path.display(), "artifact exists, skipping generation");
                return Ok(path);
            }
            Lookup::Missing(path) => path,
        };

        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            key.file_name(),
            Uuid::new_v4().simple()
        ));

        if let Err(e) = produce(&tmp) {
            discard(&tmp);
            return Err(e);
        }

        if dest.exists() {
            warn!(
                path = %dest.display(),
                "artifact appeared while generating; keeping the existing one"
            );
            discard(&tmp);
            return Ok(dest);
        }
        if let Err(e) = fs::rename(&tmp, &dest) {
            discard(&tmp);
            return Err(e.into());
        }

        info!(path = %dest.display(), "artifact written");
        Ok(dest)
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove temporary artifact");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::Cell;

    use tempfile::TempDir;

    struct Name(&'static str);

    impl CacheKey for Name {
        fn file_name(&self) -> String {
            self.0.to_string()
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn computes_once() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("out"));
        let calls = Cell::new(0);
        let produce = |tmp: &Path| -> io::Result<()> {
            calls.set(calls.get() + 1);
            fs::write(tmp, "artifact")
        };

        let first = cache.get_or_compute(&Name("a.db"), produce).unwrap();
        let second = cache.get_or_compute(&Name("a.db"), produce).unwrap();

        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("out").join("a.db"));
        assert_eq!(calls.get(), 1);
        assert_eq!(fs::read_to_string(first).unwrap(), "artifact");
    }

    #[test]
    fn probe_reports_without_creating_anything() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("out"));

        let lookup = cache.probe(&Name("a.db"));
        assert_eq!(lookup, Lookup::Missing(dir.path().join("out").join("a.db")));
        assert!(!lookup.exists());
        assert!(!dir.path().join("out").exists());

        cache
            .get_or_compute(&Name("a.db"), |tmp| fs::write(tmp, "x"))
            .unwrap();
        assert!(cache.probe(&Name("a.db")).exists());
    }

    #[test]
    fn failed_producer_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());

        let err = cache
            .get_or_compute(&Name("a.db"), |tmp| {
                fs::write(tmp, "partial")?;
                Err(io::Error::other("boom"))
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn existing_artifact_wins_a_race() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let dest = dir.path().join("a.db");

        let path = cache
            .get_or_compute(&Name("a.db"), |tmp| {
                // Another writer finishes first.
                fs::write(&dest, "theirs")?;
                fs::write(tmp, "ours")
            })
            .unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "theirs");
        assert_eq!(entries(dir.path()), ["a.db"]);
    }
}

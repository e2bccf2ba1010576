//! Utilities for tests of the `shader-make` crates.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Context as _;
use tempfile::TempDir;

/// `TestEnv` sets up a temp dir holding a shader project: config file, sources and outputs.
/// Dropping `TestEnv` will clean up the dir, except when panic unwinding, so you can debug failures.
#[must_use]
pub struct TestEnv(TempDir);

impl TestEnv {
    /// Create a new [`TestEnv`]
    ///
    /// # Panics
    /// If the temp dir could not be created.
    #[expect(clippy::new_without_default, reason = "creates a directory on disk")]
    #[expect(clippy::unwrap_used, reason = "only used in tests")]
    pub fn new() -> Self {
        Self(TempDir::with_prefix("shader-make-test").unwrap())
    }

    /// The root of the test directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.0.path()
    }

    /// Writes `contents` into `relative` inside the test directory, creating parent directories.
    ///
    /// # Errors
    /// Any IO error.
    pub fn write_file(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> anyhow::Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Like [`Self::write_file`], then sets the modification time of the file to `modified`.
    ///
    /// # Errors
    /// Any IO error.
    pub fn write_file_at(
        &self,
        relative: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
        modified: SystemTime,
    ) -> anyhow::Result<PathBuf> {
        let path = self.write_file(relative, contents)?;
        set_modified(&path, modified)?;
        Ok(path)
    }

    /// Reads a file inside the test directory.
    ///
    /// # Errors
    /// Any IO error.
    pub fn read(&self, relative: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
        let path = self.path().join(relative);
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        // when a test fails, keep directory
        if std::thread::panicking() {
            self.0.disable_cleanup(true);
        }
    }
}

/// Sets the modification time of an existing file.
///
/// # Errors
/// Any IO error.
pub fn set_modified(path: &Path, modified: SystemTime) -> anyhow::Result<()> {
    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(modified))
        .with_context(|| format!("setting modification time of {}", path.display()))
}

/// A whole-second point in time, so that it survives every filesystem's timestamp resolution.
#[must_use]
pub fn timestamp(seconds_since_epoch: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds_since_epoch)
}

/// A whole-second point in time `hours` after now.
#[must_use]
pub fn hours_from_now(hours: u64) -> SystemTime {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |since| since.as_secs());
    timestamp(now + hours * 3600)
}

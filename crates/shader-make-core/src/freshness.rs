//! Hierarchical modification times of shader sources.
//!
//! A source is as new as the newest file in its `#include` closure. Includes are resolved
//! relative to the including file first, then in each include directory in order. Results are
//! memoized per canonical path for the lifetime of a [`DependencyTracker`], so a header shared
//! by many shaders is only scanned once.

use core::fmt;
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::SystemTime,
};

use regex::Regex;

use crate::options::Options;

/// Matches `#include "file"` and `#include <file>`, capturing the file name.
static INCLUDE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[expect(clippy::unwrap_used, reason = "the pattern is a valid constant")]
    Regex::new(r#"^\s*#include\s+["<]([^>"]+)[>"]"#).unwrap()
});

/// The chain of files currently being scanned, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeStack(Vec<PathBuf>);

impl IncludeStack {
    /// The files on the stack, outermost first.
    #[inline]
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.0
    }

    /// Whether `file` is being scanned.
    #[inline]
    #[must_use]
    pub fn contains(&self, file: &Path) -> bool {
        self.0.iter().any(|entry| entry == file)
    }
}

impl fmt::Display for IncludeStack {
    /// Innermost file first, one per line.
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in self.0.iter().rev() {
            write!(f, "\n\t{}", file.display())?;
        }
        Ok(())
    }
}

/// An error while walking the include graph of a source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub enum DependencyError {
    /// A file of the closure could not be read.
    #[error("can't open file {}, included in:{stack}", .file.display())]
    Open {
        /// The file that couldn't be read.
        file: PathBuf,
        /// The includers of the file.
        stack: IncludeStack,
        /// Source of the error.
        source: io::Error,
    },
    /// An include couldn't be found next to its includer nor in any include directory.
    #[error("can't find include file {include}, included in:{stack}")]
    MissingInclude {
        /// The include as written in the source.
        include: String,
        /// The includers, innermost being the file with the `#include`.
        stack: IncludeStack,
    },
    /// A file (transitively) includes itself.
    #[error("cyclic include of {}, included in:{stack}", .file.display())]
    CyclicInclude {
        /// The file included a second time.
        file: PathBuf,
        /// The includers.
        stack: IncludeStack,
    },
}

/// Computes and memoizes hierarchical modification times.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// Directories searched for includes not found next to their includer.
    include_dirs: Vec<PathBuf>,
    /// Include names whose changes never make a shader stale.
    relaxed_includes: Vec<String>,
    /// Finished results, keyed by canonical path.
    cache: HashMap<PathBuf, SystemTime>,
}

impl DependencyTracker {
    /// Creates a tracker with an empty cache.
    #[inline]
    #[must_use]
    pub fn new(include_dirs: Vec<PathBuf>, relaxed_includes: Vec<String>) -> Self {
        Self {
            include_dirs,
            relaxed_includes,
            cache: HashMap::new(),
        }
    }

    /// Creates a tracker using the include directories and relaxed includes of `options`.
    #[inline]
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        Self::new(options.include_dirs.clone(), options.relaxed_includes.clone())
    }

    /// Newest modification time among `file` and everything it transitively includes.
    ///
    /// # Errors
    /// If a file of the closure can't be read, an include can't be resolved, or the includes
    /// form a cycle.
    #[inline]
    pub fn hierarchical_time(&mut self, file: &Path) -> Result<SystemTime, DependencyError> {
        let mut stack = IncludeStack::default();
        self.visit(file, &mut stack)
    }

    /// Number of files with a memoized time.
    #[inline]
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn visit(
        &mut self,
        file: &Path,
        stack: &mut IncludeStack,
    ) -> Result<SystemTime, DependencyError> {
        let open_error = |source, stack: &IncludeStack| DependencyError::Open {
            file: file.to_path_buf(),
            stack: stack.clone(),
            source,
        };

        let canonical = dunce::canonicalize(file).map_err(|source| open_error(source, stack))?;
        if let Some(time) = self.cache.get(&canonical) {
            return Ok(*time);
        }
        if stack.contains(&canonical) {
            return Err(DependencyError::CyclicInclude {
                file: canonical,
                stack: stack.clone(),
            });
        }

        let modified = fs::metadata(&canonical)
            .and_then(|metadata| metadata.modified())
            .map_err(|source| open_error(source, stack))?;
        let contents = fs::read(&canonical).map_err(|source| open_error(source, stack))?;

        stack.0.push(canonical.clone());
        let newest = self.newest_include(&canonical, &contents, modified, stack);
        stack.0.pop();

        let newest = newest?;
        log::trace!("{} is as new as {newest:?}", canonical.display());
        self.cache.insert(canonical, newest);
        Ok(newest)
    }

    /// Folds the times of every include of `file` into `modified`.
    fn newest_include(
        &mut self,
        file: &Path,
        contents: &[u8],
        modified: SystemTime,
        stack: &mut IncludeStack,
    ) -> Result<SystemTime, DependencyError> {
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        let text = String::from_utf8_lossy(contents);

        let mut newest = modified;
        for line in text.lines() {
            let Some(include) = INCLUDE_PATTERN
                .captures(line)
                .and_then(|captures| captures.get(1))
                .map(|name| name.as_str())
            else {
                continue;
            };

            if self.relaxed_includes.iter().any(|relaxed| relaxed == include) {
                log::trace!("ignoring relaxed include {include} of {}", file.display());
                continue;
            }

            let Some(resolved) = self.resolve(dir, include) else {
                return Err(DependencyError::MissingInclude {
                    include: include.to_owned(),
                    stack: stack.clone(),
                });
            };
            newest = newest.max(self.visit(&resolved, stack)?);
        }
        Ok(newest)
    }

    fn resolve(&self, dir: &Path, include: &str) -> Option<PathBuf> {
        core::iter::once(dir)
            .chain(self.include_dirs.iter().map(PathBuf::as_path))
            .map(|base| base.join(include))
            .find(|candidate| candidate.is_file())
    }
}

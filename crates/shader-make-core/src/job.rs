//! A unit of compile work.

use std::path::{Path, PathBuf};

use crate::naming::with_suffix;

/// One compiler invocation: a source, entry point, profile and concrete set of defines.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct CompileJob {
    /// Source file as written in the config file.
    pub source: String,
    /// Entry point function.
    pub entry_point: String,
    /// Shader profile without the model, such as `ps`.
    pub profile: String,
    /// Macro definitions of the config line.
    pub defines: Vec<String>,
    /// `defines` joined by single spaces.
    pub combined_defines: String,
    /// Output path of the permutation without extension.
    pub output_stem: PathBuf,
    /// Optimization level, at most 3.
    pub optimization_level: u32,
}

impl CompileJob {
    /// Creates a job, clamping the optimization level to 3.
    #[inline]
    #[must_use]
    pub fn new(
        source: String,
        entry_point: String,
        profile: String,
        defines: Vec<String>,
        output_stem: PathBuf,
        optimization_level: u32,
    ) -> Self {
        let combined_defines = defines.join(" ");
        Self {
            source,
            entry_point,
            profile,
            defines,
            combined_defines,
            output_stem,
            optimization_level: optimization_level.min(3),
        }
    }

    /// Output path of the permutation with `suffix`, e.g. `.dxil` or `.dxil.h`.
    #[inline]
    #[must_use]
    pub fn output_file(&self, suffix: &str) -> PathBuf {
        with_suffix(&self.output_stem, suffix)
    }

    /// Directory the permutation is written to.
    #[inline]
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        self.output_stem.parent().unwrap_or_else(|| Path::new(""))
    }
}

//! Turning a config file into compile jobs.
//!
//! Every line goes through the [block stack](crate::preprocess::BlockStack) and
//! [brace expansion](crate::expand); every concrete line is parsed, named and checked for
//! staleness. Lines with errors are reported and skipped, the rest of the file is still
//! processed.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    blob::{BlobEntry, BlobGroups},
    config_line::{ConfigLine, ConfigLineError},
    expand::{expand_permutations, ExpandError},
    freshness::{DependencyError, DependencyTracker},
    job::CompileJob,
    naming::{permutation_name, shader_name, with_suffix},
    options::Options,
    preprocess::{BlockError, BlockStack, ConfigLineKind},
    run_state::RunState,
};

/// An error that stops the config file from being processed at all.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file can't be read.
    #[error("can't read config file {}: {source}", .file.display())]
    Read {
        /// The config file.
        file: PathBuf,
        /// Source of the error.
        source: io::Error,
    },
}

/// Why one line of the config file produced no jobs.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LineError {
    /// Unbalanced `#else` or `#endif`.
    #[error(transparent)]
    Block(#[from] BlockError),
    /// An unclosed brace group.
    #[error(transparent)]
    Expand(#[from] ExpandError),
    /// A concrete line isn't a valid shader description.
    #[error(transparent)]
    Parse(#[from] ConfigLineError),
    /// The staleness of the source can't be determined.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    /// An output directory can't be created.
    #[error("can't create output directory {}: {source}", .dir.display())]
    CreateDir {
        /// The directory.
        dir: PathBuf,
        /// Source of the error.
        source: io::Error,
    },
}

/// A [`LineError`] with its position in the config file.
#[derive(Debug, thiserror::Error)]
#[error("{} ({line},0): {error}", .file.display())]
pub struct LocatedLineError {
    /// The config file.
    pub file: PathBuf,
    /// 1-based line number.
    pub line: usize,
    /// What went wrong.
    pub error: LineError,
}

/// Everything found in a config file.
#[derive(Debug, Default)]
#[non_exhaustive]
pub struct Discovery {
    /// Jobs to run, in config file order.
    pub jobs: Vec<CompileJob>,
    /// Blob entries of the jobs, when blobs are requested.
    pub blobs: BlobGroups,
    /// Lines that were reported and skipped.
    pub errors: Vec<LocatedLineError>,
}

/// Walks a config file, producing [`CompileJob`]s for stale outputs.
#[derive(Debug)]
pub struct PermutationEngine<'run> {
    options: &'run Options,
    state: &'run RunState,
    tracker: DependencyTracker,
    /// Outputs older than this are stale regardless of their sources.
    config_time: SystemTime,
    blocks: BlockStack,
    discovery: Discovery,
}

impl<'run> PermutationEngine<'run> {
    /// Creates an engine for the config file of `options`.
    ///
    /// # Errors
    /// If the modification time of the config file can't be read.
    #[inline]
    pub fn new(options: &'run Options, state: &'run RunState) -> Result<Self, ConfigError> {
        let config_time = modification_time(&options.config).map_err(|source| ConfigError::Read {
            file: options.config.clone(),
            source,
        })?;
        Ok(Self {
            options,
            state,
            tracker: DependencyTracker::from_options(options),
            config_time: config_time.max(tool_time()),
            blocks: BlockStack::default(),
            discovery: Discovery::default(),
        })
    }

    /// Reads and processes the whole config file.
    ///
    /// # Errors
    /// If the config file can't be read. Errors of single lines are reported through the
    /// [`RunState`] and collected in [`Discovery::errors`] instead.
    #[inline]
    pub fn gather(mut self) -> Result<Discovery, ConfigError> {
        let text = fs::read_to_string(&self.options.config).map_err(|source| ConfigError::Read {
            file: self.options.config.clone(),
            source,
        })?;
        self.process_text(&text);
        Ok(self.finish())
    }

    /// Processes config text line by line.
    #[inline]
    pub fn process_text(&mut self, text: &str) {
        for (index, line) in text.lines().enumerate() {
            if let Err(error) = self.process_line(line) {
                let located = LocatedLineError {
                    file: self.options.config.clone(),
                    line: index + 1,
                    error,
                };
                self.state.report_config_error(&located);
                self.discovery.errors.push(located);
            }
        }
        if self.blocks.depth() > 0 {
            log::warn!(
                "{}: {} conditional block(s) are never closed",
                self.options.config.display(),
                self.blocks.depth()
            );
        }
    }

    /// The jobs and blob groups found so far.
    #[inline]
    #[must_use]
    pub fn finish(self) -> Discovery {
        log::debug!(
            "{} job(s), {} blob(s), {} file(s) scanned for includes",
            self.discovery.jobs.len(),
            self.discovery.blobs.len(),
            self.tracker.cached()
        );
        self.discovery
    }

    fn process_line(&mut self, line: &str) -> Result<(), LineError> {
        let Some(content) = self
            .blocks
            .apply(ConfigLineKind::classify(line), self.options)?
        else {
            return Ok(());
        };
        for concrete in expand_permutations(content)? {
            self.process_concrete(&concrete)?;
        }
        Ok(())
    }

    fn process_concrete(&mut self, line: &str) -> Result<(), LineError> {
        let config_line = ConfigLine::parse(line)?;
        if !self.options.platform.supports_profile(&config_line.profile) {
            log::debug!(
                "{} can't build {} shaders, skipping {}",
                self.options.platform,
                config_line.profile,
                config_line.source
            );
            return Ok(());
        }

        let combined_defines = config_line.combined_defines();
        let shader = shader_name(
            &config_line.source,
            &config_line.entry_point,
            config_line.output_suffix.as_deref(),
            self.options.flatten || config_line.output_dir.is_some(),
        );
        let permutation = permutation_name(&shader, &combined_defines);
        let output_dir = match &config_line.output_dir {
            Some(subdir) => self.options.out.join(subdir),
            None => self.options.out.clone(),
        };

        let created_dirs = self.ensure_output_dirs(&shader.to_path(&output_dir))?;
        let output_stem = permutation.to_path(&output_dir);
        let blob_stem = shader.to_path(&output_dir);

        if !(self.options.force || created_dirs) && self.is_up_to_date(&config_line, &output_stem, &blob_stem)? {
            log::debug!("{} is up to date", output_stem.display());
            return Ok(());
        }

        let optimization = config_line.optimization.unwrap_or(self.options.optimization);
        let job = CompileJob::new(
            config_line.source,
            config_line.entry_point,
            config_line.profile,
            config_line.defines,
            output_stem,
            optimization,
        );
        if self.options.is_blob() {
            self.discovery.blobs.insert(
                blob_stem,
                BlobEntry {
                    permutation: job.output_stem.clone(),
                    defines: combined_defines,
                },
            );
        }
        self.discovery.jobs.push(job);
        self.state.add_task();
        Ok(())
    }

    /// Creates the directory of the outputs (and its `PDB` directory), returning whether
    /// anything had to be created.
    fn ensure_output_dirs(&self, shader_stem: &Path) -> Result<bool, LineError> {
        let mut dir = shader_stem
            .parent()
            .map_or_else(|| self.options.out.clone(), Path::to_path_buf);
        if self.options.pdb {
            dir.push("PDB");
        }
        if dir.is_dir() {
            return Ok(false);
        }
        fs::create_dir_all(&dir).map_err(|source| LineError::CreateDir { dir, source })?;
        Ok(true)
    }

    /// Whether every requested output exists and is newer than the source, its includes, the
    /// config file and the tool itself.
    fn is_up_to_date(
        &mut self,
        config_line: &ConfigLine,
        output_stem: &Path,
        blob_stem: &Path,
    ) -> Result<bool, LineError> {
        let Some(oldest_output) = self.oldest_output(output_stem, blob_stem) else {
            return Ok(false);
        };
        let source = self.options.source_path(&config_line.source);
        let newest_input = self.tracker.hierarchical_time(&source)?.max(self.config_time);
        Ok(oldest_output > newest_input)
    }

    /// Modification time of the oldest requested output, `None` if any is missing.
    fn oldest_output(&self, output_stem: &Path, blob_stem: &Path) -> Option<SystemTime> {
        let extension = self.options.output_extension();
        let header = format!("{extension}.h");
        let oldest = [
            (self.options.binary, output_stem, extension),
            (self.options.header, output_stem, header.as_str()),
            (self.options.binary_blob, blob_stem, extension),
            (self.options.header_blob, blob_stem, header.as_str()),
        ]
        .into_iter()
        .filter(|(requested, _, _)| *requested)
        .map(|(_, stem, suffix)| modification_time(&with_suffix(stem, suffix)).ok())
        .try_fold(None, |oldest: Option<SystemTime>, time| {
            let time = time?;
            Some(Some(oldest.map_or(time, |oldest| oldest.min(time))))
        })
        .flatten();
        oldest
    }
}

fn modification_time(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path).and_then(|metadata| metadata.modified())
}

/// When this program was built, so that upgrading it rebuilds everything.
fn tool_time() -> SystemTime {
    match std::env::current_exe().and_then(|exe| modification_time(&exe)) {
        Ok(time) => time,
        Err(error) => {
            log::debug!("can't determine the modification time of the executable: {error}");
            UNIX_EPOCH
        }
    }
}

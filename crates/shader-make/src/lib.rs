//! Command line tool for building HLSL shader permutations with DXC and FXC.
//!
//! `shader-make` reads a config file listing shaders and their permutations, compiles every
//! permutation whose outputs are older than its sources (including everything they
//! `#include`), and optionally packs the permutations of each shader into one blob.
//!
//! ## Config files
//!
//! ```text
//! // comments start with two slashes
//! basic.hlsl -T ps -D USE_FOG={0,1} -D QUALITY={LOW,HIGH}
//! #ifdef WITH_RAYTRACING
//! rt/shadows.hlsl -T lib -o rt
//! #endif
//! ```
//!
//! Each line is a source file relative to the config file, followed by `-T <profile>` and
//! optionally `-E <entry>`, `-D <define>`, `-o <subdir>`, `-O <level>` and
//! `--outputSuffix <suffix>`. Brace groups expand into one line per alternative.
//!
//! ## Settings files
//!
//! Options can also be kept in a TOML file passed with `--settings`; see [`settings`].

#![expect(clippy::pub_use, reason = "part of public API")]

use std::path::PathBuf;

pub use shader_make_core;

use shader_make_core::{
    build::{build, BuildOutcome},
    compiler::ProcessCompiler,
    options::Options,
    run_state::RunState,
};

pub mod locate;
pub mod merge;
pub mod settings;

/// The struct representing the main CLI.
#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
#[non_exhaustive]
pub struct Cli {
    /// Options of the build.
    #[clap(flatten)]
    pub options: Options,

    /// TOML file with default options, overridden by the command line.
    #[clap(long)]
    pub settings: Option<PathBuf>,

    /// Path of the compiler executable. Looked up on PATH (and in the Vulkan SDK for SPIRV)
    /// when not given.
    #[clap(long)]
    pub compiler: Option<PathBuf>,
}

impl Cli {
    /// Merges the settings file with the command line and validates the result.
    ///
    /// # Errors
    /// If the settings file is broken or the options are inconsistent.
    #[inline]
    pub fn resolve_options(&self) -> anyhow::Result<Options> {
        let mut options = settings::with_settings_file(self.settings.as_deref(), &self.options)?;
        options.validate()?;
        log::debug!("building with final merged options: {options:#?}");
        Ok(options)
    }

    /// The compiler to run for `options`.
    ///
    /// # Errors
    /// If no compiler can be found.
    #[inline]
    pub fn compiler(&self, options: &Options) -> anyhow::Result<ProcessCompiler> {
        let program = locate::locate_compiler(options.platform, self.compiler.as_deref())?;
        Ok(ProcessCompiler::new(program))
    }

    /// Runs the build.
    ///
    /// # Errors
    /// If no compiler can be found or the config file can't be read. Failed compilations are
    /// part of the [`BuildOutcome`].
    #[inline]
    pub fn run(&self, options: &Options, state: &RunState) -> anyhow::Result<BuildOutcome> {
        let compiler = self.compiler(options)?;
        let outcome = build(options, &compiler, state)?;
        log::info!(
            "{} of {} task(s) processed, {} failed",
            outcome.summary.processed,
            outcome.summary.original,
            outcome.summary.failed
        );
        Ok(outcome)
    }
}

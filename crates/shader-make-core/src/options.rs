//! Resolved settings of a shader build.
//!
//! [`Options`] is the single value object the engine reads. It can be parsed from the command
//! line (it derives [`clap::Parser`] so it may be flattened into a CLI) and deserialized from a
//! settings file (keys are `kebab-case`).

use core::fmt;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Shader binary format family the build targets.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Deserialize,
    serde::Serialize,
    clap::ValueEnum,
)]
#[non_exhaustive]
pub enum Platform {
    /// Legacy Direct3D bytecode, compiled by FXC.
    #[value(name = "DXBC", alias = "dxbc")]
    #[serde(rename = "DXBC", alias = "dxbc")]
    Dxbc,
    /// Direct3D 12 intermediate language, compiled by DXC.
    #[default]
    #[value(name = "DXIL", alias = "dxil")]
    #[serde(rename = "DXIL", alias = "dxil")]
    Dxil,
    /// Vulkan SPIR-V, compiled by DXC with `-spirv`.
    #[value(name = "SPIRV", alias = "spirv")]
    #[serde(rename = "SPIRV", alias = "spirv")]
    Spirv,
}

impl Platform {
    /// Upper-case name used in progress lines.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dxbc => "DXBC",
            Self::Dxil => "DXIL",
            Self::Spirv => "SPIRV",
        }
    }

    /// Extension of compiled shaders when none is configured, including the dot.
    #[inline]
    #[must_use]
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Dxbc => ".dxbc",
            Self::Dxil => ".dxil",
            Self::Spirv => ".spirv",
        }
    }

    /// Whether shaders of the given profile (`ps`, `lib`, `ms`, ...) can be built at all.
    ///
    /// FXC predates libraries, mesh and amplification shaders.
    #[inline]
    #[must_use]
    pub fn supports_profile(self, profile: &str) -> bool {
        match self {
            Self::Dxbc => !matches!(profile, "lib" | "ms" | "as"),
            Self::Dxil | Self::Spirv => true,
        }
    }

    /// Full compiler target such as `ps_6_5`. DXBC is always shader model `5_0`.
    #[inline]
    #[must_use]
    pub fn profile_target(self, profile: &str, shader_model: &str) -> String {
        match self {
            Self::Dxbc => format!("{profile}_5_0"),
            Self::Dxil | Self::Spirv => format!("{profile}_{shader_model}"),
        }
    }
}

impl fmt::Display for Platform {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the engine needs to know about a build.
#[derive(Debug, Clone, PartialEq, Eq, clap::Parser, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "kebab-case", default)]
#[non_exhaustive]
#[expect(
    clippy::struct_excessive_bools,
    reason = "mirrors the flags of the command line"
)]
pub struct Options {
    /// Target platform.
    #[clap(long, short = 'p', value_enum)]
    pub platform: Platform,

    /// Configuration file with the list of shaders to compile.
    #[clap(long, short = 'c')]
    pub config: PathBuf,

    /// Output directory.
    #[clap(long, short = 'o')]
    pub out: PathBuf,

    /// Output binary files.
    #[clap(long, short = 'b')]
    pub binary: bool,

    /// Output header files.
    #[clap(long)]
    pub header: bool,

    /// Output binary blob files.
    #[clap(long, short = 'B', alias = "binaryBlob")]
    pub binary_blob: bool,

    /// Output header blob files.
    #[clap(long, short = 'H', alias = "headerBlob")]
    pub header_blob: bool,

    /// Shader model for DXIL and SPIR-V, e.g. `6_5`.
    #[clap(long, short = 'm', alias = "shaderModel", default_value = "6_5")]
    pub shader_model: String,

    /// Optimization level 0-3 (3 by default, 0 disables optimizations).
    #[clap(long, short = 'O', default_value_t = 3)]
    pub optimization: u32,

    /// Treat warnings as errors (`-WX`).
    #[clap(long = "WX")]
    pub warnings_are_errors: bool,

    /// Assume all resources are bound (`-all_resources_bound`).
    #[clap(long, alias = "allResourcesBound")]
    pub all_resources_bound: bool,

    /// Output PDB files into a `PDB` directory next to the outputs.
    #[clap(long, alias = "PDB")]
    pub pdb: bool,

    /// Embed PDB data into the shader binary.
    #[clap(long, alias = "embedPDB")]
    pub embed_pdb: bool,

    /// Strip reflection data from shader binaries (`-Qstrip_reflect`).
    #[clap(long, alias = "stripReflection")]
    pub strip_reflection: bool,

    /// Pack matrices in row-major order (`-Zpr`).
    #[clap(long, alias = "matrixRowMajor")]
    pub matrix_row_major: bool,

    /// Enable the HLSL 2021 standard (`-HV 2021`).
    #[clap(long)]
    pub hlsl2021: bool,

    /// Vulkan memory layout: `dx`, `gl` or `scalar` (`-fvk-use-<VALUE>-layout`).
    #[clap(long, alias = "vulkanMemoryLayout")]
    pub vulkan_memory_layout: Option<String>,

    /// Custom compiler options, separated by spaces.
    #[clap(long, short = 'X', alias = "compilerOptions", allow_hyphen_values = true)]
    pub compiler_options: Vec<String>,

    /// Include directories.
    #[clap(long = "include", short = 'I')]
    pub include_dirs: Vec<PathBuf>,

    /// Macro definitions in forms `M=value` or `M`.
    #[clap(long = "define", short = 'D')]
    pub defines: Vec<String>,

    /// Treat all source files as modified.
    #[clap(long, short = 'f')]
    pub force: bool,

    /// Source directory, relative to the config file.
    #[clap(long, alias = "sourceDir")]
    pub source_dir: Option<PathBuf>,

    /// Include files whose changes don't trigger recompilation.
    #[clap(long = "relaxed-include", alias = "relaxedInclude")]
    pub relaxed_includes: Vec<String>,

    /// Extension of output files, `.dxbc`, `.dxil` or `.spirv` by default.
    #[clap(long, alias = "outputExt")]
    pub output_ext: Option<String>,

    /// Compile on a single thread.
    #[clap(long)]
    pub serial: bool,

    /// Flatten the source directory structure in the output directory.
    #[clap(long)]
    pub flatten: bool,

    /// Keep compiling after an error.
    #[clap(long = "continue")]
    pub continue_on_error: bool,

    /// Print compiler command lines before they are executed.
    #[clap(long)]
    pub verbose: bool,

    /// How many times to relaunch a compiler process that could not be run.
    #[clap(long, alias = "retryCount", default_value_t = 10)]
    pub retry_count: u32,

    /// Vulkan environment version (`-fspv-target-env=vulkan<VERSION>`).
    #[clap(long, alias = "vulkanVersion", default_value = "1.3")]
    pub vulkan_version: String,

    /// SPIR-V extensions permitted to use (`-fspv-extension=<EXT>`).
    #[clap(long, alias = "spirvExt")]
    pub spirv_ext: Vec<String>,

    /// SPIR-V register shift for sampler (`s#`) resources.
    #[clap(long, alias = "sRegShift", default_value_t = 100)]
    pub s_reg_shift: u32,

    /// SPIR-V register shift for texture (`t#`) resources.
    #[clap(long, alias = "tRegShift", default_value_t = 200)]
    pub t_reg_shift: u32,

    /// SPIR-V register shift for constant buffer (`b#`) resources.
    #[clap(long, alias = "bRegShift", default_value_t = 300)]
    pub b_reg_shift: u32,

    /// SPIR-V register shift for UAV (`u#`) resources.
    #[clap(long, alias = "uRegShift", default_value_t = 400)]
    pub u_reg_shift: u32,

    /// Don't pass any register shifts to the compiler.
    #[clap(long, alias = "noRegShifts")]
    pub no_reg_shifts: bool,
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            config: PathBuf::new(),
            out: PathBuf::new(),
            binary: false,
            header: false,
            binary_blob: false,
            header_blob: false,
            shader_model: "6_5".to_owned(),
            optimization: 3,
            warnings_are_errors: false,
            all_resources_bound: false,
            pdb: false,
            embed_pdb: false,
            strip_reflection: false,
            matrix_row_major: false,
            hlsl2021: false,
            vulkan_memory_layout: None,
            compiler_options: Vec::new(),
            include_dirs: Vec::new(),
            defines: Vec::new(),
            force: false,
            source_dir: None,
            relaxed_includes: Vec::new(),
            output_ext: None,
            serial: false,
            flatten: false,
            continue_on_error: false,
            verbose: false,
            retry_count: 10,
            vulkan_version: "1.3".to_owned(),
            spirv_ext: Vec::new(),
            s_reg_shift: 100,
            t_reg_shift: 200,
            b_reg_shift: 300,
            u_reg_shift: 400,
            no_reg_shifts: false,
        }
    }
}

impl Options {
    /// Whether any kind of blob output was requested.
    #[inline]
    #[must_use]
    pub const fn is_blob(&self) -> bool {
        self.binary_blob || self.header_blob
    }

    /// Extension of compiled shaders, including the dot.
    #[inline]
    #[must_use]
    pub fn output_extension(&self) -> &str {
        self.output_ext
            .as_deref()
            .unwrap_or_else(|| self.platform.default_extension())
    }

    /// Where a source path from the config file lives on disk:
    /// `<config dir>/<source dir>/<source>`.
    #[inline]
    #[must_use]
    pub fn source_path(&self, source: &str) -> PathBuf {
        let mut path = self
            .config
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);
        if let Some(source_dir) = &self.source_dir {
            path.push(source_dir);
        }
        path.push(source);
        path
    }

    /// Whether `name` is one of the global macro definitions, with or without a value.
    #[inline]
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.iter().any(|define| {
            define == name || define.split_once('=').is_some_and(|(macro_name, _)| macro_name == name)
        })
    }

    /// Checks the options for consistency and prepares the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file doesn't exist, the output directory can't be created
    /// or no kind of output was requested.
    #[inline]
    pub fn validate(&mut self) -> Result<(), OptionsError> {
        if !self.config.is_file() {
            return Err(OptionsError::MissingConfig(self.config.clone()));
        }

        if !self.out.is_dir() {
            log::debug!("creating output directory '{}'", self.out.display());
            if let Err(source) = fs::create_dir_all(&self.out) {
                return Err(OptionsError::CreateOutputDir {
                    dir: self.out.clone(),
                    source,
                });
            }
        }

        if !(self.binary || self.header || self.is_blob()) {
            return Err(OptionsError::NoOutput);
        }

        if let Some(ext) = &mut self.output_ext {
            if !ext.starts_with('.') {
                ext.insert(0, '.');
            }
        }

        Ok(())
    }
}

/// An error indicating that the [`Options`] can't be used for a build.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OptionsError {
    /// The config file doesn't exist.
    #[error("config file {} does not exist", .0.display())]
    MissingConfig(PathBuf),
    /// The output directory could not be created.
    #[error("could not create output directory {}: {source}", .dir.display())]
    CreateOutputDir {
        /// The directory we tried to create.
        dir: PathBuf,
        /// The source of the error.
        source: io::Error,
    },
    /// None of the output kinds was requested.
    #[error("one of 'binary', 'header', 'binary-blob' or 'header-blob' must be set")]
    NoOutput,
}

//! Parsing of one concrete (already expanded) config line.
//!
//! A line is a source path followed by options:
//!
//! ```text
//! path/to/shader.hlsl -T ps -E main_ps -D USE_FOO=1 -D BAR -O 2 -o subdir --outputSuffix _low
//! ```

/// A shader description of the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct ConfigLine {
    /// Source file, relative to the config file (and source directory).
    pub source: String,
    /// Shader profile without the model, such as `ps` or `cs`.
    pub profile: String,
    /// Entry point function.
    pub entry_point: String,
    /// Macro definitions, in order.
    pub defines: Vec<String>,
    /// Subdirectory of the output directory.
    pub output_dir: Option<String>,
    /// Optimization level overriding the global one.
    pub optimization: Option<u32>,
    /// Appended to the shader name.
    pub output_suffix: Option<String>,
}

/// The raw command line of a config line.
#[derive(Debug, clap::Parser)]
#[clap(
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct ConfigLineArgs {
    /// Source file.
    source: String,

    /// Shader profile.
    #[clap(long = "profile", short = 'T')]
    profile: Option<String>,

    /// Entry point.
    #[clap(long = "entryPoint", short = 'E', default_value = "main")]
    entry_point: String,

    /// Macro definitions.
    #[clap(long = "define", short = 'D')]
    defines: Vec<String>,

    /// Output subdirectory.
    #[clap(long = "output", short = 'o')]
    output_dir: Option<String>,

    /// Optimization level.
    #[clap(long = "optimization", short = 'O')]
    optimization: Option<u32>,

    /// Suffix of the output name.
    #[clap(long = "outputSuffix")]
    output_suffix: Option<String>,
}

/// A config line that isn't a valid shader description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub enum ConfigLineError {
    /// The options couldn't be parsed.
    #[error("{0}")]
    Syntax(String),
    /// There's no `-T`.
    #[error("shader target not specified")]
    MissingProfile,
}

impl ConfigLine {
    /// Parses one concrete config line.
    ///
    /// # Errors
    /// If the line contains unknown options or misses the profile.
    #[inline]
    pub fn parse(line: &str) -> Result<Self, ConfigLineError> {
        use clap::Parser as _;

        let args = ConfigLineArgs::try_parse_from(line.split_whitespace()).map_err(|error| {
            let rendered = error.to_string();
            let first_line = rendered.lines().next().unwrap_or_default();
            ConfigLineError::Syntax(
                first_line
                    .strip_prefix("error: ")
                    .unwrap_or(first_line)
                    .to_owned(),
            )
        })?;
        let profile = args.profile.ok_or(ConfigLineError::MissingProfile)?;

        Ok(Self {
            source: args.source,
            profile,
            entry_point: args.entry_point,
            defines: args.defines,
            output_dir: args.output_dir,
            optimization: args.optimization,
            output_suffix: args.output_suffix,
        })
    }

    /// The defines joined by single spaces; the input of the permutation hash.
    #[inline]
    #[must_use]
    pub fn combined_defines(&self) -> String {
        self.defines.join(" ")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn full_line() {
        let line = ConfigLine::parse(
            "post/tonemap.hlsl -T ps -E main_ps -D A=1 -D B -O 1 -o post --outputSuffix _low",
        )
        .unwrap();
        assert_eq!(line.source, "post/tonemap.hlsl");
        assert_eq!(line.profile, "ps");
        assert_eq!(line.entry_point, "main_ps");
        assert_eq!(line.defines, ["A=1", "B"]);
        assert_eq!(line.combined_defines(), "A=1 B");
        assert_eq!(line.optimization, Some(1));
        assert_eq!(line.output_dir.as_deref(), Some("post"));
        assert_eq!(line.output_suffix.as_deref(), Some("_low"));
    }

    #[test_log::test]
    fn defaults_and_long_names() {
        let line = ConfigLine::parse("a.hlsl   --profile cs").unwrap();
        assert_eq!(line.entry_point, "main");
        assert!(line.defines.is_empty());
        assert_eq!(line.combined_defines(), "");
        assert_eq!(line.optimization, None);
    }

    #[test_log::test]
    fn missing_profile() {
        assert_eq!(
            ConfigLine::parse("a.hlsl -E main").unwrap_err(),
            ConfigLineError::MissingProfile
        );
    }

    #[test_log::test]
    fn unknown_option() {
        assert!(matches!(
            ConfigLine::parse("a.hlsl -T ps --bogus").unwrap_err(),
            ConfigLineError::Syntax(_)
        ));
    }
}

//! Manage and merge the sources of options: an optional settings file and the command line.
//!
//! A settings file is TOML with the same keys as the long command line options:
//!
//! ```toml
//! shader-model = "6_6"
//! include-dirs = ["include"]
//! relaxed-includes = ["generated.h"]
//! continue-on-error = true
//! ```

use std::{fs, path::Path};

use anyhow::Context as _;
use shader_make_core::options::Options;

use crate::merge::merge;

/// Reads options from a TOML settings file. Missing keys keep their defaults.
///
/// # Errors
/// If the file can't be read or isn't valid.
#[inline]
pub fn from_settings_file(path: &Path) -> anyhow::Result<Options> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading settings file {}", path.display()))?;
    let options: Options =
        toml::from_str(&text).with_context(|| format!("parsing settings file {}", path.display()))?;
    log::debug!("options from {}: {options:#?}", path.display());
    Ok(options)
}

/// Overrides the options of the settings file with the ones given on the command line.
///
/// Platform, config file and output directory always come from the command line.
///
/// # Errors
/// If the settings file can't be read or merged.
#[inline]
pub fn with_settings_file(settings: Option<&Path>, cli: &Options) -> anyhow::Result<Options> {
    let Some(settings) = settings else {
        return Ok(cli.clone());
    };
    let from_file = from_settings_file(settings)?;
    let mut merged = merge(&from_file, cli)?;
    merged.platform = cli.platform;
    merged.config.clone_from(&cli.config);
    merged.out.clone_from(&cli.out);
    Ok(merged)
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use clap::Parser as _;
    use shader_make_core::options::Platform;
    use shader_make_test_utils::TestEnv;

    use super::*;

    fn cli(extra: &[&str]) -> Options {
        let mut args = vec!["shader-make", "-p", "SPIRV", "-c", "shaders.cfg", "-o", "out"];
        args.extend_from_slice(extra);
        Options::parse_from(args)
    }

    #[test_log::test]
    fn without_settings_file() {
        let options = with_settings_file(None, &cli(&["--binary"])).unwrap();
        assert!(options.binary);
        assert_eq!(options.platform, Platform::Spirv);
    }

    #[test_log::test]
    fn values_from_settings_file() {
        let env = TestEnv::new();
        let settings = env
            .write_file(
                "settings.toml",
                [
                    "shader-model = \"6_6\"",
                    "include-dirs = [\"include\", \"common\"]",
                    "continue-on-error = true",
                    "platform = \"DXBC\"",
                    "retry-count = 3",
                ]
                .join("\n"),
            )
            .unwrap();

        let options = with_settings_file(Some(&settings), &cli(&["--binary"])).unwrap();
        assert_eq!(options.shader_model, "6_6");
        assert_eq!(
            options.include_dirs,
            [PathBuf::from("include"), PathBuf::from("common")]
        );
        assert!(options.continue_on_error);
        assert!(options.binary);
        assert_eq!(options.retry_count, 3);
        assert_eq!(options.platform, Platform::Spirv);
        assert_eq!(options.config, PathBuf::from("shaders.cfg"));
    }

    #[test_log::test]
    fn command_line_overrides_settings_file() {
        let env = TestEnv::new();
        let settings = env
            .write_file(
                "settings.toml",
                "shader-model = \"6_6\"\ndefines = [\"FROM_FILE\"]\n",
            )
            .unwrap();

        let options =
            with_settings_file(Some(&settings), &cli(&["-m", "6_7", "-D", "FROM_CLI"])).unwrap();
        assert_eq!(options.shader_model, "6_7");
        assert_eq!(options.defines, ["FROM_CLI"]);
    }

    #[test_log::test]
    fn broken_settings_file() {
        let env = TestEnv::new();
        let settings = env
            .write_file("settings.toml", "optimization = \"high\"\n")
            .unwrap();
        let error = with_settings_file(Some(&settings), &cli(&[])).unwrap_err();
        assert!(error.to_string().contains("parsing settings file"));
    }
}

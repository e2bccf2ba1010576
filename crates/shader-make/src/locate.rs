//! Finding the compiler executable.
//!
//! An explicit `--compiler` always wins. Otherwise SPIR-V builds prefer the DXC shipped with the
//! Vulkan SDK (`$VULKAN_SDK/bin`), and everything else is looked up on `PATH`: `fxc` for DXBC,
//! `dxc` for DXIL and SPIR-V.

use std::{
    env,
    path::{Path, PathBuf},
};

use shader_make_core::options::Platform;

/// File name of the compiler for `platform`, without the platform's executable suffix.
#[inline]
#[must_use]
pub const fn compiler_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Dxbc => "fxc",
        _ => "dxc",
    }
}

/// Finds the compiler for `platform`.
///
/// # Errors
/// If an explicit compiler doesn't exist, or none can be found.
#[inline]
pub fn locate_compiler(platform: Platform, explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(explicit) = explicit {
        if explicit.is_file() {
            return Ok(explicit.to_path_buf());
        }
        anyhow::bail!("compiler {} does not exist", explicit.display());
    }

    let mut search = Vec::new();
    if platform == Platform::Spirv {
        if let Some(sdk) = env::var_os("VULKAN_SDK") {
            search.push(PathBuf::from(sdk).join("bin"));
        }
    }
    if let Some(path) = env::var_os("PATH") {
        search.extend(env::split_paths(&path));
    }

    let name = compiler_name(platform);
    let found = find_executable(name, &search);
    match found {
        Some(compiler) => {
            log::debug!("using {platform} compiler {}", compiler.display());
            Ok(compiler)
        }
        None => anyhow::bail!(
            "can't find `{name}`, put it on PATH or pass its location with --compiler"
        ),
    }
}

/// The first directory of `dirs` containing the executable `name`.
#[inline]
#[must_use]
pub fn find_executable(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let file_name = format!("{name}{}", env::consts::EXE_SUFFIX);
    dirs.iter()
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

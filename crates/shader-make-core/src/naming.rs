//! Names of shaders, their permutations and the symbols of generated headers.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use relative_path::RelativePathBuf;

use crate::options::Platform;

/// Offset basis of 64-bit FNV-1a.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
/// Prime of 64-bit FNV-1a.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash of the combined defines string that tells permutations of one shader apart.
///
/// 64-bit FNV-1a over the UTF-8 bytes, truncated to the low 32 bits. The result is stable
/// across runs and machines, as output file names depend on it.
#[inline]
#[must_use]
pub fn permutation_hash(combined_defines: &str) -> u32 {
    let hash = combined_defines
        .bytes()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
        });
    #[expect(
        clippy::as_conversions,
        clippy::cast_possible_truncation,
        reason = "only the low 32 bits are kept"
    )]
    let low = hash as u32;
    low
}

/// Output name of a shader, relative to the output directory and without extension.
///
/// Leading `.` components of `source` are dropped along with a separator that follows each,
/// the extension is removed, and with `flatten` only the file name survives. A non-`main`
/// entry point and the optional `suffix` are appended.
#[inline]
#[must_use]
pub fn shader_name(source: &str, entry_point: &str, suffix: Option<&str>, flatten: bool) -> RelativePathBuf {
    let mut trimmed = source;
    while let Some(rest) = trimmed.strip_prefix('.') {
        trimmed = rest.strip_prefix(['/', '\\']).unwrap_or(rest);
    }
    let normalized = trimmed.replace('\\', "/");

    let file_start = normalized.rfind('/').map_or(0, |slash| slash + 1);
    let without_extension = match normalized[file_start..].rfind('.') {
        Some(dot) => &normalized[..file_start + dot],
        None => normalized.as_str(),
    };
    let mut name = if flatten {
        without_extension[file_start..].to_owned()
    } else {
        without_extension.to_owned()
    };

    if entry_point != "main" {
        name.push('_');
        name.push_str(entry_point);
    }
    if let Some(suffix) = suffix {
        name.push_str(suffix);
    }
    RelativePathBuf::from(name)
}

/// Output name of one permutation of a shader: the shader name, followed by `_` and the
/// upper-case hex [`permutation_hash`] when there are any defines.
#[inline]
#[must_use]
pub fn permutation_name(shader_name: &RelativePathBuf, combined_defines: &str) -> RelativePathBuf {
    if combined_defines.is_empty() {
        shader_name.clone()
    } else {
        RelativePathBuf::from(format!(
            "{shader_name}_{:08X}",
            permutation_hash(combined_defines)
        ))
    }
}

/// Appends `suffix` (such as `.dxil` or `.dxil.h`) to a path without treating it as an extension.
#[inline]
#[must_use]
pub fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(stem);
    path.push(suffix);
    PathBuf::from(path)
}

/// C identifier of the byte array in a generated header: `g_<file name>_<platform>`.
///
/// Characters that can't appear in an identifier become `_`.
#[inline]
#[must_use]
pub fn symbol_name(stem: &Path, platform: Platform) -> String {
    let file_name = stem
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let extension = platform.default_extension().trim_start_matches('.');
    format!("g_{file_name}_{extension}")
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn name(source: &str, entry_point: &str, suffix: Option<&str>, flatten: bool) -> String {
        shader_name(source, entry_point, suffix, flatten).into_string()
    }

    #[test_log::test]
    fn fnv_1a_low_bits() {
        assert_eq!(permutation_hash(""), 0x8422_2325);
        assert_eq!(permutation_hash("a"), 0x8601_ec8c);
        assert_eq!(permutation_hash("foobar"), 0xf739_67e8);
    }

    #[test_log::test]
    fn hash_separates_define_sets() {
        assert_ne!(permutation_hash("A=1"), permutation_hash("A=2"));
        assert_ne!(permutation_hash("A B"), permutation_hash("B A"));
    }

    #[test_log::test]
    fn plain_shader_name() {
        assert_eq!(name("basic.hlsl", "main", None, false), "basic");
        assert_eq!(name("post/tonemap.hlsl", "main", None, false), "post/tonemap");
    }

    #[test_log::test]
    fn leading_dots_are_dropped() {
        assert_eq!(name("./basic.hlsl", "main", None, false), "basic");
        assert_eq!(name("../post/a.hlsl", "main", None, false), "post/a");
        assert_eq!(name(".\\post\\a.hlsl", "main", None, false), "post/a");
    }

    #[test_log::test]
    fn flatten_entry_and_suffix() {
        assert_eq!(name("post/tonemap.hlsl", "main", None, true), "tonemap");
        assert_eq!(
            name("post/tonemap.hlsl", "vs_main", Some("_low"), false),
            "post/tonemap_vs_main_low"
        );
        assert_eq!(name("dir.v2/shader", "main", None, false), "dir.v2/shader");
    }

    #[test_log::test]
    fn permutation_names() {
        let shader = shader_name("basic.hlsl", "main", None, false);
        assert_eq!(permutation_name(&shader, "").as_str(), "basic");
        assert_eq!(permutation_name(&shader, "a").as_str(), "basic_8601EC8C");
    }

    #[test_log::test]
    fn suffixes_and_symbols() {
        let stem = Path::new("out").join("post").join("tonemap");
        assert_eq!(
            with_suffix(&stem, ".dxil.h"),
            Path::new("out").join("post").join("tonemap.dxil.h")
        );
        assert_eq!(symbol_name(&stem, Platform::Dxil), "g_tonemap_dxil");
        assert_eq!(
            symbol_name(Path::new("out/my-shader_vs"), Platform::Spirv),
            "g_my_shader_vs_spirv"
        );
    }
}

//! Command lines of the shader compilers.
//!
//! DXC and FXC share most switches. SPIR-V adds Vulkan environment, layout and register shift
//! options, Direct3D platforms get reflection stripping and external PDBs instead.

use crate::{
    job::CompileJob,
    options::{Options, Platform},
};

/// Register spaces that get SPIR-V register shifts.
const SHIFTED_SPACES: core::ops::Range<u32> = 0..8;

/// Arguments of the compiler invocation for `job`, not including the program itself.
///
/// Pure: the same options and job always give the same arguments.
#[inline]
#[must_use]
pub fn compiler_arguments(options: &Options, job: &CompileJob) -> Vec<String> {
    let mut args = vec!["-nologo".to_owned()];

    output_arguments(options, job, &mut args);

    args.push("-T".to_owned());
    args.push(options.platform.profile_target(&job.profile, &options.shader_model));
    args.push("-E".to_owned());
    args.push(job.entry_point.clone());

    for define in job.defines.iter().chain(&options.defines) {
        args.push("-D".to_owned());
        args.push(define.clone());
    }
    for dir in &options.include_dirs {
        args.push("-I".to_owned());
        args.push(dir.display().to_string());
    }

    args.push(
        match job.optimization_level {
            0 => "-Od",
            1 => "-O1",
            2 => "-O2",
            _ => "-O3",
        }
        .to_owned(),
    );

    if options.platform != Platform::Dxbc && supports_16bit_types(&options.shader_model) {
        args.push("-enable-16bit-types".to_owned());
    }
    if options.warnings_are_errors {
        args.push("-WX".to_owned());
    }
    if options.all_resources_bound {
        args.push("-all_resources_bound".to_owned());
    }
    if options.matrix_row_major {
        args.push("-Zpr".to_owned());
    }
    if options.hlsl2021 {
        args.push("-HV".to_owned());
        args.push("2021".to_owned());
    }
    if options.pdb || options.embed_pdb {
        args.push("-Zi".to_owned());
        args.push("-Zsb".to_owned());
    }
    if options.embed_pdb {
        args.push("-Qembed_debug".to_owned());
    }

    if options.platform == Platform::Spirv {
        spirv_arguments(options, &mut args);
    } else {
        direct3d_arguments(options, job, &mut args);
    }

    args.extend(
        options
            .compiler_options
            .iter()
            .flat_map(|custom| custom.split_whitespace())
            .map(str::to_owned),
    );

    args.push(options.source_path(&job.source).display().to_string());
    args
}

/// `-Fo` for binaries and blob inputs, `-Fh`/`-Vh` for headers.
///
/// A header blob of a shader with defines is packed from binaries, one without defines is the
/// plain header of its single permutation.
fn output_arguments(options: &Options, job: &CompileJob, args: &mut Vec<String>) {
    let extension = options.output_extension();
    let has_defines = !job.combined_defines.is_empty();

    if options.binary || options.binary_blob || (options.header_blob && has_defines) {
        args.push("-Fo".to_owned());
        args.push(job.output_file(extension).display().to_string());
    }
    if options.header || (options.header_blob && !has_defines) {
        let header = job.output_file(&format!("{extension}.h"));
        args.push("-Fh".to_owned());
        args.push(header.display().to_string());
        args.push("-Vh".to_owned());
        args.push(crate::naming::symbol_name(&job.output_stem, options.platform));
    }
}

fn spirv_arguments(options: &Options, args: &mut Vec<String>) {
    args.push("-spirv".to_owned());
    args.push(format!("-fspv-target-env=vulkan{}", options.vulkan_version));
    if let Some(layout) = &options.vulkan_memory_layout {
        args.push(format!("-fvk-use-{layout}-layout"));
    }
    for extension in &options.spirv_ext {
        args.push(format!("-fspv-extension={extension}"));
    }
    if options.no_reg_shifts {
        return;
    }
    for space in SHIFTED_SPACES {
        for (switch, shift) in [
            ("-fvk-s-shift", options.s_reg_shift),
            ("-fvk-t-shift", options.t_reg_shift),
            ("-fvk-b-shift", options.b_reg_shift),
            ("-fvk-u-shift", options.u_reg_shift),
        ] {
            args.push(switch.to_owned());
            args.push(shift.to_string());
            args.push(space.to_string());
        }
    }
}

fn direct3d_arguments(options: &Options, job: &CompileJob, args: &mut Vec<String>) {
    if options.strip_reflection {
        args.push("-Qstrip_reflect".to_owned());
    }
    if options.pdb {
        // trailing separator: the compiler picks the file name
        let pdb_dir = job.output_dir().join("PDB").join("");
        args.push("-Fd".to_owned());
        args.push(pdb_dir.display().to_string());
    }
}

/// Whether a shader model such as `6_5` is at least 6.2.
fn supports_16bit_types(shader_model: &str) -> bool {
    let mut digits = shader_model
        .split(['_', '.'])
        .map(|part| part.parse::<u32>().ok());
    match (digits.next().flatten(), digits.next().flatten()) {
        (Some(major), Some(minor)) => (major, minor) >= (6, 2),
        (Some(major), None) => major > 6,
        _ => false,
    }
}

//! One complete build: discovery, compilation and blob packing.

use crate::{
    blob::{pack_blobs, BlobError, BlobSummary},
    compiler::ShaderCompiler,
    options::Options,
    permutation::{ConfigError, PermutationEngine},
    run_state::{RunState, RunSummary},
    scheduler::Scheduler,
};

/// How a build went.
#[derive(Debug)]
#[non_exhaustive]
pub struct BuildOutcome {
    /// Counters of the compile phase, including broken config lines.
    pub summary: RunSummary,
    /// Result of the blob pass; `None` if it didn't run because the build was terminated.
    pub blobs: Option<Result<BlobSummary, BlobError>>,
}

impl BuildOutcome {
    /// Whether the process should exit successfully.
    ///
    /// A terminated run or any failed task is a failure. A blob pass that returned an error
    /// (which only happens without continue-on-error) is a failure too.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.summary.is_success() && !matches!(self.blobs, Some(Err(_)))
    }
}

/// Runs every stale job of the config file and packs the blobs.
///
/// # Errors
/// If the config file can't be read.
#[inline]
pub fn build<C: ShaderCompiler>(
    options: &Options,
    compiler: &C,
    state: &RunState,
) -> Result<BuildOutcome, ConfigError> {
    let discovery = PermutationEngine::new(options, state)?.gather()?;

    let scheduler = Scheduler::new(options, compiler, state);
    scheduler.enqueue(discovery.jobs);
    let summary = scheduler.run();
    log::debug!("compile phase finished: {summary:?}");

    if summary.terminated {
        return Ok(BuildOutcome {
            summary,
            blobs: None,
        });
    }

    let blobs = pack_blobs(options, &discovery.blobs, state);
    Ok(BuildOutcome {
        summary,
        blobs: Some(blobs),
    })
}

#[cfg(test)]
mod test {
    use std::io;

    use shader_make_test_utils::TestEnv;

    use crate::{blob::read_blob, naming::permutation_hash, test::FakeCompiler};

    use super::*;

    fn options(env: &TestEnv, config: &str) -> Options {
        let mut options = Options {
            config: env.write_file("shaders.cfg", config).unwrap(),
            out: env.path().join("out"),
            binary_blob: true,
            serial: true,
            ..Options::default()
        };
        options.validate().unwrap();
        options
    }

    #[test_log::test]
    fn permutations_end_up_in_one_blob() {
        let env = TestEnv::new();
        let options = options(&env, "basic.hlsl -T ps -D A={1,2}\n");
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);

        let outcome = build(&options, &compiler, &state).unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.summary.processed, 2);

        let records = read_blob(&env.read("out/basic.dxil").unwrap()).unwrap();
        assert_eq!(
            records,
            [
                ("A=1".to_owned(), b"main:A=1".to_vec()),
                ("A=2".to_owned(), b"main:A=2".to_vec()),
            ]
        );
        let intermediate = format!("out/basic_{:08X}.dxil", permutation_hash("A=1"));
        assert!(!env.path().join(intermediate).exists());
    }

    #[test_log::test]
    fn two_defines_two_jobs() {
        let env = TestEnv::new();
        let mut options = options(&env, "shaders/basic.hlsl -T ps -D {A,B}\n");
        options.binary_blob = false;
        options.binary = true;
        options.force = true;
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);

        let outcome = build(&options, &compiler, &state).unwrap();
        let mut invocations = compiler.invocations();
        invocations.sort();
        assert_eq!(invocations, ["A", "B"]);
        assert_eq!(outcome.summary.original, 2);
        assert_eq!(outcome.summary.failed, 0);
        assert!(!outcome.summary.terminated);
        assert!(outcome.is_success());
        assert!(env
            .path()
            .join(format!("out/shaders/basic_{:08X}.dxil", permutation_hash("B")))
            .is_file());
    }

    #[test_log::test]
    fn mixed_group_fails_the_build() {
        let env = TestEnv::new();
        let options = options(&env, "basic.hlsl -T ps -D A={1,2}\nbasic.hlsl -T ps\n");
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);

        let outcome = build(&options, &compiler, &state).unwrap();
        assert!(outcome.summary.is_success());
        assert!(matches!(outcome.blobs, Some(Err(BlobError::EmptyDefines(_)))));
        assert!(!outcome.is_success());
    }

    #[test_log::test]
    fn failed_compile_skips_blobs() {
        let env = TestEnv::new();
        let options = options(&env, "basic.hlsl -T ps -D A={1,2}\n");
        let compiler = FakeCompiler::failing_on("A=1");
        let state = RunState::new(io::sink(), false, false);

        let outcome = build(&options, &compiler, &state).unwrap();
        assert!(outcome.summary.terminated);
        assert!(outcome.blobs.is_none());
        assert!(!outcome.is_success());
        assert!(!env.path().join("out/basic.dxil").exists());
    }

    #[test_log::test]
    fn broken_config_line_fails_the_build() {
        let env = TestEnv::new();
        let options = options(&env, "a.hlsl -E main\nb.hlsl -T ps\n");
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);

        let outcome = build(&options, &compiler, &state).unwrap();
        assert_eq!(compiler.invocations(), [""]);
        assert_eq!(outcome.summary.failed, 1);
        assert!(!outcome.is_success());
    }

    #[test_log::test]
    fn second_build_is_a_no_op() {
        let env = TestEnv::new();
        let mut options = options(&env, "basic.hlsl -T ps\n");
        options.binary_blob = false;
        options.binary = true;
        env.write_file("basic.hlsl", "float4 main() : SV_Target { return 0; }\n")
            .unwrap();
        let compiler = FakeCompiler::default();

        let state = RunState::new(io::sink(), false, false);
        assert!(build(&options, &compiler, &state).unwrap().is_success());
        assert_eq!(compiler.invocations().len(), 1);

        let output = env.path().join("out/basic.dxil");
        shader_make_test_utils::set_modified(&output, shader_make_test_utils::hours_from_now(1))
            .unwrap();
        let state = RunState::new(io::sink(), false, false);
        let outcome = build(&options, &compiler, &state).unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.summary.original, 0);
        assert_eq!(compiler.invocations().len(), 1);
    }
}

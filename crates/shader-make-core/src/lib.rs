//! Incremental shader permutation builder.
//!
//! This library takes a small configuration file listing shader sources, their entry points,
//! target profiles and macro permutations, and turns it into a set of compiler invocations.
//!
//! # How it works
//!
//! * The [permutation engine](permutation) runs the config file through a tiny preprocessor
//!   (`#ifdef`, `#if 0`, `#if 1`, `#else`, `#endif`), expands `{a,b,c}` brace groups into every
//!   concrete config line and decides, per line, whether the outputs are stale.
//! * Staleness comes from the [dependency tracker](freshness): a source is as new as the newest
//!   file in its `#include` closure.
//! * The [scheduler](scheduler) drains the resulting [jobs](job::CompileJob) on a pool of worker
//!   threads, handing each to a [`ShaderCompiler`](compiler::ShaderCompiler) and reporting
//!   progress through the shared [run state](run_state::RunState).
//! * Finally the [blob packer](blob) merges the permutations of one shader into a single
//!   indexed blob file, either binary or as a C byte array.
//!
//! [`build`](build::build) strings all of this together.

pub mod arguments;
pub mod blob;
pub mod build;
pub mod compiler;
pub mod config_line;
pub mod expand;
pub mod freshness;
pub mod job;
pub mod naming;
pub mod options;
pub mod permutation;
pub mod preprocess;
pub mod run_state;
pub mod scheduler;


/// Central function to write to the user.
///
/// Writes the formatted message into the given writer (a value or a place, borrowed mutably)
/// and flushes it, evaluating to the [`std::io::Result`] of doing so.
#[macro_export]
macro_rules! user_output {
    ($dst: expr, $($args: tt)*) => { {
        #[allow(
            clippy::allow_attributes,
            clippy::useless_attribute,
            unused_imports,
            reason = "`std::io::Write` is only sometimes in scope already"
        )]
        use ::std::io::Write as _;

        let writer = &mut $dst;
        write!(writer, $($args)*).and_then(|()| writer.flush())
    } };
}

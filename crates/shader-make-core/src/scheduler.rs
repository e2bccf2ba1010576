//! Parallel execution of compile jobs.
//!
//! Workers share one lock-free FIFO queue. Each worker checks the terminate flag, pops a job
//! and runs the compiler synchronously, until the queue is empty or the run is terminated.
//! Terminating never kills a running compiler; its result is still reported.

use core::num::NonZeroUsize;

use crossbeam::queue::SegQueue;

use crate::{
    arguments::compiler_arguments,
    compiler::{CompilerOutput, ShaderCompiler},
    job::CompileJob,
    options::Options,
    run_state::{RunState, RunSummary},
};

/// Runs [`CompileJob`]s against a [`ShaderCompiler`].
pub struct Scheduler<'run, C> {
    options: &'run Options,
    compiler: &'run C,
    state: &'run RunState,
    queue: SegQueue<CompileJob>,
    /// Overrides the worker count derived from the options.
    workers: Option<NonZeroUsize>,
}

impl<'run, C: ShaderCompiler> Scheduler<'run, C> {
    /// Creates a scheduler with an empty queue.
    #[inline]
    #[must_use]
    pub fn new(options: &'run Options, compiler: &'run C, state: &'run RunState) -> Self {
        Self {
            options,
            compiler,
            state,
            queue: SegQueue::new(),
            workers: None,
        }
    }

    /// Uses exactly `workers` threads, regardless of the machine and the serial option.
    #[inline]
    #[must_use]
    pub fn with_worker_count(mut self, workers: NonZeroUsize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Appends jobs to the queue.
    #[inline]
    pub fn enqueue(&self, jobs: impl IntoIterator<Item = CompileJob>) {
        for job in jobs {
            self.queue.push(job);
        }
    }

    /// Number of jobs waiting.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// 1 in serial mode, otherwise the available parallelism of the machine.
    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if let Some(workers) = self.workers {
            workers.get()
        } else if self.options.serial {
            1
        } else {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        }
    }

    /// Drains the queue on a pool of worker threads and waits for all of them.
    #[inline]
    pub fn run(&self) -> RunSummary {
        let workers = self.worker_count().min(self.pending().max(1));
        log::debug!("compiling {} job(s) on {workers} worker(s)", self.pending());

        std::thread::scope(|scope| {
            for worker in 0..workers {
                scope.spawn(move || self.work(worker));
            }
        });

        self.state.summary()
    }

    fn work(&self, worker: usize) {
        while !self.state.is_terminated() {
            let Some(job) = self.queue.pop() else {
                break;
            };

            let args = compiler_arguments(self.options, &job);
            if self.options.verbose {
                self.state.print(&format!(
                    "{} {}",
                    self.compiler.program().display(),
                    args.join(" ")
                ));
            }

            let output = self.invoke(&job, &args);
            self.state.report_job(self.options.platform, &job, &output);
        }
        log::trace!("worker {worker} is done");
    }

    /// Runs the compiler, relaunching it up to `retry_count` times if it couldn't be run.
    fn invoke(&self, job: &CompileJob, args: &[String]) -> CompilerOutput {
        let mut attempt = 0;
        loop {
            match self.compiler.invoke(job, args) {
                Ok(output) => return output,
                Err(error) if error.is_retryable() && attempt < self.options.retry_count => {
                    attempt += 1;
                    log::warn!(
                        "{error}, retrying {} ({attempt}/{})",
                        job.source,
                        self.options.retry_count
                    );
                }
                Err(error) => return CompilerOutput::failure(error.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        io,
        path::{Path, PathBuf},
        sync::Barrier,
        time::Duration,
    };

    use shader_make_test_utils::TestEnv;

    use crate::{compiler::CompilerError, test::FakeCompiler};

    use super::*;

    fn jobs(env: &TestEnv, defines: &[&str]) -> Vec<CompileJob> {
        defines
            .iter()
            .map(|define| {
                CompileJob::new(
                    "basic.hlsl".to_owned(),
                    "main".to_owned(),
                    "ps".to_owned(),
                    vec![(*define).to_owned()],
                    env.path().join(format!("basic_{define}")),
                    3,
                )
            })
            .collect()
    }

    fn options(serial: bool) -> Options {
        Options {
            config: PathBuf::from("shaders.cfg"),
            binary: true,
            serial,
            ..Options::default()
        }
    }

    fn run(options: &Options, compiler: &FakeCompiler, state: &RunState, jobs: Vec<CompileJob>) -> RunSummary {
        for _ in &jobs {
            state.add_task();
        }
        let scheduler = Scheduler::new(options, compiler, state);
        scheduler.enqueue(jobs);
        scheduler.run()
    }

    #[test_log::test]
    fn every_job_runs_once() {
        let env = TestEnv::new();
        let options = options(false);
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);
        let defines = ["A", "B", "C", "D", "E", "F", "G", "H"];

        let summary = run(&options, &compiler, &state, jobs(&env, &defines));
        assert!(summary.is_success());
        assert_eq!(summary.processed, defines.len());

        let mut invocations = compiler.invocations();
        invocations.sort();
        assert_eq!(invocations, defines);
        for define in defines {
            assert_eq!(
                env.read(format!("basic_{define}.dxil")).unwrap(),
                format!("main:{define}").as_bytes()
            );
        }
    }

    #[test_log::test]
    fn serial_failure_stops_dequeuing() {
        let env = TestEnv::new();
        let options = options(true);
        let compiler = FakeCompiler::failing_on("A");
        let state = RunState::new(io::sink(), false, false);

        let summary = run(&options, &compiler, &state, jobs(&env, &["A", "B", "C"]));
        assert_eq!(compiler.invocations(), ["A"]);
        assert_eq!(
            summary,
            RunSummary {
                original: 3,
                processed: 1,
                failed: 1,
                terminated: true,
            }
        );
    }

    /// Holds the first two jobs at a barrier so both are in flight together, then keeps every
    /// job but `A` running until the run has been terminated.
    struct Lockstep<'run> {
        inner: FakeCompiler,
        barrier: Barrier,
        state: &'run RunState,
    }

    impl ShaderCompiler for Lockstep<'_> {
        fn program(&self) -> &Path {
            self.inner.program()
        }

        fn invoke(&self, job: &CompileJob, args: &[String]) -> Result<CompilerOutput, CompilerError> {
            self.barrier.wait();
            if job.combined_defines != "A" {
                while !self.state.is_terminated() {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            self.inner.invoke(job, args)
        }
    }

    #[test_log::test]
    fn parallel_failure_lets_running_jobs_finish() {
        let env = TestEnv::new();
        let options = options(false);
        let state = RunState::new(io::sink(), false, false);
        let compiler = Lockstep {
            inner: FakeCompiler::failing_on("A"),
            barrier: Barrier::new(2),
            state: &state,
        };

        let jobs = jobs(&env, &["A", "B", "C"]);
        for _ in &jobs {
            state.add_task();
        }
        let scheduler = Scheduler::new(&options, &compiler, &state)
            .with_worker_count(NonZeroUsize::new(2).unwrap());
        scheduler.enqueue(jobs);
        let summary = scheduler.run();

        let mut invocations = compiler.inner.invocations();
        invocations.sort();
        assert_eq!(invocations, ["A", "B"]);
        assert_eq!(
            summary,
            RunSummary {
                original: 3,
                processed: 2,
                failed: 1,
                terminated: true,
            }
        );
        assert_eq!(scheduler.pending(), 1);
        assert!(env.path().join("basic_B.dxil").is_file());
        assert!(!env.path().join("basic_C.dxil").exists());
    }

    #[test_log::test]
    fn continue_on_error_runs_everything() {
        let env = TestEnv::new();
        let options = options(true);
        let compiler = FakeCompiler::failing_on("B");
        let state = RunState::new(io::sink(), true, false);

        let summary = run(&options, &compiler, &state, jobs(&env, &["A", "B", "C"]));
        assert_eq!(compiler.invocations(), ["A", "B", "C"]);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 1);
        assert!(!summary.terminated);
    }

    #[test_log::test]
    fn cancelled_run_dequeues_nothing() {
        let env = TestEnv::new();
        let options = options(false);
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);
        state.cancel_handle().cancel();

        let summary = run(&options, &compiler, &state, jobs(&env, &["A", "B"]));
        assert!(compiler.invocations().is_empty());
        assert_eq!(summary.processed, 0);
        assert!(summary.terminated);
    }

    #[test_log::test]
    fn launch_failures_are_retried() {
        let env = TestEnv::new();
        let mut options = options(true);
        options.retry_count = 2;
        let compiler = FakeCompiler {
            launch_failures: 2.into(),
            ..FakeCompiler::default()
        };
        let state = RunState::new(io::sink(), false, false);

        let summary = run(&options, &compiler, &state, jobs(&env, &["A"]));
        assert!(summary.is_success());
        assert_eq!(compiler.invocations(), ["A"]);
    }

    #[test_log::test]
    fn retries_run_out() {
        let env = TestEnv::new();
        let mut options = options(true);
        options.retry_count = 1;
        let compiler = FakeCompiler {
            launch_failures: 5.into(),
            ..FakeCompiler::default()
        };
        let state = RunState::new(io::sink(), false, false);

        let summary = run(&options, &compiler, &state, jobs(&env, &["A"]));
        assert_eq!(summary.failed, 1);
        assert!(compiler.invocations().is_empty());
        assert_eq!(*compiler.launch_failures.lock().unwrap(), 3);
    }

    #[test_log::test]
    fn worker_counts() {
        let compiler = FakeCompiler::default();
        let state = RunState::new(io::sink(), false, false);
        let serial = options(true);
        assert_eq!(Scheduler::new(&serial, &compiler, &state).worker_count(), 1);
        let parallel = options(false);
        assert!(Scheduler::new(&parallel, &compiler, &state).worker_count() >= 1);
        let fixed = Scheduler::new(&serial, &compiler, &state)
            .with_worker_count(NonZeroUsize::new(4).unwrap());
        assert_eq!(fixed.worker_count(), 4);
    }
}

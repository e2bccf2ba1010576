//! Process-wide state of a build: task counters, the terminate flag and user output.
//!
//! Everything printed while workers are running goes through [`RunState`], whose single lock
//! keeps progress lines from interleaving. The lock is only held while updating counters and
//! writing one message, never while a compiler runs.

use core::fmt::Display;
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use crossterm::{
    style::{Color, Stylize as _},
    tty::IsTty as _,
};

use crate::{compiler::CompilerOutput, job::CompileJob, options::Platform, user_output};

/// Counters at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks discovered in the config file.
    pub original: usize,
    /// Tasks that finished, successfully or not.
    pub processed: usize,
    /// Failed compilations and broken config lines.
    pub failed: usize,
    /// Whether the run was told to stop early.
    pub terminated: bool,
}

impl RunSummary {
    /// Whether every task succeeded and nothing stopped the run.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.terminated && self.failed == 0
    }
}

/// Sets the terminate flag of a [`RunState`] from anywhere, e.g. a Ctrl-C handler.
#[derive(Clone)]
pub struct CancelHandle {
    terminate: Arc<AtomicBool>,
    progress: Arc<Mutex<Progress>>,
}

impl core::fmt::Debug for CancelHandle {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("terminate", &self.terminate)
            .finish_non_exhaustive()
    }
}

impl CancelHandle {
    /// Asks every worker to stop after its current job.
    #[inline]
    pub fn cancel(&self) {
        self.terminate.store(true, Ordering::SeqCst);
    }

    /// Prints a plain line to the output of the run, in turn with progress lines.
    #[inline]
    pub fn print(&self, line: &str) {
        lock(&self.progress).print(line);
    }
}

/// Counters and output, guarded together.
struct Progress {
    original: usize,
    processed: usize,
    failed: usize,
    writer: Box<dyn Write + Send>,
}

impl Progress {
    fn print(&mut self, line: &str) {
        if let Err(error) = user_output!(self.writer, "{line}\n") {
            log::warn!("failed to print: {error}");
        }
    }
}

fn lock(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by the engine, all workers and the blob packer.
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct RunState {
    /// Set on failure (without continue-on-error) or external interrupt.
    terminate: Arc<AtomicBool>,
    continue_on_error: bool,
    /// Whether to color progress lines.
    colored: bool,
    progress: Arc<Mutex<Progress>>,
}

impl core::fmt::Debug for RunState {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RunState")
            .field("terminate", &self.terminate)
            .field("continue_on_error", &self.continue_on_error)
            .field("summary", &self.summary())
            .finish_non_exhaustive()
    }
}

impl RunState {
    /// Creates a state writing user output into `writer`.
    #[inline]
    #[must_use]
    pub fn new(writer: impl Write + Send + 'static, continue_on_error: bool, colored: bool) -> Self {
        Self {
            terminate: Arc::new(AtomicBool::new(false)),
            continue_on_error,
            colored,
            progress: Arc::new(Mutex::new(Progress {
                original: 0,
                processed: 0,
                failed: 0,
                writer: Box::new(writer),
            })),
        }
    }

    /// Creates a state writing to stdout, colored when it is a terminal.
    #[inline]
    #[must_use]
    pub fn stdout(continue_on_error: bool) -> Self {
        let colored = io::stdout().is_tty();
        Self::new(io::stdout(), continue_on_error, colored)
    }

    /// A handle that can stop the run from another thread.
    #[inline]
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            terminate: Arc::clone(&self.terminate),
            progress: Arc::clone(&self.progress),
        }
    }

    /// Whether workers should stop dequeuing.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Whether failures should stop the run.
    #[inline]
    #[must_use]
    pub const fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    /// Counts a discovered task.
    #[inline]
    pub fn add_task(&self) {
        self.lock().original += 1;
    }

    /// Counters as of now.
    #[inline]
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let progress = self.lock();
        RunSummary {
            original: progress.original,
            processed: progress.processed,
            failed: progress.failed,
            terminated: self.is_terminated(),
        }
    }

    /// Records a finished compilation and prints its progress line.
    ///
    /// A failure stops the run unless continue-on-error is set.
    #[inline]
    pub fn report_job(&self, platform: Platform, job: &CompileJob, output: &CompilerOutput) {
        let mut progress = self.lock();
        progress.processed += 1;
        let description = format!(
            "{platform} {} {{{}}} {{{}}}",
            job.source, job.entry_point, job.combined_defines
        );

        let message = if output.success {
            #[expect(
                clippy::as_conversions,
                clippy::cast_precision_loss,
                reason = "task counts are far below 2^52"
            )]
            let percent = if progress.original == 0 {
                100.0
            } else {
                progress.processed as f64 * 100.0 / progress.original as f64
            };
            let line = format!("[{percent:5.1}%] {description}");
            if output.stdout.is_empty() {
                self.paint(line, Color::Green)
            } else {
                self.paint(format!("{line}\n{}", output.stdout.trim_end()), Color::Yellow)
            }
        } else {
            progress.failed += 1;
            if !self.continue_on_error {
                self.terminate.store(true, Ordering::SeqCst);
            }
            let mut diagnostics = output.stderr.trim_end().to_owned();
            if !output.stdout.is_empty() {
                diagnostics.push('\n');
                diagnostics.push_str(output.stdout.trim_end());
            }
            self.paint(format!("[ FAIL ] {description}\n{diagnostics}"), Color::Red)
        };

        if let Err(error) = user_output!(progress.writer, "{message}\n") {
            log::warn!("failed to print progress: {error}");
        }
    }

    /// Reports a config line that couldn't be turned into a task. Counts as a failure, but
    /// never stops the run.
    #[inline]
    pub fn report_config_error(&self, error: &dyn Display) {
        let mut progress = self.lock();
        progress.failed += 1;
        progress.print(&self.paint(format!("ERROR: {error}"), Color::Red));
    }

    /// Prints an error without touching the counters.
    #[inline]
    pub fn report_error(&self, error: &dyn Display) {
        self.lock()
            .print(&self.paint(format!("ERROR: {error}"), Color::Red));
    }

    /// Prints a plain line, such as an echoed command line.
    #[inline]
    pub fn print(&self, line: &str) {
        self.lock().print(line);
    }

    fn paint(&self, text: String, color: Color) -> String {
        if self.colored {
            text.with(color).to_string()
        } else {
            text
        }
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        lock(&self.progress)
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use crate::test::SharedBuffer;

    use super::*;

    fn job(defines: &[&str]) -> CompileJob {
        CompileJob::new(
            "basic.hlsl".to_owned(),
            "main".to_owned(),
            "ps".to_owned(),
            defines.iter().map(|define| (*define).to_owned()).collect(),
            PathBuf::from("out/basic"),
            3,
        )
    }

    fn success(stdout: &str) -> CompilerOutput {
        CompilerOutput {
            success: true,
            stdout: stdout.to_owned(),
            stderr: String::new(),
        }
    }

    #[test_log::test]
    fn progress_lines() {
        let buffer = SharedBuffer::default();
        let state = RunState::new(buffer.clone(), false, false);
        state.add_task();
        state.add_task();
        state.report_job(Platform::Dxil, &job(&["A=1"]), &success(""));
        state.report_job(Platform::Dxil, &job(&[]), &success("warning: x\n"));

        assert_eq!(
            buffer.contents(),
            "[ 50.0%] DXIL basic.hlsl {main} {A=1}\n\
             [100.0%] DXIL basic.hlsl {main} {}\nwarning: x\n"
        );
        assert_eq!(
            state.summary(),
            RunSummary {
                original: 2,
                processed: 2,
                failed: 0,
                terminated: false,
            }
        );
    }

    #[test_log::test]
    fn failure_terminates() {
        let buffer = SharedBuffer::default();
        let state = RunState::new(buffer.clone(), false, false);
        state.add_task();
        state.report_job(
            Platform::Spirv,
            &job(&[]),
            &CompilerOutput::failure("error: boom\n"),
        );
        assert_eq!(
            buffer.contents(),
            "[ FAIL ] SPIRV basic.hlsl {main} {}\nerror: boom\n"
        );
        let summary = state.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 1);
        assert!(summary.terminated);
        assert!(!summary.is_success());
    }

    #[test_log::test]
    fn failure_with_continue_keeps_going() {
        let state = RunState::new(io::sink(), true, false);
        state.add_task();
        state.report_job(Platform::Dxil, &job(&[]), &CompilerOutput::failure("x"));
        assert!(!state.is_terminated());
        assert_eq!(state.summary().failed, 1);
    }

    #[test_log::test]
    fn config_errors_count_but_do_not_terminate() {
        let state = RunState::new(io::sink(), false, false);
        state.report_config_error(&"bad line");
        let summary = state.summary();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.processed, 0);
        assert!(!summary.terminated);
    }

    #[test_log::test]
    fn cancel_from_another_thread() {
        let buffer = SharedBuffer::default();
        let state = RunState::new(buffer.clone(), true, false);
        state.print("compiling");
        let handle = state.cancel_handle();
        std::thread::spawn(move || {
            handle.cancel();
            handle.print("Aborting...");
        })
        .join()
        .unwrap();
        assert!(state.is_terminated());
        assert_eq!(buffer.contents(), "compiling\nAborting...\n");
    }
}

//! Invoking the external shader compiler.

use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

use crate::job::CompileJob;

/// Something that turns a [`CompileJob`] with its arguments into compiled outputs.
///
/// Shared by all worker threads of a build.
pub trait ShaderCompiler: Sync {
    /// The program, for echoing command lines.
    fn program(&self) -> &Path;

    /// Runs the compiler once.
    ///
    /// A compiler that ran and rejected the shader is `Ok` with `success == false`.
    ///
    /// # Errors
    /// If the compiler could not be run at all. Such invocations may be retried.
    fn invoke(&self, job: &CompileJob, args: &[String]) -> Result<CompilerOutput, CompilerError>;
}

/// What a finished compiler run reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub struct CompilerOutput {
    /// Whether the compiler exited with status 0.
    pub success: bool,
    /// Captured standard output, usually warnings.
    pub stdout: String,
    /// Captured standard error, usually errors.
    pub stderr: String,
}

impl CompilerOutput {
    /// A failed run with `diagnostics` as its error output.
    #[inline]
    #[must_use]
    pub fn failure(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: diagnostics.into(),
        }
    }

    fn from_output(output: &Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: captured(&output.stdout),
            stderr: captured(&output.stderr),
        }
    }
}

/// Compiler output with blank lines dropped.
fn captured(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .fold(String::new(), |mut text, line| {
            text.push_str(line);
            text.push('\n');
            text
        })
}

/// An error indicating that the compiler could not be run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
#[expect(clippy::module_name_repetitions, reason = "this is intended")]
pub enum CompilerError {
    /// IO error occurred while calling the compiler.
    #[error("IO error occurred while calling `{command:?}`: {source}")]
    Io {
        /// The command which was called.
        command: Box<Command>,
        /// Source of the error.
        source: io::Error,
    },
    /// The compiler was killed before it could exit.
    #[error("`{command:?}` was terminated by a signal")]
    Terminated {
        /// The command which was called.
        command: Box<Command>,
    },
}

impl CompilerError {
    /// Creates [`Io`](CompilerError::Io) variant from given arguments.
    #[inline]
    #[must_use]
    pub fn io(command: impl Into<Command>, source: io::Error) -> Self {
        Self::Io {
            command: Box::new(command.into()),
            source,
        }
    }

    /// Whether running the compiler again might help.
    #[inline]
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns the command which was called.
    #[inline]
    #[expect(clippy::must_use_candidate, reason = "returns a reference")]
    pub fn command(&self) -> &Command {
        match self {
            Self::Io { command, .. } | Self::Terminated { command } => command.as_ref(),
        }
    }
}

/// Runs an executable such as `dxc` or `fxc` as a child process, capturing its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCompiler {
    /// Path of the executable.
    program: PathBuf,
}

impl ProcessCompiler {
    /// Creates a compiler running `program`.
    #[inline]
    #[must_use]
    pub const fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl ShaderCompiler for ProcessCompiler {
    #[inline]
    fn program(&self) -> &Path {
        &self.program
    }

    #[inline]
    fn invoke(&self, job: &CompileJob, args: &[String]) -> Result<CompilerOutput, CompilerError> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::trace!("compiling {} with {command:?}", job.source);
        let output = match command.output() {
            Ok(output) => output,
            Err(source) => return Err(CompilerError::io(command, source)),
        };
        if output.status.code().is_none() {
            return Err(CompilerError::Terminated {
                command: Box::new(command),
            });
        }
        Ok(CompilerOutput::from_output(&output))
    }
}

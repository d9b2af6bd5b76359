//! Centralized command execution.
//!
//! Every subprocess the pipeline drives is spawned here. The contract the
//! stages rely on: a command that *ran* always comes back as `Ok` with its
//! exit status, even when that status is nonzero; only a command that could
//! not be launched at all (binary missing, permission denied) is an `Err`.
//! The sequencer turns the two into distinct stage outcomes.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use crate::ui::{self, Level};

/// Outcome of one subprocess invocation: the exit status plus whatever the
/// child wrote to stderr, for surfacing in stage reports.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Set the working directory.
    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Run the command, streaming its stderr.
    ///
    /// Stdout is inherited so long-running tools (kernel builds) show their
    /// progress directly. Stderr is piped and drained on a dedicated reader
    /// thread that echoes each line to our stderr as it arrives and keeps a
    /// copy for the result. The drain runs concurrently with the wait: a
    /// full pipe buffer would otherwise deadlock the child.
    pub fn stream(self) -> Result<CommandResult> {
        ui::say(
            Level::Log,
            &format!("Executing {} {}", self.program, self.args.join(" ")),
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::piped());

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        // Always present: we just piped it.
        let stderr = child
            .stderr
            .take()
            .context("Child process has no stderr handle")?;

        let reader = thread::spawn(move || {
            let mut captured = String::new();
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => {
                        eprintln!("{}", line);
                        captured.push_str(&line);
                        captured.push('\n');
                    }
                    Err(_) => break,
                }
            }
            captured
        });

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for '{}'", self.program))?;
        let stderr = reader.join().unwrap_or_default();

        Ok(CommandResult { status, stderr })
    }

    /// Run the command with fully inherited stdio (interactive).
    ///
    /// For commands that own the terminal, like the QEMU launch script with
    /// its serial console. Same error contract as [`Cmd::stream`].
    pub fn run_interactive(self) -> Result<ExitStatus> {
        ui::say(
            Level::Log,
            &format!("Executing {} {}", self.program, self.args.join(" ")),
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        cmd.status().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })
    }
}

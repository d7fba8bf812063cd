//! Type-safe VCS command builder for consistent subprocess execution
//!
//! This module provides a fluent API for building and executing version
//! control commands (git, hg, svn), ensuring consistent timeout handling,
//! logging, and error mapping across the acquisition strategies.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::VCS_COMMAND_TIMEOUT;
use crate::core::WrapError;

/// Builder for constructing and executing VCS commands.
///
/// Commands always run with stdin detached and output captured; captured
/// stderr ends up in the typed error when the command is mandatory, or in a
/// debug log line when it is best effort.
///
/// # Examples
///
/// ```rust,ignore
/// use subwrap::vcs::VcsCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Mandatory command: nonzero exit becomes a typed error.
/// VcsCommand::git()
///     .args(["clone", "https://example.com/dep.git", "dep"])
///     .current_dir("subprojects")
///     .execute_success()
///     .await?;
///
/// // Quiet probe: nonzero exit (or a missing tool) is just `None`.
/// let status = VcsCommand::git()
///     .args(["submodule", "status", "subprojects/dep"])
///     .execute_quietly()
///     .await;
/// # Ok(())
/// # }
/// ```
///
/// # Default configuration
///
/// - Timeout: 5 minutes ([`VCS_COMMAND_TIMEOUT`]); clone-like operations
///   should raise it with [`timeout`](Self::timeout)
/// - Working directory: current process directory
/// - stdin: null, stdout/stderr: captured
pub struct VcsCommand {
    tool: &'static str,
    args: Vec<String>,
    current_dir: Option<std::path::PathBuf>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl VcsCommand {
    fn new(tool: &'static str) -> Self {
        Self {
            tool,
            args: Vec::new(),
            current_dir: None,
            timeout_duration: Some(VCS_COMMAND_TIMEOUT),
            context: None,
        }
    }

    /// Create a git command builder.
    #[must_use]
    pub fn git() -> Self {
        Self::new("git")
    }

    /// Create a Mercurial command builder.
    #[must_use]
    pub fn hg() -> Self {
        Self::new("hg")
    }

    /// Create a Subversion command builder.
    #[must_use]
    pub fn svn() -> Self {
        Self::new("svn")
    }

    /// Set the working directory for command execution.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override the default timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout_duration = Some(duration);
        self
    }

    /// Attach a context identifier (usually the dependency name) that is
    /// included in log lines for this command.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The operation name used in error messages: the first argument.
    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    async fn spawn(&self) -> Result<std::process::Output> {
        let mut cmd = Command::new(self.tool);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        if let Some(ref ctx) = self.context {
            tracing::debug!(target: "vcs", "({}) Executing: {} {}", ctx, self.tool, self.args.join(" "));
        } else {
            tracing::debug!(target: "vcs", "Executing: {} {}", self.tool, self.args.join(" "));
        }

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(WrapError::VcsCommand {
                        tool: self.tool.to_string(),
                        operation: self.operation(),
                        stderr: format!(
                            "command timed out after {} seconds: {} {}",
                            duration.as_secs(),
                            self.tool,
                            self.args.join(" ")
                        ),
                    }
                    .into());
                }
            }
        } else {
            output_future.await
        };

        match output {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(WrapError::VcsNotFound {
                tool: self.tool.to_string(),
            }
            .into()),
            Err(e) => Err(anyhow::Error::from(e))
                .context(format!("failed to execute {} {}", self.tool, self.args.join(" "))),
        }
    }

    /// Execute the command, failing with a typed [`WrapError::VcsCommand`]
    /// on nonzero exit status.
    pub async fn execute(self) -> Result<VcsOutput> {
        let output = self.spawn().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "vcs",
                "{} {} failed with exit code {:?}: {}",
                self.tool,
                self.operation(),
                output.status.code(),
                stderr.trim()
            );
            return Err(WrapError::VcsCommand {
                tool: self.tool.to_string(),
                operation: self.operation(),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            }
            .into());
        }

        if !stderr.is_empty() {
            tracing::debug!(target: "vcs", "{}", stderr.trim());
        }

        Ok(VcsOutput { stdout, stderr })
    }

    /// Execute and return trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Execute and discard output, keeping only the success check.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }

    /// Execute quietly: `Some(output)` on success, `None` on any failure,
    /// including a missing tool.
    ///
    /// Used for probes (is this a repository? is this path a submodule?)
    /// and best-effort operations where failure is acceptable.
    pub async fn execute_quietly(self) -> Option<VcsOutput> {
        let tool = self.tool;
        let operation = self.operation();
        match self.spawn().await {
            Ok(output) if output.status.success() => Some(VcsOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(output) => {
                tracing::debug!(
                    target: "vcs",
                    "{tool} {operation} exited with {:?} (ignored)",
                    output.status.code()
                );
                None
            }
            Err(e) => {
                tracing::debug!(target: "vcs", "{tool} {operation} could not run: {e} (ignored)");
                None
            }
        }
    }
}

/// Captured output of a successful VCS command.
#[derive(Debug)]
pub struct VcsOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error (commands often log progress here)
    pub stderr: String,
}

/// Check that a VCS tool is installed and on PATH.
///
/// # Errors
///
/// Returns [`WrapError::VcsNotFound`] when the tool cannot be located.
pub fn ensure_tool_available(tool: &'static str) -> Result<(), WrapError> {
    which::which(tool).map(|_| ()).map_err(|_| WrapError::VcsNotFound {
        tool: tool.to_string(),
    })
}

//! Error handling for subwrap
//!
//! This module provides the error types and user-friendly error reporting for
//! subproject resolution. The error system is built around two types:
//!
//! - [`WrapError`] - strongly-typed errors for every failure mode of a
//!   resolution request, used for precise handling in code
//! - [`ErrorContext`] - a wrapper that adds actionable suggestions and
//!   details for CLI users
//!
//! Every error in this enum is fatal to the single resolution request that
//! produced it and propagates to the caller unmodified; subwrap never skips
//! a dependency silently. The deliberately non-fatal operations (pulling the
//! latest revision of an existing checkout, the best-effort checkout after a
//! clean submodule status) are handled with a logged warning at the call
//! site and never surface here.
//!
//! # Examples
//!
//! ```rust,no_run
//! use subwrap::core::{WrapError, user_friendly_error};
//!
//! fn resolve_something() -> Result<(), WrapError> {
//!     Err(WrapError::MissingDeclaration {
//!         name: "zlib".to_string(),
//!         directory: "subprojects/zlib".to_string(),
//!     })
//! }
//!
//! if let Err(e) = resolve_something() {
//!     let ctx = user_friendly_error(anyhow::Error::from(e));
//!     ctx.display(); // colored error with suggestion on stderr
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for subproject resolution.
///
/// Each variant represents one failure mode of the resolver or one of its
/// subsystems (declaration parsing, downloading, VCS invocation, patch
/// application). Variants carry the context needed to produce a useful
/// message: file paths, URLs, expected/actual hashes, or captured stderr.
#[derive(Error, Debug)]
pub enum WrapError {
    /// A wrap declaration file is malformed.
    ///
    /// Raised when the file has zero sections, more than one section, a
    /// section name without the `wrap-` prefix, or an unknown source kind
    /// suffix.
    #[error("invalid wrap file {file}: {reason}")]
    DeclarationFormat {
        /// Path of the offending wrap file
        file: String,
        /// Specific reason for the parse failure
        reason: String,
    },

    /// A field required for the declaration's kind is not present.
    #[error("wrap file is missing required field '{key}'")]
    FieldMissing {
        /// The key that was requested but not declared
        key: String,
    },

    /// The target directory does not exist and no wrap file was found.
    #[error("no {name}.wrap found for subproject '{directory}'")]
    MissingDeclaration {
        /// Name of the dependency being resolved
        name: String,
        /// The subproject directory that would have been populated
        directory: String,
    },

    /// The target path exists but cannot be used as a subproject directory.
    ///
    /// Either the path is not a directory at all, or it is a non-empty
    /// directory that was expected to be a repository of a specific kind
    /// and is not. Neither case is ever overwritten.
    #[error("'{path}' already exists and cannot be used as a subproject: {reason}")]
    DirectoryConflict {
        /// The conflicting path
        path: String,
        /// Why the path cannot be used
        reason: String,
    },

    /// Network acquisition was requested while downloads are disabled.
    #[error("automatic wrap-based subproject downloading is disabled")]
    DownloadDisabled,

    /// A downloaded or cached artifact failed SHA-256 verification.
    ///
    /// Always fatal and never auto-retried: a mismatch means either the
    /// declaration or the bytes are wrong, and guessing which would defeat
    /// the integrity check.
    #[error("incorrect hash for {role}:\n {expected} expected\n {actual} actual")]
    HashMismatch {
        /// Artifact role, `source` or `patch`
        role: String,
        /// Hash declared in the wrap file
        expected: String,
        /// Hash computed from the bytes on disk
        actual: String,
    },

    /// A mandatory VCS command exited unsuccessfully.
    #[error("{tool} {operation} failed: {stderr}")]
    VcsCommand {
        /// The tool that was invoked (`git`, `hg`, or `svn`)
        tool: String,
        /// The operation that failed (e.g. "clone", "checkout")
        operation: String,
        /// Captured standard error of the failed command
        stderr: String,
    },

    /// The required VCS tool is not installed or not on PATH.
    #[error("{tool} is not installed or not found in PATH")]
    VcsNotFound {
        /// The missing tool
        tool: String,
    },

    /// A git submodule at the target path has unresolved merge conflicts.
    #[error("submodule '{path}' has merge conflicts")]
    SubmoduleConflict {
        /// Path of the conflicted submodule
        path: String,
    },

    /// `git submodule status` produced output this resolver does not know.
    #[error("unknown git submodule status output: {output:?}")]
    UnknownSubmoduleStatus {
        /// The unrecognized status line
        output: String,
    },

    /// An archive has an extension no unpacker is registered for.
    #[error("unsupported archive format: {file}")]
    UnsupportedArchive {
        /// The archive file name
        file: String,
    },

    /// Acquisition populated the directory but no build descriptor exists.
    #[error("'{path}' is not empty and has no {build_file} file")]
    IncompleteSource {
        /// The populated but unusable directory
        path: String,
        /// Name of the expected build descriptor file
        build_file: String,
    },

    /// An artifact download failed.
    #[error("failed to download {url}: {reason}")]
    Download {
        /// The URL that could not be fetched
        url: String,
        /// Transport-level reason
        reason: String,
    },

    /// I/O error from the standard library.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// User-facing wrapper around a [`WrapError`] with optional suggestion and
/// details, displayed in color on stderr by the CLI.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: WrapError,
    /// Optional actionable suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: WrapError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, shown in green.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add explanatory details, shown in yellow.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error, details, and suggestion to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// Known [`WrapError`] variants get tailored suggestions; everything else is
/// rendered generically with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<WrapError>() {
        Ok(wrap_error) => return contextualize(wrap_error),
        Err(other) => other,
    };

    // Generic error: include the full chain for better diagnostics.
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(WrapError::Io(std::io::Error::other(message)))
}

fn contextualize(error: WrapError) -> ErrorContext {
    match &error {
        WrapError::MissingDeclaration { name, .. } => {
            let suggestion = format!(
                "create {name}.wrap in the subprojects directory or check out the \
                 subproject manually"
            );
            ErrorContext::new(error)
                .with_suggestion(suggestion)
                .with_details("a wrap file is required to download a subproject that is not already on disk")
        }
        WrapError::DownloadDisabled => ErrorContext::new(error)
            .with_suggestion("re-run with --wrap-mode default, or provide the subproject sources manually")
            .with_details("git submodules are exempt from this restriction and are still initialized"),
        WrapError::HashMismatch { role, .. } => {
            let details = format!(
                "the cached or downloaded {role} artifact does not match the hash declared \
                 in the wrap file; it is never reused or retried automatically"
            );
            ErrorContext::new(error)
                .with_suggestion("delete the file from packagecache if it is stale, or fix the wrap file's declared hash")
                .with_details(details)
        }
        WrapError::VcsNotFound { tool } => {
            let suggestion = format!("install {tool} and ensure it is on your PATH");
            ErrorContext::new(error).with_suggestion(suggestion)
        }
        WrapError::IncompleteSource { build_file, .. } => {
            let details = format!(
                "the directory was populated but contains no {build_file}, so the build \
                 system cannot use it as a subproject"
            );
            ErrorContext::new(error).with_details(details)
        }
        WrapError::SubmoduleConflict { .. } => ErrorContext::new(error)
            .with_suggestion("resolve the merge conflict inside the submodule, then retry"),
        _ => ErrorContext::new(error),
    }
}

//! Core types for subwrap
//!
//! This module provides the foundation shared by every other module: the
//! [`WrapError`] enum covering all failure modes of a resolution request,
//! the [`ErrorContext`] wrapper that adds user-facing suggestions, and the
//! [`WrapMode`] download-permission setting supplied by the orchestrating
//! build system.
//!
//! # Design principles
//!
//! - Every fallible operation returns a `Result` with a meaningful error;
//!   the resolver never skips a dependency silently.
//! - Strong typing keeps invalid states unrepresentable: source kinds,
//!   artifact roles, and submodule states are closed enums.
//! - User-facing errors carry actionable suggestions rendered in color by
//!   the CLI.

pub mod error;

pub use error::{ErrorContext, WrapError, user_friendly_error};

use std::str::FromStr;

/// Download-permission mode for wrap-based acquisition.
///
/// Supplied by the orchestrating build system, consulted but never computed
/// here. Only [`WrapMode::NoDownload`] changes resolver behavior; the other
/// modes exist for the orchestrator's fallback policy and pass through
/// unchanged.
///
/// Git submodules are exempt from all modes: initializing a submodule is
/// not a download in the wrap sense and stays permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Download wrap-declared sources whenever required.
    #[default]
    Default,
    /// Never use a wrap as a fallback for a system dependency; plain wrap
    /// subprojects still download. Not consulted by the resolver itself.
    NoFallback,
    /// Never download anything; only pre-existing directories and git
    /// submodules resolve successfully.
    NoDownload,
}

impl WrapMode {
    /// Whether wrap-based network acquisition is permitted.
    #[must_use]
    pub const fn downloads_enabled(self) -> bool {
        !matches!(self, Self::NoDownload)
    }
}

impl FromStr for WrapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "nofallback" => Ok(Self::NoFallback),
            "nodownload" => Ok(Self::NoDownload),
            other => Err(format!(
                "invalid wrap mode '{other}' (expected default, nofallback, or nodownload)"
            )),
        }
    }
}

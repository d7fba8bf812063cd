//! Global constants used throughout the subwrap codebase.
//!
//! This module contains timeout durations, well-known file names, and other
//! constants that are used across multiple modules. Defining them centrally
//! improves maintainability and makes magic values more discoverable.

use std::time::Duration;

/// Name of the build descriptor file that marks a subproject directory
/// as resolved and build-ready.
pub const BUILD_FILE_NAME: &str = "meson.build";

/// File extension (including the dot) of wrap declaration files, looked up
/// as `<subprojects_root>/<name>.wrap`.
pub const WRAP_SUFFIX: &str = ".wrap";

/// Required prefix of the single section in a wrap declaration file.
/// The remainder of the section name is the source kind.
pub const WRAP_SECTION_PREFIX: &str = "wrap-";

/// Directory under the subprojects root where downloaded artifacts are
/// cached by their declared filename.
pub const CACHE_DIR_NAME: &str = "packagecache";

/// Host name of the canonical package index. Downloads from this host may
/// fall back to plain HTTP when a secure connection cannot be established.
pub const WRAPDB_HOST: &str = "wrapdb.mesonbuild.com";

/// Per-request timeout for artifact downloads (10 minutes).
///
/// Source archives can be large and some mirrors are slow; this bounds a
/// single download attempt rather than individual reads.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Timeout for most VCS commands (5 minutes).
pub const VCS_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for VCS clone/checkout-from-remote operations (10 minutes).
///
/// Initial clones may transfer the whole history of a repository and
/// routinely take longer than local commands.
pub const VCS_CLONE_TIMEOUT: Duration = Duration::from_secs(600);

//! subwrap - subproject wrap resolver
//!
//! Resolves external subproject dependencies for a Meson-style build tree:
//! given a dependency name, subwrap determines whether the source tree
//! already exists under the subprojects root, and if not acquires it from
//! one of four declared source kinds (pre-packaged archive, or a git,
//! Mercurial, or Subversion checkout), verifying integrity with SHA-256
//! and applying optional patch overlays.
//!
//! # Architecture overview
//!
//! - `<name>.wrap` files declare how to acquire one dependency; the single
//!   section's name carries the source kind
//! - downloaded artifacts are cached under `subprojects/packagecache/`,
//!   keyed by declared filename and trusted only after hash verification
//! - VCS checkouts shell out to the system `git`/`hg`/`svn` binaries, like
//!   Cargo does with git
//! - a directory counts as resolved exactly when it contains a `meson.build`
//!
//! # Core modules
//!
//! - [`resolver`] - the resolution state machine, submodule reconciliation,
//!   and the four acquisition strategies
//! - [`wrap`] - wrap declaration parsing into typed records
//! - [`cache`] - content-addressable download cache with streaming SHA-256
//!   verification
//! - [`archive`] - archive unpacking and patch overlays
//! - [`vcs`] - subprocess command builder for the VCS tools
//! - [`core`] - error types and the download-permission mode
//! - [`cli`] - the `subwrap` command-line interface
//!
//! # Example
//!
//! ```rust,no_run
//! use subwrap::core::WrapMode;
//! use subwrap::resolver::Resolver;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = Resolver::new("subprojects", WrapMode::Default);
//! let directory = resolver.resolve("zlib").await?;
//! println!("sources ready in subprojects/{directory}");
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cache;
pub mod cli;
pub mod constants;
pub mod core;
pub mod resolver;
pub mod utils;
pub mod vcs;
pub mod wrap;

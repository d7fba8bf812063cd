//! Version control tool integration
//!
//! Subwrap shells out to the system `git`, `hg`, and `svn` binaries rather
//! than linking VCS libraries, the same approach Cargo takes with git. The
//! [`VcsCommand`] builder gives every invocation the same timeout, logging,
//! and error-mapping behavior; success or failure is determined solely by
//! the process exit status.

pub mod command;

pub use command::{VcsCommand, VcsOutput, ensure_tool_available};

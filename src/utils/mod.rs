//! Shared utilities
//!
//! Currently just the file system helpers; anything needed by more than one
//! acquisition strategy lives here.

pub mod fs;

//! File system utilities
//!
//! Small synchronous helpers shared by the acquisition strategies and patch
//! application. Writes that must be atomic (the download cache) use
//! temp-file-then-rename at the call site; the helpers here cover directory
//! creation and the overwriting tree merge used by patch fallback.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Create a directory and all parents if missing.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Recursively merge-copy `src` into `dst`, overwriting existing files.
///
/// Missing destination directories are created. A pre-existing destination
/// file is removed before the copy; if removal is denied because the file
/// is read-only, the read-only attribute is cleared and removal retried, so
/// the overwrite is guaranteed to win.
pub fn copy_tree_overwrite(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            if target.exists() {
                remove_file_force(&target)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!("failed to copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

/// Remove a file, clearing the read-only attribute first if necessary.
pub fn remove_file_force(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            let mut perms = fs::metadata(path)
                .with_context(|| format!("failed to stat {}", path.display()))?
                .permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(path, perms)
                .with_context(|| format!("failed to clear read-only on {}", path.display()))?;
            fs::remove_file(path)
                .with_context(|| format!("failed to remove {}", path.display()))
        }
        Err(e) => {
            Err(anyhow::Error::from(e).context(format!("failed to remove {}", path.display())))
        }
    }
}

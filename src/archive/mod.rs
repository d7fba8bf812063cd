//! Archive unpacking and patch overlays
//!
//! Source archives and patch archives arrive as `.tar.gz`, `.tgz`, `.tar`,
//! or `.zip` files. Unpacking dispatches on the file name; anything else is
//! an [`WrapError::UnsupportedArchive`] error.
//!
//! Patch overlays have two paths. The fast path unpacks the archive
//! directly over the subprojects root, assuming the archive mirrors the
//! target's relative layout. If that fails for any reason (unexpected
//! internal structure, permission error), the archive is unpacked into a
//! scratch directory instead and merge-copied file by file, creating
//! missing directories and overwriting read-only destinations. The scratch
//! directory is removed in all cases.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

use crate::core::WrapError;
use crate::utils::fs::copy_tree_overwrite;

/// Unpack an archive into `dest`, dispatching on the file extension.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let open = || {
        File::open(archive).with_context(|| format!("failed to open archive {}", archive.display()))
    };

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let decoder = flate2::read::GzDecoder::new(open()?);
        tar::Archive::new(decoder)
            .unpack(dest)
            .with_context(|| format!("failed to extract {}", archive.display()))
    } else if name.ends_with(".tar") {
        tar::Archive::new(open()?)
            .unpack(dest)
            .with_context(|| format!("failed to extract {}", archive.display()))
    } else if name.ends_with(".zip") {
        let mut zip = zip::ZipArchive::new(open()?)
            .with_context(|| format!("failed to read zip archive {}", archive.display()))?;
        zip.extract(dest)
            .with_context(|| format!("failed to extract {}", archive.display()))
    } else {
        Err(WrapError::UnsupportedArchive {
            file: archive.display().to_string(),
        }
        .into())
    }
}

/// Overlay a patch archive onto `root`.
///
/// Tries the direct unpack first; on failure falls back to unpacking into a
/// scratch directory and merge-copying into `root`. An archive of an
/// unsupported format fails either way and propagates as is.
pub fn overlay(archive: &Path, root: &Path) -> Result<()> {
    match unpack(archive, root) {
        Ok(()) => Ok(()),
        Err(e) if e.downcast_ref::<WrapError>().is_some() => Err(e),
        Err(e) => {
            tracing::debug!(
                "direct unpack of {} failed ({e:#}), retrying via scratch directory",
                archive.display()
            );
            overlay_via_scratch(archive, root)
        }
    }
}

fn overlay_via_scratch(archive: &Path, root: &Path) -> Result<()> {
    // Tempdir removal on drop covers the failure paths too.
    let scratch = tempfile::tempdir().context("failed to create scratch directory")?;
    unpack(archive, scratch.path())?;
    copy_tree_overwrite(scratch.path(), root)
}

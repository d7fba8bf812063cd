//! Subproject resolution
//!
//! The [`Resolver`] turns a dependency name into a verified, on-disk,
//! build-ready source tree under the subprojects root. Resolution is a
//! sequence of filesystem and VCS checks followed by at most one
//! acquisition:
//!
//! 1. Load `<name>.wrap` if it exists (its absence is not yet an error; it
//!    may override the target directory name).
//! 2. If the target directory already contains the build descriptor file,
//!    return immediately. No network or VCS activity happens on this path.
//! 3. Reconcile git submodule state for the target path (§ below).
//! 4. A target that exists but is not a directory is a conflict.
//! 5. A target that does not exist requires a wrap file; dispatch on its
//!    kind to the file/git/hg/svn acquisition strategy.
//! 6. Require the build descriptor to exist afterwards.
//!
//! # Submodules
//!
//! Subproject directories that are git submodules of the surrounding
//! repository must never be treated as downloadable wraps, and they are
//! exempt from the download-disabled mode. The reconciliation step
//! classifies `git submodule status` output by its first byte
//! ([`classify_submodule_status`]) and initializes or refreshes the
//! checkout as needed. An out-of-date submodule is only warned about, never
//! auto-updated: silently moving a dependency to a different commit is
//! worse than building one commit behind.
//!
//! # Revision handling for VCS wraps
//!
//! A pinned revision is checked out locally first and only escalates to a
//! network fetch/pull when the local checkout fails; this works after any
//! clone depth and keeps network calls to the minimum. The symbolic latest
//! revision (`HEAD` for git, `tip` for hg) pulls best-effort on an existing
//! checkout: pull failure is non-fatal so offline development keeps
//! working.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::archive;
use crate::cache::{ArtifactCache, Role};
use crate::constants::{BUILD_FILE_NAME, CACHE_DIR_NAME, VCS_CLONE_TIMEOUT, WRAP_SUFFIX};
use crate::core::{WrapError, WrapMode};
use crate::utils::fs::ensure_dir;
use crate::vcs::{VcsCommand, ensure_tool_available};
use crate::wrap::{WrapFile, WrapKind};

/// Classification of a target path's relationship to the surrounding git
/// repository, derived from the first byte of `git submodule status`
/// output. Transient; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmoduleStatus {
    /// `+`: registered, but the checked-out commit differs from the one the
    /// superproject records.
    OutOfDate,
    /// `U`: unresolved merge conflict in the submodule.
    Conflict,
    /// `-`: registered but never initialized.
    NotInitialized,
    /// ` `: present and in sync.
    Clean,
    /// Empty output: the path is not a submodule at all.
    NotSubmodule,
}

/// Classify a `git submodule status` line by its leading character.
///
/// # Errors
///
/// Any leading character other than the four documented ones is
/// [`WrapError::UnknownSubmoduleStatus`]: it means the tool's output format
/// changed and guessing would be unsafe.
pub fn classify_submodule_status(output: &str) -> Result<SubmoduleStatus, WrapError> {
    match output.chars().next() {
        None => Ok(SubmoduleStatus::NotSubmodule),
        Some('+') => Ok(SubmoduleStatus::OutOfDate),
        Some('U') => Ok(SubmoduleStatus::Conflict),
        Some('-') => Ok(SubmoduleStatus::NotInitialized),
        Some(' ') => Ok(SubmoduleStatus::Clean),
        Some(_) => Err(WrapError::UnknownSubmoduleStatus {
            output: output.to_string(),
        }),
    }
}

/// Resolves named dependencies into populated subproject directories.
///
/// One instance per subprojects root. Resolution of a single dependency is
/// strictly sequential; concurrent resolution of *independent* dependencies
/// across instances is safe as long as their target directories and cache
/// filenames are disjoint (the cache's temp-file-then-rename discipline
/// covers racing writers on the same key).
pub struct Resolver {
    subdir_root: PathBuf,
    wrap_mode: WrapMode,
    cache: ArtifactCache,
}

impl Resolver {
    /// Create a resolver rooted at the subprojects directory.
    #[must_use]
    pub fn new(subdir_root: impl Into<PathBuf>, wrap_mode: WrapMode) -> Self {
        let subdir_root = subdir_root.into();
        let cache = ArtifactCache::new(subdir_root.join(CACHE_DIR_NAME), wrap_mode);
        Self {
            subdir_root,
            wrap_mode,
            cache,
        }
    }

    /// Resolve `name` and return the subproject directory name.
    ///
    /// Idempotent: a target that already holds the build descriptor returns
    /// immediately with no network or VCS activity.
    pub async fn resolve(&self, name: &str) -> Result<String> {
        // The wrap file must be loaded even when the directory might already
        // exist, because it can override the default directory name.
        let wrap = self.load_wrap(name)?;
        let directory = wrap
            .as_ref()
            .and_then(|w| w.get_opt("directory"))
            .unwrap_or(name)
            .to_string();
        let dirname = self.subdir_root.join(&directory);
        let build_file = dirname.join(BUILD_FILE_NAME);

        // The directory is there and has a build file? Great, use it.
        if build_file.exists() {
            debug!("{name}: {} already present, nothing to do", build_file.display());
            return Ok(directory);
        }

        self.reconcile_submodule(&dirname).await?;

        if dirname.exists() {
            if !dirname.is_dir() {
                return Err(WrapError::DirectoryConflict {
                    path: display_subproj(&dirname),
                    reason: "not a directory".to_string(),
                }
                .into());
            }
        } else {
            // A wrap file is required to download.
            let Some(wrap) = wrap else {
                return Err(WrapError::MissingDeclaration {
                    name: name.to_string(),
                    directory: display_subproj(&dirname),
                }
                .into());
            };

            match wrap.kind() {
                WrapKind::File => self.get_file(name, &wrap, &directory).await?,
                WrapKind::Git => {
                    self.check_can_download()?;
                    self.get_git(&wrap, &directory).await?;
                }
                WrapKind::Hg => {
                    self.check_can_download()?;
                    self.get_hg(&wrap, &directory).await?;
                }
                WrapKind::Svn => {
                    self.check_can_download()?;
                    self.get_svn(&wrap, &directory).await?;
                }
            }
        }

        // A build file is required in the directory.
        if !build_file.exists() {
            return Err(WrapError::IncompleteSource {
                path: display_subproj(&dirname),
                build_file: BUILD_FILE_NAME.to_string(),
            }
            .into());
        }

        Ok(directory)
    }

    /// The subprojects root this resolver operates on.
    #[must_use]
    pub fn subdir_root(&self) -> &Path {
        &self.subdir_root
    }

    fn load_wrap(&self, name: &str) -> Result<Option<WrapFile>> {
        let fname = self.subdir_root.join(format!("{name}{WRAP_SUFFIX}"));
        if fname.is_file() {
            Ok(Some(WrapFile::load(&fname)?))
        } else {
            Ok(None)
        }
    }

    fn check_can_download(&self) -> Result<()> {
        // Wrap-based downloading can be switched off entirely. Submodules
        // are still fine; they never reach this check.
        if !self.wrap_mode.downloads_enabled() {
            return Err(WrapError::DownloadDisabled.into());
        }
        Ok(())
    }

    /// Detect and fast-path git submodules at the target path.
    ///
    /// Returns the classification that drove the handling; callers only
    /// need the error side, where a merge conflict or unrecognized status
    /// output aborts resolution.
    pub async fn reconcile_submodule(&self, dirname: &Path) -> Result<SubmoduleStatus> {
        // Are we inside a git working tree at all?
        if VcsCommand::git()
            .arg("rev-parse")
            .current_dir(&self.subdir_root)
            .execute_quietly()
            .await
            .is_none()
        {
            return Ok(SubmoduleStatus::NotSubmodule);
        }

        let Some(status) = VcsCommand::git()
            .args(["submodule", "status", &dirname.display().to_string()])
            .current_dir(&self.subdir_root)
            .execute_quietly()
            .await
        else {
            return Ok(SubmoduleStatus::NotSubmodule);
        };

        let classified = classify_submodule_status(&status.stdout)?;
        match classified {
            SubmoduleStatus::OutOfDate => {
                warn!("git submodule {} might be out of date", dirname.display());
            }
            SubmoduleStatus::Conflict => {
                return Err(WrapError::SubmoduleConflict {
                    path: dirname.display().to_string(),
                }
                .into());
            }
            SubmoduleStatus::NotInitialized => {
                VcsCommand::git()
                    .args(["submodule", "update", "--init", &dirname.display().to_string()])
                    .current_dir(&self.subdir_root)
                    .timeout(VCS_CLONE_TIMEOUT)
                    .execute_success()
                    .await?;
            }
            SubmoduleStatus::Clean => {
                // The submodule looks fine but may be only partially
                // populated. Refresh the working tree; if that fails, build
                // with what is there and let the user sort it out.
                if VcsCommand::git()
                    .args(["checkout", "."])
                    .current_dir(dirname)
                    .execute_quietly()
                    .await
                    .is_none()
                {
                    warn!("checkout of submodule {} failed, continuing anyway", dirname.display());
                }
            }
            SubmoduleStatus::NotSubmodule => {}
        }
        Ok(classified)
    }

    /// Acquire a `file` wrap: fetch the source archive through the cache
    /// and extract it, then apply the optional patch overlay.
    async fn get_file(&self, name: &str, wrap: &WrapFile, directory: &str) -> Result<()> {
        let path = self.cache.get_artifact(name, wrap, Role::Source).await?;
        let target_dir = self.subdir_root.join(directory);

        // Some upstreams ship archives without a leading directory; create
        // one for them and extract inside it.
        let extract_dir = if wrap.get_opt("lead_directory_missing").is_some() {
            ensure_dir(&target_dir)?;
            target_dir
        } else {
            self.subdir_root.clone()
        };
        archive::unpack(&path, &extract_dir)?;

        if wrap.has_patch() {
            let patch = self.cache.get_artifact(name, wrap, Role::Patch).await?;
            archive::overlay(&patch, &self.subdir_root)?;
        }
        Ok(())
    }

    async fn get_git(&self, wrap: &WrapFile, directory: &str) -> Result<()> {
        ensure_tool_available("git")?;
        let checkoutdir = self.subdir_root.join(directory);
        let revno = wrap.get("revision")?;
        let is_head = revno.eq_ignore_ascii_case("head");

        if checkoutdir.is_dir() {
            // A non-repository directory must not be silently overwritten.
            if VcsCommand::git()
                .arg("rev-parse")
                .current_dir(&checkoutdir)
                .execute_quietly()
                .await
                .is_none()
            {
                return Err(WrapError::DirectoryConflict {
                    path: checkoutdir.display().to_string(),
                    reason: "not empty and not a valid git repository".to_string(),
                }
                .into());
            }

            if is_head {
                self.pull_latest(VcsCommand::git().arg("pull").current_dir(&checkoutdir)).await;
            } else {
                self.checkout_git_revision(wrap, &checkoutdir, revno).await?;
            }
        } else {
            let mut clone = VcsCommand::git().arg("clone");
            if wrap.is_true("clone-recursive") {
                clone = clone.arg("--recursive");
            }
            clone
                .args([wrap.get("url")?, directory])
                .current_dir(&self.subdir_root)
                .timeout(VCS_CLONE_TIMEOUT)
                .execute_success()
                .await?;

            if !is_head {
                self.checkout_git_revision(wrap, &checkoutdir, revno).await?;
            }
            if let Some(push_url) = wrap.get_opt("push-url") {
                VcsCommand::git()
                    .args(["remote", "set-url", "--push", "origin", push_url])
                    .current_dir(&checkoutdir)
                    .execute_success()
                    .await?;
            }
        }
        Ok(())
    }

    /// Check out a pinned git revision, escalating to an explicit fetch
    /// when the revision is not reachable locally (e.g. after a shallow
    /// clone, or a tag created since the last fetch).
    async fn checkout_git_revision(
        &self,
        wrap: &WrapFile,
        checkoutdir: &Path,
        revno: &str,
    ) -> Result<()> {
        if VcsCommand::git()
            .args(["checkout", revno])
            .current_dir(checkoutdir)
            .execute_quietly()
            .await
            .is_some()
        {
            return Ok(());
        }
        VcsCommand::git()
            .args(["fetch", wrap.get("url")?, revno])
            .current_dir(checkoutdir)
            .timeout(VCS_CLONE_TIMEOUT)
            .execute_success()
            .await?;
        VcsCommand::git()
            .args(["checkout", revno])
            .current_dir(checkoutdir)
            .execute_success()
            .await
    }

    async fn get_hg(&self, wrap: &WrapFile, directory: &str) -> Result<()> {
        ensure_tool_available("hg")?;
        let checkoutdir = self.subdir_root.join(directory);
        let revno = wrap.get("revision")?;
        let is_tip = revno.eq_ignore_ascii_case("tip");

        if checkoutdir.is_dir() {
            if is_tip {
                self.pull_latest(VcsCommand::hg().arg("pull").current_dir(&checkoutdir)).await;
            } else if VcsCommand::hg()
                .args(["checkout", revno])
                .current_dir(&checkoutdir)
                .execute_quietly()
                .await
                .is_none()
            {
                VcsCommand::hg()
                    .arg("pull")
                    .current_dir(&checkoutdir)
                    .timeout(VCS_CLONE_TIMEOUT)
                    .execute_success()
                    .await?;
                VcsCommand::hg()
                    .args(["checkout", revno])
                    .current_dir(&checkoutdir)
                    .execute_success()
                    .await?;
            }
        } else {
            VcsCommand::hg()
                .args(["clone", wrap.get("url")?, directory])
                .current_dir(&self.subdir_root)
                .timeout(VCS_CLONE_TIMEOUT)
                .execute_success()
                .await?;
            if !is_tip {
                VcsCommand::hg()
                    .args(["checkout", revno])
                    .current_dir(&checkoutdir)
                    .execute_success()
                    .await?;
            }
        }
        Ok(())
    }

    async fn get_svn(&self, wrap: &WrapFile, directory: &str) -> Result<()> {
        ensure_tool_available("svn")?;
        let checkoutdir = self.subdir_root.join(directory);
        let revno = wrap.get("revision")?;

        if checkoutdir.is_dir() {
            let current = VcsCommand::svn()
                .args(["info", "--show-item", "revision", &checkoutdir.display().to_string()])
                .execute_quietly()
                .await
                .map(|out| out.stdout.trim().to_string());

            // Conservative comparison: anything but exact equality updates.
            if current.as_deref() == Some(revno) {
                return Ok(());
            }

            if revno.eq_ignore_ascii_case("head") {
                self.pull_latest(VcsCommand::svn().arg("update").current_dir(&checkoutdir)).await;
            } else {
                VcsCommand::svn()
                    .args(["update", "-r", revno])
                    .current_dir(&checkoutdir)
                    .timeout(VCS_CLONE_TIMEOUT)
                    .execute_success()
                    .await?;
            }
        } else {
            VcsCommand::svn()
                .args(["checkout", "-r", revno, wrap.get("url")?, directory])
                .current_dir(&self.subdir_root)
                .timeout(VCS_CLONE_TIMEOUT)
                .execute_success()
                .await?;
        }
        Ok(())
    }

    /// Best-effort update of an existing checkout to the latest revision.
    /// Failure is not fatal: development must stay possible without a
    /// working network connection.
    async fn pull_latest(&self, command: VcsCommand) {
        if command.execute_quietly().await.is_none() {
            warn!("update of existing checkout failed, continuing with what is on disk");
        }
    }
}

/// Last two path components, the conventional way subproject directories
/// are shown to users ("subprojects/foo").
fn display_subproj(path: &Path) -> String {
    let components: Vec<_> = path
        .components()
        .rev()
        .take(2)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    components.into_iter().rev().collect::<Vec<_>>().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};
    use std::fs;
    use std::process::Command;
    use tempfile::{TempDir, tempdir};

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Build a gzipped tarball from (path, content) pairs, returning the
    /// archive bytes.
    fn tar_gz_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn seed_cache(root: &Path, filename: &str, bytes: &[u8]) {
        let cachedir = root.join(CACHE_DIR_NAME);
        fs::create_dir_all(&cachedir).unwrap();
        fs::write(cachedir.join(filename), bytes).unwrap();
    }

    fn write_wrap(root: &Path, name: &str, content: &str) {
        fs::write(root.join(format!("{name}.wrap")), content).unwrap();
    }

    fn git(args: &[&str], cwd: &Path) {
        let status = Command::new("git")
            .args([
                "-c",
                "user.name=test",
                "-c",
                "user.email=test@example.com",
                "-c",
                "init.defaultBranch=main",
            ])
            .args(args)
            .current_dir(cwd)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed: {:?}", status);
    }

    fn git_stdout(args: &[&str], cwd: &Path) -> String {
        let output = Command::new("git").args(args).current_dir(cwd).output().unwrap();
        assert!(output.status.success(), "git {args:?} failed: {output:?}");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    fn resolver(root: &TempDir) -> Resolver {
        Resolver::new(root.path(), WrapMode::Default)
    }

    #[tokio::test]
    async fn existing_build_file_short_circuits() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("foo")).unwrap();
        fs::write(root.path().join("foo").join(BUILD_FILE_NAME), "project('foo')").unwrap();

        let r = resolver(&root);
        assert_eq!(r.resolve("foo").await.unwrap(), "foo");
        // Still resolves with downloads disabled: no acquisition happens.
        let r = Resolver::new(root.path(), WrapMode::NoDownload);
        assert_eq!(r.resolve("foo").await.unwrap(), "foo");
    }

    #[tokio::test]
    async fn wrap_file_overrides_directory_name() {
        let root = tempdir().unwrap();
        write_wrap(
            root.path(),
            "foo",
            "[wrap-file]\ndirectory = foo-1.0\nsource_url = http://unused.invalid/a\n\
             source_filename = a.tar.gz\nsource_hash = 00\n",
        );
        fs::create_dir_all(root.path().join("foo-1.0")).unwrap();
        fs::write(root.path().join("foo-1.0").join(BUILD_FILE_NAME), "x").unwrap();

        assert_eq!(resolver(&root).resolve("foo").await.unwrap(), "foo-1.0");
    }

    #[tokio::test]
    async fn target_that_is_a_file_is_a_conflict() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("foo"), "not a directory").unwrap();

        let err = resolver(&root).resolve("foo").await.unwrap_err();
        let wrap = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap, WrapError::DirectoryConflict { .. }));
    }

    #[tokio::test]
    async fn absent_target_without_wrap_is_missing_declaration() {
        let root = tempdir().unwrap();
        let err = resolver(&root).resolve("foo").await.unwrap_err();
        let wrap = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap, WrapError::MissingDeclaration { name, .. } if name == "foo"));
    }

    #[tokio::test]
    async fn vcs_wrap_with_downloads_disabled_fails() {
        let root = tempdir().unwrap();
        write_wrap(
            root.path(),
            "dep",
            "[wrap-git]\nurl = https://example.com/dep.git\nrevision = head\n",
        );

        let r = Resolver::new(root.path(), WrapMode::NoDownload);
        let err = r.resolve("dep").await.unwrap_err();
        let wrap = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap, WrapError::DownloadDisabled));
    }

    #[tokio::test]
    async fn file_wrap_extracts_from_seeded_cache() {
        let root = tempdir().unwrap();
        let archive = tar_gz_bytes(&[("foo-1.0/meson.build", "project('foo')\n")]);
        seed_cache(root.path(), "foo-1.0.tar.gz", &archive);
        write_wrap(
            root.path(),
            "foo",
            &format!(
                "[wrap-file]\ndirectory = foo-1.0\n\
                 source_url = http://unused.invalid/foo-1.0.tar.gz\n\
                 source_filename = foo-1.0.tar.gz\nsource_hash = {}\n",
                sha256_hex(&archive)
            ),
        );

        let r = resolver(&root);
        assert_eq!(r.resolve("foo").await.unwrap(), "foo-1.0");
        assert!(root.path().join("foo-1.0").join(BUILD_FILE_NAME).exists());

        // Second resolution is the idempotent short circuit.
        assert_eq!(r.resolve("foo").await.unwrap(), "foo-1.0");
    }

    #[tokio::test]
    async fn lead_directory_missing_creates_target_dir() {
        let root = tempdir().unwrap();
        let archive = tar_gz_bytes(&[("meson.build", "project('flat')\n")]);
        seed_cache(root.path(), "flat.tar.gz", &archive);
        write_wrap(
            root.path(),
            "flat",
            &format!(
                "[wrap-file]\ndirectory = flat\nlead_directory_missing = true\n\
                 source_url = http://unused.invalid/flat.tar.gz\n\
                 source_filename = flat.tar.gz\nsource_hash = {}\n",
                sha256_hex(&archive)
            ),
        );

        assert_eq!(resolver(&root).resolve("flat").await.unwrap(), "flat");
        assert!(root.path().join("flat").join(BUILD_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn corrupted_cache_fails_before_extraction() {
        let root = tempdir().unwrap();
        let archive = tar_gz_bytes(&[("foo-1.0/meson.build", "x")]);
        seed_cache(root.path(), "foo-1.0.tar.gz", b"corrupted bytes");
        write_wrap(
            root.path(),
            "foo",
            &format!(
                "[wrap-file]\ndirectory = foo-1.0\n\
                 source_url = http://unused.invalid/foo-1.0.tar.gz\n\
                 source_filename = foo-1.0.tar.gz\nsource_hash = {}\n",
                sha256_hex(&archive)
            ),
        );

        let err = resolver(&root).resolve("foo").await.unwrap_err();
        let wrap = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap, WrapError::HashMismatch { .. }));
        assert!(!root.path().join("foo-1.0").exists());
    }

    #[tokio::test]
    async fn archive_without_build_file_is_incomplete() {
        let root = tempdir().unwrap();
        let archive = tar_gz_bytes(&[("bar/README", "no build file here")]);
        seed_cache(root.path(), "bar.tar.gz", &archive);
        write_wrap(
            root.path(),
            "bar",
            &format!(
                "[wrap-file]\ndirectory = bar\n\
                 source_url = http://unused.invalid/bar.tar.gz\n\
                 source_filename = bar.tar.gz\nsource_hash = {}\n",
                sha256_hex(&archive)
            ),
        );

        let err = resolver(&root).resolve("bar").await.unwrap_err();
        let wrap = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap, WrapError::IncompleteSource { .. }));
    }

    #[tokio::test]
    async fn patch_overlay_is_applied_after_extraction() {
        let root = tempdir().unwrap();
        let source = tar_gz_bytes(&[("foo-1.0/meson.build", "upstream\n")]);
        let patch = tar_gz_bytes(&[
            ("foo-1.0/meson.build", "patched\n"),
            ("foo-1.0/extra/port.c", "int main(void) { return 0; }\n"),
        ]);
        seed_cache(root.path(), "foo-1.0.tar.gz", &source);
        seed_cache(root.path(), "foo-patch.tar.gz", &patch);
        write_wrap(
            root.path(),
            "foo",
            &format!(
                "[wrap-file]\ndirectory = foo-1.0\n\
                 source_url = http://unused.invalid/foo-1.0.tar.gz\n\
                 source_filename = foo-1.0.tar.gz\nsource_hash = {}\n\
                 patch_url = http://unused.invalid/foo-patch.tar.gz\n\
                 patch_filename = foo-patch.tar.gz\npatch_hash = {}\n",
                sha256_hex(&source),
                sha256_hex(&patch)
            ),
        );

        assert_eq!(resolver(&root).resolve("foo").await.unwrap(), "foo-1.0");
        let dir = root.path().join("foo-1.0");
        assert_eq!(fs::read_to_string(dir.join(BUILD_FILE_NAME)).unwrap(), "patched\n");
        assert!(dir.join("extra/port.c").exists());
    }

    #[tokio::test]
    async fn git_wrap_clones_from_local_url() {
        let root = tempdir().unwrap();
        let origin = tempdir().unwrap();
        git(&["init", "-q"], origin.path());
        fs::write(origin.path().join(BUILD_FILE_NAME), "project('dep')\n").unwrap();
        git(&["add", "."], origin.path());
        git(&["commit", "-q", "-m", "initial"], origin.path());

        write_wrap(
            root.path(),
            "dep",
            &format!("[wrap-git]\nurl = {}\nrevision = head\n", origin.path().display()),
        );

        assert_eq!(resolver(&root).resolve("dep").await.unwrap(), "dep");
        assert!(root.path().join("dep").join(BUILD_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn git_wrap_checks_out_pinned_revision() {
        let root = tempdir().unwrap();
        let origin = tempdir().unwrap();
        git(&["init", "-q"], origin.path());
        fs::write(origin.path().join(BUILD_FILE_NAME), "v1\n").unwrap();
        git(&["add", "."], origin.path());
        git(&["commit", "-q", "-m", "v1"], origin.path());
        git(&["tag", "v1"], origin.path());
        fs::write(origin.path().join(BUILD_FILE_NAME), "v2\n").unwrap();
        git(&["add", "."], origin.path());
        git(&["commit", "-q", "-m", "v2"], origin.path());

        write_wrap(
            root.path(),
            "dep",
            &format!("[wrap-git]\nurl = {}\nrevision = v1\n", origin.path().display()),
        );

        assert_eq!(resolver(&root).resolve("dep").await.unwrap(), "dep");
        let content = fs::read_to_string(root.path().join("dep").join(BUILD_FILE_NAME)).unwrap();
        assert_eq!(content, "v1\n");
    }

    #[tokio::test]
    async fn existing_dir_without_build_file_is_incomplete() {
        // An existing target directory is never re-acquired; if it lacks
        // the build descriptor the resolution fails rather than overwrites.
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("dep")).unwrap();
        fs::write(root.path().join("dep/README"), "manually placed").unwrap();
        write_wrap(
            root.path(),
            "dep",
            "[wrap-git]\nurl = https://example.com/dep.git\nrevision = head\n",
        );

        let err = resolver(&root).resolve("dep").await.unwrap_err();
        let wrap = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap, WrapError::IncompleteSource { .. }));
    }

    #[tokio::test]
    async fn git_strategy_rejects_existing_non_repository() {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("dep")).unwrap();
        fs::write(root.path().join("dep/README"), "manually placed").unwrap();
        let wrap = WrapFile::parse(
            "[wrap-git]\nurl = https://example.com/dep.git\nrevision = head\n",
            "dep.wrap",
        )
        .unwrap();

        let err = resolver(&root).get_git(&wrap, "dep").await.unwrap_err();
        let wrap_err = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap_err, WrapError::DirectoryConflict { .. }));
    }

    #[tokio::test]
    async fn git_strategy_tolerates_failed_pull_on_existing_checkout() {
        let root = tempdir().unwrap();
        let dep = root.path().join("dep");
        fs::create_dir_all(&dep).unwrap();
        git(&["init", "-q"], &dep);
        fs::write(dep.join(BUILD_FILE_NAME), "project('dep')\n").unwrap();
        git(&["add", "."], &dep);
        git(&["commit", "-q", "-m", "initial"], &dep);
        let wrap = WrapFile::parse(
            "[wrap-git]\nurl = https://unreachable.invalid/dep.git\nrevision = head\n",
            "dep.wrap",
        )
        .unwrap();

        // `git pull` fails (no remote configured); the existing checkout
        // must stay usable offline.
        resolver(&root).get_git(&wrap, "dep").await.unwrap();
    }

    #[tokio::test]
    async fn pinned_revision_unknown_locally_escalates_to_fetch() {
        let root = tempdir().unwrap();
        let origin = tempdir().unwrap();
        git(&["init", "-q"], origin.path());
        fs::write(origin.path().join(BUILD_FILE_NAME), "v1\n").unwrap();
        git(&["add", "."], origin.path());
        git(&["commit", "-q", "-m", "v1"], origin.path());

        // Clone first, then advance the origin so the new tag is not
        // reachable in the existing checkout without a fetch.
        let r = resolver(&root);
        let wrap_head = WrapFile::parse(
            &format!("[wrap-git]\nurl = {}\nrevision = head\n", origin.path().display()),
            "dep.wrap",
        )
        .unwrap();
        r.get_git(&wrap_head, "dep").await.unwrap();

        fs::write(origin.path().join(BUILD_FILE_NAME), "v2\n").unwrap();
        git(&["add", "."], origin.path());
        git(&["commit", "-q", "-m", "v2"], origin.path());
        git(&["config", "uploadpack.allowAnySHA1InWant", "true"], origin.path());
        let sha = git_stdout(&["rev-parse", "HEAD"], origin.path());

        let checkoutdir = root.path().join("dep");
        r.checkout_git_revision(&wrap_head, &checkoutdir, &sha).await.unwrap();
        let content = fs::read_to_string(checkoutdir.join(BUILD_FILE_NAME)).unwrap();
        assert_eq!(content, "v2\n");
    }

    #[tokio::test]
    async fn submodule_reconciliation_outside_repo_is_noop() {
        let root = tempdir().unwrap();
        let r = resolver(&root);
        let status = r.reconcile_submodule(&root.path().join("dep")).await.unwrap();
        assert_eq!(status, SubmoduleStatus::NotSubmodule);
    }

    #[tokio::test]
    async fn plain_directory_inside_repo_is_not_a_submodule() {
        let root = tempdir().unwrap();
        git(&["init", "-q"], root.path());
        fs::create_dir_all(root.path().join("dep")).unwrap();

        let r = resolver(&root);
        let status = r.reconcile_submodule(&root.path().join("dep")).await.unwrap();
        assert_eq!(status, SubmoduleStatus::NotSubmodule);
    }

    #[test]
    fn submodule_status_classification() {
        let line = "19ab2ccbdd61c19a17fbc04f55fea4e60fd88ec7 dep (heads/main)";
        assert_eq!(
            classify_submodule_status(&format!("+{line}")).unwrap(),
            SubmoduleStatus::OutOfDate
        );
        assert_eq!(
            classify_submodule_status(&format!("U{line}")).unwrap(),
            SubmoduleStatus::Conflict
        );
        assert_eq!(
            classify_submodule_status(&format!("-{line}")).unwrap(),
            SubmoduleStatus::NotInitialized
        );
        assert_eq!(
            classify_submodule_status(&format!(" {line}")).unwrap(),
            SubmoduleStatus::Clean
        );
        assert_eq!(classify_submodule_status("").unwrap(), SubmoduleStatus::NotSubmodule);

        let err = classify_submodule_status("?something unexpected").unwrap_err();
        assert!(matches!(err, WrapError::UnknownSubmoduleStatus { .. }));
    }

    #[test]
    fn display_subproj_shows_last_two_components() {
        let path = Path::new("/work/project/subprojects/foo");
        assert_eq!(display_subproj(path), "subprojects/foo");
    }
}

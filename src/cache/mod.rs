//! Content-addressable download cache
//!
//! Downloaded artifacts (source archives and patch archives) live under
//! `<subprojects_root>/packagecache/`, keyed by their declared filename.
//! A cache entry is trusted only after its SHA-256 matches the hash the
//! wrap file declares for that role; a stale or corrupted entry is a hard
//! error, never a silent re-download.
//!
//! Downloads stream to a uniquely named temporary file in the cache
//! directory while a SHA-256 digest is updated incrementally. Only a fully
//! verified download is renamed to the final cache path, so the rename is
//! the single visible mutation: concurrent writers racing on the same key
//! produce either writer's verified bytes, never a partial file. Progress
//! is reported as a byte bar when the response declares a length and as a
//! spinner otherwise.
//!
//! Requests to the canonical package index host get one concession: if the
//! HTTPS connection cannot be established, the download is retried over
//! plain HTTP after a one-time warning. Arbitrary declared URLs always use
//! the transport their scheme implies.

use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::constants::{REQUEST_TIMEOUT, WRAPDB_HOST};
use crate::core::{WrapError, WrapMode};
use crate::utils::fs::ensure_dir;
use crate::wrap::WrapFile;

/// The role an artifact plays in a wrap declaration. Selects which
/// `*_filename`/`*_url`/`*_hash` field triple is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The main source archive.
    Source,
    /// An optional patch overlay archive.
    Patch,
}

impl Role {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filename-keyed artifact cache with SHA-256 verification.
///
/// One instance per resolver. The only mutable state is the one-time
/// insecure-transport warning flag, kept here explicitly instead of in a
/// module global so it lives exactly as long as the process's cache does.
pub struct ArtifactCache {
    dir: PathBuf,
    wrap_mode: WrapMode,
    client: reqwest::Client,
    insecure_warned: AtomicBool,
}

impl ArtifactCache {
    /// Create a cache rooted at `dir` (usually
    /// `<subprojects_root>/packagecache`). The directory is created lazily
    /// on the first cache miss.
    #[must_use]
    pub fn new(dir: PathBuf, wrap_mode: WrapMode) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            dir,
            wrap_mode,
            client,
            insecure_warned: AtomicBool::new(false),
        }
    }

    /// The cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get a verified local path for the artifact in the given role.
    ///
    /// Cache hit: the cached file is re-verified against the declared hash
    /// and reused; a mismatch is fatal. Cache miss: the artifact is
    /// downloaded, verified, and atomically placed under its declared
    /// filename. `name` is the dependency name, used for log messages only.
    pub async fn get_artifact(&self, name: &str, wrap: &WrapFile, role: Role) -> Result<PathBuf> {
        let filename = wrap.get(&format!("{role}_filename"))?;
        let expected = wrap.get(&format!("{role}_hash"))?;
        let cache_path = self.dir.join(filename);

        if cache_path.exists() {
            verify_hash(&cache_path, expected, role)?;
            info!("Using {name} {role} from cache.");
            return Ok(cache_path);
        }

        if !self.wrap_mode.downloads_enabled() {
            return Err(WrapError::DownloadDisabled.into());
        }

        ensure_dir(&self.dir)?;
        let url = wrap.get(&format!("{role}_url"))?;
        info!("Downloading {name} {role} from {url}");
        self.download(url, expected, role, &cache_path).await?;
        Ok(cache_path)
    }

    /// Stream `url` to a temporary file in the cache directory, verifying
    /// the SHA-256 digest before renaming onto `dest`.
    async fn download(&self, url: &str, expected: &str, role: Role, dest: &Path) -> Result<()> {
        let response = self.open(url).await?;
        let total = response.content_length();

        let progress = match total {
            Some(len) => {
                debug!("Download size: {len}");
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} ({eta})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                debug!("Downloading file of unknown size.");
                ProgressBar::new_spinner()
            }
        };

        // The temp file lives in the cache directory so the final rename
        // stays on one filesystem. Dropped (and deleted) on any error path.
        let mut tmpfile = tempfile::NamedTempFile::new_in(&self.dir)
            .context("failed to create temporary download file")?;
        let mut hasher = Sha256::new();

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WrapError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            hasher.update(&chunk);
            tmpfile.write_all(&chunk)?;
            progress.inc(chunk.len() as u64);
        }
        progress.finish_and_clear();
        tmpfile.flush()?;

        let actual = hex::encode(hasher.finalize());
        if actual != expected {
            // NamedTempFile drop removes the partial file; the final cache
            // path is never touched.
            return Err(WrapError::HashMismatch {
                role: role.to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }

        tmpfile
            .persist(dest)
            .with_context(|| format!("failed to move download into place at {}", dest.display()))?;
        Ok(())
    }

    /// Issue the GET request, downgrading to plain HTTP for the canonical
    /// index host when the secure connection cannot be established.
    async fn open(&self, url: &str) -> Result<reqwest::Response> {
        let download_err = |reason: String| WrapError::Download {
            url: url.to_string(),
            reason,
        };

        match self.client.get(url).send().await {
            Ok(response) => {
                let response = response
                    .error_for_status()
                    .map_err(|e| download_err(e.to_string()))?;
                Ok(response)
            }
            Err(e) if e.is_connect() && is_secure_wrapdb_url(url) => {
                if !self.insecure_warned.swap(true, Ordering::Relaxed) {
                    warn!("SSL connection failed. Falling back to unencrypted connections.");
                }
                let fallback = format!("http{}", &url["https".len()..]);
                let response = self
                    .client
                    .get(&fallback)
                    .send()
                    .await
                    .map_err(|e| download_err(e.to_string()))?
                    .error_for_status()
                    .map_err(|e| download_err(e.to_string()))?;
                Ok(response)
            }
            Err(e) => Err(download_err(e.to_string()).into()),
        }
    }
}

fn is_secure_wrapdb_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .is_some_and(|rest| rest.split('/').next().is_some_and(|host| host == WRAPDB_HOST))
}

/// Verify a file's SHA-256 against the declared hash.
fn verify_hash(path: &Path, expected: &str, role: Role) -> Result<()> {
    let content = std::fs::read(path)
        .with_context(|| format!("cannot read cached file {}", path.display()))?;
    let actual = hex::encode(Sha256::digest(&content));
    if actual != expected {
        return Err(WrapError::HashMismatch {
            role: role.to_string(),
            expected: expected.to_string(),
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sha256_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn file_wrap(filename: &str, hash: &str, url: &str) -> WrapFile {
        let content = format!(
            "[wrap-file]\ndirectory = pkg\nsource_url = {url}\n\
             source_filename = {filename}\nsource_hash = {hash}\n"
        );
        WrapFile::parse(&content, "pkg.wrap").unwrap()
    }

    /// Serve exactly one HTTP response on an ephemeral port.
    async fn serve_once(body: Vec<u8>, with_length: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let header = if with_length {
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
            } else {
                "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n".to_string()
            };
            stream.write_all(header.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn cache_hit_reverifies_and_reuses() {
        let root = tempdir().unwrap();
        let cache = ArtifactCache::new(root.path().join("packagecache"), WrapMode::Default);
        ensure_dir(cache.dir()).unwrap();
        std::fs::write(cache.dir().join("pkg.tar.gz"), b"cached bytes").unwrap();

        let wrap = file_wrap("pkg.tar.gz", &sha256_hex(b"cached bytes"), "http://unused.invalid/x");
        let path = cache.get_artifact("pkg", &wrap, Role::Source).await.unwrap();
        assert_eq!(path, cache.dir().join("pkg.tar.gz"));
    }

    #[tokio::test]
    async fn corrupted_cache_entry_is_fatal() {
        let root = tempdir().unwrap();
        let cache = ArtifactCache::new(root.path().join("packagecache"), WrapMode::Default);
        ensure_dir(cache.dir()).unwrap();
        std::fs::write(cache.dir().join("pkg.tar.gz"), b"tampered").unwrap();

        let wrap = file_wrap("pkg.tar.gz", &sha256_hex(b"original"), "http://unused.invalid/x");
        let err = cache.get_artifact("pkg", &wrap, Role::Source).await.unwrap_err();
        let wrap_err = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap_err, WrapError::HashMismatch { .. }));
    }

    #[tokio::test]
    async fn cache_miss_with_downloads_disabled_fails() {
        let root = tempdir().unwrap();
        let cache = ArtifactCache::new(root.path().join("packagecache"), WrapMode::NoDownload);

        let wrap = file_wrap("pkg.tar.gz", &sha256_hex(b"x"), "http://unused.invalid/x");
        let err = cache.get_artifact("pkg", &wrap, Role::Source).await.unwrap_err();
        let wrap_err = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap_err, WrapError::DownloadDisabled));
    }

    #[tokio::test]
    async fn downloads_verify_and_land_under_declared_filename() {
        let body = b"archive contents".to_vec();
        let url = serve_once(body.clone(), true).await;

        let root = tempdir().unwrap();
        let cache = ArtifactCache::new(root.path().join("packagecache"), WrapMode::Default);
        let wrap = file_wrap("pkg.tar.gz", &sha256_hex(&body), &format!("{url}/pkg.tar.gz"));

        let path = cache.get_artifact("pkg", &wrap, Role::Source).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), body);
    }

    #[tokio::test]
    async fn downloads_without_content_length_still_verify() {
        let body = b"unsized body".to_vec();
        let url = serve_once(body.clone(), false).await;

        let root = tempdir().unwrap();
        let cache = ArtifactCache::new(root.path().join("packagecache"), WrapMode::Default);
        let wrap = file_wrap("pkg.tar.gz", &sha256_hex(&body), &format!("{url}/pkg.tar.gz"));

        let path = cache.get_artifact("pkg", &wrap, Role::Source).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), body);
    }

    #[tokio::test]
    async fn mismatched_download_never_occupies_cache_path() {
        let url = serve_once(b"wrong bytes".to_vec(), true).await;

        let root = tempdir().unwrap();
        let cache = ArtifactCache::new(root.path().join("packagecache"), WrapMode::Default);
        let wrap = file_wrap("pkg.tar.gz", &sha256_hex(b"right bytes"), &format!("{url}/pkg.tar.gz"));

        let err = cache.get_artifact("pkg", &wrap, Role::Source).await.unwrap_err();
        let wrap_err = err.downcast_ref::<WrapError>().unwrap();
        assert!(matches!(wrap_err, WrapError::HashMismatch { .. }));
        assert!(!cache.dir().join("pkg.tar.gz").exists());
        // No stray temp files left under the final name either.
        let leftovers: Vec<_> = std::fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(leftovers.is_empty(), "unexpected cache entries: {leftovers:?}");
    }

    #[test]
    fn wrapdb_url_detection_is_host_exact() {
        assert!(is_secure_wrapdb_url("https://wrapdb.mesonbuild.com/v1/projects/zlib"));
        assert!(!is_secure_wrapdb_url("http://wrapdb.mesonbuild.com/v1/projects/zlib"));
        assert!(!is_secure_wrapdb_url("https://example.com/wrapdb.mesonbuild.com"));
        assert!(!is_secure_wrapdb_url("https://wrapdb.mesonbuild.com.evil.example/x"));
    }
}

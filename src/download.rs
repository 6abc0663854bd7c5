// src/download.rs

//! Source archive downloads
//!
//! `fetch` is fetch-if-absent: an archive already in the cache is reused
//! unless the caller forces a refresh. Bodies are streamed to a temporary
//! file next to the destination and renamed into place, so an interrupted
//! download never leaves a truncated archive behind.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (5 minutes, tarballs can be large)
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Last path segment of a URI, used as the file name in a directory
pub fn file_name_of(uri: &str) -> Option<&str> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Where `uri` lands when fetched to `dest`
pub fn target_path(uri: &str, dest: &Path) -> Result<PathBuf> {
    if dest.is_dir() {
        let name = file_name_of(uri).ok_or_else(|| {
            Error::DownloadError(format!("Cannot derive a file name from {}", uri))
        })?;
        Ok(dest.join(name))
    } else {
        Ok(dest.to_path_buf())
    }
}

/// HTTP downloader with retry support
pub struct Downloader {
    client: Client,
    max_retries: u32,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Fetch `uri` into `dest` and return the local path
    ///
    /// If `dest` is a directory the file keeps the URI's last segment as its
    /// name. Nothing is fetched when the file exists and `force` is unset.
    /// `file://` URIs are copied from the local filesystem.
    pub fn fetch(&self, uri: &str, dest: &Path, force: bool) -> Result<PathBuf> {
        let target = target_path(uri, dest)?;
        if target.exists() && !force {
            debug!("{} already present, not downloading again", target.display());
            return Ok(target);
        }

        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        info!("Downloading {} to {}", uri, target.display());
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;

        let bytes = match uri.strip_prefix("file://") {
            Some(local) => {
                let mut src = fs::File::open(local).map_err(|e| {
                    Error::DownloadError(format!("Failed to open {}: {}", local, e))
                })?;
                stream(&mut src, tmp.as_file_mut())?
            }
            None => self.download(uri, tmp.as_file_mut())?,
        };

        tmp.persist(&target)
            .map_err(|e| Error::io(format!("Failed to store {}", target.display()), e.error))?;
        debug!("fetched {} bytes into {}", bytes, target.display());
        Ok(target)
    }

    fn download(&self, uri: &str, file: &mut fs::File) -> Result<u64> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(uri).send() {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            uri
                        )));
                    }
                    return stream(&mut response, file);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download {uri} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Download attempt {} for {} failed: {}, retrying...", attempt, uri, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

/// Copy `reader` into `file` in fixed size chunks
fn stream(reader: &mut impl Read, file: &mut fs::File) -> Result<u64> {
    let mut total: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .map_err(|e| Error::io("Failed to write data", e))?;
        total += read as u64;
    }

    file.flush()?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_name_of() {
        assert_eq!(
            file_name_of("https://zlib.net/zlib-1.3.tar.gz"),
            Some("zlib-1.3.tar.gz")
        );
        assert_eq!(
            file_name_of("https://x.org/a/b.tgz?raw=1"),
            Some("b.tgz")
        );
        assert_eq!(file_name_of("https://x.org/dir/"), None);
    }

    #[test]
    fn test_fetch_local_into_directory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("zlib-1.3.tar.gz");
        fs::write(&src, b"archive").unwrap();
        let cache = dir.path().join("downloads");
        fs::create_dir_all(&cache).unwrap();

        let downloader = Downloader::new().unwrap();
        let uri = format!("file://{}", src.display());
        let path = downloader.fetch(&uri, &cache, false).unwrap();

        assert_eq!(path, cache.join("zlib-1.3.tar.gz"));
        assert_eq!(fs::read(&path).unwrap(), b"archive");
    }

    #[test]
    fn test_existing_file_not_refetched() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("cached.tar.gz");
        fs::write(&dest, b"old").unwrap();

        let src = dir.path().join("new.tar.gz");
        fs::write(&src, b"new").unwrap();
        let uri = format!("file://{}", src.display());

        let downloader = Downloader::new().unwrap();
        downloader.fetch(&uri, &dest, false).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"old");

        downloader.fetch(&uri, &dest, true).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn test_missing_local_source() {
        let dir = tempdir().unwrap();
        let downloader = Downloader::new().unwrap();
        let err = downloader
            .fetch("file:///nonexistent/x.tar.gz", dir.path(), false)
            .unwrap_err();
        assert!(matches!(err, Error::DownloadError(_)));
    }
}

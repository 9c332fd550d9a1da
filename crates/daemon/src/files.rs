// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only filesystem browser and download-token minting
//! (`SPEC_FULL.md` §"Supplemented features"): `explore_filesystem` lists a
//! directory's immediate children, `request_download_token` mints a
//! short-lived opaque token a separate HTTP surface can later exchange for
//! a file's bytes.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nanoid::nanoid;
use paseo_core::HostError;
use parking_lot::Mutex;
use paseo_wire::FilesystemEntry;

/// How long a minted download token remains redeemable.
const DOWNLOAD_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Lists the immediate children of `path`, sorted directories-first then by
/// name. Errors if `path` doesn't exist or isn't a directory.
pub async fn explore_filesystem(path: String) -> Result<Vec<FilesystemEntry>, HostError> {
    tokio::task::spawn_blocking(move || explore_filesystem_sync(&path))
        .await
        .map_err(|e| HostError::HostFatal(e.to_string()))?
}

fn explore_filesystem_sync(path: &str) -> Result<Vec<FilesystemEntry>, HostError> {
    let dir = Path::new(path);
    let read_dir = std::fs::read_dir(dir)
        .map_err(|e| HostError::not_found(format!("cannot list {path}: {e}")))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| HostError::provider_failure(e.to_string()))?;
        let metadata = entry.metadata().map_err(|e| HostError::provider_failure(e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        entries.push(FilesystemEntry {
            path: entry.path().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size_bytes: if metadata.is_dir() { None } else { Some(metadata.len()) },
            name,
        });
    }

    entries.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
    Ok(entries)
}

struct IssuedToken {
    path: PathBuf,
    expires_at_ms: u64,
}

/// Mints and redeems opaque `request_download_token` tokens. Tokens are
/// in-memory only: a daemon restart invalidates every outstanding token,
/// which is acceptable since a client can always request a fresh one.
#[derive(Default)]
pub struct DownloadTokenStore {
    tokens: Mutex<std::collections::HashMap<String, IssuedToken>>,
}

impl DownloadTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, path: String) -> (String, u64) {
        let token = nanoid!();
        let expires_at_ms = now_ms() + DOWNLOAD_TOKEN_TTL.as_millis() as u64;
        self.tokens.lock().insert(token.clone(), IssuedToken { path: PathBuf::from(path), expires_at_ms });
        (token, expires_at_ms)
    }

    /// Redeems a token, returning the file path it was minted for if the
    /// token exists and hasn't expired. Tokens are single-use.
    pub fn redeem(&self, token: &str) -> Option<PathBuf> {
        let mut tokens = self.tokens.lock();
        let issued = tokens.remove(token)?;
        if issued.expires_at_ms < now_ms() {
            return None;
        }
        Some(issued.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn explore_filesystem_lists_directories_before_files() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("b.txt"), "b").expect("write");
        std::fs::create_dir(tmp.path().join("a_dir")).expect("mkdir");
        std::fs::write(tmp.path().join("a.txt"), "a").expect("write");

        let entries = explore_filesystem(tmp.path().to_string_lossy().into_owned()).await.expect("lists");
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].name, "a_dir");
    }

    #[tokio::test]
    async fn explore_filesystem_errors_for_missing_path() {
        let result = explore_filesystem("/does/not/exist/anywhere".to_string()).await;
        assert!(result.is_err());
    }

    #[test]
    fn issued_token_redeems_once() {
        let store = DownloadTokenStore::new();
        let (token, _expires) = store.issue("/tmp/a.txt".to_string());
        assert_eq!(store.redeem(&token), Some(PathBuf::from("/tmp/a.txt")));
        assert_eq!(store.redeem(&token), None);
    }

    #[test]
    fn unknown_token_does_not_redeem() {
        let store = DownloadTokenStore::new();
        assert_eq!(store.redeem("nope"), None);
    }
}

//! Over-the-air file replacement
//!
//! Downloads a replacement file next to the target under a `.new`
//! suffix, verifies the sha256 digest when one was supplied, and only
//! then renames it over the target. The live file is never touched until
//! a fully verified replacement exists on disk, so a failed or torn
//! download cannot brick the node. The new file takes effect at the next
//! reboot.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};
use sha2::{Digest, Sha256};

use aeris_core::traits::Updater;

/// Download attempts per update command.
const DOWNLOAD_ATTEMPTS: u32 = 3;

/// Hard cap on accepted file size.
const MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;

/// Updater that fetches over HTTP into a target directory.
pub struct HttpUpdater {
    agent: ureq::Agent,
    target_dir: PathBuf,
}

impl HttpUpdater {
    /// Updater writing into `target_dir`.
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build();
        Self {
            agent,
            target_dir: target_dir.into(),
        }
    }

    fn download_to(&self, url: &str, staging: &Path) -> io::Result<()> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let mut reader = response.into_reader().take(MAX_FILE_BYTES);
        let mut file = File::create(staging)?;
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
        }
        file.sync_all()
    }
}

/// Lowercase hex sha256 of a file on disk.
fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

impl Updater for HttpUpdater {
    fn download_and_replace(&mut self, url: &str, filename: &str, checksum: Option<&str>) -> bool {
        let target = self.target_dir.join(filename);
        let staging = self.target_dir.join(format!("{filename}.new"));

        let mut downloaded = false;
        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            match self.download_to(url, &staging) {
                Ok(()) => {
                    downloaded = true;
                    break;
                }
                Err(e) => warn!(
                    "download of {url} failed (attempt {attempt}/{DOWNLOAD_ATTEMPTS}): {e}"
                ),
            }
        }
        if !downloaded {
            error!("update of {filename} abandoned, download never completed");
            let _ = fs::remove_file(&staging);
            return false;
        }

        verify_and_replace(&staging, &target, filename, checksum)
    }
}

/// Verify the staged download and move it over the target. On any
/// failure the staging file is removed and the target stays untouched.
fn verify_and_replace(staging: &Path, target: &Path, filename: &str, checksum: Option<&str>) -> bool {
    if let Some(expected) = checksum {
        match file_digest(staging) {
            Ok(actual) if actual == expected.to_ascii_lowercase() => {}
            Ok(actual) => {
                error!("checksum mismatch for {filename}: expected {expected}, got {actual}");
                let _ = fs::remove_file(staging);
                return false;
            }
            Err(e) => {
                error!("could not digest staged {filename}: {e}");
                let _ = fs::remove_file(staging);
                return false;
            }
        }
    }

    match fs::rename(staging, target) {
        Ok(()) => {
            info!("{filename} replaced, effective at next reboot");
            true
        }
        Err(e) => {
            error!("could not move staged {filename} into place: {e}");
            let _ = fs::remove_file(staging);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // sha256 of b"hello world"
    const HELLO_DIGEST: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn digest_matches_known_vector() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.py");
        fs::write(&path, b"hello world").unwrap();
        assert_eq!(file_digest(&path).unwrap(), HELLO_DIGEST);
    }

    #[test]
    fn checksum_mismatch_preserves_the_live_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("main.py");
        let staging = dir.path().join("main.py.new");
        fs::write(&target, b"live version").unwrap();
        fs::write(&staging, b"corrupted download").unwrap();

        assert!(!verify_and_replace(&staging, &target, "main.py", Some(HELLO_DIGEST)));
        assert_eq!(fs::read(&target).unwrap(), b"live version");
        assert!(!staging.exists());
    }

    #[test]
    fn verified_download_replaces_the_target() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("main.py");
        let staging = dir.path().join("main.py.new");
        fs::write(&target, b"old").unwrap();
        fs::write(&staging, b"hello world").unwrap();

        assert!(verify_and_replace(&staging, &target, "main.py", Some(HELLO_DIGEST)));
        assert_eq!(fs::read(&target).unwrap(), b"hello world");
        assert!(!staging.exists());
    }

    #[test]
    fn uppercase_checksum_is_accepted() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("main.py");
        let staging = dir.path().join("main.py.new");
        fs::write(&staging, b"hello world").unwrap();

        let upper = HELLO_DIGEST.to_ascii_uppercase();
        assert!(verify_and_replace(&staging, &target, "main.py", Some(&upper)));
        assert_eq!(fs::read(&target).unwrap(), b"hello world");
    }

    #[test]
    fn no_checksum_replaces_without_verification() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("config.toml");
        let staging = dir.path().join("config.toml.new");
        fs::write(&staging, b"anything").unwrap();

        assert!(verify_and_replace(&staging, &target, "config.toml", None));
        assert_eq!(fs::read(&target).unwrap(), b"anything");
    }
}

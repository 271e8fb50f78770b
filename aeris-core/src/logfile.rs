//! Size-capped rotating log file
//!
//! Append-only log with one rotation rule: when a write would push the
//! file past its size limit, the file is renamed with a timestamp suffix
//! and a fresh one is started. A bounded number of rotated backups are
//! retained; the oldest is deleted first. `tail` serves the remote `logs`
//! command.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

/// Append-only rotating log file. Handles are cheap to clone; all state
/// lives on disk.
#[derive(Debug, Clone)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_backups: usize,
}

impl RotatingFile {
    /// Rotate `path` when it exceeds `max_bytes`, keeping at most
    /// `max_backups` rotated files.
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, max_backups: usize) -> Self {
        Self {
            path: path.into(),
            max_bytes: max_bytes.max(1),
            max_backups,
        }
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line, rotating first if the file is full.
    pub fn append(&self, line: &str) -> io::Result<()> {
        if self.current_size()? + line.len() as u64 + 1 > self.max_bytes {
            self.rotate()?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }

    /// Last `n` lines of the active file, oldest first.
    pub fn tail(&self, n: usize) -> io::Result<Vec<String>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let lines: Vec<String> = BufReader::new(file).lines().collect::<Result<_, _>>()?;
        let start = lines.len().saturating_sub(n);
        Ok(lines[start..].to_vec())
    }

    fn current_size(&self) -> io::Result<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn rotate(&self) -> io::Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut rotated = self.path.clone();
        rotated.set_file_name(format!(
            "{}.{stamp}",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "aeris.log".to_string())
        ));
        // A second rotation within one second would collide; tack on a
        // counter until the name is free.
        let mut unique = rotated.clone();
        let mut n = 1;
        while unique.exists() {
            unique = rotated.clone();
            unique.set_file_name(format!(
                "{}.{n}",
                rotated.file_name().unwrap_or_default().to_string_lossy()
            ));
            n += 1;
        }
        fs::rename(&self.path, &unique)?;
        self.prune()
    }

    fn prune(&self) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let stem = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .map(|n| {
                        let name = n.to_string_lossy();
                        name.starts_with(&stem) && name.len() > stem.len()
                    })
                    .unwrap_or(false)
            })
            .collect();
        // Timestamp suffixes sort chronologically; oldest first.
        backups.sort();
        while backups.len() > self.max_backups {
            let oldest = backups.remove(0);
            fs::remove_file(oldest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_lines() {
        let dir = tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("node.log"), 4096, 2);
        log.append("2026-01-01 00:00:00 - INFO - boot").unwrap();
        log.append("2026-01-01 00:00:01 - WARN - wobble").unwrap();
        let tail = log.tail(10).unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail[1].contains("wobble"));
    }

    #[test]
    fn rotates_when_full_and_prunes_oldest() {
        let dir = tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("node.log"), 64, 2);
        for i in 0..40 {
            log.append(&format!("line number {i} with some padding"))
                .unwrap();
        }
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        // Active file plus at most two backups.
        assert!(entries.len() <= 3, "found {} files", entries.len());
        assert!(dir.path().join("node.log").exists());
    }

    #[test]
    fn tail_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("node.log"), 64, 2);
        assert!(log.tail(5).unwrap().is_empty());
    }

    #[test]
    fn tail_returns_last_n() {
        let dir = tempdir().unwrap();
        let log = RotatingFile::new(dir.path().join("node.log"), 4096, 2);
        for i in 0..10 {
            log.append(&format!("entry {i}")).unwrap();
        }
        let tail = log.tail(3).unwrap();
        assert_eq!(tail, vec!["entry 7", "entry 8", "entry 9"]);
    }
}

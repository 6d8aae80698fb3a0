// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segmented write-ahead log
//!
//! Layout: a directory of `segment-<sequence>.log` files, where the sequence
//! is a zero-padded counter so segments sort lexicographically in write
//! order. Exactly one segment is the active write target; the rest are
//! sealed. Each line is one complete JSON event object terminated by `\n`.
//!
//! Durability floor: the outgoing segment is fsync'd on rotation; the active
//! segment is not synced per write, so a machine crash may lose the tail.
//! The pipeline is at-least-once overall, which tolerates that.

use floodgate_core::{Event, WalError, WalPort};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

const SEGMENT_PREFIX: &str = "segment-";
const SEGMENT_SUFFIX: &str = ".log";
const SEGMENT_SEQ_DIGITS: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct WalConfig {
    /// Rotation threshold for the active segment, in bytes
    pub max_segment_size: u64,
    /// Fail-closed ceiling on the total size of all segments, in bytes
    pub max_total_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            max_segment_size: 100 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
        }
    }
}

struct ActiveSegment {
    file: File,
    size: u64,
}

struct WalInner {
    dir: PathBuf,
    config: WalConfig,
    active: Option<ActiveSegment>,
    next_sequence: u64,
}

/// Single-writer segmented append log. All operations hold one exclusive
/// lock; clones share the same log.
#[derive(Clone)]
pub struct Wal {
    inner: Arc<Mutex<WalInner>>,
}

impl Wal {
    /// Open a WAL directory, creating it if needed. If segments exist, the
    /// newest is reopened for appending (unless already over the rotation
    /// threshold).
    pub fn open(dir: impl Into<PathBuf>, config: WalConfig) -> Result<Self, WalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let segments = sorted_segments(&dir)?;
        let next_sequence = segments
            .last()
            .and_then(|path| parse_sequence(path))
            .map(|seq| seq + 1)
            .unwrap_or(0);

        let mut inner = WalInner {
            dir,
            config,
            active: None,
            next_sequence,
        };

        if let Some(latest) = segments.last() {
            let size = fs::metadata(latest)?.len();
            if size < config.max_segment_size {
                let file = OpenOptions::new().append(true).open(latest)?;
                info!(path = %latest.display(), size, "reopened WAL segment");
                inner.active = Some(ActiveSegment { file, size });
            }
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Fsync and close the active segment. Called on graceful shutdown;
    /// the next write reopens a fresh segment.
    pub fn close(&self) -> Result<(), WalError> {
        let mut inner = self.lock();
        if let Some(active) = inner.active.take() {
            active.file.sync_all()?;
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, WalInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WalPort for Wal {
    fn write(&self, event: &Event) -> Result<(), WalError> {
        let mut inner = self.lock();

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        // Budget is enforced against a fresh scan so external deletions and
        // untracked segments are accounted for.
        let total = scan_total_size(&inner.dir)?;
        let incoming = line.len() as u64;
        if total + incoming > inner.config.max_total_size {
            return Err(WalError::Full {
                total,
                incoming,
                limit: inner.config.max_total_size,
            });
        }

        if inner.active.is_none() {
            rotate(&mut inner)?;
        }
        let threshold = inner.config.max_segment_size;
        let Some(active) = inner.active.as_mut() else {
            return Err(WalError::Io(std::io::Error::other(
                "no active WAL segment after rotation",
            )));
        };
        active.file.write_all(&line)?;
        active.size += incoming;

        if active.size >= threshold {
            rotate(&mut inner)?;
        }
        Ok(())
    }

    fn replay(
        &self,
        handler: &mut dyn FnMut(Event) -> Result<(), String>,
    ) -> Result<usize, WalError> {
        let mut inner = self.lock();
        if let Some(active) = inner.active.take() {
            active.file.sync_all()?;
        }

        let segments = sorted_segments(&inner.dir)?;
        let mut replayed = 0;
        for path in &segments {
            let reader = BufReader::new(File::open(path)?);
            for line in reader.lines() {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Event>(&line) {
                    Ok(event) => {
                        handler(event).map_err(WalError::ReplayAborted)?;
                        replayed += 1;
                    }
                    Err(err) => {
                        // Most likely a torn tail from a crash mid-write
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "skipping unparsable WAL line"
                        );
                    }
                }
            }
        }
        Ok(replayed)
    }

    fn truncate(&self) -> Result<(), WalError> {
        let mut inner = self.lock();
        inner.active = None;
        let segments = sorted_segments(&inner.dir)?;
        for path in &segments {
            fs::remove_file(path)?;
        }
        if !segments.is_empty() {
            info!(removed = segments.len(), "WAL truncated");
        }
        Ok(())
    }

    fn segment_count(&self) -> Result<usize, WalError> {
        let inner = self.lock();
        Ok(sorted_segments(&inner.dir)?.len())
    }

    fn total_size(&self) -> Result<u64, WalError> {
        let inner = self.lock();
        scan_total_size(&inner.dir)
    }
}

/// Seal the active segment (fsync before close) and start a new one.
fn rotate(inner: &mut WalInner) -> Result<(), WalError> {
    if let Some(active) = inner.active.take() {
        active.file.sync_all()?;
    }

    let name = format!(
        "{SEGMENT_PREFIX}{:0width$}{SEGMENT_SUFFIX}",
        inner.next_sequence,
        width = SEGMENT_SEQ_DIGITS
    );
    let path = inner.dir.join(name);
    inner.next_sequence += 1;

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    inner.active = Some(ActiveSegment { file, size: 0 });
    info!(path = %path.display(), "rotated to new WAL segment");
    Ok(())
}

fn is_segment(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(SEGMENT_PREFIX) && name.ends_with(SEGMENT_SUFFIX))
}

fn parse_sequence(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?
        .parse()
        .ok()
}

fn sorted_segments(dir: &Path) -> Result<Vec<PathBuf>, WalError> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_segment(&path) {
            segments.push(path);
        }
    }
    segments.sort();
    Ok(segments)
}

fn scan_total_size(dir: &Path) -> Result<u64, WalError> {
    let mut total = 0;
    for path in sorted_segments(dir)? {
        total += fs::metadata(&path)?.len();
    }
    Ok(total)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;

//! Timestamped snapshot rotation for the store file.
//!
//! Snapshots are named `backup-YYYYMMDD-HHMMSS.db`, so a sorted directory
//! listing is already in chronological order. The debounce reads the newest
//! parseable filename rather than file mtimes: copied or touched files keep
//! their logical creation instant.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::db::Database;
use crate::error::Result;

pub const BACKUP_PREFIX: &str = "backup-";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone)]
pub struct BackupPolicy {
    /// Minimum age of the newest snapshot before another one is taken.
    pub min_interval: Duration,
    /// Snapshot count kept after rotation.
    pub retain: usize,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        BackupPolicy {
            min_interval: Duration::from_secs(24 * 60 * 60),
            retain: 3,
        }
    }
}

/// What one backup pass did.
#[derive(Debug, Default, Serialize)]
pub struct BackupOutcome {
    /// Filename of the snapshot written this pass, if any.
    pub created: Option<String>,
    /// True when the debounce suppressed a new snapshot.
    pub skipped: bool,
    /// Old snapshots deleted by rotation.
    pub pruned: usize,
}

/// One invocation of the backup state machine: debounce, snapshot, rotate.
/// Safe to call redundantly; a recent snapshot turns it into a rotation-only
/// pass.
pub fn backup_pass(db: &Database, dir: &Path, policy: &BackupPolicy) -> Result<BackupOutcome> {
    fs::create_dir_all(dir)?;
    let mut outcome = BackupOutcome::default();

    let now = chrono::Utc::now();
    let snapshots = list_snapshots(dir);

    if let Some(last) = snapshots.iter().rev().find_map(|n| parse_snapshot_time(n)) {
        let age = now.signed_duration_since(last).num_seconds();
        if age < policy.min_interval.as_secs() as i64 {
            outcome.skipped = true;
            outcome.pruned = prune_snapshots(dir, policy.retain);
            return Ok(outcome);
        }
    }

    let filename = format!("{}{}.db", BACKUP_PREFIX, now.format(TIMESTAMP_FORMAT));
    let path = dir.join(&filename);
    db.backup_to(&path.to_string_lossy())?;
    outcome.created = Some(filename);

    outcome.pruned = prune_snapshots(dir, policy.retain);
    Ok(outcome)
}

/// Snapshot filenames in `dir`, lexicographically sorted (oldest first).
fn list_snapshots(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(BACKUP_PREFIX) && name.ends_with(".db") {
                names.push(name);
            }
        }
    }
    names.sort();
    names
}

fn parse_snapshot_time(name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let stamp = name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(".db")?;
    chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Delete the oldest snapshots beyond `retain`. Failures are logged, never
/// fatal. Returns the number actually removed.
fn prune_snapshots(dir: &Path, retain: usize) -> usize {
    let snapshots = list_snapshots(dir);
    if snapshots.len() <= retain {
        return 0;
    }
    let excess = snapshots.len() - retain;
    let mut pruned = 0;
    for name in snapshots.iter().take(excess) {
        let path = dir.join(name);
        match fs::remove_file(&path) {
            Ok(_) => pruned += 1,
            Err(e) => eprintln!("[Backup] Failed to remove {}: {}", path.display(), e),
        }
    }
    pruned
}

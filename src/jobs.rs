//! Background maintenance loops for the daemon.
//!
//! Each job is a spawned task driven by a `tokio::time::interval`, with a
//! watch channel for shutdown. The first tick fires immediately, so both
//! jobs run a pass at startup. Passes are fallible but never kill the loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backup::{backup_pass, BackupPolicy};
use crate::db::Database;

/// How often the retention sweep purges expired soft-deleted rows.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
/// How often the backup debounce is re-checked. Much shorter than the
/// debounce interval itself, so a missed window is caught within the hour.
pub const BACKUP_CHECK_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Periodically purge soft-deleted rows whose retention window has lapsed.
pub fn spawn_cleanup_sweep(
    db: Arc<Database>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    match db.cleanup_old_deleted() {
                        Ok(0) => {}
                        Ok(n) => println!("[Sweep] Purged {} nodes past retention", n),
                        Err(e) => eprintln!("[Sweep] Cleanup failed: {}", e),
                    }
                }
            }
        }
    })
}

/// Periodically run the backup state machine against `dir`.
pub fn spawn_backup_job(
    db: Arc<Database>,
    dir: PathBuf,
    policy: BackupPolicy,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,
                _ = interval.tick() => {
                    match backup_pass(&db, &dir, &policy) {
                        Ok(outcome) => {
                            if let Some(name) = outcome.created {
                                println!("[Backup] Wrote {}", dir.join(name).display());
                            }
                        }
                        Err(e) => eprintln!("[Backup] Pass failed: {}", e),
                    }
                }
            }
        }
    })
}

//! Understory daemon — hosts the periodic maintenance jobs.
//!
//! Runs the retention sweep and the backup check on fixed intervals until
//! interrupted. The CLI offers one-shot runs of the same passes.
//!
//! Usage:
//!   understoryd [--db PATH] [--backup-retain N]

use std::sync::Arc;

use tokio::sync::watch;

use understory_lib::backup::{backup_pass, BackupPolicy};
use understory_lib::{jobs, paths, Database};

#[tokio::main]
async fn main() {
    // Parse simple args (no clap to keep binary small)
    let args: Vec<String> = std::env::args().collect();
    let mut db_arg: Option<&str> = None;
    let mut retain_arg: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" if i + 1 < args.len() => {
                db_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--backup-retain" if i + 1 < args.len() => {
                retain_arg = args[i + 1].parse().ok();
                i += 2;
            }
            "--help" | "-h" => {
                println!("understoryd — note tree maintenance daemon");
                println!();
                println!("Usage: understoryd [--db PATH] [--backup-retain N]");
                println!();
                println!("Environment variables:");
                println!("  UNDERSTORY_DB  Database path");
                std::process::exit(0);
            }
            _ => { i += 1; }
        }
    }

    let db_path = paths::resolve_db_path(db_arg);
    println!("[Daemon] Database: {}", db_path.display());

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    // Open database
    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("[Daemon] Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    match db.get_stats() {
        Ok((total, live, deleted)) => {
            println!("[Daemon] {} nodes ({} live, {} soft-deleted)", total, live, deleted);
        }
        Err(e) => eprintln!("[Daemon] Failed to read stats: {}", e),
    }

    let mut policy = BackupPolicy::default();
    if let Some(retain) = retain_arg {
        policy.retain = retain;
    }
    let backup_dir = paths::backup_dir_for(&db_path);

    // Initial backup
    match backup_pass(&db, &backup_dir, &policy) {
        Ok(outcome) => {
            if let Some(name) = outcome.created {
                println!("[Backup] startup: {}", backup_dir.join(name).display());
            } else if outcome.skipped {
                println!("[Backup] startup: recent snapshot exists, skipped");
            }
        }
        Err(e) => eprintln!("[Backup] Failed (startup): {}", e),
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep = jobs::spawn_cleanup_sweep(db.clone(), jobs::SWEEP_PERIOD, shutdown_rx.clone());
    let backup = jobs::spawn_backup_job(
        db.clone(),
        backup_dir,
        policy,
        jobs::BACKUP_CHECK_PERIOD,
        shutdown_rx,
    );

    println!("[Daemon] Running; Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("[Daemon] Failed to listen for shutdown signal: {}", e);
    }

    println!("[Daemon] Shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = sweep.await;
    let _ = backup.await;
    println!("[Daemon] Stopped");
}

//! Understory CLI — tends a note tree stored in a single SQLite file.
//!
//! Usage:
//!   understory create "Reading list" --folder
//!   understory list inbox --page 2
//!   understory check
//!   understory backup --retain 5

use chrono::{Datelike, Local, Timelike};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use understory_lib::backup::{backup_pass, BackupPolicy};
use understory_lib::{integrity, paths, Database, Node, NodePatch, Result};

static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
static QUIET: AtomicBool = AtomicBool::new(false);

/// Initialize logging - creates log file and cleans old logs
fn init_logging() -> Option<PathBuf> {
    let log_dir = paths::log_dir();

    if fs::create_dir_all(&log_dir).is_err() {
        return None;
    }

    // Clean logs older than 7 days
    if let Ok(entries) = fs::read_dir(&log_dir) {
        let cutoff = Local::now() - chrono::Duration::days(7);
        for entry in entries.flatten() {
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                // Parse date from filename: understory-YYYY-MM-DD.log
                if let Some(date_str) = name.strip_prefix("understory-").and_then(|s| s.strip_suffix(".log")) {
                    if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                        if date < cutoff.date_naive() {
                            let _ = fs::remove_file(&path);
                        }
                    }
                }
            }
        }
    }

    // Create today's log file
    let today = Local::now();
    let log_filename = format!("understory-{:04}-{:02}-{:02}.log", today.year(), today.month(), today.day());
    let log_path = log_dir.join(&log_filename);

    if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        *LOG_FILE.lock().unwrap() = Some(file);
        Some(log_path)
    } else {
        None
    }
}

/// Log to both terminal and file. --quiet drops the terminal half.
fn log_both(msg: &str) {
    let now = Local::now();
    let timestamp = format!("[{:02}:{:02}:{:02}]", now.hour(), now.minute(), now.second());

    if !QUIET.load(Ordering::Relaxed) {
        println!("{}", msg);
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{} {}", timestamp, msg);
        }
    }
}

/// Log error to both terminal and file. Errors ignore --quiet.
fn elog_both(msg: &str) {
    let now = Local::now();
    let timestamp = format!("[{:02}:{:02}:{:02}]", now.hour(), now.minute(), now.second());

    eprintln!("{}", msg);

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(ref mut file) = *guard {
            let _ = writeln!(file, "{} [ERROR] {}", timestamp, msg);
        }
    }
}

/// Macro for logging to both terminal and file
macro_rules! log {
    ($($arg:tt)*) => {
        log_both(&format!($($arg)*))
    };
}

/// Macro for error logging to both terminal and file
macro_rules! elog {
    ($($arg:tt)*) => {
        elog_both(&format!($($arg)*))
    };
}

// ============================================================================
// Main CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "understory")]
#[command(version, about = "Understory note tree CLI", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database path (default: auto-detect)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a note or folder
    Create {
        /// Title of the new node
        title: String,
        /// Body text
        #[arg(long, default_value = "")]
        content: String,
        /// Create a folder instead of a note
        #[arg(long)]
        folder: bool,
        /// Parent folder id (default: top level)
        #[arg(long)]
        parent: Option<String>,
    },
    /// Show one node
    Get {
        id: String,
        /// Print the whole content body
        #[arg(long)]
        full: bool,
    },
    /// Change fields on a node
    Update {
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New body text
        #[arg(long)]
        content: Option<String>,
        /// Move under a new parent folder
        #[arg(long, conflicts_with = "root")]
        parent: Option<String>,
        /// Move to the top level
        #[arg(long)]
        root: bool,
        /// New sibling ordering weight (larger sorts first)
        #[arg(long)]
        sort_order: Option<i64>,
        /// Bring a soft-deleted node back
        #[arg(long)]
        restore: bool,
    },
    /// Soft-delete a node and everything under it
    Delete {
        id: String,
    },
    /// List live nodes, newest first
    List {
        /// Substring filter on title and content
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 20)]
        size: i64,
    },
    /// Scan the tree for structural damage and repair it
    Check,
    /// Snapshot the store into the backups directory
    Backup {
        /// Snapshots to keep after rotation
        #[arg(long, default_value_t = 3)]
        retain: usize,
        /// Minimum hours since the last snapshot
        #[arg(long, default_value_t = 24)]
        min_hours: u64,
        /// Snapshot even if a recent one exists
        #[arg(long)]
        force: bool,
    },
    /// Purge soft-deleted nodes past the retention window
    Cleanup,
    /// Print the resolved database path
    Path,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    // Ignore SIGPIPE so piping through head/tail doesn't kill the process.
    // Without this, `understory list --size 500 | head -5` sends SIGPIPE when
    // head closes its stdin, terminating the listing mid-write.
    #[cfg(unix)]
    unsafe { libc::signal(libc::SIGPIPE, libc::SIG_IGN); }

    // Exit cleanly on broken pipe instead of panicking.
    // println! internally unwraps write results, so even with SIGPIPE ignored,
    // it panics when the pipe is closed. This hook catches that and exits quietly.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe") {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();
    QUIET.store(cli.quiet, Ordering::Relaxed);

    // Initialize logging
    if let Some(log_path) = init_logging() {
        if cli.verbose {
            eprintln!("Logging to: {}", log_path.display());
        }
    }

    if let Err(e) = run_cli(cli) {
        elog!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    // Handle completions first (no DB needed)
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "understory", &mut std::io::stdout());
        return Ok(());
    }

    let db_path = paths::resolve_db_path(cli.db.as_deref());

    if cli.verbose {
        eprintln!("[verbose] Using database: {:?}", db_path);
    }

    // Path only reports where the store lives; it must not create the file
    if let Commands::Path = &cli.command {
        println!("{}", db_path.display());
        return Ok(());
    }

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let db = Database::new(&db_path)?;

    match cli.command {
        Commands::Create { title, content, folder, parent } => {
            let node = db.create_node(&title, &content, folder, parent.as_deref())?;
            if cli.json {
                println!("{}", serde_json::to_string(&node).unwrap_or_default());
            } else {
                let kind = if node.is_folder { "folder" } else { "note" };
                log!("Created {} {} {}", kind, short_id(&node.id), node.title);
            }
        }

        Commands::Get { id, full } => {
            let node = db.get_node(&id)?;
            if cli.json {
                println!("{}", serde_json::to_string(&node).unwrap_or_default());
            } else {
                print_node(&node, full);
            }
        }

        Commands::Update { id, title, content, parent, root, sort_order, restore } => {
            let mut patch = NodePatch {
                title,
                content,
                sort_order,
                ..NodePatch::default()
            };
            if root {
                patch.parent_id = Some(None);
            } else if parent.is_some() {
                patch.parent_id = Some(parent);
            }
            if restore {
                patch.is_deleted = Some(false);
            }

            let node = db.update_node(&id, &patch)?;
            if cli.json {
                println!("{}", serde_json::to_string(&node).unwrap_or_default());
            } else {
                log!("Updated {} {}", short_id(&node.id), node.title);
            }
        }

        Commands::Delete { id } => {
            db.delete_node(&id)?;
            if cli.json {
                println!("{}", delete_json(&id));
            } else {
                log!("Deleted {} and its subtree", short_id(&id));
            }
        }

        Commands::List { query, page, size } => {
            let nodes = db.list_nodes(&query, page, size)?;
            if cli.json {
                println!("{}", serde_json::to_string(&nodes).unwrap_or_default());
            } else {
                for node in &nodes {
                    let marker = if node.is_folder { "[F]" } else { "[N]" };
                    log!("{} {} {}", marker, short_id(&node.id), node.title);
                }
                log!("\n{} nodes (page {})", nodes.len(), page);
            }
        }

        Commands::Check => {
            let report = integrity::run_check(&db)?;
            if cli.json {
                println!("{}", serde_json::to_string(&report).unwrap_or_default());
            } else if report.total_fixes() == 0 {
                log!("Tree is clean, nothing to repair");
            } else {
                log!("Repair complete:");
                log!("  Orphans removed:     {} ({} passes)", report.orphans_removed, report.orphan_passes);
                log!("  Non-folder children: {}", report.nonfolder_children.len());
                for child in &report.nonfolder_children {
                    log!("    discarded {} '{}' (under '{}')", short_id(&child.id), child.title, child.parent_title);
                }
                log!("  Self-references:     {}", report.self_refs_cleared);
                log!("  Cycles broken:       {}", report.cycles_broken.len());
                for pair in &report.cycles_broken {
                    log!(
                        "    promoted {} '{}' (was mutual with {} '{}')",
                        short_id(&pair.promoted),
                        pair.promoted_title,
                        short_id(&pair.partner),
                        pair.partner_title
                    );
                }
            }
        }

        Commands::Backup { retain, min_hours, force } => {
            let policy = BackupPolicy {
                min_interval: if force {
                    Duration::ZERO
                } else {
                    Duration::from_secs(min_hours * 3600)
                },
                retain,
            };
            let dir = paths::backup_dir_for(&db_path);
            let outcome = backup_pass(&db, &dir, &policy)?;
            if cli.json {
                println!("{}", serde_json::to_string(&outcome).unwrap_or_default());
            } else if outcome.skipped {
                log!("Recent snapshot exists, skipped (pruned {})", outcome.pruned);
            } else if let Some(ref name) = outcome.created {
                log!("Snapshot {} written ({} pruned)", name, outcome.pruned);
            }
        }

        Commands::Cleanup => {
            let purged = db.cleanup_old_deleted()?;
            if cli.json {
                println!("{}", cleanup_json(purged));
            } else {
                log!("Purged {} nodes past retention", purged);
            }
        }

        Commands::Path | Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}

fn print_node(node: &Node, full: bool) {
    log!("ID:      {}", node.id);
    log!("Title:   {}", node.title);
    log!("Type:    {}", if node.is_folder { "Folder" } else { "Note" });
    if let Some(ref parent) = node.parent_id {
        log!("Parent:  {}", parent);
    }
    log!("Sort:    {}", node.sort_order);
    log!("Created: {}", format_ts(node.created_at));
    log!("Updated: {}", format_ts(node.updated_at));
    if node.is_deleted {
        log!("Deleted: {}", format_ts(node.deleted_at));
    }
    if !node.content.is_empty() {
        if full || node.content.chars().count() <= 500 {
            log!("\n{}", node.content);
        } else {
            let preview: String = node.content.chars().take(500).collect();
            log!("\n{}...", preview);
        }
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

// One-line --json payloads for the commands that have no report struct.
fn delete_json(id: &str) -> String {
    serde_json::json!({ "deleted": id }).to_string()
}

fn cleanup_json(purged: usize) -> String {
    serde_json::json!({ "purged": purged }).to_string()
}

//! Filesystem locations shared by the binaries.

use std::path::{Path, PathBuf};

pub const DB_ENV: &str = "UNDERSTORY_DB";

/// Resolve the store file path, checking the usual places in order.
pub fn resolve_db_path(flag: Option<&str>) -> PathBuf {
    // 1. CLI argument
    if let Some(path) = flag {
        return PathBuf::from(path);
    }

    // 2. Environment variable
    if let Ok(path) = std::env::var(DB_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // 3. Walk up directory tree for .understory.db
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        loop {
            let candidate = dir.join(".understory.db");
            if candidate.exists() {
                return candidate;
            }
            match dir.parent() {
                Some(p) => dir = p,
                None => break,
            }
        }
    }

    // 4. Default app data directory
    dirs::data_dir()
        .map(|p| p.join("understory/understory.db"))
        .unwrap_or_else(|| PathBuf::from("understory.db"))
}

/// Snapshot directory: `backups/` beside the store file.
pub fn backup_dir_for(db_path: &Path) -> PathBuf {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join("backups"),
        _ => PathBuf::from("backups"),
    }
}

/// Where the CLI writes its dated log files.
pub fn log_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("understory").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_resolution_order() {
        // Flag beats the environment, environment beats defaults
        std::env::set_var(DB_ENV, "/tmp/env-store.db");
        assert_eq!(
            resolve_db_path(Some("/tmp/flag-store.db")),
            PathBuf::from("/tmp/flag-store.db")
        );
        assert_eq!(resolve_db_path(None), PathBuf::from("/tmp/env-store.db"));
        std::env::remove_var(DB_ENV);
    }

    #[test]
    fn test_backup_dir_is_sibling() {
        assert_eq!(
            backup_dir_for(Path::new("/data/app/store.db")),
            PathBuf::from("/data/app/backups")
        );
        assert_eq!(backup_dir_for(Path::new("store.db")), PathBuf::from("backups"));
    }
}

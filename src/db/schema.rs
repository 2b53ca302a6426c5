use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use super::models::{Node, NodePatch, Settings};
use crate::error::{Result, StoreError};

/// Days a soft-deleted node is kept before the retention sweep purges it.
const RETENTION_DAYS: i64 = 30;

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn = Connection::open(&path)?;
        let db = Database { conn: Mutex::new(conn), path: path_str };
        db.init()?;
        Ok(db)
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn: Mutex::new(conn), path: ":memory:".to_string() };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        // WAL may be unavailable on some filesystems; the store works without it
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "cache_size", -64000).ok();
        conn.pragma_update(None, "temp_store", "MEMORY").ok();
        conn.pragma_update(None, "mmap_size", 268435456).ok();

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                is_folder INTEGER NOT NULL DEFAULT 0,
                parent_id TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                deleted_at INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                theme TEXT NOT NULL,
                editor_opts TEXT,
                sync_enabled INTEGER NOT NULL DEFAULT 0,
                sync_endpoint TEXT
            );

            INSERT OR IGNORE INTO settings (id, theme) VALUES (1, 'light');

            CREATE INDEX IF NOT EXISTS idx_nodes_updated_at ON nodes(updated_at);
            CREATE INDEX IF NOT EXISTS idx_nodes_parent_id ON nodes(parent_id);
            CREATE INDEX IF NOT EXISTS idx_nodes_deleted ON nodes(is_deleted, deleted_at);
            ",
        )?;

        // Migration: Add tree columns if they don't exist (stores created
        // before folders were introduced)
        let has_parent_id: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('nodes') WHERE name = 'parent_id'",
            [],
            |row| row.get(0),
        ).unwrap_or(false);

        if !has_parent_id {
            conn.execute("ALTER TABLE nodes ADD COLUMN is_folder INTEGER NOT NULL DEFAULT 0", [])?;
            conn.execute("ALTER TABLE nodes ADD COLUMN parent_id TEXT", [])?;
            conn.execute("ALTER TABLE nodes ADD COLUMN sort_order INTEGER NOT NULL DEFAULT 0", [])?;
            eprintln!("Migration: added tree columns to nodes");
        }

        // Migration: Add soft-delete columns if they don't exist
        let has_is_deleted: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('nodes') WHERE name = 'is_deleted'",
            [],
            |row| row.get(0),
        ).unwrap_or(false);

        if !has_is_deleted {
            conn.execute("ALTER TABLE nodes ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0", [])?;
            conn.execute("ALTER TABLE nodes ADD COLUMN deleted_at INTEGER NOT NULL DEFAULT 0", [])?;
            eprintln!("Migration: added soft-delete columns to nodes");
        }

        Ok(())
    }

    // ==================== Node Operations ====================

    pub fn create_node(&self, title: &str, content: &str, is_folder: bool, parent_id: Option<&str>) -> Result<Node> {
        if title.is_empty() {
            return Err(StoreError::InvalidArgument("title is required".to_string()));
        }
        // An empty parent id means top level
        let parent_id = parent_id.filter(|p| !p.is_empty());

        // Duplicate sibling titles are tolerated here; renames and moves
        // enforce uniqueness in update_node.
        let now = chrono::Utc::now().timestamp();
        let node = Node {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            is_folder,
            parent_id: parent_id.map(|p| p.to_string()),
            sort_order: now,
            is_deleted: false,
            deleted_at: 0,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO nodes (id, title, content, is_folder, parent_id, sort_order, is_deleted, deleted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7, ?8)",
            params![
                node.id,
                node.title,
                node.content,
                node.is_folder,
                node.parent_id,
                node.sort_order,
                node.created_at,
                node.updated_at,
            ],
        )?;
        Ok(node)
    }

    /// Fetch a live node. Soft-deleted and missing ids both report NotFound.
    pub fn get_node(&self, id: &str) -> Result<Node> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE id = ?1 AND is_deleted = 0",
            Self::NODE_COLUMNS
        ))?;

        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Self::row_to_node(row)?)
        } else {
            Err(StoreError::NotFound(format!("node {}", id)))
        }
    }

    /// Fetch a node regardless of deletion state.
    pub fn get_node_any(&self, id: &str) -> Result<Option<Node>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE id = ?1",
            Self::NODE_COLUMNS
        ))?;

        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::row_to_node(row)?))
        } else {
            Ok(None)
        }
    }

    /// Partial update. A deleted node rejects every patch except an explicit
    /// restore, and a live node cannot be deleted this way (deletion must
    /// cascade through delete_node). Rename and move run a sibling-uniqueness
    /// check against the resulting (parent_id, title) pair.
    pub fn update_node(&self, id: &str, patch: &NodePatch) -> Result<Node> {
        let current = self.get_node_any(id)?
            .ok_or_else(|| StoreError::NotFound(format!("node {}", id)))?;

        if current.is_deleted && patch.is_deleted != Some(false) {
            return Err(StoreError::Conflict(format!("node {} is deleted", id)));
        }
        if !current.is_deleted && patch.is_deleted == Some(true) {
            return Err(StoreError::Conflict(format!(
                "node {} must be deleted through delete, not update", id
            )));
        }

        let title = patch.title.clone().unwrap_or(current.title);
        let content = patch.content.clone().unwrap_or(current.content);
        let parent_id = match &patch.parent_id {
            Some(p) => p.clone(),
            None => current.parent_id.clone(),
        };
        let sort_order = patch.sort_order.unwrap_or(current.sort_order);
        let is_deleted = patch.is_deleted.unwrap_or(current.is_deleted);

        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().unwrap();

        if patch.title.is_some() || patch.parent_id.is_some() {
            // IS instead of = so NULL parents (top level) compare equal
            let duplicates: i64 = conn.query_row(
                "SELECT COUNT(*) FROM nodes
                 WHERE parent_id IS ?1 AND title = ?2 AND id != ?3 AND is_deleted = 0",
                params![parent_id, title, id],
                |row| row.get(0),
            )?;
            if duplicates > 0 {
                return Err(StoreError::Conflict(format!("a sibling named '{}' already exists", title)));
            }
        }

        // deleted_at is deliberately left alone: a restore keeps the old
        // stamp, and the purge only looks at rows with is_deleted = 1
        conn.execute(
            "UPDATE nodes SET title = ?2, content = ?3, parent_id = ?4, sort_order = ?5, is_deleted = ?6, updated_at = ?7
             WHERE id = ?1",
            params![id, title, content, parent_id, sort_order, is_deleted, now],
        )?;

        Ok(Node {
            id: id.to_string(),
            title,
            content,
            is_folder: current.is_folder,
            parent_id,
            sort_order,
            is_deleted,
            deleted_at: current.deleted_at,
            created_at: current.created_at,
            updated_at: now,
        })
    }

    /// Soft-delete a node and every descendant in one statement, stamping all
    /// of them with the same deleted_at. Deleting a missing id is a no-op.
    pub fn delete_node(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let conn = self.conn.lock().unwrap();
        // UNION, not UNION ALL: keeps the walk finite if a cycle slipped in
        // before a repair pass caught it
        conn.execute(
            "WITH RECURSIVE subtree(id) AS (
                SELECT id FROM nodes WHERE id = ?1
                UNION
                SELECT n.id FROM nodes n JOIN subtree s ON n.parent_id = s.id
            )
            UPDATE nodes SET is_deleted = 1, deleted_at = ?2, updated_at = ?2
            WHERE id IN (SELECT id FROM subtree)",
            params![id, now],
        )?;
        Ok(())
    }

    /// Physically remove soft-deleted nodes older than the retention window.
    /// Returns the number of rows purged.
    pub fn cleanup_old_deleted(&self) -> Result<usize> {
        let threshold = chrono::Utc::now().timestamp() - RETENTION_DAYS * 24 * 60 * 60;
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM nodes WHERE is_deleted = 1 AND deleted_at < ?1",
            params![threshold],
        )?;
        Ok(count)
    }

    /// Substring search over title and content of live nodes, newest (by
    /// sort_order) first. Pages are 1-based; non-positive page/size fall back
    /// to 1 and 20.
    pub fn list_nodes(&self, query: &str, page: i64, size: i64) -> Result<Vec<Node>> {
        let page = if page <= 0 { 1 } else { page };
        let size = if size <= 0 { 20 } else { size };
        let offset = (page - 1).saturating_mul(size);
        let pattern = format!("%{}%", query);

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM nodes
             WHERE is_deleted = 0 AND (title LIKE ?1 OR content LIKE ?1)
             ORDER BY sort_order DESC LIMIT ?2 OFFSET ?3",
            Self::NODE_COLUMNS
        ))?;

        let nodes = stmt
            .query_map(params![pattern, size, offset], Self::row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    pub fn get_stats(&self) -> Result<(usize, usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let total: usize = conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
        let live: usize = conn.query_row("SELECT COUNT(*) FROM nodes WHERE is_deleted = 0", [], |r| r.get(0))?;
        Ok((total, live, total - live))
    }

    fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
        Ok(Node {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            is_folder: row.get::<_, i32>(3)? != 0,
            parent_id: row.get(4)?,
            sort_order: row.get(5)?,
            is_deleted: row.get::<_, i32>(6)? != 0,
            deleted_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// Standard SELECT columns for nodes
    const NODE_COLUMNS: &'static str =
        "id, title, content, is_folder, parent_id, sort_order, is_deleted, deleted_at, created_at, updated_at";

    // ==================== Tree Repair Operations ====================

    /// One pass of orphan removal: hard-delete live nodes whose parent_id does
    /// not resolve to any row. Callers loop until this returns 0, since each
    /// removed generation can expose the next.
    pub fn remove_orphans_once(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "DELETE FROM nodes
             WHERE is_deleted = 0
               AND parent_id IS NOT NULL
               AND parent_id NOT IN (SELECT id FROM nodes)",
            [],
        )?;
        Ok(count)
    }

    /// Live nodes whose parent exists but is not a folder.
    /// Returns (id, title, parent title) per offender.
    pub fn find_nonfolder_children(&self) -> Result<Vec<(String, String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.title, p.title
             FROM nodes c
             JOIN nodes p ON c.parent_id = p.id
             WHERE p.is_folder = 0 AND c.is_deleted = 0",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Set is_deleted without stamping deleted_at or cascading. Repair use
    /// only; normal deletion goes through delete_node.
    pub fn set_deleted_flag(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE nodes SET is_deleted = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Promote self-parenting nodes to top level.
    pub fn clear_self_parents(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute("UPDATE nodes SET parent_id = NULL WHERE id = parent_id", [])?;
        Ok(count)
    }

    /// Pairs of live nodes that are each other's parent, as
    /// (id, title, id, title). Each pair appears once with the smaller id
    /// first, so repair order is deterministic.
    pub fn find_cycle_pairs(&self) -> Result<Vec<(String, String, String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.id, a.title, b.id, b.title
             FROM nodes a
             JOIN nodes b ON a.parent_id = b.id AND b.parent_id = a.id
             WHERE a.is_deleted = 0 AND b.is_deleted = 0 AND a.id < b.id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Clear parent_id on each given node, promoting it to top level.
    pub fn clear_parents(&self, ids: &[String]) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let mut count = 0;
        for id in ids {
            count += conn.execute("UPDATE nodes SET parent_id = NULL WHERE id = ?1", params![id])?;
        }
        Ok(count)
    }

    // ==================== Settings Operations ====================

    pub fn get_settings(&self) -> Result<Settings> {
        let conn = self.conn.lock().unwrap();
        let settings = conn.query_row(
            "SELECT theme, editor_opts, sync_enabled, sync_endpoint FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(Settings {
                    theme: row.get(0)?,
                    editor_opts: row.get(1)?,
                    sync_enabled: row.get::<_, i32>(2).unwrap_or(0) != 0,
                    sync_endpoint: row.get(3)?,
                })
            },
        )?;
        Ok(settings)
    }

    pub fn update_settings(&self, settings: &Settings) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE settings SET theme = ?1, editor_opts = ?2, sync_enabled = ?3, sync_endpoint = ?4 WHERE id = 1",
            params![settings.theme, settings.editor_opts, settings.sync_enabled, settings.sync_endpoint],
        )?;
        Ok(())
    }

    // ==================== Backup Operations ====================

    /// Online snapshot of the whole database into `dest`. Point-in-time
    /// consistent without taking an exclusive lock on the live store.
    pub fn backup_to(&self, dest: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut dst = Connection::open(dest)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dst)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(0), None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_path(), ":memory:");
        let node = db.create_node("Inbox", "", true, None).unwrap();
        assert!(node.is_folder);
        assert_eq!(node.parent_id, None);
        assert_eq!(node.sort_order, node.created_at);
        assert!(!node.is_deleted);

        let fetched = db.get_node(&node.id).unwrap();
        assert_eq!(fetched.title, "Inbox");
        assert_eq!(fetched.created_at, node.created_at);
    }

    #[test]
    fn test_create_requires_title() {
        let db = Database::in_memory().unwrap();
        match db.create_node("", "", false, None) {
            Err(StoreError::InvalidArgument(_)) => {}
            other => panic!("expected InvalidArgument, got {:?}", other.map(|n| n.title)),
        }
    }

    #[test]
    fn test_create_allows_duplicate_titles() {
        let db = Database::in_memory().unwrap();
        let folder = db.create_node("Projects", "", true, None).unwrap();
        db.create_node("Notes", "", false, Some(&folder.id)).unwrap();
        // No uniqueness check at creation time
        db.create_node("Notes", "", false, Some(&folder.id)).unwrap();
        assert_eq!(db.list_nodes("Notes", 1, 20).unwrap().len(), 2);
    }

    #[test]
    fn test_get_missing_or_deleted_not_found() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(db.get_node("nope"), Err(StoreError::NotFound(_))));

        let node = db.create_node("Draft", "", false, None).unwrap();
        db.delete_node(&node.id).unwrap();
        assert!(matches!(db.get_node(&node.id), Err(StoreError::NotFound(_))));
        // Still present underneath
        assert!(db.get_node_any(&node.id).unwrap().unwrap().is_deleted);
    }

    #[test]
    fn test_update_patches_only_given_fields() {
        let db = Database::in_memory().unwrap();
        let node = db.create_node("Draft", "original", false, None).unwrap();

        let patch = NodePatch { content: Some("revised".to_string()), ..Default::default() };
        let updated = db.update_node(&node.id, &patch).unwrap();
        assert_eq!(updated.title, "Draft");
        assert_eq!(updated.content, "revised");
        assert_eq!(updated.sort_order, node.sort_order);
    }

    #[test]
    fn test_update_missing_not_found() {
        let db = Database::in_memory().unwrap();
        let patch = NodePatch { title: Some("x".to_string()), ..Default::default() };
        assert!(matches!(db.update_node("nope", &patch), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_update_deleted_conflicts_unless_restoring() {
        let db = Database::in_memory().unwrap();
        let node = db.create_node("Draft", "", false, None).unwrap();
        db.delete_node(&node.id).unwrap();

        let rename = NodePatch { title: Some("Renamed".to_string()), ..Default::default() };
        assert!(matches!(db.update_node(&node.id, &rename), Err(StoreError::Conflict(_))));

        let restore = NodePatch { is_deleted: Some(false), ..Default::default() };
        let restored = db.update_node(&node.id, &restore).unwrap();
        assert!(!restored.is_deleted);
        assert!(db.get_node(&node.id).is_ok());
    }

    #[test]
    fn test_update_cannot_soft_delete() {
        let db = Database::in_memory().unwrap();
        let node = db.create_node("Draft", "", false, None).unwrap();
        let patch = NodePatch { is_deleted: Some(true), ..Default::default() };
        assert!(matches!(db.update_node(&node.id, &patch), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_update_duplicate_sibling_conflict() {
        let db = Database::in_memory().unwrap();
        let parent = db.create_node("Projects", "", true, None).unwrap();
        db.create_node("Notes", "", false, Some(&parent.id)).unwrap();
        let second = db.create_node("Notes", "", false, Some(&parent.id)).unwrap();

        // Both creates succeed; the first update touching parent or title
        // trips the uniqueness check
        let patch = NodePatch { parent_id: Some(Some(parent.id.clone())), ..Default::default() };
        assert!(matches!(db.update_node(&second.id, &patch), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_update_rename_conflicts() {
        let db = Database::in_memory().unwrap();
        let parent = db.create_node("Projects", "", true, None).unwrap();
        db.create_node("A", "", false, Some(&parent.id)).unwrap();
        let b = db.create_node("B", "", false, Some(&parent.id)).unwrap();

        let clash = NodePatch { title: Some("A".to_string()), ..Default::default() };
        assert!(matches!(db.update_node(&b.id, &clash), Err(StoreError::Conflict(_))));

        // Renaming to its own title is not a collision
        let own = NodePatch { title: Some("B".to_string()), ..Default::default() };
        db.update_node(&b.id, &own).unwrap();
    }

    #[test]
    fn test_update_uniqueness_ignores_deleted_siblings() {
        let db = Database::in_memory().unwrap();
        let parent = db.create_node("Projects", "", true, None).unwrap();
        let a = db.create_node("A", "", false, Some(&parent.id)).unwrap();
        let b = db.create_node("B", "", false, Some(&parent.id)).unwrap();

        db.delete_node(&a.id).unwrap();
        let patch = NodePatch { title: Some("A".to_string()), ..Default::default() };
        db.update_node(&b.id, &patch).unwrap();
    }

    #[test]
    fn test_update_uniqueness_at_top_level() {
        let db = Database::in_memory().unwrap();
        db.create_node("Root", "", true, None).unwrap();
        let other = db.create_node("Other", "", true, None).unwrap();

        // NULL parents must compare equal for the sibling check
        let patch = NodePatch { title: Some("Root".to_string()), ..Default::default() };
        assert!(matches!(db.update_node(&other.id, &patch), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_delete_cascades_in_one_operation() {
        let db = Database::in_memory().unwrap();
        let folder = db.create_node("F", "", true, None).unwrap();
        let c1 = db.create_node("C1", "", false, Some(&folder.id)).unwrap();
        let c2 = db.create_node("C2", "", true, Some(&folder.id)).unwrap();
        let c3 = db.create_node("C3", "", false, Some(&c2.id)).unwrap();

        db.delete_node(&folder.id).unwrap();

        let f = db.get_node_any(&folder.id).unwrap().unwrap();
        assert!(f.is_deleted);
        for id in [&c1.id, &c2.id, &c3.id] {
            let n = db.get_node_any(id).unwrap().unwrap();
            assert!(n.is_deleted);
            assert_eq!(n.deleted_at, f.deleted_at);
            assert!(matches!(db.get_node(id), Err(StoreError::NotFound(_))));
        }
        assert!(db.list_nodes("", 1, 20).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_is_a_noop() {
        let db = Database::in_memory().unwrap();
        db.delete_node("nope").unwrap();
    }

    #[test]
    fn test_cleanup_old_deleted_respects_window() {
        let db = Database::in_memory().unwrap();
        let old = db.create_node("Old", "", false, None).unwrap();
        let recent = db.create_node("Recent", "", false, None).unwrap();
        db.delete_node(&old.id).unwrap();
        db.delete_node(&recent.id).unwrap();

        let day = 24 * 60 * 60;
        let now = chrono::Utc::now().timestamp();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute("UPDATE nodes SET deleted_at = ?1 WHERE id = ?2", params![now - 31 * day, old.id]).unwrap();
            conn.execute("UPDATE nodes SET deleted_at = ?1 WHERE id = ?2", params![now - 29 * day, recent.id]).unwrap();
        }

        let purged = db.cleanup_old_deleted().unwrap();
        assert_eq!(purged, 1);
        assert!(db.get_node_any(&old.id).unwrap().is_none());
        assert!(db.get_node_any(&recent.id).unwrap().is_some());
    }

    #[test]
    fn test_cleanup_purges_repair_flagged_rows() {
        let db = Database::in_memory().unwrap();
        let node = db.create_node("Corrupt", "", false, None).unwrap();
        db.set_deleted_flag(&node.id).unwrap();

        // deleted_at stays 0, which sits past the retention threshold, so the
        // next sweep finishes what the repair started
        let purged = db.cleanup_old_deleted().unwrap();
        assert_eq!(purged, 1);
        assert!(db.get_node_any(&node.id).unwrap().is_none());
    }

    #[test]
    fn test_list_orders_and_pages() {
        let db = Database::in_memory().unwrap();
        let a = db.create_node("A", "", false, None).unwrap();
        let b = db.create_node("B", "", false, None).unwrap();
        let c = db.create_node("C", "", false, None).unwrap();
        for (id, order) in [(&a.id, 10i64), (&b.id, 20), (&c.id, 30)] {
            let patch = NodePatch { sort_order: Some(order), ..Default::default() };
            db.update_node(id, &patch).unwrap();
        }

        let first = db.list_nodes("", 1, 2).unwrap();
        assert_eq!(first.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(), ["C", "B"]);
        let second = db.list_nodes("", 2, 2).unwrap();
        assert_eq!(second.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(), ["A"]);

        // Non-positive page and size fall back to 1 / 20
        assert_eq!(db.list_nodes("", 0, 0).unwrap().len(), 3);
    }

    #[test]
    fn test_list_extreme_page_returns_empty() {
        let db = Database::in_memory().unwrap();
        db.create_node("A", "", false, None).unwrap();

        assert!(db.list_nodes("", i64::MAX, 20).unwrap().is_empty());
        assert!(db.list_nodes("", i64::MAX, i64::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_list_matches_title_or_content() {
        let db = Database::in_memory().unwrap();
        db.create_node("Meeting notes", "", false, None).unwrap();
        db.create_node("Scratch", "meeting agenda for tuesday", false, None).unwrap();
        db.create_node("Unrelated", "nothing here", false, None).unwrap();

        let hits = db.list_nodes("meeting", 1, 20).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_settings_roundtrip() {
        let db = Database::in_memory().unwrap();
        let initial = db.get_settings().unwrap();
        assert_eq!(initial.theme, "light");

        let mut settings = initial;
        settings.theme = "dark".to_string();
        settings.sync_enabled = true;
        settings.sync_endpoint = Some("https://example.net/sync".to_string());
        db.update_settings(&settings).unwrap();

        let reloaded = db.get_settings().unwrap();
        assert_eq!(reloaded.theme, "dark");
        assert!(reloaded.sync_enabled);
        assert_eq!(reloaded.sync_endpoint.as_deref(), Some("https://example.net/sync"));
    }

    #[test]
    fn test_stats_counts_live_and_deleted() {
        let db = Database::in_memory().unwrap();
        db.create_node("A", "", false, None).unwrap();
        let b = db.create_node("B", "", false, None).unwrap();
        db.delete_node(&b.id).unwrap();

        assert_eq!(db.get_stats().unwrap(), (2, 1, 1));
    }
}

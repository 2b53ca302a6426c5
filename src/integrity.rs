//! Offline structural repair for the node tree.
//!
//! Four passes, in order: orphan removal looped to a fixed point, non-folder
//! parents, self-references, two-hop cycles. Cycles of three or more hops are
//! out of scope for this checker; nothing in the write path creates them short
//! of repeated conflicting moves, and they are left for a future ancestor walk.
//!
//! The passes are read-then-write without a wrapping transaction, so this must
//! not run while another process is mutating the same store. Completed passes
//! stay committed even when a later one fails.

use serde::Serialize;

use crate::db::Database;
use crate::error::Result;

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    #[serde(rename = "orphansRemoved")]
    pub orphans_removed: usize,
    #[serde(rename = "orphanPasses")]
    pub orphan_passes: usize,
    #[serde(rename = "nonFolderChildren")]
    pub nonfolder_children: Vec<NonFolderChild>,
    #[serde(rename = "selfRefsCleared")]
    pub self_refs_cleared: usize,
    #[serde(rename = "cyclesBroken")]
    pub cycles_broken: Vec<CyclePair>,
}

/// A node that was soft-deleted because its parent is not a folder.
#[derive(Debug, Serialize)]
pub struct NonFolderChild {
    pub id: String,
    pub title: String,
    #[serde(rename = "parentTitle")]
    pub parent_title: String,
}

/// A mutual parent pair. `promoted` had its parent cleared; `partner` keeps
/// its pointer, which now chains through the promoted node to the top level.
#[derive(Debug, Serialize)]
pub struct CyclePair {
    pub promoted: String,
    #[serde(rename = "promotedTitle")]
    pub promoted_title: String,
    pub partner: String,
    #[serde(rename = "partnerTitle")]
    pub partner_title: String,
}

impl IntegrityReport {
    pub fn total_fixes(&self) -> usize {
        self.orphans_removed
            + self.nonfolder_children.len()
            + self.self_refs_cleared
            + self.cycles_broken.len()
    }
}

/// Run every repair pass once (orphan removal until a pass removes nothing)
/// and report what was fixed. Any failed statement aborts the remainder of
/// the run.
pub fn run_check(db: &Database) -> Result<IntegrityReport> {
    let mut report = IntegrityReport::default();

    // Pass 1: orphans. Removing one generation can expose the next, so loop.
    loop {
        let removed = db.remove_orphans_once()?;
        report.orphan_passes += 1;
        report.orphans_removed += removed;
        if removed == 0 {
            break;
        }
    }

    // Pass 2: children of non-folder parents are corrupt data, discarded
    // rather than relocated.
    for (id, title, parent_title) in db.find_nonfolder_children()? {
        db.set_deleted_flag(&id)?;
        report.nonfolder_children.push(NonFolderChild { id, title, parent_title });
    }

    // Pass 3: a self-parent is recoverable metadata, promote it.
    report.self_refs_cleared = db.clear_self_parents()?;

    // Pass 4: mutual pairs. Exactly one side per pair is promoted.
    let pairs = db.find_cycle_pairs()?;
    let promoted: Vec<String> = pairs.iter().map(|(a, _, _, _)| a.clone()).collect();
    db.clear_parents(&promoted)?;
    for (a_id, a_title, b_id, b_title) in pairs {
        report.cycles_broken.push(CyclePair {
            promoted: a_id,
            promoted_title: a_title,
            partner: b_id,
            partner_title: b_title,
        });
    }

    Ok(report)
}

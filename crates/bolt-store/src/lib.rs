pub mod file;
pub mod memory;

use anyhow::Result;
use chrono::{DateTime, Utc};

use bolt_types::Snapshot;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

/// Synchronous snapshot persistence with a modification-time oracle.
///
/// The feed polls `last_modified` to detect writes from other process
/// instances sharing the same store. Saves replace the whole snapshot, so
/// concurrent writers resolve last-writer-wins at snapshot granularity.
pub trait SnapshotGateway: Send + Sync {
    /// Returns `None` when no snapshot has ever been saved.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replaces the stored snapshot. A failure here must surface to the
    /// caller; the feed treats it as fatal to the triggering operation.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Modification time of the stored snapshot, `None` when absent.
    fn last_modified(&self) -> Result<Option<DateTime<Utc>>>;
}

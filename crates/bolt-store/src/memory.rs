use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeZone, Utc};

use bolt_types::Snapshot;

use crate::SnapshotGateway;

/// In-memory gateway for tests.
///
/// A logical version counter stands in for the file mtime so every save is
/// observably distinct even within the same clock tick. Cloning the `Arc`
/// that wraps it lets two feed instances share one store, which is how the
/// last-writer-wins behavior across instances is exercised.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    snapshot: Option<Snapshot>,
    version: i64,
    fail_saves: bool,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail, to exercise the fatal-persistence
    /// path.
    pub fn fail_saves(&self, fail: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fail_saves = fail;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| anyhow!("store lock poisoned: {}", e))
    }
}

impl SnapshotGateway for MemorySnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.lock()?.snapshot.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.fail_saves {
            return Err(anyhow!("simulated save failure"));
        }
        inner.snapshot = Some(snapshot.clone());
        inner.version += 1;
        Ok(())
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        let inner = self.lock()?;
        if inner.snapshot.is_none() {
            return Ok(None);
        }
        let mtime = Utc
            .timestamp_opt(inner.version, 0)
            .single()
            .ok_or_else(|| anyhow!("version {} out of timestamp range", inner.version))?;
        Ok(Some(mtime))
    }
}

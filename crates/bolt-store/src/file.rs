use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tracing::info;

use bolt_types::Snapshot;
use bolt_types::models::SNAPSHOT_SCHEMA_VERSION;

use crate::SnapshotGateway;

/// JSON snapshot on the local filesystem.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated snapshot behind. The file's
/// mtime doubles as the change oracle for other instances polling the same
/// path.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Snapshot store at {}", path.display());
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotGateway for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            bail!(
                "snapshot {} has schema version {} but this build understands up to {}",
                self.path.display(),
                snapshot.schema_version,
                SNAPSHOT_SCHEMA_VERSION
            );
        }

        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let bytes = serde_json::to_vec(snapshot).context("serializing snapshot")?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &bytes).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        match fs::metadata(&self.path) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .with_context(|| format!("mtime of {}", self.path.display()))?;
                Ok(Some(DateTime::<Utc>::from(mtime)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("stat {}", self.path.display())),
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::cuesheet::CueSheet;
use crate::error::{EngineError, Result};

pub const BACKUP_PREFIX: &str = "insomniax_";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Owns the live cue-sheet document and its timestamped version history.
/// Every mutating operation elsewhere snapshots through here first.
#[derive(Debug, Clone)]
pub struct CueSheetStore {
    cue_path: PathBuf,
    versions_dir: PathBuf,
}

impl CueSheetStore {
    pub fn new(cue_path: impl Into<PathBuf>, versions_dir: impl Into<PathBuf>) -> Self {
        CueSheetStore {
            cue_path: cue_path.into(),
            versions_dir: versions_dir.into(),
        }
    }

    pub fn cue_path(&self) -> &Path {
        &self.cue_path
    }

    pub fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    /// Copy the live document into the version directory. Returns the
    /// backup path, or `None` when there is no live document to copy —
    /// callers decide whether that matters.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.cue_path.exists() {
            return Ok(None);
        }
        fs::create_dir_all(&self.versions_dir)?;
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        // Two backups within the same second collide; last write wins.
        let backup = self
            .versions_dir
            .join(format!("{BACKUP_PREFIX}{stamp}.json"));
        fs::copy(&self.cue_path, &backup)?;
        Ok(Some(backup))
    }

    pub fn load(&self) -> Result<CueSheet> {
        if !self.cue_path.exists() {
            return Err(EngineError::CueSheetMissing(self.cue_path.clone()));
        }
        let raw = fs::read_to_string(&self.cue_path)?;
        serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {e}", self.cue_path.display())))
    }

    /// Whole-document overwrite; the store never merges.
    pub fn save(&self, doc: &CueSheet) -> Result<()> {
        let raw = serde_json::to_string_pretty(doc)
            .map_err(|e| EngineError::Config(e.to_string()))?;
        fs::write(&self.cue_path, raw)?;
        Ok(())
    }

    /// Backup file names in lexicographic order, which the timestamp
    /// scheme makes chronological.
    pub fn list_versions(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.versions_dir.exists() {
            for entry in fs::read_dir(&self.versions_dir)? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                if name.starts_with(BACKUP_PREFIX) && name.ends_with(".json") {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Copy a named version over the live document, backing up the
    /// current document first so the restore itself can be undone.
    /// Returns the pre-restore backup path when one was written.
    pub fn restore(&self, timestamp: &str) -> Result<Option<PathBuf>> {
        let version = self
            .versions_dir
            .join(format!("{BACKUP_PREFIX}{timestamp}.json"));
        if !version.exists() {
            return Err(EngineError::VersionNotFound(timestamp.to_string()));
        }
        let prior = self.backup()?;
        fs::copy(&version, &self.cue_path)?;
        Ok(prior)
    }
}

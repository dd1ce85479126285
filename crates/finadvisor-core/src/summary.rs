//! The latest profile summary, shared between the intake form and the advisor
//!
//! Held in memory for the life of the process and mirrored to a small JSON
//! scratch file so a restart can pick it up again. The scratch copy is best
//! effort: write failures are logged, unreadable files count as empty.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const SUMMARY_KEY: &str = "summary";

/// Key/value scratch storage backed by one JSON object file
#[derive(Debug, Clone)]
pub struct ScratchStorage {
    path: PathBuf,
}

impl ScratchStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{data_dir}/finadvisor/scratch.json`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(data_dir.join("finadvisor").join("scratch.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read_all()
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_all();
        entries.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    fn read_all(&self) -> Map<String, Value> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct SummaryStore {
    current: Option<String>,
    scratch: Option<ScratchStorage>,
}

impl SummaryStore {
    pub fn new(scratch: ScratchStorage) -> Self {
        Self {
            current: None,
            scratch: Some(scratch),
        }
    }

    /// A store that forgets everything when the process exits
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn set(&mut self, summary: &str) {
        let summary = summary.trim().to_string();
        if let Some(scratch) = &self.scratch {
            match scratch.set(SUMMARY_KEY, &summary) {
                Ok(()) => debug!("Summary saved to {:?}", scratch.path()),
                Err(e) => warn!("Failed to save summary to scratch storage: {}", e),
            }
        }
        self.current = Some(summary);
    }

    /// The in-memory summary, else whatever the scratch file holds.
    pub fn get(&self) -> Option<String> {
        self.current
            .clone()
            .or_else(|| self.scratch.as_ref().and_then(|s| s.get(SUMMARY_KEY)))
            .filter(|s| !s.is_empty())
    }
}

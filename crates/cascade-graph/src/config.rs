//! Graph configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how a persistent graph is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Directory holding the main database and the delta directory
    pub root_dir: PathBuf,
    /// Keep deltas in memory instead of a scratch database under `root_dir/delta`
    pub transient_delta: bool,
    /// File name of the main database inside `root_dir`
    pub database_file: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(".cascade"),
            transient_delta: true,
            database_file: "mappings.redb".to_string(),
        }
    }
}

impl GraphConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; missing keys take their defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_dir.join(&self.database_file)
    }

    pub fn delta_dir(&self) -> PathBuf {
        self.root_dir.join("delta")
    }
}

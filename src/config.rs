//! Configuration.
//!
//! Chunk sizing for the name generator and column layout for the flat-text
//! backend. Everything has a default and can be loaded from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Chunk sizing for [`NameGen`](crate::archive::NameGen).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameGenConfig {
    /// Target number of samples per chunk.
    /// Default: 5000
    pub points_per_chunk: u64,
}

impl Default for NameGenConfig {
    fn default() -> Self {
        Self {
            points_per_chunk: 5000,
        }
    }
}

/// Column layout for [`AsciiBackend`](crate::backend::AsciiBackend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsciiConfig {
    /// Field names, in column order after the leading time column.
    /// Default: ["default"]
    pub fields: Vec<String>,

    /// Digits after the decimal point for the time column.
    /// Default: 1
    pub time_precision: usize,

    /// Mantissa digits for data columns (scientific notation).
    /// Default: 5
    pub data_precision: usize,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            fields: vec!["default".to_string()],
            time_precision: 1,
            data_precision: 5,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsmrConfig {
    pub namegen: NameGenConfig,
    pub ascii: AsciiConfig,
}

impl DsmrConfig {
    /// Load configuration from a JSON file. Missing sections take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| Error::Parse {
            locator: path.display().to_string(),
            line: e.line(),
            msg: e.to_string(),
        })
    }
}

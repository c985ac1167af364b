//! Chunk records and per-resolution filesets.

use std::fmt;

use crate::archive::Resolution;
use crate::error::{Error, Result};
use crate::measurements::TimeRange;

/// Backend-owned handle for where a chunk's bytes live.
///
/// The catalog never interprets the contents. It only stores, encodes and
/// prefix-rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replace the leading `old_prefix` with `new_prefix`.
    ///
    /// # Errors
    ///
    /// - `Error::LocatorMismatch`: the locator does not start with `old_prefix`
    pub fn relocated(&self, new_prefix: &str, old_prefix: &str) -> Result<Locator> {
        match self.0.strip_prefix(old_prefix) {
            Some(rest) => Ok(Locator(format!("{new_prefix}{rest}"))),
            None => Err(Error::LocatorMismatch {
                locator: self.0.clone(),
                prefix: old_prefix.to_string(),
            }),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Locator(value.to_string())
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Locator(value)
    }
}

/// One physically stored chunk: its time range, fields and locator.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub time_range: TimeRange,
    pub fields: Vec<String>,
    pub locator: Locator,
}

/// Ordered chunk records for a single resolution.
///
/// Records keep registration order. Overlapping or duplicate registrations
/// are not detected.
#[derive(Debug, Clone, PartialEq)]
pub struct Fileset {
    resolution: Resolution,
    records: Vec<ChunkRecord>,
}

impl Fileset {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            records: Vec::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn add_file(&mut self, time_range: TimeRange, locator: Locator, fields: Vec<String>) {
        self.records.push(ChunkRecord {
            time_range,
            fields,
            locator,
        });
    }

    pub fn contains_locator(&self, locator: &Locator) -> bool {
        self.records.iter().any(|record| &record.locator == locator)
    }

    /// Replace the field list of the record stored at `locator`.
    ///
    /// Returns `false` when no record has that locator.
    pub fn update_fields(&mut self, locator: &Locator, fields: Vec<String>) -> bool {
        match self.records.iter_mut().find(|record| &record.locator == locator) {
            Some(record) => {
                record.fields = fields;
                true
            }
            None => false,
        }
    }

    /// Records whose range contains at least one of `times`.
    pub fn cover_for_times(&self, times: &[f64]) -> Vec<&ChunkRecord> {
        self.records
            .iter()
            .filter(|record| times.iter().any(|&t| record.time_range.contains(t)))
            .collect()
    }

    /// Records overlapping any of `time_ranges`, each at most once, in
    /// registration order.
    pub fn cover_for_intervals(&self, time_ranges: &[TimeRange]) -> Vec<&ChunkRecord> {
        self.records
            .iter()
            .filter(|record| time_ranges.iter().any(|q| record.time_range.overlaps(q)))
            .collect()
    }

    /// Union of field names, in first-seen order, over records overlapping
    /// `time_range`.
    pub fn get_fields(&self, time_range: TimeRange) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for record in self.cover_for_intervals(&[time_range]) {
            for field in &record.fields {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }
        fields
    }

    /// Rewrite every locator from `old_prefix` to `new_prefix`.
    ///
    /// Either every record is rewritten or, on the first mismatch, none is.
    pub fn relocate(&mut self, new_prefix: &str, old_prefix: &str) -> Result<()> {
        let relocated = self
            .records
            .iter()
            .map(|record| record.locator.relocated(new_prefix, old_prefix))
            .collect::<Result<Vec<_>>>()?;
        for (record, locator) in self.records.iter_mut().zip(relocated) {
            record.locator = locator;
        }
        Ok(())
    }
}

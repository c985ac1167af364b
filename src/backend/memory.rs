use std::collections::HashMap;

use crate::archive::Locator;
use crate::backend::{FieldMap, StorageBackend};
use crate::error::{Error, Result};
use crate::measurements::{Overlap, TimeRange};

/// Keeps chunks in a map. Reads select by validity overlap.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    chunks: HashMap<Locator, FieldMap>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.chunks.contains_key(locator)
    }
}

impl StorageBackend for MemoryBackend {
    fn read(
        &self,
        locator: &Locator,
        time_ranges: &[TimeRange],
        fields: Option<&[String]>,
    ) -> Result<FieldMap> {
        let chunk = self
            .chunks
            .get(locator)
            .ok_or_else(|| Error::LocatorNotFound(locator.to_string()))?;

        let mut out = FieldMap::new();
        for (name, series) in chunk {
            if let Some(wanted) = fields {
                if !wanted.contains(name) {
                    continue;
                }
            }
            out.insert(
                name.clone(),
                series.intersect_any(time_ranges, Overlap::Validity),
            );
        }
        Ok(out)
    }

    fn write(&mut self, locator: &Locator, data: &FieldMap) -> Result<()> {
        self.chunks.insert(locator.clone(), data.clone());
        Ok(())
    }
}

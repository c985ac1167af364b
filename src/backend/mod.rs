//! Storage backends.
//!
//! A backend turns a [`Locator`] into per-field [`Measurements`] and back.
//! The archive only ever hands locators through; what they mean is up to the
//! backend.

mod ascii;
mod memory;

use std::collections::BTreeMap;

use crate::archive::Locator;
use crate::error::Result;
use crate::measurements::{Measurements, TimeRange};

pub use ascii::AsciiBackend;
pub use memory::MemoryBackend;

/// Per-field series, keyed by field name.
pub type FieldMap = BTreeMap<String, Measurements>;

/// Physical read/write of one chunk.
pub trait StorageBackend {
    /// Load `fields` (all stored fields when `None`) from the chunk at
    /// `locator`, keeping only samples inside the union of `time_ranges`.
    /// An empty `time_ranges` slice returns the whole chunk.
    ///
    /// # Errors
    ///
    /// - `Error::LocatorNotFound`: nothing is stored at `locator`
    /// - any backend-specific decode failure
    fn read(
        &self,
        locator: &Locator,
        time_ranges: &[TimeRange],
        fields: Option<&[String]>,
    ) -> Result<FieldMap>;

    /// Replace everything stored at `locator` with `data`.
    fn write(&mut self, locator: &Locator, data: &FieldMap) -> Result<()>;

    /// Suffix appended to generated chunk names, e.g. `".txt"`.
    fn suffix(&self) -> &str {
        ""
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    fn read(
        &self,
        locator: &Locator,
        time_ranges: &[TimeRange],
        fields: Option<&[String]>,
    ) -> Result<FieldMap> {
        (**self).read(locator, time_ranges, fields)
    }

    fn write(&mut self, locator: &Locator, data: &FieldMap) -> Result<()> {
        (**self).write(locator, data)
    }

    fn suffix(&self) -> &str {
        (**self).suffix()
    }
}

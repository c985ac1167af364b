//! Multi-resolution chunk catalog.
//!
//! A [`ResArchive`] keeps one [`Fileset`] per known sampling resolution. A
//! query names a resolution; the archive picks the nearest one it knows
//! (by logarithmic distance), finds the chunks covering the requested time
//! ranges and merges what the storage backend returns for them.
//!
//! # Example
//!
//! ```no_run
//! use dsmr::archive::{ResArchive, TimeRange};
//! use dsmr::backend::MemoryBackend;
//!
//! let mut archive = ResArchive::with_backend(MemoryBackend::new());
//! archive.add_file(1.0, TimeRange::new(0.0, 100.0), "mem://a".into(), vec!["x".into()])?;
//! let data = archive.get_data(1.0, &[TimeRange::new(50.0, 150.0)], None, None)?;
//! # Ok::<(), dsmr::Error>(())
//! ```

mod codec;
mod fileset;
mod namegen;
mod writer;

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::backend::{FieldMap, StorageBackend};
use crate::error::{Error, Result};
use crate::measurements::Measurements;

pub use crate::measurements::TimeRange;
pub use codec::{decode, encode, CATALOG_MAGIC, CATALOG_VERSION};
pub use fileset::{ChunkRecord, Fileset, Locator};
pub use namegen::NameGen;
pub use writer::ChunkWriter;

/// Nominal sampling interval. Always positive and finite.
///
/// Compared and hashed by bit pattern so it can key a map.
#[derive(Debug, Clone, Copy)]
pub struct Resolution(f64);

impl Resolution {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(Error::InvalidResolution(value))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// `|ln(self / other)|`: symmetric in "twice" and "half".
    pub fn log_distance(self, other: Resolution) -> f64 {
        (self.0 / other.0).ln().abs()
    }
}

impl PartialEq for Resolution {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Resolution {}

impl Hash for Resolution {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog of chunk files across sampling resolutions.
///
/// `resolutions` keeps registration order and always holds exactly the keys
/// of `filesets`.
#[derive(Default)]
pub struct ResArchive {
    resolutions: Vec<Resolution>,
    filesets: HashMap<Resolution, Fileset>,
    backend: Option<Box<dyn StorageBackend>>,
}

impl ResArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty archive that reads through `backend` by default.
    pub fn with_backend(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Some(Box::new(backend)),
            ..Self::default()
        }
    }

    pub fn set_backend(&mut self, backend: impl StorageBackend + 'static) {
        self.backend = Some(Box::new(backend));
    }

    pub fn backend(&self) -> Option<&dyn StorageBackend> {
        self.backend.as_deref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut (dyn StorageBackend + 'static)> {
        self.backend.as_deref_mut()
    }

    /// Known resolutions, in registration order.
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// Filesets in resolution registration order.
    pub fn filesets(&self) -> impl Iterator<Item = &Fileset> {
        self.resolutions.iter().map(move |res| &self.filesets[res])
    }

    /// Fileset registered for exactly `res`.
    pub fn fileset(&self, res: f64) -> Option<&Fileset> {
        let res = Resolution::new(res).ok()?;
        self.filesets.get(&res)
    }

    pub(crate) fn fileset_mut(&mut self, res: f64) -> Option<&mut Fileset> {
        let res = Resolution::new(res).ok()?;
        self.filesets.get_mut(&res)
    }

    /// Register an empty fileset for `res`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidResolution`: `res` is not positive and finite
    /// - `Error::DuplicateResolution`: `res` is already registered
    pub fn add_resolution(&mut self, res: f64) -> Result<()> {
        let res = Resolution::new(res)?;
        if self.filesets.contains_key(&res) {
            return Err(Error::DuplicateResolution(res.get()));
        }
        self.resolutions.push(res);
        self.filesets.insert(res, Fileset::new(res));
        Ok(())
    }

    /// Known resolution closest to `res` in `|ln(res / r)|`.
    ///
    /// Equal distances go to the smaller resolution.
    ///
    /// # Errors
    ///
    /// - `Error::NoResolutions`: nothing is registered yet
    pub fn nearest_resolution(&self, res: f64) -> Result<Resolution> {
        let res = Resolution::new(res)?;
        self.resolutions
            .iter()
            .copied()
            .min_by(|a, b| {
                res.log_distance(*a)
                    .total_cmp(&res.log_distance(*b))
                    .then(a.get().total_cmp(&b.get()))
            })
            .ok_or(Error::NoResolutions)
    }

    /// Record a chunk at `res`, creating the fileset on first use.
    pub fn add_file(
        &mut self,
        res: f64,
        time_range: TimeRange,
        locator: Locator,
        fields: Vec<String>,
    ) -> Result<()> {
        let res = Resolution::new(res)?;
        if !self.filesets.contains_key(&res) {
            self.resolutions.push(res);
        }
        self.filesets
            .entry(res)
            .or_insert_with(|| Fileset::new(res))
            .add_file(time_range, locator, fields);
        log::debug!("registered chunk {} at res {}", time_range, res);
        Ok(())
    }

    fn nearest_fileset(&self, res: f64) -> Result<&Fileset> {
        let res = self.nearest_resolution(res)?;
        Ok(&self.filesets[&res])
    }

    /// Fields stored in chunks overlapping `time_range`.
    ///
    /// With `res`, only the nearest resolution is consulted; without, every
    /// resolution is, in registration order.
    pub fn get_fields(&self, res: Option<f64>, time_range: TimeRange) -> Result<Vec<String>> {
        let filesets: Vec<&Fileset> = match res {
            Some(res) => vec![self.nearest_fileset(res)?],
            None => self.filesets().collect(),
        };
        let mut fields: Vec<String> = Vec::new();
        for fileset in filesets {
            for field in fileset.get_fields(time_range) {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }
        Ok(fields)
    }

    pub fn cover_for_times(&self, res: f64, times: &[f64]) -> Result<Vec<&ChunkRecord>> {
        Ok(self.nearest_fileset(res)?.cover_for_times(times))
    }

    pub fn cover_for_intervals(
        &self,
        res: f64,
        time_ranges: &[TimeRange],
    ) -> Result<Vec<&ChunkRecord>> {
        Ok(self.nearest_fileset(res)?.cover_for_intervals(time_ranges))
    }

    /// Read `fields` over `time_ranges` at the resolution nearest `res`.
    ///
    /// Every covering chunk is read through `backend` (or the archive's
    /// default) and the per-field pieces are joined in chunk time order.
    /// Trimming to `time_ranges` is left to the backend. Any backend error
    /// aborts the whole read.
    ///
    /// # Errors
    ///
    /// - `Error::NoResolutions`: the archive is empty
    /// - `Error::NoBackend`: no backend given and no default set
    /// - any error raised by the backend
    pub fn get_data(
        &self,
        res: f64,
        time_ranges: &[TimeRange],
        fields: Option<&[String]>,
        backend: Option<&dyn StorageBackend>,
    ) -> Result<FieldMap> {
        let backend = backend
            .or_else(|| self.backend.as_deref())
            .ok_or(Error::NoBackend)?;
        let fileset = self.nearest_fileset(res)?;
        let records = fileset.cover_for_intervals(time_ranges);
        log::debug!(
            "get_data res {} -> {}: {} chunk(s)",
            res,
            fileset.resolution(),
            records.len()
        );

        let mut pieces: HashMap<String, Vec<Measurements>> = HashMap::new();
        for record in records {
            let chunk = backend.read(&record.locator, time_ranges, fields)?;
            log::debug!("read {} field(s) from {}", chunk.len(), record.locator);
            for field in &record.fields {
                let requested = fields.map_or(true, |wanted| wanted.contains(field));
                if requested && !chunk.contains_key(field) {
                    log::warn!("{} lists field {} but returned none", record.locator, field);
                }
            }
            for (field, series) in chunk {
                pieces.entry(field).or_default().push(series);
            }
        }

        Ok(pieces
            .into_iter()
            .map(|(field, parts)| (field, Measurements::join(parts)))
            .collect())
    }

    /// Rewrite every chunk locator from `old_prefix` to `new_prefix`.
    ///
    /// Nothing changes unless every locator in every fileset matches.
    pub fn relocate(&mut self, new_prefix: &str, old_prefix: &str) -> Result<()> {
        let mut relocated = self.filesets.clone();
        for fileset in relocated.values_mut() {
            fileset.relocate(new_prefix, old_prefix)?;
        }
        self.filesets = relocated;
        log::info!("relocated catalog from '{}' to '{}'", old_prefix, new_prefix);
        Ok(())
    }

    /// Total number of chunk records across all resolutions.
    pub fn chunk_count(&self) -> usize {
        self.filesets.values().map(Fileset::len).sum()
    }
}

impl fmt::Debug for ResArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResArchive")
            .field("filesets", &self.filesets().collect::<Vec<_>>())
            .field("has_backend", &self.backend.is_some())
            .finish()
    }
}

/// Two archives are equal when their resolutions, in order, and their chunk
/// records, in order, match. The default backend is not compared.
impl PartialEq for ResArchive {
    fn eq(&self, other: &Self) -> bool {
        self.resolutions == other.resolutions && self.filesets().eq(other.filesets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn archive(resolutions: &[f64]) -> ResArchive {
        let mut archive = ResArchive::new();
        for &res in resolutions {
            archive.add_resolution(res).unwrap();
        }
        archive
    }

    #[test]
    fn resolution_rejects_non_positive() {
        assert!(Resolution::new(0.0).is_err());
        assert!(Resolution::new(-1.0).is_err());
        assert!(Resolution::new(f64::INFINITY).is_err());
        assert_eq!(Resolution::new(2.5).unwrap().get(), 2.5);
    }

    #[test]
    fn nearest_resolution_is_logarithmic() {
        let archive = archive(&[1.0, 10.0, 100.0]);
        assert_eq!(archive.nearest_resolution(9.0).unwrap().get(), 10.0);
        assert!((31.0f64 / 10.0).ln().abs() < (31.0f64 / 100.0).ln().abs());
        assert_eq!(archive.nearest_resolution(31.0).unwrap().get(), 10.0);
        assert_eq!(archive.nearest_resolution(40.0).unwrap().get(), 100.0);
        assert_eq!(archive.nearest_resolution(0.01).unwrap().get(), 1.0);
    }

    #[test]
    fn nearest_resolution_tie_prefers_smaller() {
        let archive = archive(&[4.0, 1.0]);
        assert_eq!(archive.nearest_resolution(2.0).unwrap().get(), 1.0);
    }

    #[test]
    fn nearest_resolution_empty() {
        let archive = ResArchive::new();
        assert!(matches!(
            archive.nearest_resolution(1.0),
            Err(Error::NoResolutions)
        ));
        assert!(matches!(
            archive.cover_for_times(1.0, &[0.0]),
            Err(Error::NoResolutions)
        ));
    }

    #[test]
    fn add_resolution_rejects_duplicates() {
        let mut archive = archive(&[1.0]);
        assert!(matches!(
            archive.add_resolution(1.0),
            Err(Error::DuplicateResolution(_))
        ));
        assert_eq!(archive.resolutions().len(), 1);
    }

    #[test]
    fn add_file_creates_resolution_lazily() {
        let mut archive = ResArchive::new();
        archive
            .add_file(10.0, TimeRange::new(0.0, 50.0), "a".into(), vec![])
            .unwrap();
        archive
            .add_file(10.0, TimeRange::new(50.0, 100.0), "b".into(), vec![])
            .unwrap();
        assert_eq!(archive.resolutions().len(), 1);
        assert_eq!(archive.fileset(10.0).unwrap().len(), 2);
        assert_eq!(archive.chunk_count(), 2);
    }

    #[test]
    fn get_fields_across_resolutions() {
        let mut archive = ResArchive::new();
        let range = TimeRange::new(0.0, 100.0);
        archive
            .add_file(1.0, range, "a".into(), vec!["x".into(), "y".into()])
            .unwrap();
        archive
            .add_file(10.0, range, "b".into(), vec!["y".into(), "z".into()])
            .unwrap();

        assert_eq!(archive.get_fields(Some(8.0), range).unwrap(), vec!["y", "z"]);
        assert_eq!(archive.get_fields(None, range).unwrap(), vec!["x", "y", "z"]);
    }

    #[test]
    fn get_data_requires_backend() {
        let mut archive = ResArchive::new();
        archive
            .add_file(1.0, TimeRange::new(0.0, 10.0), "a".into(), vec![])
            .unwrap();
        assert!(matches!(
            archive.get_data(1.0, &[TimeRange::new(0.0, 10.0)], None, None),
            Err(Error::NoBackend)
        ));
    }

    #[test]
    fn get_data_propagates_backend_error() {
        let mut archive = ResArchive::with_backend(MemoryBackend::new());
        archive
            .add_file(1.0, TimeRange::new(0.0, 10.0), "missing".into(), vec![])
            .unwrap();
        assert!(matches!(
            archive.get_data(1.0, &[TimeRange::new(0.0, 10.0)], None, None),
            Err(Error::LocatorNotFound(_))
        ));
    }

    #[test]
    fn relocate_all_or_nothing() {
        let mut archive = ResArchive::new();
        let range = TimeRange::new(0.0, 10.0);
        archive.add_file(1.0, range, "/old/a".into(), vec![]).unwrap();
        archive.add_file(2.0, range, "/other/b".into(), vec![]).unwrap();

        assert!(archive.relocate("/new", "/old").is_err());
        assert_eq!(
            archive.fileset(1.0).unwrap().records()[0].locator.as_str(),
            "/old/a"
        );

        archive.relocate("", "/").unwrap();
        assert_eq!(
            archive.fileset(2.0).unwrap().records()[0].locator.as_str(),
            "other/b"
        );
    }
}

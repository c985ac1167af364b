//! Down-sampling and multi-resolution time-series archives.
//!
//! - [`Measurements`]: irregularly sampled series with per-sample validity
//!   intervals, plus the intersect / join / clean algebra over them.
//! - [`ResArchive`]: catalog of time-chunked files across several sampling
//!   resolutions, answering "field F at resolution R over these ranges".
//! - [`NameGen`]: deterministic chunk boundaries, so independent writers
//!   agree on where chunks start and end.
//! - [`StorageBackend`]: the physical read/write of one chunk.
//!
//! # Example
//!
//! ```no_run
//! use dsmr::{ChunkWriter, FieldMap, Measurements, NameGen, ResArchive, TimeRange};
//! use dsmr::backend::MemoryBackend;
//!
//! let t: Vec<f64> = (0..20_000).map(|i| i as f64).collect();
//! let mut data = FieldMap::new();
//! data.insert("temp".into(), Measurements::from_simple(&t, &t, None)?);
//!
//! let mut archive = ResArchive::new();
//! let mut backend = MemoryBackend::new();
//! ChunkWriter::new(&mut archive, NameGen::default(), "mem://temp")
//!     .write(1.0, &data, &mut backend)?;
//!
//! let merged = archive.get_data(1.0, &[TimeRange::new(4_000.0, 12_000.0)], None, Some(&backend))?;
//! # Ok::<(), dsmr::Error>(())
//! ```

pub mod archive;
pub mod backend;
pub mod config;
pub mod error;
pub mod measurements;
pub mod resample;

pub use archive::{ChunkRecord, ChunkWriter, Fileset, Locator, NameGen, ResArchive, Resolution};
pub use backend::{FieldMap, StorageBackend};
pub use config::{AsciiConfig, DsmrConfig, NameGenConfig};
pub use error::{Error, Result};
pub use measurements::{Measurements, Overlap, TimeRange, ValidityRun};
pub use resample::{Evaluator, LinearSampler};

//! Write path: split series into grid chunks, store them, register them.

use crate::archive::{ChunkRecord, Locator, NameGen, ResArchive};
use crate::backend::{FieldMap, StorageBackend};
use crate::error::Result;
use crate::measurements::Overlap;

/// Splits per-field series into [`NameGen`] grid cells and writes each cell
/// as one chunk.
///
/// Chunk locators are `"{prefix}/{chunk_length}/{cell_start}{suffix}"`, so
/// rewriting the same cell replaces the same chunk instead of adding a new
/// one. A chunk is registered in the archive only after the backend has
/// stored it.
pub struct ChunkWriter<'a> {
    archive: &'a mut ResArchive,
    namegen: NameGen,
    prefix: String,
    chunks_written: u64,
}

impl<'a> ChunkWriter<'a> {
    pub fn new(archive: &'a mut ResArchive, namegen: NameGen, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/').to_string();
        Self {
            archive,
            namegen,
            prefix,
            chunks_written: 0,
        }
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Write `data` at resolution `res` through `backend`.
    ///
    /// Samples are assigned to cells by timestamp. Fields with no samples in
    /// a cell are left out of that chunk. Returns the records of the chunks
    /// written, in time order.
    pub fn write(
        &mut self,
        res: f64,
        data: &FieldMap,
        backend: &mut dyn StorageBackend,
    ) -> Result<Vec<ChunkRecord>> {
        let step = self.namegen.effective_resolution(res)?;
        let times: Vec<f64> = data.values().flat_map(|m| m.t().iter().copied()).collect();
        let cells = self.namegen.cover_for_times(res, &times)?;

        let mut written = Vec::with_capacity(cells.len());
        for cell in cells {
            let chunk: FieldMap = data
                .iter()
                .map(|(field, series)| {
                    (field.clone(), series.intersect(cell.start, cell.end, Overlap::Centers))
                })
                .filter(|(_, series)| !series.is_empty())
                .collect();
            if chunk.is_empty() {
                continue;
            }

            let locator = Locator::new(format!(
                "{}/{}{}",
                self.prefix,
                NameGen::chunk_name(step, &cell),
                backend.suffix()
            ));
            backend.write(&locator, &chunk)?;
            self.chunks_written += 1;

            let fields: Vec<String> = chunk.keys().cloned().collect();
            let known = self
                .archive
                .fileset_mut(res)
                .map(|fs| fs.update_fields(&locator, fields.clone()))
                .unwrap_or(false);
            if known {
                log::debug!("chunk {} rewritten in place", locator);
            } else {
                self.archive
                    .add_file(res, cell, locator.clone(), fields.clone())?;
            }

            written.push(ChunkRecord {
                time_range: cell,
                fields,
                locator,
            });
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TimeRange;
    use crate::backend::MemoryBackend;
    use crate::config::NameGenConfig;
    use crate::measurements::Measurements;

    fn series(t: &[f64]) -> Measurements {
        let y: Vec<f64> = t.iter().map(|v| v * 2.0).collect();
        Measurements::from_simple(t, &y, None).unwrap()
    }

    #[test]
    fn write_splits_on_grid() {
        let mut archive = ResArchive::new();
        let mut backend = MemoryBackend::new();
        let namegen = NameGen::new(NameGenConfig {
            points_per_chunk: 10,
        });

        let mut data = FieldMap::new();
        data.insert("x".to_string(), series(&[1.0, 5.0, 12.0, 19.0, 31.0]));
        data.insert("y".to_string(), series(&[2.0, 3.0]));

        let mut writer = ChunkWriter::new(&mut archive, namegen, "mem://store/");
        let records = writer.write(1.0, &data, &mut backend).unwrap();
        assert_eq!(writer.chunks_written(), 3);

        let ranges: Vec<TimeRange> = records.iter().map(|r| r.time_range).collect();
        assert_eq!(
            ranges,
            vec![
                TimeRange::new(0.0, 10.0),
                TimeRange::new(10.0, 20.0),
                TimeRange::new(30.0, 40.0),
            ]
        );
        assert_eq!(records[0].locator.as_str(), "mem://store/10/0");
        assert_eq!(records[0].fields, vec!["x", "y"]);
        assert_eq!(records[1].fields, vec!["x"]);
        assert_eq!(backend.len(), 3);
        assert_eq!(archive.fileset(1.0).unwrap().len(), 3);
    }

    #[test]
    fn rewrite_same_cell_does_not_duplicate() {
        let mut archive = ResArchive::new();
        let mut backend = MemoryBackend::new();
        let namegen = NameGen::new(NameGenConfig {
            points_per_chunk: 10,
        });
        let mut data = FieldMap::new();
        data.insert("x".to_string(), series(&[1.0, 2.0]));

        let mut writer = ChunkWriter::new(&mut archive, namegen, "mem://store");
        writer.write(1.0, &data, &mut backend).unwrap();
        writer.write(1.0, &data, &mut backend).unwrap();
        assert_eq!(writer.chunks_written(), 2);
        assert_eq!(archive.chunk_count(), 1);
    }

    #[test]
    fn rewrite_same_cell_updates_registered_fields() {
        let mut archive = ResArchive::new();
        let mut backend = MemoryBackend::new();
        let namegen = NameGen::new(NameGenConfig {
            points_per_chunk: 10,
        });
        let cell = TimeRange::new(0.0, 10.0);

        let mut data = FieldMap::new();
        data.insert("x".to_string(), series(&[1.0, 2.0]));
        let mut writer = ChunkWriter::new(&mut archive, namegen, "mem://store");
        writer.write(1.0, &data, &mut backend).unwrap();

        data.insert("y".to_string(), series(&[3.0]));
        let records = writer.write(1.0, &data, &mut backend).unwrap();
        assert_eq!(records[0].fields, vec!["x", "y"]);

        assert_eq!(archive.chunk_count(), 1);
        assert_eq!(archive.fileset(1.0).unwrap().records()[0], records[0]);
        assert_eq!(archive.get_fields(Some(1.0), cell).unwrap(), vec!["x", "y"]);
        let read = archive
            .get_data(1.0, &[cell], None, Some(&backend))
            .unwrap();
        let read_fields: Vec<&str> = read.keys().map(String::as_str).collect();
        assert_eq!(read_fields, vec!["x", "y"]);
    }
}

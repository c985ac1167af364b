//! Versioned binary encoding of the catalog.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header  : magic u32 | version u32 | payload_len u32 | crc32(payload) u32
//! payload : n_res u32
//!           per resolution: res f64 | n_chunks u32
//!             per chunk: start f64 | end f64 | n_fields u32
//!                        per field: len u32 | utf-8 bytes
//!                        locator: len u32 | utf-8 bytes
//! ```
//!
//! Resolutions and chunk records are written in catalog order, so decoding
//! reproduces that order exactly.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::archive::{Locator, ResArchive, TimeRange};
use crate::error::{Error, Result};

pub const CATALOG_MAGIC: u32 = u32::from_le_bytes(*b"DSMR");
pub const CATALOG_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// Encode the catalog. The default backend is not part of the blob.
pub fn encode(archive: &ResArchive) -> Vec<u8> {
    let mut payload = Vec::new();
    put_u32(&mut payload, archive.resolutions().len() as u32);
    for fileset in archive.filesets() {
        payload.extend_from_slice(&fileset.resolution().get().to_le_bytes());
        put_u32(&mut payload, fileset.len() as u32);
        for record in fileset.records() {
            payload.extend_from_slice(&record.time_range.start.to_le_bytes());
            payload.extend_from_slice(&record.time_range.end.to_le_bytes());
            put_u32(&mut payload, record.fields.len() as u32);
            for field in &record.fields {
                put_str(&mut payload, field);
            }
            put_str(&mut payload, record.locator.as_str());
        }
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    put_u32(&mut out, CATALOG_MAGIC);
    put_u32(&mut out, CATALOG_VERSION);
    put_u32(&mut out, payload.len() as u32);
    put_u32(&mut out, crc32(&payload));
    out.extend_from_slice(&payload);
    out
}

/// Decode a catalog produced by [`encode`].
///
/// # Errors
///
/// - `Error::Corrupt`: bad magic, truncated or oversized input, invalid UTF-8
/// - `Error::UnsupportedVersion`: unknown format version
/// - `Error::ChecksumMismatch`: payload CRC does not match the header
/// - `Error::DuplicateResolution`: a resolution appears twice
pub fn decode(bytes: &[u8]) -> Result<ResArchive> {
    let mut header = Reader::new(bytes);
    if header.u32()? != CATALOG_MAGIC {
        return Err(Error::Corrupt("catalog magic mismatch"));
    }
    let version = header.u32()?;
    if version != CATALOG_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let payload_len = header.u32()? as usize;
    let expected = header.u32()?;
    let payload = header.take(payload_len)?;
    if !header.is_empty() {
        return Err(Error::Corrupt("trailing bytes after payload"));
    }
    let actual = crc32(payload);
    if actual != expected {
        return Err(Error::ChecksumMismatch { expected, actual });
    }

    let mut reader = Reader::new(payload);
    let mut archive = ResArchive::new();
    let n_res = reader.u32()?;
    for _ in 0..n_res {
        let res = reader.f64()?;
        archive.add_resolution(res)?;
        let n_chunks = reader.u32()?;
        for _ in 0..n_chunks {
            let start = reader.f64()?;
            let end = reader.f64()?;
            let n_fields = reader.u32()?;
            let mut fields = Vec::new();
            for _ in 0..n_fields {
                fields.push(reader.string()?);
            }
            let locator = Locator::new(reader.string()?);
            archive.add_file(res, TimeRange::new(start, end), locator, fields)?;
        }
    }
    if !reader.is_empty() {
        return Err(Error::Corrupt("trailing bytes in payload"));
    }
    Ok(archive)
}

impl ResArchive {
    /// Write the encoded catalog to `path`, replacing it atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("tmp");
        let data = encode(self);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        log::info!(
            "saved catalog {} ({} resolutions, {} chunks)",
            path.display(),
            self.resolutions().len(),
            self.chunk_count()
        );
        Ok(())
    }

    /// Read a catalog written by [`ResArchive::save`]. No default backend is set.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let archive = decode(&bytes)?;
        log::info!(
            "loaded catalog {} ({} resolutions, {} chunks)",
            path.display(),
            archive.resolutions().len(),
            archive.chunk_count()
        );
        Ok(archive)
    }
}

fn crc32(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    put_u32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(Error::Corrupt("truncated catalog"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("slice length")))
    }

    fn f64(&mut self) -> Result<f64> {
        let bytes = self.take(8)?;
        Ok(f64::from_le_bytes(bytes.try_into().expect("slice length")))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::Corrupt("invalid utf-8"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ResArchive {
        let mut archive = ResArchive::new();
        archive.add_resolution(10.0).unwrap();
        archive
            .add_file(1.0, TimeRange::new(100.0, 200.0), "/d/1/100".into(), vec!["x".into()])
            .unwrap();
        archive
            .add_file(1.0, TimeRange::new(0.0, 100.0), "/d/1/0".into(), vec!["x".into(), "y".into()])
            .unwrap();
        archive
            .add_file(10.0, TimeRange::new(0.0, 1000.0), "/d/10/0".into(), vec![])
            .unwrap();
        archive
    }

    #[test]
    fn decode_reproduces_order() {
        let archive = sample();
        let decoded = decode(&encode(&archive)).unwrap();
        assert_eq!(decoded, archive);
        let order: Vec<f64> = decoded.resolutions().iter().map(|r| r.get()).collect();
        assert_eq!(order, vec![10.0, 1.0]);
        assert_eq!(
            decoded.fileset(1.0).unwrap().records()[0].locator.as_str(),
            "/d/1/100"
        );
    }

    #[test]
    fn decode_rejects_bad_header() {
        let mut bytes = encode(&sample());
        bytes[0] ^= 0xFF;
        assert!(matches!(decode(&bytes), Err(Error::Corrupt(_))));

        let mut bytes = encode(&sample());
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(Error::UnsupportedVersion(99))));
    }

    #[test]
    fn decode_detects_corruption() {
        let mut bytes = encode(&sample());
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(decode(&bytes), Err(Error::ChecksumMismatch { .. })));

        let bytes = encode(&sample());
        assert!(matches!(
            decode(&bytes[..bytes.len() - 3]),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn empty_catalog() {
        let bytes = encode(&ResArchive::new());
        assert_eq!(bytes.len(), HEADER_LEN + 4);
        assert!(decode(&bytes).unwrap().resolutions().is_empty());
    }

    #[test]
    fn save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog").join("archive.dsmr");
        let archive = sample();
        archive.save(&path).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(ResArchive::load(&path).unwrap(), archive);
    }
}

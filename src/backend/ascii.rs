//! Flat-text chunks: one row per sample, time first, then one column per field.
//!
//! Field names are not stored in the file; the column order comes from
//! [`AsciiConfig::fields`]. All fields in a file are co-sampled.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::archive::Locator;
use crate::backend::{FieldMap, StorageBackend};
use crate::config::AsciiConfig;
use crate::error::{Error, Result};
use crate::measurements::{Measurements, TimeRange};

pub struct AsciiBackend {
    config: AsciiConfig,
}

impl AsciiBackend {
    pub fn new(config: AsciiConfig) -> Self {
        Self { config }
    }

    pub fn fields(&self) -> &[String] {
        &self.config.fields
    }

    fn column_of(&self, field: &str) -> Result<usize> {
        self.config
            .fields
            .iter()
            .position(|f| f == field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))
    }
}

impl StorageBackend for AsciiBackend {
    fn read(
        &self,
        locator: &Locator,
        time_ranges: &[TimeRange],
        fields: Option<&[String]>,
    ) -> Result<FieldMap> {
        let wanted: Vec<(usize, &str)> = match fields {
            Some(fields) => fields
                .iter()
                .map(|f| Ok((self.column_of(f)?, f.as_str())))
                .collect::<Result<_>>()?,
            None => self
                .config
                .fields
                .iter()
                .enumerate()
                .map(|(i, f)| (i, f.as_str()))
                .collect(),
        };

        let file = File::open(locator.as_str()).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::LocatorNotFound(locator.to_string()),
            _ => Error::Io(err),
        })?;

        let width = self.config.fields.len();
        let mut times = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); width];
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parse_error = |msg: String| Error::Parse {
                locator: locator.to_string(),
                line: index + 1,
                msg,
            };
            let row = line
                .split_whitespace()
                .map(str::parse::<f64>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| parse_error(e.to_string()))?;
            if row.len() < width + 1 {
                return Err(parse_error(format!(
                    "expected {} columns, got {}",
                    width + 1,
                    row.len()
                )));
            }

            let t = row[0];
            if !time_ranges.is_empty() && !time_ranges.iter().any(|r| r.contains(t)) {
                continue;
            }
            times.push(t);
            for (column, value) in columns.iter_mut().zip(&row[1..]) {
                column.push(*value);
            }
        }

        let mut out = FieldMap::new();
        for (column, name) in wanted {
            let series = Measurements::from_simple(&times, &columns[column], None)?;
            out.insert(name.to_string(), series);
        }
        Ok(out)
    }

    fn write(&mut self, locator: &Locator, data: &FieldMap) -> Result<()> {
        if data.len() != self.config.fields.len() {
            return Err(Error::FieldCount {
                expected: self.config.fields.len(),
                got: data.len(),
            });
        }
        if let Some(unknown) = data.keys().find(|k| !self.config.fields.contains(k)) {
            return Err(Error::UnknownField(unknown.clone()));
        }

        let series: Vec<&Measurements> = self.config.fields.iter().map(|f| &data[f]).collect();
        let times = series.first().map(|m| m.t()).unwrap_or(&[]);
        for (name, m) in self.config.fields.iter().zip(&series).skip(1) {
            if m.t() != times {
                return Err(Error::NotCosampled(name.clone()));
            }
        }

        let path = Path::new(locator.as_str());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        let mut out = BufWriter::new(file);
        let time_precision = self.config.time_precision;
        let data_precision = self.config.data_precision;
        for (i, t) in times.iter().enumerate() {
            write!(out, "{:.*}", time_precision, t)?;
            for m in &series {
                write!(out, " {}", format_sci(m.data()[i], data_precision))?;
            }
            writeln!(out)?;
        }
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        log::debug!("wrote {} rows to {}", times.len(), locator);
        Ok(())
    }

    fn suffix(&self) -> &str {
        ".txt"
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Scientific notation with a signed, at least two-digit exponent
/// (`1.50000e+00`).
fn format_sci(value: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, value);
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

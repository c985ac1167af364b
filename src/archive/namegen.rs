//! Deterministic chunk boundaries.
//!
//! The chunk length for a resolution is `res * points_per_chunk`, snapped to
//! the nearest of `{1, 2, 4, 5, 10} * 10^k`. Chunks then tile a global grid
//! anchored at zero, so two writers that agree on the resolution compute the
//! same boundaries without talking to each other.

use std::collections::BTreeSet;

use crate::measurements::TimeRange;
use crate::archive::Resolution;
use crate::config::NameGenConfig;
use crate::error::{Error, Result};

const NICE_MULTIPLIERS: [f64; 5] = [1.0, 2.0, 4.0, 5.0, 10.0];

/// Cell indices at or beyond 2^53 are no longer exact in `f64`.
const MAX_CELL: f64 = 9_007_199_254_740_992.0;

/// Maps a resolution to chunk length and chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct NameGen {
    config: NameGenConfig,
}

impl NameGen {
    pub fn new(config: NameGenConfig) -> Self {
        Self { config }
    }

    pub fn points_per_chunk(&self) -> u64 {
        self.config.points_per_chunk.max(1)
    }

    /// Chunk length for `res`, rounded to a "nice" value.
    ///
    /// Ties between candidates go to the smaller length.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidResolution`: `res` is not positive and finite
    pub fn effective_resolution(&self, res: f64) -> Result<f64> {
        let res = Resolution::new(res)?.get();
        let target = res * self.points_per_chunk() as f64;
        let base = 10f64.powi(target.log10().floor() as i32);

        let mut best = (f64::INFINITY, base);
        for mul in NICE_MULTIPLIERS {
            let candidate = mul * base;
            let deviation = (candidate / target - 1.0).abs();
            if deviation < best.0 {
                best = (deviation, candidate);
            }
        }
        Ok(best.1)
    }

    /// Ascending, deduplicated grid cells touched by `times`.
    ///
    /// Non-finite timestamps are ignored.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidResolution`: `res` is not positive and finite
    /// - `Error::TimeOutOfRange`: `t / step` is too large for an exact cell index
    pub fn cover_for_times(&self, res: f64, times: &[f64]) -> Result<Vec<TimeRange>> {
        let step = self.effective_resolution(res)?;
        let mut cells = BTreeSet::new();
        for &t in times.iter().filter(|t| t.is_finite()) {
            let cell = (t / step).floor();
            if cell.abs() >= MAX_CELL {
                return Err(Error::TimeOutOfRange { t, step });
            }
            cells.insert(cell as i64);
        }
        Ok(cells
            .into_iter()
            .map(|cell| TimeRange::new(cell as f64 * step, (cell + 1) as f64 * step))
            .collect())
    }

    /// Relative chunk name for a grid cell: `"{step}/{cell_start}"`.
    pub fn chunk_name(step: f64, cell: &TimeRange) -> String {
        format!("{}/{}", step, cell.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn effective_resolution_rounds_to_nice_values() {
        let namegen = NameGen::default();
        assert_eq!(namegen.effective_resolution(1.0).unwrap(), 5000.0);
        assert_eq!(namegen.effective_resolution(0.2).unwrap(), 1000.0);
        assert_eq!(namegen.effective_resolution(0.5).unwrap(), 2000.0);
        assert_eq!(namegen.effective_resolution(7.0).unwrap(), 40000.0);
        assert_eq!(namegen.effective_resolution(0.001).unwrap(), 5.0);
    }

    #[test]
    fn effective_resolution_uses_config() {
        let namegen = NameGen::new(NameGenConfig {
            points_per_chunk: 100,
        });
        assert_eq!(namegen.effective_resolution(1.0).unwrap(), 100.0);
    }

    #[test]
    fn effective_resolution_rejects_bad_input() {
        let namegen = NameGen::default();
        assert!(matches!(
            namegen.effective_resolution(0.0),
            Err(Error::InvalidResolution(_))
        ));
        assert!(namegen.effective_resolution(f64::NAN).is_err());
    }

    #[test]
    fn cover_for_times_grid() {
        let namegen = NameGen::new(NameGenConfig {
            points_per_chunk: 100,
        });
        let cells = namegen
            .cover_for_times(1.0, &[250.0, 5.0, 99.9, -1.0, 260.0])
            .unwrap();
        assert_eq!(
            cells,
            vec![
                TimeRange::new(-100.0, 0.0),
                TimeRange::new(0.0, 100.0),
                TimeRange::new(200.0, 300.0),
            ]
        );
    }

    #[test]
    fn cover_for_times_rejects_times_beyond_exact_cells() {
        let namegen = NameGen::default();
        assert!(matches!(
            namegen.cover_for_times(1.0, &[0.0, 1e300]),
            Err(Error::TimeOutOfRange { t, step }) if t == 1e300 && step == 5000.0
        ));
        assert!(matches!(
            namegen.cover_for_times(1.0, &[-1e300]),
            Err(Error::TimeOutOfRange { .. })
        ));

        let t = 1.7e9;
        let cells = namegen.cover_for_times(1.0, &[t]).unwrap();
        assert_eq!(cells.len(), 1);
        assert!(cells[0].contains(t));
    }

    #[test]
    fn cover_for_times_empty() {
        let namegen = NameGen::default();
        assert!(namegen.cover_for_times(1.0, &[]).unwrap().is_empty());
    }

    #[test]
    fn chunk_name_joins_step_and_start() {
        let cell = TimeRange::new(10000.0, 15000.0);
        assert_eq!(NameGen::chunk_name(5000.0, &cell), "5000/10000");
    }
}

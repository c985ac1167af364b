//! Validity-bounded time series.
//!
//! A [`Measurements`] holds four index-aligned columns: the sample time `t`,
//! the validity interval `[t_lo, t_hi)` over which the sample is
//! representative, and the sample value. A NaN value marks an invalid or
//! missing sample; [`Measurements::clean`] drops those and can optionally
//! heal the small gaps they leave behind.
//!
//! Samples are expected in ascending `t` order. Only
//! [`Measurements::from_simple`] checks this; the other operations trust the
//! caller.

use std::fmt;

use crate::error::{Error, Result};

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t < self.end
    }

    /// True when one range starts inside the other.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.contains(other.start) || other.contains(self.start)
    }
}

impl From<(f64, f64)> for TimeRange {
    fn from((start, end): (f64, f64)) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// How [`Measurements::intersect`] decides whether a sample falls in a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overlap {
    /// Keep samples whose validity interval overlaps the window.
    #[default]
    Validity,
    /// Keep samples whose timestamp lies inside the window.
    Centers,
}

/// A maximal run of samples with no validity gap between neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidityRun {
    /// Index of the first sample in the run.
    pub start: usize,
    /// One past the index of the last sample in the run.
    pub end: usize,
    /// Lower validity bound of the first sample.
    pub t_lo: f64,
    /// Upper validity bound of the last sample.
    pub t_hi: f64,
}

impl ValidityRun {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Irregularly sampled series with per-sample validity bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements {
    t: Vec<f64>,
    t_lo: Vec<f64>,
    t_hi: Vec<f64>,
    data: Vec<f64>,
}

impl Measurements {
    /// Build from explicit columns. All four must have the same length.
    pub fn new(t: Vec<f64>, t_lo: Vec<f64>, t_hi: Vec<f64>, data: Vec<f64>) -> Result<Self> {
        let expected = t.len();
        for (what, len) in [("t_lo", t_lo.len()), ("t_hi", t_hi.len()), ("data", data.len())] {
            if len != expected {
                return Err(Error::LengthMismatch {
                    what,
                    expected,
                    got: len,
                });
            }
        }
        Ok(Self { t, t_lo, t_hi, data })
    }

    /// Build from sample times and values, deriving validity bounds.
    ///
    /// Each bound sits halfway to the neighbouring sample; the first and last
    /// samples get a symmetric half-interval. With `max_step`, any spacing of
    /// at least `max_step` is clamped to it before halving, so sparse regions
    /// keep bounds at most `max_step / 2` from their sample. A single sample
    /// gets zero-width validity.
    ///
    /// # Errors
    ///
    /// - `Error::LengthMismatch`: `t` and `y` differ in length
    /// - `Error::Unsorted`: `t` decreases somewhere
    pub fn from_simple(t: &[f64], y: &[f64], max_step: Option<f64>) -> Result<Self> {
        if y.len() != t.len() {
            return Err(Error::LengthMismatch {
                what: "data",
                expected: t.len(),
                got: y.len(),
            });
        }
        if let Some(pos) = t.windows(2).position(|w| w[1] < w[0]) {
            return Err(Error::Unsorted { index: pos + 1 });
        }

        let n = t.len();
        let mut t_lo = vec![0.0; n];
        let mut t_hi = vec![0.0; n];
        if n == 1 {
            t_lo[0] = t[0];
            t_hi[0] = t[0];
        } else if n > 1 {
            let clamp = |step: f64| match max_step {
                Some(max) if step >= max => (max, true),
                _ => (step, false),
            };

            let (first, _) = clamp(t[1] - t[0]);
            t_lo[0] = t[0] - first / 2.0;
            let (last, _) = clamp(t[n - 1] - t[n - 2]);
            t_hi[n - 1] = t[n - 1] + last / 2.0;

            for i in 0..n - 1 {
                let (step, clamped) = clamp(t[i + 1] - t[i]);
                if clamped {
                    t_hi[i] = t[i] + step / 2.0;
                    t_lo[i + 1] = t[i + 1] - step / 2.0;
                } else {
                    // Share one midpoint so neighbours meet exactly.
                    let mid = t[i] + step / 2.0;
                    t_hi[i] = mid;
                    t_lo[i + 1] = mid;
                }
            }
        }

        Ok(Self {
            t: t.to_vec(),
            t_lo,
            t_hi,
            data: y.to_vec(),
        })
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            t: Vec::with_capacity(capacity),
            t_lo: Vec::with_capacity(capacity),
            t_hi: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn t_lo(&self) -> &[f64] {
        &self.t_lo
    }

    pub fn t_hi(&self) -> &[f64] {
        &self.t_hi
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Time extent `(first t_lo, last t_hi)`, or `None` when empty.
    pub fn extent(&self) -> Option<(f64, f64)> {
        match (self.t_lo.first(), self.t_hi.last()) {
            (Some(&lo), Some(&hi)) => Some((lo, hi)),
            _ => None,
        }
    }

    /// Filtered copy keeping only samples that fall in `[t0, t1)`.
    ///
    /// With [`Overlap::Validity`] a sample is kept when `t_hi >= t0` and
    /// `t_lo < t1`; with [`Overlap::Centers`] when `t0 <= t < t1`.
    pub fn intersect(&self, t0: f64, t1: f64, mode: Overlap) -> Self {
        self.select(|i| self.hits(i, t0, t1, mode))
    }

    /// Filtered copy keeping samples that fall in any of `ranges`, in their
    /// original order. An empty slice keeps everything.
    pub fn intersect_any(&self, ranges: &[TimeRange], mode: Overlap) -> Self {
        if ranges.is_empty() {
            return self.clone();
        }
        self.select(|i| ranges.iter().any(|r| self.hits(i, r.start, r.end, mode)))
    }

    fn hits(&self, i: usize, t0: f64, t1: f64, mode: Overlap) -> bool {
        match mode {
            Overlap::Validity => self.t_hi[i] >= t0 && self.t_lo[i] < t1,
            Overlap::Centers => t0 <= self.t[i] && self.t[i] < t1,
        }
    }

    fn select(&self, keep: impl Fn(usize) -> bool) -> Self {
        let mut out = Self::default();
        for i in (0..self.len()).filter(|&i| keep(i)) {
            out.t.push(self.t[i]);
            out.t_lo.push(self.t_lo[i]);
            out.t_hi.push(self.t_hi[i]);
            out.data.push(self.data[i]);
        }
        out
    }

    /// Concatenate several series, ordered by each one's first timestamp.
    ///
    /// Empty inputs are dropped. Samples inside each input keep their order;
    /// nothing is sorted or deduplicated across inputs.
    pub fn join<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Measurements>,
    {
        let mut parts: Vec<Measurements> = parts.into_iter().filter(|m| !m.is_empty()).collect();
        parts.sort_by(|a, b| a.t[0].total_cmp(&b.t[0]));

        let total = parts.iter().map(Measurements::len).sum();
        let mut out = Self::with_capacity(total);
        for part in parts {
            out.t.extend_from_slice(&part.t);
            out.t_lo.extend_from_slice(&part.t_lo);
            out.t_hi.extend_from_slice(&part.t_hi);
            out.data.extend_from_slice(&part.data);
        }
        out
    }

    /// Drop invalid (NaN) samples in place and heal small validity gaps.
    ///
    /// After compaction, every gap `g` between neighbouring samples with
    /// `0 < g < heal_gaps` is closed by moving both bounds to its midpoint.
    /// Returns the number of samples removed.
    pub fn clean(&mut self, heal_gaps: f64) -> usize {
        let before = self.len();
        let mut write = 0;
        for read in 0..before {
            if self.data[read].is_nan() {
                continue;
            }
            if write != read {
                self.t[write] = self.t[read];
                self.t_lo[write] = self.t_lo[read];
                self.t_hi[write] = self.t_hi[read];
                self.data[write] = self.data[read];
            }
            write += 1;
        }
        self.t.truncate(write);
        self.t_lo.truncate(write);
        self.t_hi.truncate(write);
        self.data.truncate(write);

        for i in 0..write.saturating_sub(1) {
            let gap = self.t_lo[i + 1] - self.t_hi[i];
            if gap > 0.0 && gap < heal_gaps {
                let mid = (self.t_hi[i] + self.t_lo[i + 1]) / 2.0;
                self.t_hi[i] = mid;
                self.t_lo[i + 1] = mid;
            }
        }

        before - write
    }

    /// Split into maximal runs where `t_lo[i + 1] <= t_hi[i]` holds throughout.
    pub fn get_validity_intervals(&self) -> Vec<ValidityRun> {
        let mut runs = Vec::new();
        if self.is_empty() {
            return runs;
        }
        let mut start = 0;
        for i in 1..=self.len() {
            let gap = i == self.len() || self.t_lo[i] - self.t_hi[i - 1] > 0.0;
            if gap {
                runs.push(ValidityRun {
                    start,
                    end: i,
                    t_lo: self.t_lo[start],
                    t_hi: self.t_hi[i - 1],
                });
                start = i;
            }
        }
        runs
    }
}

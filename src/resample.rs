//! Continuous evaluation and coarser resampling of a cleaned series.
//!
//! [`Evaluator`] is the contract a smoothing component fulfils: given a time
//! it returns a value, or `None` where the source series had no coverage,
//! and it can produce a coarser evaluator whose values are bin averages.
//!
//! [`LinearSampler`] is the reference implementation. It interpolates
//! linearly between samples inside each validity run and holds the edge
//! value out to the run's validity bounds.

use crate::error::{Error, Result};
use crate::measurements::Measurements;

/// Continuous view over a series.
pub trait Evaluator {
    /// Value at `t`, or `None` outside every covered interval.
    fn value_at(&self, t: f64) -> Option<f64>;

    /// Evaluator of bin-integral averages with bins of about `resolution / 2`.
    fn resample(&self, resolution: f64) -> Result<Box<dyn Evaluator>>;
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    t0: f64,
    t1: f64,
    knots_t: Vec<f64>,
    knots_y: Vec<f64>,
}

impl Segment {
    fn value_at(&self, t: f64) -> f64 {
        let idx = self.knots_t.partition_point(|&k| k <= t);
        if idx == 0 {
            return self.knots_y[0];
        }
        if idx == self.knots_t.len() {
            return self.knots_y[idx - 1];
        }
        lerp(
            self.knots_t[idx - 1],
            self.knots_y[idx - 1],
            self.knots_t[idx],
            self.knots_y[idx],
            t,
        )
    }

    /// Exact integral of the piecewise-linear interpolant over `[a, b]`.
    fn integral(&self, a: f64, b: f64) -> f64 {
        let mut area = 0.0;
        for k in 0..self.knots_t.len().saturating_sub(1) {
            let (x0, y0) = (self.knots_t[k], self.knots_y[k]);
            let (x1, y1) = (self.knots_t[k + 1], self.knots_y[k + 1]);
            let lo = a.max(x0);
            let hi = b.min(x1);
            if hi > lo {
                let y_lo = lerp(x0, y0, x1, y1, lo);
                let y_hi = lerp(x0, y0, x1, y1, hi);
                area += (hi - lo) * (y_lo + y_hi) / 2.0;
            }
        }
        area
    }

    fn resample(&self, resolution: f64) -> Segment {
        let width = self.t1 - self.t0;
        let bins = ((width / resolution * 2.0).round() as usize).max(1);
        let bin = width / bins as f64;

        let edges: Vec<f64> = (0..=bins)
            .map(|k| if k == bins { self.t1 } else { self.t0 + k as f64 * bin })
            .collect();
        let means: Vec<f64> = edges
            .windows(2)
            .map(|e| {
                if e[1] > e[0] {
                    self.integral(e[0], e[1]) / (e[1] - e[0])
                } else {
                    self.value_at(e[0])
                }
            })
            .collect();

        let mut knots_y = Vec::with_capacity(edges.len());
        knots_y.push(means[0]);
        for pair in means.windows(2) {
            knots_y.push((pair[0] + pair[1]) / 2.0);
        }
        knots_y.push(means[bins - 1]);

        Segment {
            t0: self.t0,
            t1: self.t1,
            knots_t: edges,
            knots_y,
        }
    }
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    let dx = x1 - x0;
    if dx <= 0.0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / dx
}

/// Piecewise-linear evaluator, one segment per validity run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearSampler {
    segments: Vec<Segment>,
}

impl LinearSampler {
    /// Build from a cleaned series.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidSample`: the series still holds NaN values
    pub fn for_measurements(m: &Measurements) -> Result<Self> {
        if let Some(index) = m.data().iter().position(|v| v.is_nan()) {
            return Err(Error::InvalidSample { index });
        }

        let (t, y) = (m.t(), m.data());
        let mut segments = Vec::new();
        for run in m.get_validity_intervals() {
            let mut knots_t = Vec::with_capacity(run.len() + 2);
            let mut knots_y = Vec::with_capacity(run.len() + 2);
            if run.t_lo < t[run.start] {
                knots_t.push(run.t_lo);
                knots_y.push(y[run.start]);
            }
            knots_t.extend_from_slice(&t[run.start..run.end]);
            knots_y.extend_from_slice(&y[run.start..run.end]);
            if run.t_hi > t[run.end - 1] {
                knots_t.push(run.t_hi);
                knots_y.push(y[run.end - 1]);
            }
            segments.push(Segment {
                t0: run.t_lo,
                t1: run.t_hi,
                knots_t,
                knots_y,
            });
        }
        Ok(Self { segments })
    }

    /// Covered intervals, one per validity run.
    pub fn coverage(&self) -> Vec<(f64, f64)> {
        self.segments.iter().map(|s| (s.t0, s.t1)).collect()
    }

    /// Evaluate at every time in `times`.
    pub fn values_at(&self, times: &[f64]) -> Vec<Option<f64>> {
        times.iter().map(|&t| self.value_at(t)).collect()
    }

    /// Coarser sampler of bin averages; see [`Evaluator::resample`].
    pub fn resampled(&self, resolution: f64) -> Result<LinearSampler> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Error::InvalidResolution(resolution));
        }
        Ok(Self {
            segments: self
                .segments
                .iter()
                .map(|s| s.resample(resolution))
                .collect(),
        })
    }

    /// Like [`LinearSampler::resampled`], also returning the bin-edge knots as
    /// a series.
    pub fn resampled_with_data(&self, resolution: f64) -> Result<(LinearSampler, Measurements)> {
        let out = self.resampled(resolution)?;
        let t: Vec<f64> = out.segments.iter().flat_map(|s| s.knots_t.iter().copied()).collect();
        let y: Vec<f64> = out.segments.iter().flat_map(|s| s.knots_y.iter().copied()).collect();
        let knots = Measurements::from_simple(&t, &y, None)?;
        Ok((out, knots))
    }
}

impl Evaluator for LinearSampler {
    fn value_at(&self, t: f64) -> Option<f64> {
        self.segments
            .iter()
            .find(|s| s.t0 <= t && t <= s.t1)
            .map(|s| s.value_at(t))
    }

    fn resample(&self, resolution: f64) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(self.resampled(resolution)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn ramp_with_gap() -> Measurements {
        let t: Vec<f64> = (0..10).chain(20..30).map(|i| i as f64).collect();
        Measurements::from_simple(&t, &t, Some(2.0)).unwrap()
    }

    #[test]
    fn rejects_uncleaned() {
        let m = Measurements::from_simple(&[0.0, 1.0], &[1.0, f64::NAN], None).unwrap();
        assert!(matches!(
            LinearSampler::for_measurements(&m),
            Err(Error::InvalidSample { index: 1 })
        ));
    }

    #[test]
    fn value_at_interpolates_within_runs() {
        let sampler = LinearSampler::for_measurements(&ramp_with_gap()).unwrap();
        assert_eq!(sampler.coverage(), vec![(-0.5, 10.0), (19.0, 29.5)]);
        assert!(close(sampler.value_at(2.25).unwrap(), 2.25));
        assert!(close(sampler.value_at(25.5).unwrap(), 25.5));
        assert_eq!(sampler.value_at(-0.25), Some(0.0));
        assert_eq!(sampler.value_at(9.5), Some(9.0));
        assert_eq!(sampler.value_at(15.0), None);
        assert_eq!(sampler.values_at(&[1.0, 15.0]), vec![Some(1.0), None]);
    }

    #[test]
    fn resample_constant_stays_constant() {
        let t: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let m = Measurements::from_simple(&t, &vec![3.0; 50], None).unwrap();
        let coarse = LinearSampler::for_measurements(&m)
            .unwrap()
            .resample(1.0)
            .unwrap();
        for probe in [0.0, 1.3, 2.75, 4.9] {
            assert!(close(coarse.value_at(probe).unwrap(), 3.0));
        }
        assert_eq!(coarse.value_at(6.0), None);
    }

    #[test]
    fn resample_ramp_edges_are_bin_averages() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let m = Measurements::from_simple(&t, &t, None).unwrap();
        let sampler = LinearSampler::for_measurements(&m).unwrap();
        let (coarse, knots) = sampler.resampled_with_data(2.0).unwrap();
        // [-0.5, 9.5] splits into ten unit bins; interior edges sit on the ramp
        assert!(close(coarse.value_at(1.5).unwrap(), 1.5));
        assert!(close(coarse.value_at(6.5).unwrap(), 6.5));
        assert_eq!(knots.len(), 11);
        assert!(close(knots.t()[0], -0.5));
        assert!(close(knots.t()[10], 9.5));
    }

    #[test]
    fn resample_keeps_gaps() {
        let sampler = LinearSampler::for_measurements(&ramp_with_gap()).unwrap();
        let coarse = sampler.resampled(4.0).unwrap();
        assert_eq!(coarse.coverage(), sampler.coverage());
        assert_eq!(coarse.value_at(15.0), None);
        assert!(coarse.value_at(25.0).is_some());
    }

    #[test]
    fn resample_rejects_bad_resolution() {
        let sampler = LinearSampler::for_measurements(&ramp_with_gap()).unwrap();
        assert!(sampler.resampled(0.0).is_err());
    }
}

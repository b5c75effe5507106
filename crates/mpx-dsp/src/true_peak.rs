//! MPX true-peak estimation
//!
//! Inter-sample peaks are reconstructed by Catmull-Rom interpolation over
//! a four-sample history at 4x or 8x, then held by a hold-and-release
//! envelope with broadcast-meter ballistics.

use mpx_core::Sample;

/// Catmull-Rom spline evaluated at t in [0, 1] between p1 and p2
#[inline]
fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Oversampling true-peak interpolator.
///
/// Keeps the last four samples; once warm, each new sample yields the
/// maximum absolute value over `factor + 1` interpolation points across
/// the central segment. During warm-up it reports `|x|` directly.
#[derive(Debug, Clone, Default)]
pub struct TruePeakInterpolator {
    history: [f64; 4],
    warm: u8,
}

impl TruePeakInterpolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one sample with the given oversampling factor.
    /// Factors other than 8 coerce to 4.
    pub fn process(&mut self, x: Sample, factor: u32) -> f64 {
        let factor = if factor == 8 { 8 } else { 4 };

        if self.warm < 4 {
            for slot in &mut self.history[self.warm as usize..] {
                *slot = x;
            }
            self.warm += 1;
            return x.abs();
        }

        self.history[0] = self.history[1];
        self.history[1] = self.history[2];
        self.history[2] = self.history[3];
        self.history[3] = x;

        let [p0, p1, p2, p3] = self.history;

        let mut max_abs: f64 = 0.0;
        for k in 0..=factor {
            let t = k as f64 / factor as f64;
            max_abs = max_abs.max(catmull_rom(p0, p1, p2, p3, t).abs());
        }
        max_abs
    }

    pub fn reset(&mut self) {
        self.history = [0.0; 4];
        self.warm = 0;
    }
}

/// Peak hold-and-release envelope.
///
/// Holds a new maximum for `hold_ms`, then releases exponentially with
/// `release_ms`; an input overtaking the decayed value restarts the hold.
#[derive(Debug, Clone)]
pub struct PeakHoldRelease {
    value: f64,
    hold_samples: usize,
    hold_counter: usize,
    release_coeff: f64,
}

impl PeakHoldRelease {
    pub fn new(sample_rate: f64, hold_ms: f64, release_ms: f64) -> Self {
        let hold_samples = ((sample_rate * hold_ms / 1000.0) as usize).max(1);
        let tau = (release_ms / 1000.0).max(0.001);
        Self {
            value: 0.0,
            hold_samples,
            hold_counter: 0,
            release_coeff: (-1.0 / (sample_rate * tau)).exp(),
        }
    }

    pub fn process(&mut self, x: Sample) -> f64 {
        if x >= self.value {
            self.value = x;
            self.hold_counter = self.hold_samples;
            return self.value;
        }
        if self.hold_counter > 0 {
            self.hold_counter -= 1;
            return self.value;
        }
        self.value *= self.release_coeff;
        if x > self.value {
            self.value = x;
            self.hold_counter = self.hold_samples;
        }
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.hold_counter = 0;
    }
}

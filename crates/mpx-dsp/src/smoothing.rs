//! One-pole smoothing helpers
//!
//! The analyzer leans on exponential (RC-style) smoothing everywhere:
//! leaky power estimators, PLL error filtering, IQ magnitude averaging,
//! and the slow display ballistics of the emitted scalars.

/// Per-sample coefficient for a one-pole IIR with time constant `tau_s`.
///
/// `state += (input - state) * alpha` then settles with the given tau.
#[inline]
pub fn tau_alpha(sample_rate: f64, tau_s: f64) -> f64 {
    if tau_s <= 0.0 {
        return 1.0;
    }
    let dt = 1.0 / sample_rate;
    1.0 - (-(dt / tau_s)).exp()
}

/// Interval-rate display smoother with fixed retain factor.
///
/// Seeds on the first update, then blends `retain`/`1 - retain` per
/// update. Runs at the emit cadence, not the sample rate.
#[derive(Debug, Clone)]
pub struct DisplaySmoother {
    retain: f64,
    state: Option<f64>,
}

impl DisplaySmoother {
    pub fn new(retain: f64) -> Self {
        Self {
            retain,
            state: None,
        }
    }

    /// Feed one value, returning the smoothed display value.
    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.state {
            None => value,
            Some(prev) => prev * self.retain + value * (1.0 - self.retain),
        };
        self.state = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

//! Type-II second-order carrier PLL
//!
//! Tracks the phase of a bandpass-filtered carrier against a free-running
//! nominal step. The loop filter is the standard discrete-time
//! proportional-plus-integrator design derived from a chosen noise
//! bandwidth and damping, assuming a multiplier phase detector
//! (Kd = 0.5) and unity VCO gain.

use std::f64::consts::TAU;

use mpx_core::Sample;

/// Proportional and integral loop gains
#[derive(Debug, Clone, Copy)]
pub struct LoopGains {
    pub kp: f64,
    pub ki: f64,
}

impl LoopGains {
    /// Design gains for a loop bandwidth in Hz and damping factor.
    pub fn design(sample_rate: f64, loop_bw_hz: f64, zeta: f64) -> Self {
        let t = 1.0 / sample_rate;
        const KD: f64 = 0.5;
        const K0: f64 = 1.0;

        let theta = (loop_bw_hz * t) / (zeta + 0.25 / zeta);
        let d = 1.0 + 2.0 * zeta * theta + theta * theta;

        let kp = (4.0 * zeta * theta) / d / (KD * K0);
        let ki = (4.0 * theta * theta) / d / (KD * K0);

        Self { kp, ki }
    }
}

/// Carrier PLL state.
///
/// Invariants: phase stays in [0, 2pi); the integrator is clamped to
/// +/- the configured maximum pull expressed in radians per sample.
#[derive(Debug, Clone)]
pub struct CarrierPll {
    phase: f64,
    w0: f64,
    integrator: f64,
    err_lp: f64,
    err_alpha: f64,
    gains: LoopGains,
    max_pull: f64,
}

impl CarrierPll {
    pub fn new(
        sample_rate: f64,
        carrier_hz: f64,
        loop_bw_hz: f64,
        zeta: f64,
        max_pull_hz: f64,
    ) -> Self {
        let rad_per_hz = TAU / sample_rate;
        Self {
            phase: 0.0,
            w0: rad_per_hz * carrier_hz,
            integrator: 0.0,
            err_lp: 0.0,
            // 10 ms phase-error smoothing
            err_alpha: crate::smoothing::tau_alpha(sample_rate, 0.010),
            gains: LoopGains::design(sample_rate, loop_bw_hz, zeta),
            max_pull: max_pull_hz * rad_per_hz,
        }
    }

    #[inline]
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn gains(&self) -> LoopGains {
        self.gains
    }

    /// Feed the phase detector: multiply the filtered carrier by -sin of
    /// the current reference phase, normalize by the carrier RMS, and
    /// smooth. Returns the smoothed error for inspection.
    #[inline]
    pub fn detect(&mut self, filtered: Sample, rms: f64) -> f64 {
        let err = filtered * -self.phase.sin();
        let err_norm = err / (rms + 1e-9);
        self.err_lp += (err_norm - self.err_lp) * self.err_alpha;
        self.err_lp
    }

    /// Advance one sample with the loop closed.
    #[inline]
    pub fn advance_locked(&mut self) {
        self.integrator += self.gains.ki * self.err_lp;
        self.integrator = self.integrator.clamp(-self.max_pull, self.max_pull);

        let freq_offset = self.gains.kp * self.err_lp + self.integrator;
        self.phase = wrap_phase(self.phase + self.w0 + freq_offset);
    }

    /// Advance one sample at the nominal rate (loop open).
    #[inline]
    pub fn advance_free(&mut self) {
        self.phase = wrap_phase(self.phase + self.w0);
    }

    /// Force the reference phase (used to slave the 57 kHz loop to the
    /// pilot-derived phase while the pilot is present).
    #[inline]
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = wrap_phase(phase);
    }

    /// Clear the loop filter state, keeping the phase.
    pub fn reset_loop(&mut self) {
        self.integrator = 0.0;
        self.err_lp = 0.0;
    }
}

/// Wrap a phase into [0, 2pi)
#[inline]
pub fn wrap_phase(mut phase: f64) -> f64 {
    while phase >= TAU {
        phase -= TAU;
    }
    while phase < 0.0 {
        phase += TAU;
    }
    phase
}

//! ITU-R BS.412 MPX power measurement
//!
//! 60-second sliding integration of instantaneous MPX power, reported in
//! dB relative to the power of a sinusoid with +/- 19 kHz deviation.
//! The input must already be scaled to kHz of deviation (MeterMPXScale
//! maps full scale to deviation); otherwise the reading carries a
//! constant calibration offset.

use mpx_core::Sample;

use crate::smoothing::tau_alpha;

/// Power of a +/- 19 kHz deviation sine: (19^2)/2
const REF_POWER: f64 = 180.5;

/// Retain factor for the slow display smoothing of the dBr readout
const DISPLAY_RETAIN: f64 = 0.98;

#[derive(Debug, Clone)]
pub struct Bs412Meter {
    power: f64,
    alpha: f64,
    display: Option<f64>,
}

impl Bs412Meter {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            power: 0.0,
            alpha: tau_alpha(sample_rate, 60.0),
            display: None,
        }
    }

    /// Integrate one deviation-scaled sample.
    #[inline]
    pub fn process(&mut self, scaled: Sample) {
        let instant = scaled * scaled;
        self.power += (instant - self.power) * self.alpha;
    }

    /// Instantaneous integrated power in dBr.
    pub fn dbr(&self) -> f64 {
        10.0 * ((self.power + 1e-12) / REF_POWER).log10()
    }

    /// Display reading: dBr smoothed 50:1, updated once per call.
    /// Intended to run at the emit cadence, not the sample rate.
    pub fn display_dbr(&mut self) -> f64 {
        let raw = self.dbr();
        let next = match self.display {
            None => raw,
            Some(prev) => prev * DISPLAY_RETAIN + raw * (1.0 - DISPLAY_RETAIN),
        };
        self.display = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.power = 0.0;
        self.display = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    #[test]
    fn test_reference_tone_reads_zero_dbr() {
        // A sine with amplitude 19 (= +/-19 kHz deviation after scaling)
        // must integrate to 0 dBr. Run at a low rate so several time
        // constants fit in a quick test; the 60 s tau is rate-invariant.
        let sample_rate = 8000.0;
        let mut meter = Bs412Meter::new(sample_rate);

        let omega = TAU * 190.0 / sample_rate;
        let samples = (sample_rate * 300.0) as usize;
        for i in 0..samples {
            meter.process(19.0 * (omega * i as f64).sin());
        }

        let dbr = meter.dbr();
        assert!(dbr.abs() < 0.1, "reference tone reads {dbr} dBr");
    }

    #[test]
    fn test_silence_floors_near_epsilon() {
        let mut meter = Bs412Meter::new(192000.0);
        for _ in 0..1000 {
            meter.process(0.0);
        }
        // 10*log10(1e-12 / 180.5)
        let dbr = meter.dbr();
        assert!(dbr < -140.0, "silence reads {dbr} dBr");
    }

    #[test]
    fn test_display_seeds_then_smooths() {
        let mut meter = Bs412Meter::new(192000.0);
        meter.process(19.0);
        let first = meter.display_dbr();
        assert!((first - meter.dbr()).abs() < 1e-9);

        // Jump the integrated power; the display must move only 2%
        for _ in 0..100000 {
            meter.process(190.0);
        }
        let second = meter.display_dbr();
        let raw = meter.dbr();
        assert!((second - (first * 0.98 + raw * 0.02)).abs() < 1e-9);
    }
}

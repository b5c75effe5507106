//! Pilot/RDS demodulator
//!
//! Two coupled carrier recoveries drive two IQ magnitude estimators:
//!
//! - A PLL on the 19 kHz bandpass output tracks the stereo pilot. Its
//!   loop only closes while the pilot-presence gate is asserted;
//!   otherwise the reference free-runs at nominal rate.
//! - A second PLL locks directly on the 57 kHz bandpass output. While
//!   the pilot is present it is slaved to 3x the pilot phase every
//!   sample; when the pilot drops it runs autonomously.
//!
//! The RDS reference is a crossfade of the two 57 kHz references driven
//! by a 50 ms blend factor, so regime switches stay phase-continuous.

use mpx_core::Sample;

use crate::biquad::BiquadCoeffs;
use crate::pll::{CarrierPll, wrap_phase};
use crate::smoothing::tau_alpha;
use crate::{BiquadTDF2, MonoProcessor};

const PILOT_HZ: f64 = 19_000.0;
const RDS_HZ: f64 = 57_000.0;
const BANDPASS_Q: f64 = 20.0;
const IQ_LPF_Q: f64 = 0.707;

/// Loop design targets: 1..5 Hz is typical for carrier recovery here
const LOOP_BW_HZ: f64 = 2.0;
const ZETA: f64 = 0.707;
const PILOT_MAX_PULL_HZ: f64 = 50.0;
// Wider pull for the 57 kHz loop, the carrier sits higher
const RDS_MAX_PULL_HZ: f64 = 100.0;

/// Pilot gate: pilot RMS must exceed this fraction of broadband MPX RMS
const PILOT_REL_THRESH: f64 = 0.01;
const PRESENT_HOLD_SAMPLES: u32 = 2000;
const ABSENT_HOLD_SAMPLES: u32 = 8000;

/// Decay applied to the pilot magnitude accumulator while the gate is
/// off, forcing the reported level toward zero
const PILOT_MAG_DECAY: f64 = 0.9995;

#[derive(Debug, Clone)]
pub struct MpxDemodulator {
    // Carrier isolation
    bpf_pilot: BiquadTDF2,
    bpf_rds: BiquadTDF2,

    // IQ lowpass pairs
    lpf_i_pilot: BiquadTDF2,
    lpf_q_pilot: BiquadTDF2,
    lpf_i_rds: BiquadTDF2,
    lpf_q_rds: BiquadTDF2,

    pilot_pll: CarrierPll,
    rds_pll: CarrierPll,

    // Leaky power estimators
    mpx_pow: f64,
    mpx_pow_alpha: f64,
    pilot_pow: f64,
    pilot_pow_alpha: f64,
    rds_pow: f64,
    rds_pow_alpha: f64,

    // Mean-square magnitude accumulators
    mean_sq_pilot: f64,
    mean_sq_rds: f64,
    rms_alpha: f64,

    // Pilot-presence gate
    pilot_present: bool,
    present_count: u32,
    absent_count: u32,

    /// RDS reference blend: 1.0 = pilot-derived (3x), 0.0 = 57 kHz PLL
    blend: f64,
    blend_alpha: f64,

    // Outputs
    pilot_mag: f64,
    rds_mag: f64,
}

impl MpxDemodulator {
    pub fn new(sample_rate: f64) -> Self {
        let bandpass = |freq| {
            BiquadTDF2::with_coeffs(BiquadCoeffs::bandpass(freq, BANDPASS_Q, sample_rate), sample_rate)
        };
        let lowpass = |freq| {
            BiquadTDF2::with_coeffs(BiquadCoeffs::lowpass(freq, IQ_LPF_Q, sample_rate), sample_rate)
        };

        let pilot_pll = CarrierPll::new(sample_rate, PILOT_HZ, LOOP_BW_HZ, ZETA, PILOT_MAX_PULL_HZ);
        let rds_pll = CarrierPll::new(sample_rate, RDS_HZ, LOOP_BW_HZ, ZETA, RDS_MAX_PULL_HZ);

        log::info!(
            "pilot PLL: bw {:.2} Hz -> kp {:.10} ki {:.10}",
            LOOP_BW_HZ,
            pilot_pll.gains().kp,
            pilot_pll.gains().ki
        );
        log::info!(
            "57 kHz PLL: bw {:.2} Hz -> kp {:.10} ki {:.10}",
            LOOP_BW_HZ,
            rds_pll.gains().kp,
            rds_pll.gains().ki
        );
        log::info!("RDS dual-mode reference: pilot x3 when present, 57 kHz PLL when absent");

        Self {
            bpf_pilot: bandpass(PILOT_HZ),
            bpf_rds: bandpass(RDS_HZ),
            lpf_i_pilot: lowpass(50.0),
            lpf_q_pilot: lowpass(50.0),
            lpf_i_rds: lowpass(2400.0),
            lpf_q_rds: lowpass(2400.0),
            pilot_pll,
            rds_pll,
            mpx_pow: 1e-6,
            mpx_pow_alpha: tau_alpha(sample_rate, 0.100),
            pilot_pow: 1e-6,
            pilot_pow_alpha: tau_alpha(sample_rate, 0.050),
            rds_pow: 1e-6,
            rds_pow_alpha: tau_alpha(sample_rate, 0.050),
            mean_sq_pilot: 0.0,
            mean_sq_rds: 0.0,
            rms_alpha: tau_alpha(sample_rate, 0.100),
            pilot_present: false,
            present_count: 0,
            absent_count: 0,
            blend: 1.0,
            blend_alpha: tau_alpha(sample_rate, 0.050),
            pilot_mag: 0.0,
            rds_mag: 0.0,
        }
    }

    /// Process one measurement-path sample.
    pub fn process(&mut self, sample: Sample) {
        // Broadband MPX RMS for pilot-presence gating
        self.mpx_pow += (sample * sample - self.mpx_pow) * self.mpx_pow_alpha;
        let mpx_rms = self.mpx_pow.max(1e-12).sqrt();

        // Pilot bandpass feeds the PLL detector and the pilot RMS
        let pilot_filtered = self.bpf_pilot.process_sample(sample);
        self.pilot_pow += (pilot_filtered * pilot_filtered - self.pilot_pow) * self.pilot_pow_alpha;
        let pilot_rms = self.pilot_pow.max(1e-12).sqrt();

        self.update_gate(pilot_rms, mpx_rms);

        // Pilot PLL: detector always runs, the loop only closes while
        // the gate is asserted
        self.pilot_pll.detect(pilot_filtered, pilot_rms);
        if self.pilot_present {
            self.pilot_pll.advance_locked();
        } else {
            self.pilot_pll.advance_free();
            self.mean_sq_pilot *= PILOT_MAG_DECAY;
        }

        // Pilot IQ magnitude on the raw MPX sample
        let (p_sin, p_cos) = self.pilot_pll.phase().sin_cos();
        let i_p = self.lpf_i_pilot.process_sample(sample * p_cos);
        let q_p = self.lpf_q_pilot.process_sample(sample * p_sin);
        let mag_sq_pilot = i_p * i_p + q_p * q_p;
        self.mean_sq_pilot += (mag_sq_pilot - self.mean_sq_pilot) * self.rms_alpha;
        self.pilot_mag = if self.pilot_present {
            self.mean_sq_pilot.max(0.0).sqrt()
        } else {
            0.0
        };

        // Blend tracks the gate with a 50 ms time constant
        let target = if self.pilot_present { 1.0 } else { 0.0 };
        self.blend += (target - self.blend) * self.blend_alpha;

        // Pilot-derived 57 kHz reference
        let phase57_pilot = wrap_phase(3.0 * self.pilot_pll.phase());
        let (s57_p, c57_p) = phase57_pilot.sin_cos();

        // 57 kHz fallback PLL on the 57 kHz bandpass output
        let rds_filtered = self.bpf_rds.process_sample(sample);
        self.rds_pow += (rds_filtered * rds_filtered - self.rds_pow) * self.rds_pow_alpha;
        let rds_rms = self.rds_pow.max(1e-12).sqrt();

        if self.pilot_present {
            // Slave to the pilot-derived phase so switchover is seamless
            self.rds_pll.set_phase(phase57_pilot);
            self.rds_pll.reset_loop();
        } else {
            self.rds_pll.detect(rds_filtered, rds_rms);
            self.rds_pll.advance_locked();
        }

        let (s57_r, c57_r) = self.rds_pll.phase().sin_cos();

        // Crossfaded RDS reference
        let b = self.blend;
        let c57 = b * c57_p + (1.0 - b) * c57_r;
        let s57 = b * s57_p + (1.0 - b) * s57_r;

        // RDS IQ on the raw MPX sample for consistent calibration
        let i_r = self.lpf_i_rds.process_sample(sample * c57);
        let q_r = self.lpf_q_rds.process_sample(sample * s57);
        let mag_sq_rds = i_r * i_r + q_r * q_r;
        self.mean_sq_rds += (mag_sq_rds - self.mean_sq_rds) * self.rms_alpha;
        self.rds_mag = self.mean_sq_rds.max(0.0).sqrt();
    }

    fn update_gate(&mut self, pilot_rms: f64, mpx_rms: f64) {
        let present_now = mpx_rms > 1e-9 && pilot_rms / (mpx_rms + 1e-9) > PILOT_REL_THRESH;

        if present_now {
            self.present_count += 1;
            self.absent_count = 0;
            if !self.pilot_present && self.present_count > PRESENT_HOLD_SAMPLES {
                self.pilot_present = true;
                self.pilot_pll.reset_loop();
                // Align the 57 kHz loop to the pilot-derived phase to
                // avoid a reference jump
                self.rds_pll.set_phase(3.0 * self.pilot_pll.phase());
                self.rds_pll.reset_loop();
                log::info!("pilot gate: present");
            }
        } else {
            self.absent_count += 1;
            self.present_count = 0;
            if self.pilot_present && self.absent_count > ABSENT_HOLD_SAMPLES {
                self.pilot_present = false;
                self.pilot_pll.reset_loop();
                self.rds_pll.reset_loop();
                log::info!("pilot gate: absent");
            }
        }
    }

    /// Reported pilot magnitude (zero while the gate is off)
    #[inline]
    pub fn pilot_magnitude(&self) -> f64 {
        self.pilot_mag
    }

    /// Reported RDS subcarrier magnitude
    #[inline]
    pub fn rds_magnitude(&self) -> f64 {
        self.rds_mag
    }

    #[inline]
    pub fn pilot_present(&self) -> bool {
        self.pilot_present
    }

    /// Current pilot PLL phase in [0, 2pi)
    #[inline]
    pub fn pilot_phase(&self) -> f64 {
        self.pilot_pll.phase()
    }

    /// Current RDS reference blend factor in [0, 1]
    #[inline]
    pub fn blend(&self) -> f64 {
        self.blend
    }
}

//! mpx-dsp: DSP processors for the MPX analyzer
//!
//! Real-time state machines that turn a raw MPX baseband stream into the
//! analyzer's measurements:
//! - `biquad` - TDF-II biquad filters (bandpass, lowpass)
//! - `dc_block` - single-pole DC blocker
//! - `smoothing` - one-pole time-constant helpers and display smoothing
//! - `pll` - type-II carrier PLL
//! - `demod` - pilot/RDS demodulator (coupled PLLs, IQ magnitude, gate)
//! - `true_peak` - Catmull-Rom true-peak estimator + hold/release envelope
//! - `bs412` - ITU-R BS.412 60 s MPX power integrator
//! - `spectrum` - windowed FFT spectrum with attack/decay smoothing
//!
//! All processors are created once at startup and mutated per sample;
//! nothing on the per-sample path allocates or fails.

pub mod biquad;
pub mod bs412;
pub mod dc_block;
pub mod demod;
pub mod pll;
pub mod smoothing;
pub mod spectrum;
pub mod true_peak;

pub use biquad::{BiquadCoeffs, BiquadTDF2};
pub use bs412::Bs412Meter;
pub use dc_block::DcBlocker;
pub use demod::MpxDemodulator;
pub use pll::{CarrierPll, LoopGains};
pub use smoothing::{DisplaySmoother, tau_alpha};
pub use spectrum::SpectrumBuilder;
pub use true_peak::{PeakHoldRelease, TruePeakInterpolator};

use mpx_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send {
    /// Reset processor state
    fn reset(&mut self);
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

//! Per-sample analysis chain and output cadence
//!
//! Owns every piece of DSP state. Each stereo frame flows through
//! channel selection, preamp, DC blocking, the calibration gains, and
//! then fans out into the BS.412 integrator, the true-peak path, the
//! pilot/RDS demodulator, and the spectrum accumulator. A sample
//! counter drives record emission; a record is held one interval when
//! the FFT frame has not filled yet.

use mpx_core::{AnalyzerConfig, StereoSample};
use mpx_dsp::{
    Bs412Meter, BiquadTDF2, DcBlocker, DisplaySmoother, MonoProcessor, MpxDemodulator,
    PeakHoldRelease, SpectrumBuilder, TruePeakInterpolator,
};

use crate::emit::OutputFrame;
use crate::input::ChannelSelector;

/// Fixed preamp applied after channel selection
const PREAMP_GAIN: f64 = 3.0;

/// Requested peak-path lowpass cutoff; clamped under Nyquist
const PEAK_LPF_HZ: f64 = 100_000.0;

/// Envelope ballistics for the MPX peak readout
const PEAK_HOLD_MS: f64 = 200.0;
const PEAK_RELEASE_MS: f64 = 1500.0;

/// Interval-rate smoothing retain for the pilot/RDS readouts
const SCALAR_DISPLAY_RETAIN: f64 = 0.90;

pub struct Analyzer {
    sample_rate: f64,
    cfg: AnalyzerConfig,

    selector: ChannelSelector,
    dc_blocker: DcBlocker,
    demod: MpxDemodulator,
    peak_lpf: BiquadTDF2,
    true_peak: TruePeakInterpolator,
    envelope: PeakHoldRelease,
    bs412: Bs412Meter,
    spectrum: SpectrumBuilder,

    pilot_display: DisplaySmoother,
    rds_display: DisplaySmoother,

    emit_threshold: usize,
    counter: usize,
    held_peak: f64,
}

impl Analyzer {
    pub fn new(sample_rate: f64, fft_size: usize, cfg: AnalyzerConfig) -> Self {
        let spectrum = SpectrumBuilder::new(fft_size);
        if spectrum.fft_size() != fft_size {
            log::warn!("fft size {fft_size} coerced to {}", spectrum.fft_size());
        }

        let cutoff = PEAK_LPF_HZ.min(0.45 * sample_rate);
        log::info!("peak-path LPF cutoff: {cutoff:.1} Hz");
        let mut peak_lpf = BiquadTDF2::new(sample_rate);
        peak_lpf.set_lowpass(cutoff, 0.707);

        let emit_threshold = emit_threshold(sample_rate, cfg.spectrum_send_interval_ms);

        Self {
            sample_rate,
            cfg,
            selector: ChannelSelector::new(),
            dc_blocker: DcBlocker::new(),
            demod: MpxDemodulator::new(sample_rate),
            peak_lpf,
            true_peak: TruePeakInterpolator::new(),
            envelope: PeakHoldRelease::new(sample_rate, PEAK_HOLD_MS, PEAK_RELEASE_MS),
            bs412: Bs412Meter::new(sample_rate),
            spectrum,
            pilot_display: DisplaySmoother::new(SCALAR_DISPLAY_RETAIN),
            rds_display: DisplaySmoother::new(SCALAR_DISPLAY_RETAIN),
            emit_threshold,
            counter: 0,
            held_peak: 0.0,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.cfg
    }

    /// Replace the configuration snapshot wholesale; takes effect at
    /// the next sample.
    pub fn set_config(&mut self, cfg: AnalyzerConfig) {
        self.emit_threshold = emit_threshold(self.sample_rate, cfg.spectrum_send_interval_ms);
        self.cfg = cfg;
    }

    /// Process one stereo frame; yields a record on the emit cadence.
    pub fn process_frame(&mut self, frame: StereoSample) -> Option<OutputFrame> {
        let raw = self.selector.select(frame) * PREAMP_GAIN;

        // DC removal before any gain or measurement
        let v = self.dc_blocker.process_sample(raw);
        let v_meter = v * self.cfg.meter_gain;
        let v_spec = v * self.cfg.spectrum_gain;

        // BS.412 integrates the deviation-scaled signal
        self.bs412.process(v_meter * self.cfg.meter_mpx_scale);

        // True-peak path, optionally band-limited to ~100 kHz
        let v_peak = if self.cfg.mpx_lpf_enabled {
            self.peak_lpf.process_sample(v_meter)
        } else {
            v_meter
        };
        let tp = self.true_peak.process(v_peak, self.cfg.true_peak_factor);
        self.held_peak = self.envelope.process(tp);

        self.demod.process(v_meter);
        self.spectrum.push(v_spec);

        self.counter += 1;
        if self.counter < self.emit_threshold {
            return None;
        }
        self.counter = 0;

        // Display ballistics run on the emit cadence even when the
        // record itself is held for the FFT to fill
        let pilot = self
            .pilot_display
            .update(self.demod.pilot_magnitude() * self.cfg.meter_pilot_scale);
        let rds = self
            .rds_display
            .update(self.demod.rds_magnitude() * self.cfg.meter_rds_scale);
        let bs412_dbr = self.bs412.display_dbr();
        let mpx_peak = self.held_peak * self.cfg.meter_mpx_scale;

        if !self.spectrum.is_full() {
            return None;
        }

        let spectrum = self
            .spectrum
            .analyze(self.cfg.spectrum_attack, self.cfg.spectrum_decay)
            .to_vec();

        Some(OutputFrame {
            pilot,
            rds,
            mpx_peak,
            bs412_dbr,
            spectrum,
        })
    }
}

fn emit_threshold(sample_rate: f64, interval_ms: u32) -> usize {
    (((sample_rate as usize) * interval_ms as usize) / 1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    const SAMPLE_RATE: f64 = 192000.0;

    fn pilot_frame(i: usize) -> StereoSample {
        let x = 0.1 * (TAU * 19000.0 / SAMPLE_RATE * i as f64).sin();
        StereoSample::new(x, 0.0)
    }

    #[test]
    fn test_emit_cadence() {
        // 30 ms at 192 kHz = 5760 samples per record
        let mut analyzer = Analyzer::new(SAMPLE_RATE, 512, AnalyzerConfig::default());

        let mut records = 0;
        for i in 0..(SAMPLE_RATE as usize) {
            if let Some(frame) = analyzer.process_frame(pilot_frame(i)) {
                records += 1;
                assert_eq!(frame.spectrum.len(), 256);
            }
        }
        assert_eq!(records, 192000 / 5760);
    }

    #[test]
    fn test_interval_reconfigure_takes_effect() {
        let mut analyzer = Analyzer::new(SAMPLE_RATE, 512, AnalyzerConfig::default());

        let mut cfg = analyzer.config().clone();
        cfg.spectrum_send_interval_ms = 10;
        analyzer.set_config(cfg);

        let mut records = 0;
        for i in 0..(SAMPLE_RATE as usize) {
            if analyzer.process_frame(pilot_frame(i)).is_some() {
                records += 1;
            }
        }
        assert_eq!(records, 192000 / 1920);
    }

    #[test]
    fn test_mpx_scale_rescales_peak() {
        let mut analyzer = Analyzer::new(SAMPLE_RATE, 512, AnalyzerConfig::default());

        let mut last = None;
        for i in 0..(SAMPLE_RATE as usize / 2) {
            if let Some(frame) = analyzer.process_frame(pilot_frame(i)) {
                last = Some(frame);
            }
        }
        let before = last.expect("records emitted").mpx_peak;

        let mut cfg = analyzer.config().clone();
        cfg.meter_mpx_scale = 50.0;
        analyzer.set_config(cfg);

        let mut last = None;
        for i in 0..(SAMPLE_RATE as usize / 2) {
            if let Some(frame) = analyzer.process_frame(pilot_frame(i)) {
                last = Some(frame);
            }
        }
        let after = last.expect("records emitted").mpx_peak;

        // Halving the scale halves the emitted peak
        assert!(
            (after / before - 0.5).abs() < 0.05,
            "before {before}, after {after}"
        );
    }

    #[test]
    fn test_record_held_until_fft_fills() {
        // A 4096 FFT with a 10 ms interval (1920 samples): the first
        // two intervals cannot have a full frame yet
        let mut cfg = AnalyzerConfig::default();
        cfg.spectrum_send_interval_ms = 10;
        let mut analyzer = Analyzer::new(SAMPLE_RATE, 4096, cfg);

        let mut emitted_at = Vec::new();
        for i in 0..(SAMPLE_RATE as usize / 10) {
            if analyzer.process_frame(pilot_frame(i)).is_some() {
                emitted_at.push(i);
            }
        }
        assert!(!emitted_at.is_empty());
        // First possible record: third interval (5760 samples > 4096)
        assert_eq!(emitted_at[0], 5759);
    }
}

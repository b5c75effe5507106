//! FFT spectrum builder
//!
//! Accumulates Hann-windowed samples into an FFT frame; when the frame
//! is full, computes bin magnitudes and folds them into a persistent
//! per-bin envelope with asymmetric attack/decay smoothing. Emitted
//! values carry a fixed display multiplier.

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

use mpx_core::Sample;

/// Minimum accepted FFT size; anything smaller or non-power-of-two
/// coerces to the default
const MIN_FFT_SIZE: usize = 512;
const DEFAULT_FFT_SIZE: usize = 4096;

/// Fixed display scalar applied to every emitted bin
const DISPLAY_SCALE: f64 = 15.0;

pub struct SpectrumBuilder {
    fft: Arc<dyn RealToComplex<f64>>,
    fft_size: usize,
    window: Vec<f64>,
    /// Accumulation frame; windowing is applied at push time
    frame: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    /// Persistent smoothed per-bin amplitude (N/2 bins)
    smoothed: Vec<f64>,
    /// Smoothed amplitudes times the display scalar
    display: Vec<f64>,
    index: usize,
}

impl SpectrumBuilder {
    pub fn new(fft_size: usize) -> Self {
        let fft_size = if fft_size.is_power_of_two() && fft_size >= MIN_FFT_SIZE {
            fft_size
        } else {
            DEFAULT_FFT_SIZE
        };

        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Hann window
        let window: Vec<f64> = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (fft_size - 1) as f64).cos())
            })
            .collect();

        Self {
            fft,
            fft_size,
            window,
            frame: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size / 2 + 1],
            smoothed: vec![0.0; fft_size / 2],
            display: vec![0.0; fft_size / 2],
            index: 0,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Add one spectrum-path sample; ignored while the frame is full
    /// and waiting for `analyze`.
    #[inline]
    pub fn push(&mut self, sample: Sample) {
        if self.index < self.fft_size {
            self.frame[self.index] = sample * self.window[self.index];
            self.index += 1;
        }
    }

    /// True when a complete frame has accumulated.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.index >= self.fft_size
    }

    /// Run the FFT over the accumulated frame, update the per-bin
    /// envelope, and return the display values. Resets the accumulator.
    pub fn analyze(&mut self, attack: f64, decay: f64) -> &[f64] {
        // realfft consumes the input frame; the accumulator restarts
        // from zero afterwards anyway
        if self.fft.process(&mut self.frame, &mut self.spectrum).is_err() {
            for c in &mut self.spectrum {
                *c = Complex::new(0.0, 0.0);
            }
        }

        let scale = 2.0 / self.fft_size as f64;
        for (k, bin) in self.smoothed.iter_mut().enumerate() {
            let c = self.spectrum[k];
            let amp = (c.re * c.re + c.im * c.im).sqrt() * scale;

            *bin = if amp > *bin {
                *bin * (1.0 - attack) + amp * attack
            } else {
                *bin * (1.0 - decay) + amp * decay
            };
            self.display[k] = *bin * DISPLAY_SCALE;
        }

        self.index = 0;
        &self.display
    }

    /// Most recent display values without re-running the FFT.
    pub fn display(&self) -> &[f64] {
        &self.display
    }

    pub fn reset(&mut self) {
        self.frame.fill(0.0);
        self.smoothed.fill(0.0);
        self.display.fill(0.0);
        self.index = 0;
    }
}

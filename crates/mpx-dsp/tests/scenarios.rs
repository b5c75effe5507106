//! MPX demodulation scenario tests
//!
//! Drives the demodulator and meters through realistic broadcast
//! regimes: pure pilot, RDS-only with fallback lock, pilot dropout, and
//! silence. Verifies magnitudes, gate timing, and phase invariants.

use std::f64::consts::TAU;

use mpx_dsp::demod::MpxDemodulator;
use mpx_dsp::{Bs412Meter, PeakHoldRelease, SpectrumBuilder, TruePeakInterpolator};

const SAMPLE_RATE: f64 = 192000.0;
const PILOT_HZ: f64 = 19000.0;
const RDS_HZ: f64 = 57000.0;

/// Fixed preamp applied by the capture front end
const PREAMP: f64 = 3.0;

fn tone(freq: f64, amplitude: f64, i: usize) -> f64 {
    amplitude * (TAU * freq / SAMPLE_RATE * i as f64).sin()
}

#[test]
fn scenario_silence_in_silence_out() {
    let mut demod = MpxDemodulator::new(SAMPLE_RATE);
    let mut tp = TruePeakInterpolator::new();
    let mut env = PeakHoldRelease::new(SAMPLE_RATE, 200.0, 1500.0);
    let mut bs412 = Bs412Meter::new(SAMPLE_RATE);

    let mut peak = 0.0;
    for _ in 0..(SAMPLE_RATE * 2.0) as usize {
        demod.process(0.0);
        peak = env.process(tp.process(0.0, 8));
        bs412.process(0.0);
    }

    assert_eq!(demod.pilot_magnitude(), 0.0);
    assert!(demod.rds_magnitude() < 1e-6);
    assert_eq!(peak, 0.0);
    assert!(bs412.dbr() < -100.0, "bs412 {}", bs412.dbr());
}

#[test]
fn scenario_pure_pilot() {
    // 19 kHz sine, amplitude 0.1 at the input, 0.3 after the preamp.
    let mut demod = MpxDemodulator::new(SAMPLE_RATE);
    for i in 0..(SAMPLE_RATE * 5.0) as usize {
        demod.process(tone(PILOT_HZ, 0.1 * PREAMP, i));
    }

    assert!(demod.pilot_present());

    // Quadrature demodulation of an amplitude-A carrier settles at A/2
    let expected = 0.1 * PREAMP / 2.0;
    let pilot = demod.pilot_magnitude();
    assert!(
        (pilot - expected).abs() < expected * 0.1,
        "pilot {pilot}, expected ~{expected}"
    );

    // No 57 kHz energy: the RDS read stays near zero
    assert!(
        demod.rds_magnitude() < expected * 0.05,
        "rds {}",
        demod.rds_magnitude()
    );
}

#[test]
fn scenario_pilot_drop() {
    let mut demod = MpxDemodulator::new(SAMPLE_RATE);

    for i in 0..(SAMPLE_RATE * 3.0) as usize {
        demod.process(tone(PILOT_HZ, 0.3, i));
    }
    assert!(demod.pilot_present());
    let locked_mag = demod.pilot_magnitude();
    assert!(locked_mag > 0.1);

    // Silence: the narrowband pilot estimate decays faster than the
    // broadband estimate, so the gate must drop well within 1.5 s,
    // and the reported magnitude collapses with it.
    let mut dropped_at = None;
    for i in 0..(SAMPLE_RATE * 1.4) as usize {
        demod.process(0.0);
        if dropped_at.is_none() && !demod.pilot_present() {
            dropped_at = Some(i);
        }
    }

    let dropped_at = dropped_at.expect("gate never dropped");
    assert!(
        (dropped_at as f64) < SAMPLE_RATE * 1.2,
        "gate dropped late: {dropped_at}"
    );
    assert!(
        demod.pilot_magnitude() < 0.001,
        "pilot residue {}",
        demod.pilot_magnitude()
    );
}

#[test]
fn scenario_rds_without_pilot() {
    // 57 kHz subcarrier over a mono program tone, no pilot. The
    // broadband program keeps the gate firmly absent (the Q=20 pilot
    // bandpass only sees its -40 dB skirt), so the fallback PLL must
    // acquire on its own and the pilot read must stay dark.
    let mut demod = MpxDemodulator::new(SAMPLE_RATE);
    let rds_amp = 0.05 * PREAMP;
    for i in 0..(SAMPLE_RATE * 5.0) as usize {
        let x = tone(RDS_HZ, rds_amp, i) + tone(1000.0, 0.5, i);
        demod.process(x);
    }

    assert!(!demod.pilot_present());
    assert!(demod.pilot_magnitude() < 0.001);
    // Blend has fully handed over to the 57 kHz PLL reference
    assert!(demod.blend() < 0.01, "blend {}", demod.blend());

    let expected = rds_amp / 2.0;
    let rds = demod.rds_magnitude();
    assert!(
        (rds - expected).abs() < expected * 0.1,
        "rds {rds}, expected ~{expected}"
    );
}

#[test]
fn scenario_pilot_and_rds_together() {
    // 9% pilot, 4% RDS of a nominal 0.75 carrier swing: both reads
    // must resolve independently through their narrowband IQ paths.
    let mut demod = MpxDemodulator::new(SAMPLE_RATE);
    let pilot_amp = 0.09;
    let rds_amp = 0.04;
    for i in 0..(SAMPLE_RATE * 5.0) as usize {
        let x = tone(PILOT_HZ, pilot_amp, i) + tone(RDS_HZ, rds_amp, i);
        demod.process(x);
    }

    assert!(demod.pilot_present());
    // Blend pinned to the pilot-derived reference
    assert!(demod.blend() > 0.99);

    let pilot = demod.pilot_magnitude();
    let rds = demod.rds_magnitude();
    assert!((pilot - pilot_amp / 2.0).abs() < pilot_amp / 2.0 * 0.1, "pilot {pilot}");
    assert!((rds - rds_amp / 2.0).abs() < rds_amp / 2.0 * 0.1, "rds {rds}");
}

#[test]
fn invariant_phase_bounded_across_regimes() {
    let mut demod = MpxDemodulator::new(SAMPLE_RATE);
    for i in 0..(SAMPLE_RATE * 2.0) as usize {
        // Pilot on, then off, then RDS only
        let x = match i {
            i if i < 96000 => tone(PILOT_HZ, 0.3, i),
            i if i < 192000 => 0.0,
            i => tone(RDS_HZ, 0.15, i),
        };
        demod.process(x);
        let phase = demod.pilot_phase();
        assert!((0.0..TAU).contains(&phase), "phase {phase} at {i}");
    }
}

#[test]
fn spectrum_chain_resolves_carrier_bin() {
    // Push a full frame through the spectrum path the way the pipeline
    // does and confirm the carrier lands where expected.
    let n = 4096;
    let mut spectrum = SpectrumBuilder::new(n);
    let k = 405; // ~19 kHz at 192 kHz with N=4096
    let amplitude = 0.3;

    let mut frames = 0;
    for i in 0..n * 8 {
        spectrum.push(amplitude * (TAU * k as f64 * i as f64 / n as f64).sin());
        if spectrum.is_full() {
            spectrum.analyze(0.25, 0.15);
            frames += 1;
        }
    }
    assert_eq!(frames, 8);

    // Attack smoothing converges geometrically toward A/2 * 15
    let expected = amplitude * 0.5 * 15.0;
    let converged = expected * (1.0 - 0.75_f64.powi(frames));
    let got = spectrum.display()[k];
    assert!(
        (got - converged).abs() < expected * 0.02,
        "bin {k}: {got}, expected ~{converged}"
    );
}

#[test]
fn true_peak_envelope_tracks_mpx_swing() {
    // A full-deviation MPX-ish waveform: the held envelope must sit at
    // or above the raw crest and within the interpolator overshoot.
    let mut tp = TruePeakInterpolator::new();
    let mut env = PeakHoldRelease::new(SAMPLE_RATE, 200.0, 1500.0);

    let mut crest: f64 = 0.0;
    let mut held: f64 = 0.0;
    for i in 0..(SAMPLE_RATE * 0.5) as usize {
        let x = tone(15000.0, 0.7, i) + tone(PILOT_HZ, 0.09, i);
        crest = crest.max(x.abs());
        held = env.process(tp.process(x, 8));
    }

    assert!(held >= crest * 0.98, "held {held} vs crest {crest}");
    assert!(held <= crest * 1.1, "held {held} vs crest {crest}");
}

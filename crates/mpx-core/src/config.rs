//! Hot-reloadable analyzer configuration
//!
//! The configuration file is a UTF-8 JSON object written by an external
//! tool, possibly non-atomically and with relaxed syntax (trailing
//! commas, partial writes). Parsing is therefore two-stage: a strict
//! `serde_json` pass first, and a tolerant per-key scanner as fallback.
//! Keys that are missing or unparseable retain their previous values.

use serde::Deserialize;

use crate::db_to_linear;

/// One field update set parsed from a config file.
///
/// Every field is optional; `None` means "leave the current value".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    #[serde(rename = "MeterInputCalibration")]
    pub meter_input_calibration: Option<f64>,
    #[serde(rename = "SpectrumInputCalibration")]
    pub spectrum_input_calibration: Option<f64>,
    #[serde(rename = "MeterPilotScale")]
    pub meter_pilot_scale: Option<f64>,
    #[serde(rename = "MeterMPXScale")]
    pub meter_mpx_scale: Option<f64>,
    #[serde(rename = "MeterRDSScale")]
    pub meter_rds_scale: Option<f64>,
    #[serde(rename = "SpectrumAttackLevel")]
    pub spectrum_attack_level: Option<f64>,
    #[serde(rename = "SpectrumDecayLevel")]
    pub spectrum_decay_level: Option<f64>,
    #[serde(rename = "SpectrumSendInterval")]
    pub spectrum_send_interval: Option<f64>,
    #[serde(rename = "TruePeakFactor")]
    pub true_peak_factor: Option<f64>,
    #[serde(rename = "MPX_LPF_100kHz")]
    pub mpx_lpf_100khz: Option<f64>,
}

impl ConfigUpdate {
    /// Parse a config file body.
    ///
    /// Tries strict JSON first; on any syntax error falls back to the
    /// tolerant scanner so that well-formed keys in a half-written or
    /// comma-trailing file still apply.
    pub fn parse(text: &str) -> Self {
        if let Ok(update) = serde_json::from_str::<Self>(text) {
            return update;
        }

        Self {
            meter_input_calibration: scan_number(text, "MeterInputCalibration"),
            spectrum_input_calibration: scan_number(text, "SpectrumInputCalibration"),
            meter_pilot_scale: scan_number(text, "MeterPilotScale"),
            meter_mpx_scale: scan_number(text, "MeterMPXScale"),
            meter_rds_scale: scan_number(text, "MeterRDSScale"),
            spectrum_attack_level: scan_number(text, "SpectrumAttackLevel"),
            spectrum_decay_level: scan_number(text, "SpectrumDecayLevel"),
            spectrum_send_interval: scan_number(text, "SpectrumSendInterval"),
            true_peak_factor: scan_number(text, "TruePeakFactor"),
            mpx_lpf_100khz: scan_number(text, "MPX_LPF_100kHz"),
        }
    }
}

/// Find a quoted key, skip whitespace and the colon, parse a number.
///
/// The leading character must be a digit or '-', matching the tolerance
/// of the external writer; anything else retains the previous value.
fn scan_number(json: &str, key: &str) -> Option<f64> {
    let rest = scan_key(json, key)?;
    let first = rest.chars().next()?;
    if first != '-' && !first.is_ascii_digit() {
        return None;
    }
    parse_leading_number(rest)
}

fn scan_key<'a>(json: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("\"{key}\"");
    let pos = json.find(&needle)? + needle.len();
    Some(json[pos..].trim_start_matches(|c: char| c.is_whitespace() || c == ':'))
}

/// Parse the longest numeric prefix of `s`, if any.
fn parse_leading_number(s: &str) -> Option<f64> {
    let end = s
        .char_indices()
        .find(|&(_, c)| !matches!(c, '0'..='9' | '-' | '+' | '.' | 'e' | 'E'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    let mut slice = &s[..end];
    while !slice.is_empty() {
        if let Ok(v) = slice.parse::<f64>() {
            return Some(v);
        }
        slice = &slice[..slice.len() - 1];
    }
    None
}

/// The analyzer configuration snapshot.
///
/// Owned by the main loop and replaced wholesale on each successful
/// reload; DSP components read the current snapshot per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Measurement-path input calibration in dB
    pub meter_input_calibration_db: f64,
    /// Spectrum-path input calibration in dB
    pub spectrum_input_calibration_db: f64,
    /// Linear gain derived from `meter_input_calibration_db`
    pub meter_gain: f64,
    /// Linear gain derived from `spectrum_input_calibration_db`
    pub spectrum_gain: f64,
    /// Display multiplier for the pilot magnitude
    pub meter_pilot_scale: f64,
    /// Display multiplier for the MPX peak, and BS.412 input scaling.
    /// For BS.412 to read correctly this must map 1.0 full scale to
    /// actual kHz of deviation (e.g. 100.0 when 1.0 = 100 kHz).
    pub meter_mpx_scale: f64,
    /// Display multiplier for the RDS magnitude
    pub meter_rds_scale: f64,
    /// Spectrum per-bin attack coefficient, clamped to [0.01, 1.0]
    pub spectrum_attack: f64,
    /// Spectrum per-bin decay coefficient, clamped to [0.01, 1.0]
    pub spectrum_decay: f64,
    /// Interval between output records in milliseconds
    pub spectrum_send_interval_ms: u32,
    /// True-peak oversampling factor (4 or 8)
    pub true_peak_factor: u32,
    /// Enable the ~100 kHz lowpass in the peak path
    pub mpx_lpf_enabled: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            meter_input_calibration_db: 0.0,
            spectrum_input_calibration_db: 0.0,
            meter_gain: 1.0,
            spectrum_gain: 1.0,
            meter_pilot_scale: 1.0,
            meter_mpx_scale: 100.0,
            meter_rds_scale: 1.0,
            spectrum_attack: 0.25,
            spectrum_decay: 0.15,
            spectrum_send_interval_ms: 30,
            true_peak_factor: 8,
            mpx_lpf_enabled: true,
        }
    }
}

impl AnalyzerConfig {
    /// Apply an update set, retaining current values for absent keys.
    /// Clamps apply after parsing.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(db) = update.meter_input_calibration {
            self.meter_input_calibration_db = db;
            self.meter_gain = db_to_linear(db);
        }
        if let Some(db) = update.spectrum_input_calibration {
            self.spectrum_input_calibration_db = db;
            self.spectrum_gain = db_to_linear(db);
        }
        if let Some(v) = update.meter_pilot_scale {
            self.meter_pilot_scale = v;
        }
        if let Some(v) = update.meter_mpx_scale {
            self.meter_mpx_scale = v;
        }
        if let Some(v) = update.meter_rds_scale {
            self.meter_rds_scale = v;
        }
        if let Some(v) = update.spectrum_attack_level {
            self.spectrum_attack = v * 0.1;
        }
        if let Some(v) = update.spectrum_decay_level {
            self.spectrum_decay = v * 0.01;
        }
        if let Some(v) = update.spectrum_send_interval {
            if v > 0.0 {
                self.spectrum_send_interval_ms = v as u32;
            }
        }
        if let Some(v) = update.true_peak_factor {
            let factor = v.round() as i64;
            if factor == 4 || factor == 8 {
                self.true_peak_factor = factor as u32;
            }
        }
        if let Some(v) = update.mpx_lpf_100khz {
            self.mpx_lpf_enabled = v != 0.0;
        }

        self.spectrum_attack = self.spectrum_attack.clamp(0.01, 1.0);
        self.spectrum_decay = self.spectrum_decay.clamp(0.01, 1.0);
    }
}

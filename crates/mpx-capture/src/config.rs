//! Configuration file polling
//!
//! The config file is written externally, sometimes non-atomically. The
//! watcher stats the file on the main-loop cadence, and on an mtime
//! change reads it with bounded retries so half-written content never
//! produces a partial snapshot.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use mpx_core::{AnalyzerConfig, ConfigUpdate};

const RELOAD_RETRIES: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// Content shorter than this is considered a partial write
const MIN_USABLE_LEN: usize = 10;

pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_modified: None,
        }
    }

    /// Check the file and, if it changed, apply its keys onto `cfg`.
    ///
    /// Returns true when a reload happened. A missing or unreadable
    /// file keeps the current snapshot with no error surfaced; an
    /// unusable file after all retries logs a warning and skips this
    /// reload cycle.
    pub fn poll(&mut self, cfg: &mut AnalyzerConfig) -> bool {
        let Ok(meta) = fs::metadata(&self.path) else {
            return false;
        };
        let modified = meta.modified().ok();
        if self.last_modified.is_some() && modified == self.last_modified {
            return false;
        }
        self.last_modified = modified;

        let Some(text) = self.read_with_retries() else {
            log::warn!(
                "config {} unusable after {RELOAD_RETRIES} attempts, keeping current snapshot",
                self.path.display()
            );
            return false;
        };

        cfg.apply(&ConfigUpdate::parse(&text));
        self.log_snapshot(cfg);
        true
    }

    fn read_with_retries(&self) -> Option<String> {
        for attempt in 0..RELOAD_RETRIES {
            if attempt > 0 {
                std::thread::sleep(RETRY_DELAY);
            }
            if let Ok(text) = fs::read_to_string(&self.path) {
                if text.len() > MIN_USABLE_LEN && text.contains('{') {
                    return Some(text);
                }
            }
        }
        None
    }

    fn log_snapshot(&self, cfg: &AnalyzerConfig) {
        log::info!("config update ({}):", self.path.display());
        log::info!(
            "  meter gain: {:.2} dB (x{:.6}), spectrum gain: {:.2} dB (x{:.6})",
            cfg.meter_input_calibration_db,
            cfg.meter_gain,
            cfg.spectrum_input_calibration_db,
            cfg.spectrum_gain
        );
        log::info!(
            "  scales: pilot={:.6} mpx={:.6} rds={:.6}",
            cfg.meter_pilot_scale,
            cfg.meter_mpx_scale,
            cfg.meter_rds_scale
        );
        log::info!(
            "  spectrum: attack={:.3} decay={:.3} interval={}ms",
            cfg.spectrum_attack,
            cfg.spectrum_decay,
            cfg.spectrum_send_interval_ms
        );
        log::info!(
            "  mpx peak: truepeak={}x lpf100k={}",
            cfg.true_peak_factor,
            cfg.mpx_lpf_enabled
        );
    }
}

//! Output record serialization
//!
//! One JSON object per record, newline-delimited, flushed immediately so
//! the downstream UI sees records promptly. Scalars and spectrum bins
//! are rounded to four decimals.

use std::io::{self, Write};

use serde::Serialize;

/// One measurement record with display scaling already applied.
#[derive(Debug, Clone)]
pub struct OutputFrame {
    pub pilot: f64,
    pub rds: f64,
    pub mpx_peak: f64,
    pub bs412_dbr: f64,
    pub spectrum: Vec<f64>,
}

/// Wire format; field order is part of the contract.
#[derive(Serialize)]
struct Record<'a> {
    p: f64,
    r: f64,
    m: f64,
    b: f64,
    s: &'a [f64],
}

#[inline]
fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

pub struct Emitter<W: Write> {
    out: W,
    scratch: Vec<f64>,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            scratch: Vec::new(),
        }
    }

    pub fn write_frame(&mut self, frame: &OutputFrame) -> io::Result<()> {
        self.scratch.clear();
        self.scratch.extend(frame.spectrum.iter().map(|&v| round4(v)));

        let record = Record {
            p: round4(frame.pilot),
            r: round4(frame.rds),
            m: round4(frame.mpx_peak),
            b: round4(frame.bs412_dbr),
            s: &self.scratch,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

//! mpx-core: Shared types, configuration, and errors for the MPX analyzer
//!
//! This crate provides the foundational types used across the analyzer
//! crates: the sample type, dB conversion helpers, the hot-reloadable
//! configuration snapshot, and the error type.

mod config;
mod error;
mod sample;

pub use config::*;
pub use error::*;
pub use sample::*;

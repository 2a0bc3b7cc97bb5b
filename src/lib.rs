//! # muse-decode
//!
//! Decoding and time alignment for the notification protocol of
//! [Interaxon Muse](https://choosemuse.com/) EEG headsets.
//!
//! The headset streams each sensor on its own characteristic: five EEG
//! electrodes, three PPG optical channels, accelerometer, gyroscope,
//! telemetry, and a text control channel. This crate turns the raw
//! notifications into typed readings and then into time-aligned
//! multi-channel rows. It does no radio I/O; any transport that hands over
//! one buffer per notification in arrival order can drive it.
//!
//! ## Pipeline
//!
//! ```text
//! raw buffer ─▶ parse::parse_* ─▶ reading ─▶ zip::SampleZipper ─▶ AlignedRow
//!                    ▲
//!        clock::SequenceClock (one per channel group)
//!
//! control text ─▶ control::ControlAccumulator ─▶ ControlResponse
//! ```
//!
//! [`session::Session`] wires the left half together for one connection.
//!
//! ## Quick start
//!
//! ```
//! use muse_decode::prelude::*;
//!
//! let mut session = Session::new(SessionConfig::default());
//! let mut zipper = SampleZipper::eeg();
//! let mut rows = Vec::new();
//!
//! for electrode in 0..4 {
//!     let mut packet = vec![0x00, 0x01];
//!     packet.extend_from_slice(&[0x80; 18]);
//!     for event in session.handle(Channel::Eeg(electrode), &packet) {
//!         if let Ok(MuseEvent::Eeg(reading)) = event {
//!             rows.extend(zipper.push(reading));
//!         }
//!     }
//! }
//! rows.extend(zipper.finish());
//!
//! assert_eq!(rows.len(), EEG_SAMPLES_PER_READING);
//! assert!(rows[0].data[4].is_nan()); // AUX not streamed
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed items |
//! | [`protocol`] | GATT UUIDs, channel identities, sampling constants, control framing |
//! | [`parse`] | 12-bit codec and per-channel notification parsers |
//! | [`control`] | Reassembly of JSON control responses from text fragments |
//! | [`clock`] | Sequence-index to wall-clock timestamp reconstruction |
//! | [`zip`] | Alignment of per-channel readings into multi-channel rows |
//! | [`session`] | Per-connection routing of notifications to events |
//! | [`types`] | Readings, rows, control responses and events |
//! | [`error`] | Error types |

pub mod clock;
pub mod control;
pub mod error;
pub mod parse;
pub mod protocol;
pub mod session;
pub mod types;
pub mod zip;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
pub mod prelude {
    // ── Decoding state ────────────────────────────────────────────────────────
    pub use crate::clock::SequenceClock;
    pub use crate::control::{reassemble_control, ControlAccumulator};
    pub use crate::session::{Session, SessionConfig};
    pub use crate::zip::{zip_samples, zip_samples_ppg, zip_stream, SampleZipper};

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::error::{ControlError, Error, ParseError};
    pub use crate::types::{
        AlignedRow, ChannelReading, ControlResponse, ControlValue, DeviceInfo, EegReading,
        EegSample, EventMarker, ImuData, MuseEvent, PpgReading, PpgSample, TelemetryData,
        XyzSample,
    };

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{
        Channel, EEG_CHANNEL_NAMES, EEG_FREQUENCY, EEG_SAMPLES_PER_READING, PPG_CHANNEL_NAMES,
        PPG_FREQUENCY, PPG_SAMPLES_PER_READING,
    };
}

use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::{
    EEG_FREQUENCY, EEG_SAMPLES_PER_READING, PPG_FREQUENCY, PPG_SAMPLES_PER_READING,
};

/// Span of the device's 16-bit sequence counter.
const COUNTER_SPAN: u32 = 0x1_0000;

/// Largest backward step still treated as jitter rather than a wrap.
const WRAP_THRESHOLD: u32 = 0x1000;

/// Wall clock in milliseconds since Unix epoch.
pub fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}

/// Reconstructs a wall-clock timestamp for each notification of a channel
/// group from the device's 16-bit packet index.
///
/// The headset does not embed timestamps in its packets. Each notification
/// carries a counter that increments by one per packet, so the first packet
/// is anchored to `now()` and every later timestamp is extrapolated from the
/// index delta and the group's reading duration.
///
/// One clock serves a whole group (all EEG electrodes, or all PPG channels):
/// whichever channel delivers a new index first moves the clock forward, the
/// others reuse that timestamp, and a channel that is still behind gets a
/// back-dated timestamp without moving the clock.
///
/// ```
/// # use muse_decode::clock::SequenceClock;
/// let mut clock = SequenceClock::eeg();
/// let t0 = clock.advance_at(100, 10_000.0);
/// assert_eq!(t0, 10_000.0 - 46.875);
/// assert_eq!(clock.advance_at(100, 0.0), t0); // sibling electrode, same packet
/// assert_eq!(clock.advance_at(101, 0.0), t0 + 46.875);
/// ```
#[derive(Debug, Clone)]
pub struct SequenceClock {
    reading_delta_ms: f64,
    /// Normalized index of the most recent forward step; may exceed 0xFFFF
    /// after the counter wraps.
    last_index: Option<u32>,
    last_timestamp: Option<f64>,
}

impl SequenceClock {
    /// A clock for readings of `samples_per_reading` samples at `frequency` Hz.
    pub fn new(samples_per_reading: usize, frequency: f64) -> Self {
        Self {
            reading_delta_ms: 1000.0 * samples_per_reading as f64 / frequency,
            last_index: None,
            last_timestamp: None,
        }
    }

    /// The clock for the EEG electrode group (46.875 ms per reading).
    pub fn eeg() -> Self {
        Self::new(EEG_SAMPLES_PER_READING, EEG_FREQUENCY)
    }

    /// The clock for the PPG channel group (93.75 ms per reading).
    pub fn ppg() -> Self {
        Self::new(PPG_SAMPLES_PER_READING, PPG_FREQUENCY)
    }

    /// Milliseconds covered by one reading.
    pub fn reading_delta_ms(&self) -> f64 {
        self.reading_delta_ms
    }

    pub fn last_index(&self) -> Option<u32> {
        self.last_index
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Timestamp for `index`, anchoring to the wall clock on first use.
    pub fn advance(&mut self, index: u16) -> f64 {
        self.advance_at(index, now_ms())
    }

    /// Timestamp for `index`; `now_ms` is only used to anchor an unset clock.
    ///
    /// The anchor is `now − reading_delta`, so the first timestamp marks the
    /// start of the reading window rather than its arrival.
    pub fn advance_at(&mut self, index: u16, now_ms: f64) -> f64 {
        let (last, ts) = match (self.last_index, self.last_timestamp) {
            (Some(last), Some(ts)) => (last, ts),
            _ => {
                let ts = now_ms - self.reading_delta_ms;
                self.last_index = Some(u32::from(index));
                self.last_timestamp = Some(ts);
                return ts;
            }
        };

        let mut idx = u32::from(index);
        while last > idx && last - idx > WRAP_THRESHOLD {
            idx += COUNTER_SPAN;
        }

        if idx == last {
            ts
        } else if idx > last {
            let new_ts = ts + self.reading_delta_ms * f64::from(idx - last);
            // Rebasing by one span keeps every later delta identical while
            // the stored index stays above one span plus the wrap threshold.
            if idx >= 3 * COUNTER_SPAN {
                idx -= COUNTER_SPAN;
            }
            self.last_index = Some(idx);
            self.last_timestamp = Some(new_ts);
            new_ts
        } else {
            // Laggard: back-date without moving the anchor.
            ts - self.reading_delta_ms * f64::from(last - idx)
        }
    }

    /// Forget the anchor; the next call re-anchors to the wall clock.
    ///
    /// Call this when re-connecting.
    pub fn reset(&mut self) {
        self.last_index = None;
        self.last_timestamp = None;
    }
}

//! Binary decoders for Muse notification payloads.
//!
//! All functions in this module are pure (no I/O, no state) and are safe to
//! call from any async or sync context.
//!
//! Every sensor has its own characteristic and a fixed layout; all integers
//! are big-endian and all but telemetry lead with a 16-bit sequence index:
//!
//! | Function | Sensor | Format |
//! |---|---|---|
//! | [`parse_eeg`] | EEG | 12-bit packed, 12 samples, 0.48828125 µV/LSB around 0x800 |
//! | [`parse_ppg`] | PPG | 12-bit packed, 6 samples, normalized optical units |
//! | [`parse_telemetry`] | Battery | 5 × u16 fields |
//! | [`parse_accelerometer`] | Accel | 3 × i16 XYZ, 0.0000610352 g/LSB |
//! | [`parse_gyroscope`] | Gyro | 3 × i16 XYZ, 0.0074768 °/s/LSB |
//!
//! Buffers shorter than their fixed header fail with [`ParseError::TooShort`].
//! EEG and PPG payloads that are merely short decode to fewer samples; the
//! resulting reading reports it through `is_complete()`.

use log::warn;

use crate::error::ParseError;
use crate::protocol::{
    Channel, ACCELEROMETER_SCALE, EEG_OFFSET, EEG_SAMPLES_PER_READING, EEG_SCALE, GYROSCOPE_SCALE,
    PPG_SAMPLES_PER_READING, PPG_SCALE,
};
use crate::types::{EegReading, ImuData, PpgReading, TelemetryData, XyzSample};

/// Length of the big-endian sequence index that prefixes most notifications.
pub const SEQUENCE_INDEX_LEN: usize = 2;

const TELEMETRY_LEN: usize = 10;
const IMU_LEN: usize = 20;

// ── Bit codec ────────────────────────────────────────────────────────────────

/// Unpack 12-bit integers, three bytes to two samples.
///
/// ```text
/// [AA BB CC] → sample0 = (AA << 4) | (BB >> 4)
///              sample1 = ((BB & 0x0F) << 8) | CC
/// ```
///
/// With `signed`, values with bit 11 set are sign-extended (`value - 0x1000`).
/// A step whose second byte is missing emits nothing, so a buffer of `3k`
/// bytes yields exactly `2k` samples.
///
/// ```
/// # use muse_decode::parse::decode_12bit;
/// assert_eq!(decode_12bit(&[0x80, 0x0F, 0xFF], false), vec![2048, 4095]);
/// assert_eq!(decode_12bit(&[0x80, 0x0F, 0xFF], true), vec![-2048, -1]);
/// ```
pub fn decode_12bit(data: &[u8], signed: bool) -> Vec<i32> {
    let mut out = Vec::with_capacity(data.len() * 2 / 3);
    let mut i = 0;
    while i + 1 < data.len() {
        let raw = if i % 3 == 0 {
            (i32::from(data[i]) << 4) | (i32::from(data[i + 1]) >> 4)
        } else {
            let value = ((i32::from(data[i]) & 0x0F) << 8) | i32::from(data[i + 1]);
            i += 1;
            value
        };
        out.push(if signed && raw & 0x800 != 0 {
            raw - 0x1000
        } else {
            raw
        });
        i += 1;
    }
    out
}

/// [`decode_12bit`] without sign extension; every value is in `0..=4095`.
pub fn decode_unsigned_12bit(data: &[u8]) -> Vec<i32> {
    decode_12bit(data, false)
}

/// [`decode_12bit`] with sign extension; every value is in `-2048..=2047`.
pub fn decode_signed_12bit(data: &[u8]) -> Vec<i32> {
    decode_12bit(data, true)
}

/// Read the big-endian sequence index from the first two bytes.
pub fn sequence_index(data: &[u8]) -> Option<u16> {
    match data {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

fn require(data: &[u8], channel: Channel, expected: usize) -> Result<(), ParseError> {
    if data.len() < expected {
        return Err(ParseError::TooShort {
            channel,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

// ── EEG ──────────────────────────────────────────────────────────────────────

/// Decode EEG payload bytes (everything after the sequence index) into µV.
///
/// `µV = (raw − 2048) × 0.48828125`
pub fn decode_eeg_samples(payload: &[u8]) -> Vec<f64> {
    decode_unsigned_12bit(payload)
        .into_iter()
        .map(|n| EEG_SCALE * (f64::from(n) - EEG_OFFSET))
        .collect()
}

/// Parse a full EEG notification into an [`EegReading`].
///
/// `timestamp` is supplied by the caller, normally from the EEG group's
/// [`crate::clock::SequenceClock`].
pub fn parse_eeg(
    data: &[u8],
    electrode: usize,
    timestamp: f64,
) -> Result<EegReading, ParseError> {
    let channel = Channel::Eeg(electrode);
    require(data, channel, SEQUENCE_INDEX_LEN)?;
    let index = u16::from_be_bytes([data[0], data[1]]);
    let samples = decode_eeg_samples(&data[SEQUENCE_INDEX_LEN..]);
    if samples.len() < EEG_SAMPLES_PER_READING {
        warn!(
            "{channel}: truncated notification ({} bytes), {} of {EEG_SAMPLES_PER_READING} samples",
            data.len(),
            samples.len()
        );
    }
    Ok(EegReading {
        index,
        electrode,
        timestamp,
        samples,
    })
}

// ── PPG ──────────────────────────────────────────────────────────────────────

/// Decode PPG payload bytes (after the sequence index) into optical units.
pub fn decode_ppg_samples(payload: &[u8]) -> Vec<f64> {
    decode_unsigned_12bit(payload)
        .into_iter()
        .map(|n| PPG_SCALE * f64::from(n))
        .collect()
}

/// Parse a full PPG notification into a [`PpgReading`].
///
/// Wire layout: `[index_hi, index_lo, packed 12-bit samples…]`. At most
/// six samples are kept; trailing padding is ignored.
pub fn parse_ppg(
    data: &[u8],
    ppg_channel: usize,
    timestamp: f64,
) -> Result<PpgReading, ParseError> {
    let channel = Channel::Ppg(ppg_channel);
    require(data, channel, SEQUENCE_INDEX_LEN)?;
    let index = u16::from_be_bytes([data[0], data[1]]);
    let mut samples = decode_ppg_samples(&data[SEQUENCE_INDEX_LEN..]);
    samples.truncate(PPG_SAMPLES_PER_READING);
    if samples.len() < PPG_SAMPLES_PER_READING {
        warn!(
            "{channel}: truncated notification ({} bytes), {} of {PPG_SAMPLES_PER_READING} samples",
            data.len(),
            samples.len()
        );
    }
    Ok(PpgReading {
        index,
        ppg_channel,
        timestamp,
        samples,
    })
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// Parse a telemetry notification into a [`TelemetryData`].
///
/// | Bytes | Field | Conversion |
/// |---|---|---|
/// | 0–1 | sequence_id | raw |
/// | 2–3 | battery raw | ÷ 512 → % |
/// | 4–5 | fuel gauge  | × 2.2 → mV |
/// | 6–7 | (unused ADC) | — |
/// | 8–9 | temperature | raw |
pub fn parse_telemetry(data: &[u8]) -> Result<TelemetryData, ParseError> {
    require(data, Channel::Telemetry, TELEMETRY_LEN)?;
    let be = |off: usize| u16::from_be_bytes([data[off], data[off + 1]]);
    Ok(TelemetryData {
        sequence_id: be(0),
        battery_level: f32::from(be(2)) / 512.0,
        fuel_gauge_voltage: f32::from(be(4)) * 2.2,
        temperature: be(8),
    })
}

// ── IMU ───────────────────────────────────────────────────────────────────────

/// Shared decoder for accelerometer and gyroscope notifications.
///
/// A 2-byte sequence ID followed by three XYZ samples at byte offsets 2, 8
/// and 14, each three consecutive `i16` values. `scale` is applied to every
/// raw value.
fn parse_imu(data: &[u8], channel: Channel, scale: f32) -> Result<ImuData, ParseError> {
    require(data, channel, IMU_LEN)?;
    let read_i16 = |off: usize| f32::from(i16::from_be_bytes([data[off], data[off + 1]]));
    let sample = |off: usize| XyzSample {
        x: scale * read_i16(off),
        y: scale * read_i16(off + 2),
        z: scale * read_i16(off + 4),
    };
    Ok(ImuData {
        sequence_id: u16::from_be_bytes([data[0], data[1]]),
        samples: [sample(2), sample(8), sample(14)],
    })
}

/// Parse an accelerometer notification; values in g.
pub fn parse_accelerometer(data: &[u8]) -> Result<ImuData, ParseError> {
    parse_imu(data, Channel::Accelerometer, ACCELEROMETER_SCALE)
}

/// Parse a gyroscope notification; values in °/s.
pub fn parse_gyroscope(data: &[u8]) -> Result<ImuData, ParseError> {
    parse_imu(data, Channel::Gyroscope, GYROSCOPE_SCALE)
}

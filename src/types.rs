use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::{
    EEG_CHANNEL_COUNT, EEG_SAMPLES_PER_READING, PPG_CHANNEL_COUNT, PPG_SAMPLES_PER_READING,
};

/// An EEG reading, one notification from a single electrode.
///
/// One notification per electrode at 256 Hz, carrying **12 samples**
/// (46.875 ms of signal). Samples are decoded from 12-bit big-endian packed
/// values, centred on 0x800 and scaled by 0.48828125 µV/LSB.
#[derive(Debug, Clone, PartialEq)]
pub struct EegReading {
    /// Sequential packet index emitted by the headset (wraps at 0xFFFF).
    pub index: u16,
    /// Electrode channel index:
    /// * 0 = TP9 (left rear)
    /// * 1 = AF7 (left front)
    /// * 2 = AF8 (right front)
    /// * 3 = TP10 (right rear)
    /// * 4 = AUX (optional)
    pub electrode: usize,
    /// Timestamp in milliseconds of the *first* sample in this packet, as
    /// reconstructed by [`crate::clock::SequenceClock`].
    pub timestamp: f64,
    /// Voltage samples in µV.
    pub samples: Vec<f64>,
}

impl EegReading {
    /// `true` when the notification carried a full set of samples.
    pub fn is_complete(&self) -> bool {
        self.samples.len() == EEG_SAMPLES_PER_READING
    }
}

/// A PPG (photoplethysmography) reading from the optical heart-rate sensor.
///
/// Each notification carries 6 samples at 64 Hz, decoded from 12-bit packed
/// values and scaled to normalized optical units.
#[derive(Debug, Clone, PartialEq)]
pub struct PpgReading {
    /// Sequential packet index (wraps at 0xFFFF), same purpose as [`EegReading::index`].
    pub index: u16,
    /// Optical channel:
    /// * 0 = ambient
    /// * 1 = infrared
    /// * 2 = red
    pub ppg_channel: usize,
    /// Timestamp in milliseconds of the first sample.
    pub timestamp: f64,
    /// Scaled optical samples, 6 per notification.
    pub samples: Vec<f64>,
}

impl PpgReading {
    /// `true` when the notification carried a full set of samples.
    pub fn is_complete(&self) -> bool {
        self.samples.len() == PPG_SAMPLES_PER_READING
    }
}

/// A per-channel reading that can be zipped with its siblings.
///
/// Implemented by [`EegReading`] and [`PpgReading`]; consumed by
/// [`crate::zip::SampleZipper`].
pub trait ChannelReading {
    /// Position of this reading's channel inside the aligned row.
    fn channel(&self) -> usize;
    fn index(&self) -> u16;
    fn timestamp(&self) -> f64;
    fn samples(&self) -> &[f64];
}

impl ChannelReading for EegReading {
    fn channel(&self) -> usize {
        self.electrode
    }
    fn index(&self) -> u16 {
        self.index
    }
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
    fn samples(&self) -> &[f64] {
        &self.samples
    }
}

impl ChannelReading for PpgReading {
    fn channel(&self) -> usize {
        self.ppg_channel
    }
    fn index(&self) -> u16 {
        self.index
    }
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
    fn samples(&self) -> &[f64] {
        &self.samples
    }
}

/// Battery and housekeeping telemetry packet, sent roughly once per second.
///
/// | Bytes | Field | Conversion |
/// |---|---|---|
/// | 0–1 | `sequence_id` | raw |
/// | 2–3 | `battery_level` | ÷ 512 → % |
/// | 4–5 | `fuel_gauge_voltage` | × 2.2 → mV |
/// | 8–9 | `temperature` | raw |
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    /// Monotonically increasing packet counter (wraps at 0xFFFF).
    pub sequence_id: u16,
    /// Battery state-of-charge in percent (0–100).
    pub battery_level: f32,
    /// Fuel-gauge terminal voltage in millivolts.
    pub fuel_gauge_voltage: f32,
    /// Temperature, integer degrees as reported by the device.
    pub temperature: u16,
}

/// A single 3-axis inertial measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XyzSample {
    /// X-axis value in sensor-specific units (g for accelerometer, °/s for gyroscope).
    pub x: f32,
    /// Y-axis value.
    pub y: f32,
    /// Z-axis value.
    pub z: f32,
}

/// A batch of inertial measurements from one notification.
///
/// Accelerometer and gyroscope share this layout: three XYZ samples per
/// notification, big-endian `i16`, with a sensor-specific scale.
#[derive(Debug, Clone, PartialEq)]
pub struct ImuData {
    /// Monotonically increasing packet counter (wraps at 0xFFFF).
    pub sequence_id: u16,
    /// Three consecutive XYZ samples; index 0 is the oldest.
    pub samples: [XyzSample; 3],
}

/// A time-aligned multi-channel snapshot for one intra-batch sample position.
///
/// Produced by [`crate::zip::SampleZipper`] from readings that share a
/// timestamp. `N` is the channel count of the group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow<const N: usize> {
    /// Sequence index of the batch this row came from.
    pub index: u16,
    /// Timestamp in milliseconds of this particular sample.
    pub timestamp: f64,
    /// One value per channel; `f64::NAN` where the channel was absent.
    pub data: [f64; N],
}

/// Aligned EEG row in order `[TP9, AF7, AF8, TP10, AUX]`.
pub type EegSample = AlignedRow<EEG_CHANNEL_COUNT>;

/// Aligned PPG row in order `[ambient, infrared, red]`.
pub type PpgSample = AlignedRow<PPG_CHANNEL_COUNT>;

// ── Control channel ───────────────────────────────────────────────────────────

/// A value in a control response: the device only emits strings and numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Number(f64),
    Text(String),
}

impl ControlValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ControlValue::Text(s) => Some(s),
            ControlValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ControlValue::Number(n) => Some(*n),
            ControlValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Number(n) => write!(f, "{n}"),
            ControlValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ControlValue {
    fn from(s: &str) -> Self {
        ControlValue::Text(s.to_owned())
    }
}

impl From<String> for ControlValue {
    fn from(s: String) -> Self {
        ControlValue::Text(s)
    }
}

impl From<f64> for ControlValue {
    fn from(n: f64) -> Self {
        ControlValue::Number(n)
    }
}

/// A decoded Muse control/status response.
///
/// The headset replies to `v1` (device info), `s` (status), and similar
/// commands with a flat JSON object split across several notifications.
/// [`crate::control::ControlAccumulator`] reassembles the fragments; this
/// struct carries the final result.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    /// The raw, un-parsed message text.
    pub raw: String,
    /// Key-value pairs from the object. The key set is device-defined.
    pub fields: BTreeMap<String, ControlValue>,
}

impl ControlResponse {
    pub fn get(&self, key: &str) -> Option<&ControlValue> {
        self.fields.get(key)
    }

    /// The `rc` status code; `0` means the command was accepted.
    pub fn status(&self) -> Option<i64> {
        self.get("rc").and_then(ControlValue::as_f64).map(|n| n as i64)
    }

    /// Device information, when this is the reply to a `v1` request.
    pub fn device_info(&self) -> Option<DeviceInfo> {
        DeviceInfo::from_response(self)
    }
}

/// Firmware and hardware description returned for the `v1` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceInfo {
    /// Application type (e.g. `"headset"`).
    pub ap: String,
    /// Bootloader version.
    pub bl: String,
    /// Build number.
    pub bn: Option<f64>,
    /// Firmware version.
    pub fw: String,
    /// Hardware version.
    pub hw: String,
    /// Protocol version.
    pub pv: Option<f64>,
    /// Hardware revision (e.g. `"RevE"`).
    pub sp: String,
    /// Product type (e.g. `"consumer"`).
    pub tp: String,
    pub status: Option<i64>,
}

impl DeviceInfo {
    /// Build from a response carrying an `fw` field; `None` otherwise.
    pub fn from_response(resp: &ControlResponse) -> Option<Self> {
        let fw = resp.get("fw")?.to_string();
        let text = |key: &str| resp.get(key).map(ToString::to_string).unwrap_or_default();
        let number = |key: &str| resp.get(key).and_then(ControlValue::as_f64);
        Some(Self {
            ap: text("ap"),
            bl: text("bl"),
            bn: number("bn"),
            fw,
            hw: text("hw"),
            pv: number("pv"),
            sp: text("sp"),
            tp: text("tp"),
            status: resp.status(),
        })
    }
}

/// An application-defined marker placed on the session timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMarker {
    pub value: ControlValue,
    /// Milliseconds since Unix epoch.
    pub timestamp: f64,
}

/// All events produced by [`crate::session::Session`].
#[derive(Debug, Clone, PartialEq)]
pub enum MuseEvent {
    /// An EEG packet from one electrode.
    Eeg(EegReading),
    /// A PPG optical packet.
    Ppg(PpgReading),
    /// Battery and housekeeping telemetry (~1 Hz).
    Telemetry(TelemetryData),
    /// Accelerometer batch.
    Accelerometer(ImuData),
    /// Gyroscope batch.
    Gyroscope(ImuData),
    /// A complete control/status response from the headset.
    Control(ControlResponse),
    /// A marker injected by the application.
    Marker(EventMarker),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(pairs: &[(&str, ControlValue)]) -> ControlResponse {
        ControlResponse {
            raw: String::new(),
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn status_reads_rc() {
        let resp = response(&[("rc", 0.0.into())]);
        assert_eq!(resp.status(), Some(0));
        assert_eq!(response(&[("rc", "x".into())]).status(), None);
        assert!(resp.device_info().is_none());
    }

    #[test]
    fn device_info_from_v1_reply() {
        let resp = response(&[
            ("ap", "headset".into()),
            ("bn", 27.0.into()),
            ("fw", "1.2.13".into()),
            ("hw", "3.1".into()),
            ("pv", 1.0.into()),
            ("rc", 0.0.into()),
        ]);
        let info = resp.device_info().unwrap();
        assert_eq!(info.fw, "1.2.13");
        assert_eq!(info.hw, "3.1");
        assert_eq!(info.ap, "headset");
        assert_eq!(info.bn, Some(27.0));
        assert_eq!(info.pv, Some(1.0));
        assert_eq!(info.bl, "");
        assert_eq!(info.status, Some(0));
    }

    #[test]
    fn control_value_display() {
        assert_eq!(ControlValue::from("Muse-1324").to_string(), "Muse-1324");
        assert_eq!(ControlValue::from(82.0).to_string(), "82");
        assert_eq!(ControlValue::from(1.5).to_string(), "1.5");
    }
}

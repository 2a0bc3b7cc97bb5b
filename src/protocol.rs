//! GATT UUIDs, sampling constants, channel identities and the control-channel
//! text framing for Muse headsets.
//!
//! All characteristic UUIDs belong to the Muse vendor namespace
//! `273eXXXX-4c4d-454d-96be-f03bac821358`.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

// ── Service ──────────────────────────────────────────────────────────────────

/// Primary GATT service UUID advertised by all Muse devices.
pub const MUSE_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fe8d_0000_1000_8000_00805f9b34fb);

// ── Characteristics ───────────────────────────────────────────────────────────

/// Bidirectional control channel.
///
/// The host writes length-prefixed ASCII commands and receives JSON status
/// fragments in response notifications.
/// See [`encode_command`] and [`decode_response`] for the wire format.
pub const CONTROL_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x273e0001_4c4d_454d_96be_f03bac821358);

/// Telemetry characteristic (battery level, temperature, fuel-gauge voltage).
pub const TELEMETRY_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x273e000b_4c4d_454d_96be_f03bac821358);

/// Gyroscope characteristic, 3 × XYZ samples per notification.
pub const GYROSCOPE_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x273e0009_4c4d_454d_96be_f03bac821358);

/// Accelerometer characteristic, 3 × XYZ samples per notification.
pub const ACCELEROMETER_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x273e000a_4c4d_454d_96be_f03bac821358);

/// EEG per-channel characteristics, indexed by electrode:
///
/// | Index | UUID suffix | Electrode |
/// |-------|-------------|-----------|
/// | 0     | 0003        | TP9       |
/// | 1     | 0004        | AF7       |
/// | 2     | 0005        | AF8       |
/// | 3     | 0006        | TP10      |
/// | 4     | 0007        | AUX       |
pub const EEG_CHARACTERISTICS: [Uuid; EEG_CHANNEL_COUNT] = [
    Uuid::from_u128(0x273e0003_4c4d_454d_96be_f03bac821358), // TP9
    Uuid::from_u128(0x273e0004_4c4d_454d_96be_f03bac821358), // AF7
    Uuid::from_u128(0x273e0005_4c4d_454d_96be_f03bac821358), // AF8
    Uuid::from_u128(0x273e0006_4c4d_454d_96be_f03bac821358), // TP10
    Uuid::from_u128(0x273e0007_4c4d_454d_96be_f03bac821358), // AUX
];

/// PPG (optical heart-rate) characteristics, indexed by channel:
///
/// | Index | UUID suffix | Channel    |
/// |-------|-------------|------------|
/// | 0     | 000f        | ambient    |
/// | 1     | 0010        | infrared   |
/// | 2     | 0011        | red        |
pub const PPG_CHARACTERISTICS: [Uuid; PPG_CHANNEL_COUNT] = [
    Uuid::from_u128(0x273e000f_4c4d_454d_96be_f03bac821358), // ambient
    Uuid::from_u128(0x273e0010_4c4d_454d_96be_f03bac821358), // infrared
    Uuid::from_u128(0x273e0011_4c4d_454d_96be_f03bac821358), // red
];

// ── Sampling constants ────────────────────────────────────────────────────────

/// EEG sample rate in Hz.
pub const EEG_FREQUENCY: f64 = 256.0;

/// EEG voltage samples packed into one notification.
///
/// At 256 Hz, 12 samples represent 46.875 ms of signal per packet.
pub const EEG_SAMPLES_PER_READING: usize = 12;

/// Number of EEG electrodes, AUX included.
pub const EEG_CHANNEL_COUNT: usize = 5;

/// Electrodes streamed without the AUX input.
pub const EEG_STANDARD_CHANNELS: usize = 4;

/// PPG sample rate in Hz.
pub const PPG_FREQUENCY: f64 = 64.0;

/// PPG samples packed into one notification.
///
/// At 64 Hz, 6 samples represent 93.75 ms of signal per packet.
pub const PPG_SAMPLES_PER_READING: usize = 6;

/// Number of optical channels.
pub const PPG_CHANNEL_COUNT: usize = 3;

// ── Scale factors ─────────────────────────────────────────────────────────────

/// EEG µV per 12-bit count, applied after centring on 0x800.
pub const EEG_SCALE: f64 = 0.48828125;

/// Mid-scale of the 12-bit EEG ADC.
pub const EEG_OFFSET: f64 = 2048.0;

/// PPG normalized optical units per 12-bit count (full scale maps to 1.0).
pub const PPG_SCALE: f64 = 1.0 / 4096.0;

/// Accelerometer g per LSB (±2 g over a signed 16-bit range).
pub const ACCELEROMETER_SCALE: f32 = 0.0000610352;

/// Gyroscope °/s per LSB (±245 dps over a signed 16-bit range).
pub const GYROSCOPE_SCALE: f32 = 0.0074768;

// ── Human-readable labels ─────────────────────────────────────────────────────

/// Electrode names in [`EEG_CHARACTERISTICS`] index order.
pub const EEG_CHANNEL_NAMES: [&str; EEG_CHANNEL_COUNT] = ["TP9", "AF7", "AF8", "TP10", "AUX"];

/// Optical channel names in [`PPG_CHARACTERISTICS`] index order.
pub const PPG_CHANNEL_NAMES: [&str; PPG_CHANNEL_COUNT] = ["ambient", "infrared", "red"];

// ── Channel identity ──────────────────────────────────────────────────────────

/// The source of one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// EEG electrode, `0..EEG_CHANNEL_COUNT`.
    Eeg(usize),
    /// Optical channel, `0..PPG_CHANNEL_COUNT`.
    Ppg(usize),
    Telemetry,
    Accelerometer,
    Gyroscope,
    Control,
}

impl Channel {
    /// Map a GATT characteristic UUID to its channel.
    ///
    /// ```
    /// # use muse_decode::protocol::{Channel, EEG_CHARACTERISTICS};
    /// assert_eq!(Channel::from_characteristic(EEG_CHARACTERISTICS[2]), Some(Channel::Eeg(2)));
    /// ```
    pub fn from_characteristic(uuid: Uuid) -> Option<Self> {
        if let Some(electrode) = EEG_CHARACTERISTICS.iter().position(|&u| u == uuid) {
            return Some(Channel::Eeg(electrode));
        }
        if let Some(ppg_channel) = PPG_CHARACTERISTICS.iter().position(|&u| u == uuid) {
            return Some(Channel::Ppg(ppg_channel));
        }
        match uuid {
            CONTROL_CHARACTERISTIC => Some(Channel::Control),
            TELEMETRY_CHARACTERISTIC => Some(Channel::Telemetry),
            ACCELEROMETER_CHARACTERISTIC => Some(Channel::Accelerometer),
            GYROSCOPE_CHARACTERISTIC => Some(Channel::Gyroscope),
            _ => None,
        }
    }

    /// The GATT characteristic carrying this channel, if the index is valid.
    pub fn characteristic(self) -> Option<Uuid> {
        match self {
            Channel::Eeg(i) => EEG_CHARACTERISTICS.get(i).copied(),
            Channel::Ppg(i) => PPG_CHARACTERISTICS.get(i).copied(),
            Channel::Telemetry => Some(TELEMETRY_CHARACTERISTIC),
            Channel::Accelerometer => Some(ACCELEROMETER_CHARACTERISTIC),
            Channel::Gyroscope => Some(GYROSCOPE_CHARACTERISTIC),
            Channel::Control => Some(CONTROL_CHARACTERISTIC),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Eeg(i) => write!(f, "eeg{i}"),
            Channel::Ppg(i) => write!(f, "ppg{i}"),
            Channel::Telemetry => f.write_str("telemetry"),
            Channel::Accelerometer => f.write_str("accel"),
            Channel::Gyroscope => f.write_str("gyro"),
            Channel::Control => f.write_str("control"),
        }
    }
}

/// Returned when a channel tag or UUID does not name a Muse channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    /// Accepts the short tags produced by `Display` (`eeg0`, `ppg2`,
    /// `telemetry`, `accel`, `gyro`, `control`) or a characteristic UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownChannel(s.to_owned());
        let indexed = |rest: &str, count: usize| -> Option<usize> {
            rest.parse::<usize>().ok().filter(|&i| i < count)
        };

        match s {
            "telemetry" => return Ok(Channel::Telemetry),
            "accel" => return Ok(Channel::Accelerometer),
            "gyro" => return Ok(Channel::Gyroscope),
            "control" => return Ok(Channel::Control),
            _ => {}
        }
        if let Some(rest) = s.strip_prefix("eeg") {
            return indexed(rest, EEG_CHANNEL_COUNT)
                .map(Channel::Eeg)
                .ok_or_else(unknown);
        }
        if let Some(rest) = s.strip_prefix("ppg") {
            return indexed(rest, PPG_CHANNEL_COUNT)
                .map(Channel::Ppg)
                .ok_or_else(unknown);
        }
        Uuid::parse_str(s)
            .ok()
            .and_then(Channel::from_characteristic)
            .ok_or_else(unknown)
    }
}

// ── Control channel framing ───────────────────────────────────────────────────

/// Encode a text command for the Muse control characteristic.
///
/// The Muse expects a length-prefixed frame:
/// ```text
/// byte 0     : payload length (= command.len() + 1 for the trailing '\n')
/// bytes 1..N : ASCII command string
/// byte N+1   : '\n' terminator
/// ```
///
/// ```
/// # use muse_decode::protocol::encode_command;
/// assert_eq!(encode_command("v1"), &[3, b'v', b'1', b'\n']);
/// assert_eq!(encode_command(""), &[1, b'\n']);
/// ```
pub fn encode_command(cmd: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(cmd.len() + 2);
    bytes.push((cmd.len() + 1) as u8);
    bytes.extend_from_slice(cmd.as_bytes());
    bytes.push(b'\n');
    bytes
}

/// Decode a raw notification from the control characteristic into text.
///
/// ```text
/// byte 0     : payload length
/// bytes 1..N : UTF-8 (lossy) response fragment
/// ```
///
/// The length is clamped to the buffer. Returns an empty string if `bytes`
/// is empty. Fragments are reassembled by [`crate::control::ControlAccumulator`].
pub fn decode_response(bytes: &[u8]) -> String {
    let Some((&len, rest)) = bytes.split_first() else {
        return String::new();
    };
    let end = (len as usize).min(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_command_prefixes_length() {
        assert_eq!(encode_command("v1"), vec![3, 118, 49, 10]);
        assert_eq!(encode_command("p21"), vec![4, b'p', b'2', b'1', b'\n']);
    }

    #[test]
    fn decode_response_round_trips_encoded_frames() {
        assert_eq!(decode_response(&encode_command("{\"rc\":0}")), "{\"rc\":0}\n");
        assert_eq!(decode_response(&[]), "");
        assert_eq!(decode_response(&encode_command("")), "\n");
    }

    #[test]
    fn decode_response_clamps_overlong_length() {
        assert_eq!(decode_response(&[200, b'{', b'}']), "{}");
        assert_eq!(decode_response(&[0, b'x']), "");
    }

    #[test]
    fn channel_from_characteristic() {
        assert_eq!(
            Channel::from_characteristic(CONTROL_CHARACTERISTIC),
            Some(Channel::Control)
        );
        assert_eq!(
            Channel::from_characteristic(PPG_CHARACTERISTICS[1]),
            Some(Channel::Ppg(1))
        );
        assert_eq!(Channel::from_characteristic(MUSE_SERVICE_UUID), None);
        for (i, &uuid) in EEG_CHARACTERISTICS.iter().enumerate() {
            assert_eq!(Channel::Eeg(i).characteristic(), Some(uuid));
        }
    }

    #[test]
    fn channel_tags_parse_back() {
        for ch in [
            Channel::Eeg(0),
            Channel::Eeg(4),
            Channel::Ppg(2),
            Channel::Telemetry,
            Channel::Accelerometer,
            Channel::Gyroscope,
            Channel::Control,
        ] {
            assert_eq!(ch.to_string().parse::<Channel>(), Ok(ch));
        }
        assert_eq!(
            "273e000b-4c4d-454d-96be-f03bac821358".parse::<Channel>(),
            Ok(Channel::Telemetry)
        );
        assert!("eeg5".parse::<Channel>().is_err());
        assert!("ppg".parse::<Channel>().is_err());
        assert!("imu".parse::<Channel>().is_err());
    }
}

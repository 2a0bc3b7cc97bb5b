//! Per-connection decoding state.
//!
//! A [`Session`] takes notifications in arrival order, routes each one to its
//! parser, stamps EEG and PPG readings with the group's [`SequenceClock`] and
//! reassembles control responses. It performs no I/O; the transport owns
//! discovery, subscription and reconnection and calls [`Session::reset`] when
//! a new link is established.

use log::debug;
use uuid::Uuid;

use crate::clock::{now_ms, SequenceClock};
use crate::control::ControlAccumulator;
use crate::error::{Error, ParseError};
use crate::parse::{
    parse_accelerometer, parse_eeg, parse_gyroscope, parse_ppg, parse_telemetry, sequence_index,
    SEQUENCE_INDEX_LEN,
};
use crate::protocol::{decode_response, Channel, EEG_CHANNEL_COUNT, EEG_STANDARD_CHANNELS};
use crate::types::{ControlValue, EventMarker, MuseEvent};

/// Which optional channel groups a session decodes.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Decode the AUX (5th) EEG electrode. Default: `false`.
    pub enable_aux: bool,
    /// Decode the three PPG channels. Default: `false`.
    pub enable_ppg: bool,
}

impl SessionConfig {
    /// Number of EEG electrodes decoded under this configuration.
    pub fn eeg_channels(&self) -> usize {
        if self.enable_aux {
            EEG_CHANNEL_COUNT
        } else {
            EEG_STANDARD_CHANNELS
        }
    }
}

/// Decoding state for one connection.
///
/// ```
/// # use muse_decode::prelude::*;
/// let mut session = Session::new(SessionConfig::default());
/// let mut packet = vec![0x00, 0x2A];
/// packet.extend_from_slice(&[0x80; 18]);
/// let events = session.handle(Channel::Eeg(1), &packet);
/// match &events[0] {
///     Ok(MuseEvent::Eeg(r)) => assert_eq!((r.index, r.electrode, r.samples.len()), (42, 1, 12)),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    eeg_clock: SequenceClock,
    ppg_clock: SequenceClock,
    control: ControlAccumulator,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            eeg_clock: SequenceClock::eeg(),
            ppg_clock: SequenceClock::ppg(),
            control: ControlAccumulator::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn eeg_clock(&self) -> &SequenceClock {
        &self.eeg_clock
    }

    pub fn ppg_clock(&self) -> &SequenceClock {
        &self.ppg_clock
    }

    /// Decode one notification from `channel`.
    ///
    /// Binary channels yield at most one event. The control channel yields
    /// one entry per message the notification completes. Channels disabled
    /// by the configuration yield nothing.
    pub fn handle(&mut self, channel: Channel, data: &[u8]) -> Vec<Result<MuseEvent, Error>> {
        self.handle_at(channel, data, now_ms())
    }

    /// As [`Session::handle`], anchoring an unset clock at `now_ms`.
    pub fn handle_at(
        &mut self,
        channel: Channel,
        data: &[u8],
        now_ms: f64,
    ) -> Vec<Result<MuseEvent, Error>> {
        match channel {
            Channel::Control => self.push_control_text(&decode_response(data)),
            Channel::Telemetry => vec![parse_telemetry(data)
                .map(MuseEvent::Telemetry)
                .map_err(Error::from)],
            Channel::Accelerometer => vec![parse_accelerometer(data)
                .map(MuseEvent::Accelerometer)
                .map_err(Error::from)],
            Channel::Gyroscope => vec![parse_gyroscope(data)
                .map(MuseEvent::Gyroscope)
                .map_err(Error::from)],
            Channel::Eeg(electrode) => {
                if electrode >= self.config.eeg_channels() {
                    debug!("ignoring {channel}: not enabled");
                    return Vec::new();
                }
                let result = stamp(&mut self.eeg_clock, channel, data, now_ms)
                    .and_then(|ts| parse_eeg(data, electrode, ts))
                    .map(MuseEvent::Eeg);
                vec![result.map_err(Error::from)]
            }
            Channel::Ppg(ppg_channel) => {
                if !self.config.enable_ppg {
                    debug!("ignoring {channel}: PPG not enabled");
                    return Vec::new();
                }
                let result = stamp(&mut self.ppg_clock, channel, data, now_ms)
                    .and_then(|ts| parse_ppg(data, ppg_channel, ts))
                    .map(MuseEvent::Ppg);
                vec![result.map_err(Error::from)]
            }
        }
    }

    /// Decode a notification identified by its GATT characteristic.
    pub fn handle_characteristic(
        &mut self,
        uuid: Uuid,
        data: &[u8],
    ) -> Vec<Result<MuseEvent, Error>> {
        match Channel::from_characteristic(uuid) {
            Some(channel) => self.handle(channel, data),
            None => vec![Err(Error::UnknownCharacteristic(uuid))],
        }
    }

    /// Feed already-decoded control text.
    pub fn push_control_text(&mut self, fragment: &str) -> Vec<Result<MuseEvent, Error>> {
        self.control
            .push(fragment)
            .into_iter()
            .map(|r| r.map(MuseEvent::Control).map_err(Error::from))
            .collect()
    }

    /// Place an application marker on the timeline, at `timestamp` or now.
    pub fn inject_marker(
        &self,
        value: impl Into<ControlValue>,
        timestamp: Option<f64>,
    ) -> MuseEvent {
        MuseEvent::Marker(EventMarker {
            value: value.into(),
            timestamp: timestamp.unwrap_or_else(now_ms),
        })
    }

    /// Forget clocks and partial control text, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.eeg_clock.reset();
        self.ppg_clock.reset();
        self.control.reset();
    }
}

/// Read the sequence index and advance the group clock with it.
fn stamp(
    clock: &mut SequenceClock,
    channel: Channel,
    data: &[u8],
    now_ms: f64,
) -> Result<f64, ParseError> {
    let index = sequence_index(data).ok_or(ParseError::TooShort {
        channel,
        expected: SEQUENCE_INDEX_LEN,
        actual: data.len(),
    })?;
    Ok(clock.advance_at(index, now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_command, EEG_CHARACTERISTICS, PPG_CHARACTERISTICS};

    fn packet(index: u16, payload_len: usize) -> Vec<u8> {
        let mut data = index.to_be_bytes().to_vec();
        data.resize(2 + payload_len, 0x80);
        data
    }

    fn eeg_events(events: Vec<Result<MuseEvent, Error>>) -> Vec<crate::types::EegReading> {
        events
            .into_iter()
            .map(|e| match e {
                Ok(MuseEvent::Eeg(r)) => r,
                other => panic!("expected EEG, got {other:?}"),
            })
            .collect()
    }

    #[test]
    fn electrodes_share_one_clock() {
        let mut session = Session::new(SessionConfig::default());
        let mut readings = Vec::new();
        for electrode in 0..4 {
            readings.extend(eeg_events(session.handle_at(
                Channel::Eeg(electrode),
                &packet(10, 18),
                1000.0,
            )));
        }
        let t0 = 1000.0 - 46.875;
        assert!(readings.iter().all(|r| r.timestamp == t0));
        let next = eeg_events(session.handle_at(Channel::Eeg(2), &packet(11, 18), 0.0));
        assert_eq!(next[0].timestamp, t0 + 46.875);
        assert_eq!(session.eeg_clock().last_index(), Some(11));
        assert_eq!(session.ppg_clock().last_index(), None);
    }

    #[test]
    fn optional_groups_are_gated() {
        let mut session = Session::new(SessionConfig::default());
        assert!(session.handle(Channel::Eeg(4), &packet(1, 18)).is_empty());
        assert!(session.handle(Channel::Ppg(0), &packet(1, 9)).is_empty());

        let mut session = Session::new(SessionConfig {
            enable_aux: true,
            enable_ppg: true,
        });
        assert_eq!(session.handle(Channel::Eeg(4), &packet(1, 18)).len(), 1);
        let out = session.handle_at(Channel::Ppg(1), &packet(5, 9), 2000.0);
        match &out[..] {
            [Ok(MuseEvent::Ppg(r))] => {
                assert_eq!(r.ppg_channel, 1);
                assert_eq!(r.timestamp, 2000.0 - 93.75);
                assert_eq!(r.samples.len(), 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn routes_by_characteristic() {
        let mut session = Session::new(SessionConfig {
            enable_aux: false,
            enable_ppg: true,
        });
        let out = session.handle_characteristic(EEG_CHARACTERISTICS[3], &packet(1, 18));
        assert!(matches!(&out[..], [Ok(MuseEvent::Eeg(r))] if r.electrode == 3));
        let out = session.handle_characteristic(PPG_CHARACTERISTICS[2], &packet(1, 9));
        assert!(matches!(&out[..], [Ok(MuseEvent::Ppg(r))] if r.ppg_channel == 2));
        let out = session.handle_characteristic(Uuid::nil(), &[]);
        assert!(matches!(&out[..], [Err(Error::UnknownCharacteristic(u))] if u.is_nil()));
    }

    #[test]
    fn short_buffers_surface_parse_errors() {
        let mut session = Session::new(SessionConfig::default());
        let out = session.handle(Channel::Eeg(0), &[1]);
        assert!(matches!(
            &out[..],
            [Err(Error::Parse(ParseError::TooShort { expected: 2, actual: 1, .. }))]
        ));
        assert_eq!(session.eeg_clock().last_index(), None);
        let out = session.handle(Channel::Telemetry, &[0; 4]);
        assert!(matches!(&out[..], [Err(Error::Parse(_))]));
    }

    #[test]
    fn control_notifications_reassemble() {
        let mut session = Session::new(SessionConfig::default());
        assert!(session
            .handle(Channel::Control, &encode_command(r#"{"rc":"#)[..7])
            .is_empty());
        let out = session.handle(Channel::Control, &[6, b'0', b'}', b'{', b'x', b'}', b'!']);
        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Ok(MuseEvent::Control(c)) if c.status() == Some(0)));
        assert!(matches!(&out[1], Err(Error::Control(e)) if e.raw() == "{x}"));
    }

    #[test]
    fn reset_clears_state() {
        let mut session = Session::new(SessionConfig::default());
        session.handle_at(Channel::Eeg(0), &packet(500, 18), 0.0);
        session.push_control_text(r#"{"partial":"#);
        session.reset();
        assert_eq!(session.eeg_clock().last_index(), None);
        let out = session.push_control_text(r#"{"rc":0}"#);
        assert!(matches!(&out[..], [Ok(MuseEvent::Control(_))]));
    }

    #[test]
    fn markers_carry_value_and_time() {
        let session = Session::new(SessionConfig::default());
        let marker = session.inject_marker("blink", Some(12.5));
        assert_eq!(
            marker,
            MuseEvent::Marker(EventMarker {
                value: ControlValue::Text("blink".into()),
                timestamp: 12.5,
            })
        );
        match session.inject_marker(3.0, None) {
            MuseEvent::Marker(m) => assert!(m.timestamp > 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }
}

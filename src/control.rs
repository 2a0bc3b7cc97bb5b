//! Reassembly of JSON control responses from the control characteristic.
//!
//! The headset splits its status replies across several notifications and
//! may also pack the tail of one reply and the head of the next into one
//! notification. Fragments like `{"hn":`, `"Muse-AB12",`, `"rc":0}{"r` are
//! pushed in arrival order and every closing `}` completes one message.
//!
//! Control messages are flat objects. The first `}` ends a message whatever
//! the nesting, so a nested object would be cut short and fail to decode.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::error::ControlError;
use crate::types::{ControlResponse, ControlValue};

/// Incrementally assembles control-channel fragments into complete messages.
///
/// ```
/// # use muse_decode::control::ControlAccumulator;
/// let mut acc = ControlAccumulator::new();
/// assert!(acc.push(r#"{"fw":"3.4."#).is_empty());
/// let done = acc.push(r#"5","rc":0}"#);
/// let resp = done[0].as_ref().unwrap();
/// assert_eq!(resp.raw, r#"{"fw":"3.4.5","rc":0}"#);
/// assert_eq!(resp.status(), Some(0));
/// ```
#[derive(Debug, Default)]
pub struct ControlAccumulator {
    buffer: String,
    /// The buffer holds a completed message that has already been emitted.
    closed: bool,
}

impl ControlAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded fragment.
    ///
    /// Returns one entry per message completed inside this fragment, in
    /// order. A message that fails to decode is returned as an error and does
    /// not affect the next one.
    pub fn push(&mut self, fragment: &str) -> Vec<Result<ControlResponse, ControlError>> {
        let mut completed = Vec::new();
        for ch in fragment.chars() {
            if self.closed {
                self.buffer.clear();
                self.closed = false;
            }
            self.buffer.push(ch);
            if ch == '}' {
                self.closed = true;
                debug!("control message complete: {}", self.buffer);
                let decoded = decode_control(&self.buffer);
                if let Err(e) = &decoded {
                    warn!("{e}");
                }
                completed.push(decoded);
            }
        }
        completed
    }

    /// Text accumulated towards the next message.
    pub fn pending(&self) -> &str {
        if self.closed {
            ""
        } else {
            &self.buffer
        }
    }

    /// Drop any partial message, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.closed = false;
    }
}

/// Decode one complete message into a [`ControlResponse`].
pub fn decode_control(raw: &str) -> Result<ControlResponse, ControlError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|source| ControlError::Json {
        raw: raw.to_owned(),
        source,
    })?;
    if !value.is_object() {
        return Err(ControlError::NotAnObject {
            raw: raw.to_owned(),
        });
    }
    let fields: BTreeMap<String, ControlValue> =
        serde_json::from_value(value).map_err(|_| ControlError::NotAnObject {
            raw: raw.to_owned(),
        })?;
    Ok(ControlResponse {
        raw: raw.to_owned(),
        fields,
    })
}

/// Reassemble every message carried by a sequence of fragments.
///
/// The chunking of the fragments does not matter, only their concatenation.
pub fn reassemble_control<I>(
    fragments: I,
) -> impl Iterator<Item = Result<ControlResponse, ControlError>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut acc = ControlAccumulator::new();
    fragments
        .into_iter()
        .flat_map(move |fragment| acc.push(fragment.as_ref()))
}

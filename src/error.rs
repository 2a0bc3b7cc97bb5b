//! Error types for notification decoding.
//!
//! Every failure is scoped to a single notification or a single control
//! message; none of them leaves a decoder in a broken state.

use uuid::Uuid;

use crate::protocol::Channel;

/// A binary notification was too short for its fixed layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("{channel} notification too short: need {expected} bytes, got {actual}")]
    TooShort {
        channel: Channel,
        expected: usize,
        actual: usize,
    },
}

/// A completed control message could not be decoded.
///
/// The offending text is kept so callers can log or inspect it.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("control message is not valid JSON: {source} | raw: {raw}")]
    Json {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("control message is not a flat object of strings and numbers | raw: {raw}")]
    NotAnObject { raw: String },
}

impl ControlError {
    /// The raw message text that failed to decode.
    pub fn raw(&self) -> &str {
        match self {
            ControlError::Json { raw, .. } | ControlError::NotAnObject { raw } => raw,
        }
    }
}

/// Any error produced by [`crate::session::Session`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("characteristic {0} is not a known Muse channel")]
    UnknownCharacteristic(Uuid),
}

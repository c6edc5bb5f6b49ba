//! Inbound command decoding
//!
//! Payloads are case-insensitive ASCII words:
//! ```text
//! on | 1      -> TurnOn
//! off | 0     -> TurnOff
//! toggle      -> Toggle
//! status      -> QueryStatus
//! <anything>  -> Unknown(<text>)
//! ```
//!
//! Payloads longer than [`MAX_MSG_LEN`] are silently truncated and the prefix
//! is treated as the whole message. Decoding never fails.

use crate::limits::MAX_MSG_LEN;

/// A decoded actuator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    TurnOn,
    TurnOff,
    Toggle,
    QueryStatus,
    /// Unrecognized payload, original text (after truncation) preserved
    Unknown(String),
}

/// Return the accepted prefix of a payload
pub fn truncate(payload: &[u8]) -> &[u8] {
    &payload[..payload.len().min(MAX_MSG_LEN)]
}

/// Decode a raw payload into a [`Command`]
pub fn decode(payload: &[u8]) -> Command {
    let accepted = truncate(payload);

    if accepted.eq_ignore_ascii_case(b"on") || accepted == b"1" {
        Command::TurnOn
    } else if accepted.eq_ignore_ascii_case(b"off") || accepted == b"0" {
        Command::TurnOff
    } else if accepted.eq_ignore_ascii_case(b"toggle") {
        Command::Toggle
    } else if accepted.eq_ignore_ascii_case(b"status") {
        Command::QueryStatus
    } else {
        Command::Unknown(String::from_utf8_lossy(accepted).into_owned())
    }
}

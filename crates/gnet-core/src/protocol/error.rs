//! Protocol errors

use thiserror::Error;

/// Errors that can occur during Gnet bus communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Builder finished without an address or command
    #[error("Frame used before address and command were set")]
    NotConstructed,

    /// Reply too short or missing its terminator
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Reply checksum does not match its contents
    #[error("Checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumError {
        /// Checksum computed over the reply
        expected: u16,
        /// Checksum carried in the reply
        actual: u16,
    },

    /// Device answered with a status other than ACK
    #[error("Device returned error status {0:#04x}")]
    Status(u8),

    /// No reply before the read deadline
    #[error("Timeout waiting for device response")]
    Timeout,

    /// Reply spread over more USB packets than allowed
    #[error("Maximum number of response segments ({max}) exceeded")]
    TooManySegments {
        /// Configured packet limit
        max: usize,
    },

    /// USB packet with a bad length byte
    #[error("Malformed transport segment: {0}")]
    MalformedSegment(String),

    /// Monitor did not confirm its new address
    #[error(
        "Address {address} assignment to monitor with serial {serial} failed, response was {response:02x?}"
    )]
    AssignmentFailed {
        /// Serial of the monitor being addressed
        serial: u32,
        /// Address that was offered
        address: u8,
        /// Payload the monitor answered with
        response: Vec<u8>,
    },

    /// Escaped frame does not fit in one USB packet
    #[error("Frame too large for a single transport packet: {len} bytes (max {max})")]
    FrameTooLarge {
        /// Escaped frame length
        len: usize,
        /// Room in one packet
        max: usize,
    },

    /// Reply payload does not decode
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Argument out of range for the wire format
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation the device kind does not support
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// HID read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True for the one outcome callers are expected to recover from:
    /// a device (or the discovery race) that did not answer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtocolError::Timeout)
    }
}

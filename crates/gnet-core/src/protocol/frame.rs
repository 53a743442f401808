//! Frame encoding/decoding
//!
//! Outbound frame format:
//! - 1 byte: target address (RID)
//! - 1 byte: command (CID)
//! - N bytes: payload (optional)
//! - 2 bytes: CRC-16/GSM of address + command + payload (big-endian)
//! - 1 byte: terminator (0x7E)
//!
//! Inbound messages carry a source byte and a status byte in front of the payload,
//! and the checksum covers everything before it.

use byteorder::{BigEndian, ByteOrder};
use crc::{Crc, CRC_16_GSM};

use super::{Command, ProtocolError, GNET_ACK, GNET_TERM, GNET_TIMEOUT};

const GSM16: Crc<u16> = Crc::<u16>::new(&CRC_16_GSM);

/// Smallest and largest values representable as a signed 24-bit integer
const SINT24_MIN: i32 = -(1 << 23);
const SINT24_MAX: i32 = (1 << 23) - 1;

/// CRC-16/GSM (poly 0x1021, init 0x0000, xorout 0xFFFF, unreflected)
pub fn checksum(data: &[u8]) -> u16 {
    GSM16.checksum(data)
}

/// Encode a signed 24-bit integer as 3 big-endian two's-complement bytes
pub fn encode_sint24(value: i32) -> Result<[u8; 3], ProtocolError> {
    if !(SINT24_MIN..=SINT24_MAX).contains(&value) {
        return Err(ProtocolError::InvalidParameter(format!(
            "{} does not fit in a signed 24-bit integer",
            value
        )));
    }
    let mut bytes = [0u8; 3];
    BigEndian::write_i24(&mut bytes, value);
    Ok(bytes)
}

/// Decode 3 big-endian two's-complement bytes
pub fn decode_sint24(bytes: [u8; 3]) -> i32 {
    BigEndian::read_i24(&bytes)
}

/// An outbound Gnet frame, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    address: u8,
    command: u8,
    payload: Vec<u8>,
    bytes: Vec<u8>,
}

impl Frame {
    /// Build a frame for the given address, command and payload
    pub fn new(address: u8, command: u8, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();

        let mut bytes = Vec::with_capacity(payload.len() + 5);
        bytes.push(address);
        bytes.push(command);
        bytes.extend_from_slice(&payload);

        let mut crc_bytes = [0u8; 2];
        BigEndian::write_u16(&mut crc_bytes, checksum(&bytes));
        bytes.extend_from_slice(&crc_bytes);
        bytes.push(GNET_TERM);

        Self {
            address,
            command,
            payload,
            bytes,
        }
    }

    /// Build a frame for a known command
    pub fn for_command(address: u8, command: Command, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(address, command.code(), payload)
    }

    /// Destination address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Command code
    pub fn command(&self) -> u8 {
        self.command
    }

    /// Payload bytes between command and checksum
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Checksum carried in the encoded frame
    pub fn checksum(&self) -> u16 {
        let n = self.bytes.len();
        BigEndian::read_u16(&self.bytes[n - 3..n - 1])
    }

    /// The encoded frame, terminator included, before byte stuffing
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the frame and return its encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Length of the encoded frame
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a frame with no encoded bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builder for frames whose fields are filled in step by step
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    address: Option<u8>,
    command: Option<u8>,
    payload: Vec<u8>,
}

impl FrameBuilder {
    /// Create an empty frame builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target address
    pub fn address(mut self, address: u8) -> Self {
        self.address = Some(address);
        self
    }

    /// Set the command
    pub fn command(mut self, command: u8) -> Self {
        self.command = Some(command);
        self
    }

    /// Append raw bytes to the payload
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Append a single byte
    pub fn byte(mut self, b: u8) -> Self {
        self.payload.push(b);
        self
    }

    /// Append a 16-bit signed value (big-endian)
    pub fn i16_be(mut self, value: i16) -> Self {
        let mut bytes = [0u8; 2];
        BigEndian::write_i16(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Append a signed 24-bit value (big-endian, two's complement)
    pub fn sint24(mut self, value: i32) -> Result<Self, ProtocolError> {
        self.payload.extend_from_slice(&encode_sint24(value)?);
        Ok(self)
    }

    /// Build the frame; fails until both address and command are set
    pub fn build(self) -> Result<Frame, ProtocolError> {
        match (self.address, self.command) {
            (Some(address), Some(command)) => Ok(Frame::new(address, command, self.payload)),
            _ => Err(ProtocolError::NotConstructed),
        }
    }
}

/// A verified inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    source: u8,
    status: u8,
    payload: Vec<u8>,
}

impl Response {
    /// Create a response (used to synthesise device replies)
    pub fn new(source: u8, status: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            source,
            status,
            payload: payload.into(),
        }
    }

    /// An acknowledged response from `source` carrying `payload`
    pub fn ack(source: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(source, GNET_ACK, payload)
    }

    /// Parse and verify a raw, unescaped inbound message
    ///
    /// The status byte is checked first: a timeout status is reported as
    /// [`ProtocolError::Timeout`] whatever the rest of the message looks like.
    pub fn parse(raw: &[u8]) -> Result<Self, ProtocolError> {
        if raw.len() < 2 {
            return Err(ProtocolError::MalformedFrame(format!(
                "response too short ({} bytes)",
                raw.len()
            )));
        }

        let status = raw[1];
        if status == GNET_TIMEOUT {
            return Err(ProtocolError::Timeout);
        }
        if status != GNET_ACK {
            tracing::warn!("Unexpected response status {:#04x}: {:02x?}", status, raw);
            return Err(ProtocolError::Status(status));
        }

        if raw.len() < 5 {
            return Err(ProtocolError::MalformedFrame(format!(
                "response too short ({} bytes)",
                raw.len()
            )));
        }
        let n = raw.len();
        if raw[n - 1] != GNET_TERM {
            return Err(ProtocolError::MalformedFrame(format!(
                "response ends with {:#04x} instead of the terminator",
                raw[n - 1]
            )));
        }

        let actual = BigEndian::read_u16(&raw[n - 3..n - 1]);
        let expected = checksum(&raw[..n - 3]);
        if actual != expected {
            return Err(ProtocolError::ChecksumError { expected, actual });
        }

        Ok(Self {
            source: raw[0],
            status,
            payload: raw[2..n - 3].to_vec(),
        })
    }

    /// Encode to raw bytes, checksum and terminator included
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 5);
        bytes.push(self.source);
        bytes.push(self.status);
        bytes.extend_from_slice(&self.payload);

        let mut crc_bytes = [0u8; 2];
        BigEndian::write_u16(&mut crc_bytes, checksum(&bytes));
        bytes.extend_from_slice(&crc_bytes);
        bytes.push(GNET_TERM);
        bytes
    }

    /// Address of the answering device
    pub fn source(&self) -> u8 {
        self.source
    }

    /// Status byte of the reply
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Payload after the status byte
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the response and return its payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

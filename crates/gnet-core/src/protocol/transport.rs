//! Segmented USB HID transport
//!
//! The GLM adapter exchanges fixed 64-byte HID packets. Outbound frames are byte
//! stuffed and prefixed with `0x80 + length`; inbound messages arrive in one or
//! more packets whose first byte is the content length (always 63) and whose
//! content is NUL padded.

use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

use super::{
    escape, unescape, Frame, ProtocolError, Response, DEFAULT_MAX_SEGMENTS, DEFAULT_TIMEOUT_MS,
    GNET_TERM, MAX_PACKET_LEN,
};

/// Base value of the header byte prefixed to outbound frames
const SEND_HEADER_BASE: u8 = 0x80;

/// Largest escaped frame that fits in one outbound packet next to its header
const MAX_SEND_LEN: usize = MAX_PACKET_LEN - 1;

/// Byte-oriented access to the USB adapter
pub trait HidDevice {
    /// Write one packet
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read one packet, waiting at most `timeout`; returns 0 when the deadline expires
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Descriptive identity of the device, for diagnostics
    fn info(&self) -> AdapterInfo;
}

impl<D: HidDevice + ?Sized> HidDevice for Box<D> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).write(data)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read_timeout(buf, timeout)
    }

    fn info(&self) -> AdapterInfo {
        (**self).info()
    }
}

/// Identity strings reported by the USB adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterInfo {
    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

/// Request/response access to the bus
pub trait Transport {
    /// Send one frame
    fn send(&mut self, frame: &Frame) -> Result<(), ProtocolError>;

    /// Receive and verify one response
    fn receive(&mut self) -> Result<Response, ProtocolError>;

    /// Send a frame and wait for its response. No retries.
    fn send_receive(&mut self, frame: &Frame) -> Result<Response, ProtocolError> {
        self.send(frame)?;
        self.receive()
    }
}

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum number of packets one response may span
    pub max_segments: usize,
    /// Read deadline per packet in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_segments: DEFAULT_MAX_SEGMENTS,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Transport over the GLM adapter's USB HID interface
///
/// Owns the device handle; dropping the transport closes it.
pub struct UsbTransport<D> {
    device: D,
    config: TransportConfig,
}

impl<D: HidDevice> UsbTransport<D> {
    /// Create a transport with default settings
    pub fn new(device: D) -> Self {
        Self::with_config(device, TransportConfig::default())
    }

    /// Create a transport with explicit settings
    pub fn with_config(device: D, config: TransportConfig) -> Self {
        Self { device, config }
    }

    /// Current settings
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The underlying HID device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the underlying HID device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Give back the device handle
    pub fn into_inner(self) -> D {
        self.device
    }

    /// Identity of the underlying adapter
    pub fn info(&self) -> AdapterInfo {
        self.device.info()
    }

    /// Read packets until a terminator shows up, then reassemble and unescape them
    pub fn receive_raw(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let timeout = Duration::from_millis(self.config.read_timeout_ms);
        let mut message = Vec::with_capacity(MAX_PACKET_LEN);
        let mut segments = 0;

        loop {
            if segments >= self.config.max_segments {
                return Err(ProtocolError::TooManySegments {
                    max: self.config.max_segments,
                });
            }

            let mut packet = [0u8; MAX_PACKET_LEN];
            let n = self.device.read_timeout(&mut packet, timeout)?;
            if n == 0 {
                return Err(ProtocolError::Timeout);
            }
            tracing::trace!("HID read: {:02x?}", &packet[..n]);

            if n != MAX_PACKET_LEN {
                return Err(ProtocolError::MalformedSegment(format!(
                    "expected {} bytes, got {}",
                    MAX_PACKET_LEN, n
                )));
            }
            if packet[0] as usize != MAX_PACKET_LEN - 1 {
                return Err(ProtocolError::MalformedSegment(format!(
                    "length byte is {}, expected {}",
                    packet[0],
                    MAX_PACKET_LEN - 1
                )));
            }
            segments += 1;

            let content = &packet[1..];
            message.extend_from_slice(content);
            let last = content.iter().rposition(|&b| b != 0).map(|i| content[i]);
            if last == Some(GNET_TERM) {
                break;
            }
        }

        let len = message.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        message.truncate(len);
        tracing::debug!("Rcvd ({} segments): {:02x?}", segments, message);

        Ok(unescape(&message))
    }
}

impl<D: HidDevice> Transport for UsbTransport<D> {
    fn send(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        let escaped = escape(frame.as_bytes())?;

        // Outbound frames are never split over several packets
        if escaped.len() > MAX_SEND_LEN {
            return Err(ProtocolError::FrameTooLarge {
                len: escaped.len(),
                max: MAX_SEND_LEN,
            });
        }

        let mut packet = Vec::with_capacity(escaped.len() + 1);
        packet.push(SEND_HEADER_BASE + escaped.len() as u8);
        packet.extend_from_slice(&escaped);

        tracing::debug!("Sent: {:02x?}", frame.as_bytes());
        tracing::trace!("HID write: {:02x?}", packet);
        self.device.write(&packet)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Response, ProtocolError> {
        let raw = self.receive_raw()?;
        Response::parse(&raw)
    }
}

//! Gnet Protocol Communication
//!
//! Implements the Gnet RS-485 framing as tunnelled by the GLM adapter over USB HID.
//!
//! Frames are checksummed with CRC-16/GSM, terminated with `0x7E` and PPP-style
//! byte stuffed before they are handed to the segmented USB transport.

pub mod commands;
mod error;
pub mod frame;
pub mod stuffing;
pub mod transport;

pub use commands::Command;
pub use error::ProtocolError;
pub use frame::{checksum, decode_sint24, encode_sint24, Frame, FrameBuilder, Response};
pub use stuffing::{escape, unescape};
pub use transport::{AdapterInfo, HidDevice, Transport, TransportConfig, UsbTransport};

/// Frame terminator byte
pub const GNET_TERM: u8 = 0x7E;

/// Escape marker used by the byte stuffing layer
pub const GNET_ESC: u8 = 0x7D;

/// Response status: request acknowledged
pub const GNET_ACK: u8 = 0x09;

/// Response status: addressed device did not answer
pub const GNET_TIMEOUT: u8 = 0x0B;

/// Bus address of the GLM adapter itself
pub const ADAPTER_ADDRESS: u8 = 0x01;

/// First address handed out to discovered monitors
pub const FIRST_MONITOR_ADDRESS: u8 = 0x02;

/// Highest address handed out to discovered monitors
pub const MAX_MONITOR_ADDRESS: u8 = 127;

/// Address reaching all monitors that have not been assigned an address yet
pub const GNET_MULTICAST_ADDR: u8 = 0xF0;

/// Address reaching every device on the bus, the adapter included
pub const GNET_BROADCAST_ADDR: u8 = 0xFF;

/// Fixed size of a USB HID transport packet
pub const MAX_PACKET_LEN: usize = 64;

/// Default maximum number of packets one response may span
pub const DEFAULT_MAX_SEGMENTS: usize = 3;

/// Default read deadline per transport packet in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// USB vendor ID of the GLM adapter
pub const GLM_ADAPTER_VID: u16 = 0x1781;

/// USB product ID of the GLM adapter
pub const GLM_ADAPTER_PID: u16 = 0x0E40;

//! # Gnet Core Library
//!
//! Host-side control of Genelec SAM monitors through the GLM USB adapter.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

//!
//! This library provides:
//! - Gnet frame encoding with CRC-16/GSM and byte stuffing
//! - Segmented transport over the adapter's 64-byte HID reports
//! - Bus sessions with race/assign monitor discovery
//! - Per-device queries, telemetry polling and bypass control
//! - A simulated bus for running without hardware
//!
//! ## Example
//!
//! ```rust,ignore
//! use gnet_core::prelude::*;
//!
//! let device = gnet_core::hid::open_adapter(GLM_ADAPTER_VID, GLM_ADAPTER_PID)?;
//! let mut session = BusSession::new(UsbTransport::new(device));
//!
//! for found in session.discover(false) {
//!     println!("found {:?}", found?);
//! }
//! session.wakeup_all()?;
//! session.set_volume(-20.0)?;
//! ```

pub mod bus;
pub mod device;
#[cfg(feature = "hidapi")]
#[cfg_attr(docsrs, doc(cfg(feature = "hidapi")))]
pub mod hid;
pub mod protocol;
pub mod sim;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{BusSession, DiscoveredDevice, Discovery};
    pub use crate::device::{BypassConfig, Device, DeviceHandle, DeviceKind, LedColor, Telemetry};
    pub use crate::protocol::{
        Command, Frame, HidDevice, ProtocolError, Response, Transport, TransportConfig,
        UsbTransport, GLM_ADAPTER_PID, GLM_ADAPTER_VID,
    };
    pub use crate::sim::SimulatedBus;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

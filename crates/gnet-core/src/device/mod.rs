//! Bus devices
//!
//! A [`Device`] is the host-side record of one device on the bus: the GLM adapter
//! at address 1 or a SAM monitor that obtained its address during discovery.
//! Requests go through a [`DeviceHandle`], which pairs a device with the bus
//! transport for the duration of a call.

mod bypass;
mod handle;

pub use bypass::{BypassConfig, LedColor};
pub use handle::DeviceHandle;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::protocol::{decode_sint24, ProtocolError, ADAPTER_ADDRESS};

/// Named numeric telemetry fields, as reported by the most recent polls
pub type Telemetry = BTreeMap<String, f64>;

/// Monitor poll: temperature in °C
pub const FIELD_TEMPERATURE: &str = "temperature";
/// Monitor poll: input level in dBFS
pub const FIELD_INPUT_DBFS: &str = "input_dBFS";
/// Monitor poll: output level in dBFS
pub const FIELD_OUTPUT_DBFS: &str = "output_dBFS";
/// Adapter poll: calibration microphone level in dB SPL
pub const FIELD_MICROPHONE_DBSPL: &str = "microphone_dBSPL";

/// Reference pressure for dB SPL, in µPa
const SPL_REFERENCE_UPA: f64 = 20.0;

const MONITOR_POLL_MIN_LEN: usize = 13;
const ADAPTER_POLL_MIN_LEN: usize = 6;

/// What kind of device sits at an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceKind {
    /// The GLM USB adapter
    Adapter,
    /// A SAM monitor or subwoofer, identified by its 24-bit serial number
    Monitor {
        /// Serial number announced during discovery
        serial: u32,
    },
}

/// Hardware identification, split into five fields from the right
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    /// Hardware string fields, leftmost first
    pub fields: [String; 5],
}

impl HardwareInfo {
    /// Parse a hardware string. The leftmost field keeps any embedded spaces.
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        let mut parts: Vec<&str> = s.rsplitn(5, ' ').collect();
        if parts.len() < 5 {
            return Err(ProtocolError::MalformedResponse(format!(
                "hardware string {:?} has {} fields, expected 5",
                s,
                parts.len()
            )));
        }
        parts.reverse();
        Ok(Self {
            fields: [
                parts[0].to_string(),
                parts[1].to_string(),
                parts[2].to_string(),
                parts[3].to_string(),
                parts[4].to_string(),
            ],
        })
    }

    /// Model name
    pub fn model(&self) -> &str {
        &self.fields[0]
    }
}

/// Host-side state of one bus device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    address: u8,
    kind: DeviceKind,
    /// Last hardware identification read
    pub hardware: Option<HardwareInfo>,
    /// Last software version string read
    pub software: Option<String>,
    /// Last bar code read
    pub barcode: Option<String>,
    /// Microphone serial number (adapter only)
    pub mic_serial: Option<String>,
    /// Cumulative telemetry, merged from every poll
    pub telemetry: Telemetry,
}

impl Device {
    /// The GLM adapter at address 1
    pub fn adapter() -> Self {
        Self::new(ADAPTER_ADDRESS, DeviceKind::Adapter)
    }

    /// A monitor discovered at `address`
    pub fn monitor(address: u8, serial: u32) -> Self {
        Self::new(address, DeviceKind::Monitor { serial })
    }

    fn new(address: u8, kind: DeviceKind) -> Self {
        Self {
            address,
            kind,
            hardware: None,
            software: None,
            barcode: None,
            mic_serial: None,
            telemetry: Telemetry::new(),
        }
    }

    /// Bus address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Adapter or monitor
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// True for the GLM adapter
    pub fn is_adapter(&self) -> bool {
        self.kind == DeviceKind::Adapter
    }

    /// Serial number, for monitors
    pub fn serial(&self) -> Option<u32> {
        match self.kind {
            DeviceKind::Monitor { serial } => Some(serial),
            DeviceKind::Adapter => None,
        }
    }

    /// Version and build fields (3rd and 5th) of a `;`-separated software string
    pub fn software_version(&self) -> Option<(&str, &str)> {
        let mut fields = self.software.as_deref()?.split(';');
        let version = fields.nth(2)?;
        let build = fields.nth(1)?;
        Some((version, build))
    }

    /// Decode a poll payload for this kind of device
    pub fn decode_poll(&self, payload: &[u8]) -> Result<Telemetry, ProtocolError> {
        match self.kind {
            DeviceKind::Adapter => decode_adapter_poll(payload),
            DeviceKind::Monitor { .. } => decode_monitor_poll(payload),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.address)?;
        if let Some(hw) = &self.hardware {
            write!(f, "{}", hw.model())?;
        }
        if let Some(serial) = self.serial() {
            write!(f, "#{}", serial)?;
        }
        Ok(())
    }
}

/// Decode a monitor poll reply
///
/// Byte 1 is the temperature in °C, bytes 6 and 12 the signed input and
/// output levels in dBFS. An empty payload carries no new telemetry.
pub fn decode_monitor_poll(payload: &[u8]) -> Result<Telemetry, ProtocolError> {
    let mut fields = Telemetry::new();
    if payload.is_empty() {
        return Ok(fields);
    }
    if payload.len() < MONITOR_POLL_MIN_LEN {
        return Err(ProtocolError::MalformedResponse(format!(
            "monitor poll reply has {} bytes, expected at least {}",
            payload.len(),
            MONITOR_POLL_MIN_LEN
        )));
    }

    fields.insert(FIELD_TEMPERATURE.to_string(), f64::from(payload[1]));
    fields.insert(FIELD_INPUT_DBFS.to_string(), f64::from(payload[6] as i8));
    fields.insert(FIELD_OUTPUT_DBFS.to_string(), f64::from(payload[12] as i8));
    Ok(fields)
}

/// Decode an adapter poll reply
///
/// Bytes 3..6 hold the microphone level as a signed 24-bit linear value. A
/// non-positive reading means no microphone is connected and is not reported.
pub fn decode_adapter_poll(payload: &[u8]) -> Result<Telemetry, ProtocolError> {
    let mut fields = Telemetry::new();
    if payload.is_empty() {
        return Ok(fields);
    }
    if payload.len() < ADAPTER_POLL_MIN_LEN {
        return Err(ProtocolError::MalformedResponse(format!(
            "adapter poll reply has {} bytes, expected at least {}",
            payload.len(),
            ADAPTER_POLL_MIN_LEN
        )));
    }

    let spl_raw = decode_sint24([payload[3], payload[4], payload[5]]);
    if spl_raw > 0 {
        fields.insert(
            FIELD_MICROPHONE_DBSPL.to_string(),
            db_spl_from_linear(spl_raw),
        );
    }
    Ok(fields)
}

/// Convert a linear microphone reading to dB SPL
pub fn db_spl_from_linear(linear: i32) -> f64 {
    20.0 * (f64::from(linear) / SPL_REFERENCE_UPA).log10()
}

/// Decode a text reply: UTF-8 with trailing NULs and whitespace trimmed
pub(crate) fn decode_text(payload: &[u8]) -> Result<String, ProtocolError> {
    let end = payload.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let s = std::str::from_utf8(&payload[..end])
        .map_err(|e| ProtocolError::MalformedResponse(format!("invalid UTF-8: {}", e)))?;
    Ok(s.trim_end().to_string())
}

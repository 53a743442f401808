//! Protocol commands
//!
//! Command identifiers (CIDs) understood by the GLM adapter and SAM monitors.

use serde::{Deserialize, Serialize};

/// Gnet command identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Hardware identification string
    HardwareQuery,

    /// Status/telemetry poll
    Poll,

    /// Software version string
    SoftwareQuery,

    /// Keep-alive broadcast
    StayOnline,

    /// Bypass register (mute, LED colour and blinking)
    Bypass,

    /// Group volume, signed 24-bit linear
    VolumeGlm,

    /// Digital summing gain, signed 16-bit
    DigisumGain,

    /// Bar code string
    BarCode,

    /// Wakeup/shutdown broadcast
    Wakeup,

    /// Serial number of the calibration microphone (adapter only)
    MicSerial,

    /// Assign a bus address (RID) to the monitor with a given serial
    SetRid,

    /// Ask one unassigned monitor to announce its serial number
    Race,
}

impl Command {
    /// Wire code of this command
    pub fn code(&self) -> u8 {
        match self {
            Command::HardwareQuery => 0x02,
            Command::Poll => 0x08,
            Command::SoftwareQuery => 0x0D,
            Command::StayOnline => 0x0F,
            Command::Bypass => 0x11,
            Command::VolumeGlm => 0x1F,
            Command::DigisumGain => 0x2C,
            Command::BarCode => 0x32,
            Command::Wakeup => 0x3A,
            Command::MicSerial => 0x51,
            Command::SetRid => 0xFD,
            Command::Race => 0xFE,
        }
    }

    /// Look up a command by its wire code
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x02 => Command::HardwareQuery,
            0x08 => Command::Poll,
            0x0D => Command::SoftwareQuery,
            0x0F => Command::StayOnline,
            0x11 => Command::Bypass,
            0x1F => Command::VolumeGlm,
            0x2C => Command::DigisumGain,
            0x32 => Command::BarCode,
            0x3A => Command::Wakeup,
            0x51 => Command::MicSerial,
            0xFD => Command::SetRid,
            0xFE => Command::Race,
            _ => return None,
        })
    }

    /// Check if this command expects a response
    pub fn expects_response(&self) -> bool {
        !matches!(
            self,
            Command::StayOnline | Command::VolumeGlm | Command::Wakeup
        )
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd.code()
    }
}

//! Bypass register encoding
//!
//! Bit layout of the single bypass byte:
//! - bit 0: mute
//! - bits 1-2: LED colour
//! - bit 3: LED pulsing
//! - bit 4: invert LED enable
//!
//! Fields that are `None` leave their bits at the value given in `value`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::protocol::ProtocolError;

/// Front panel LED colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    /// LED off
    Off,
    /// Green LED
    Green,
    /// Red LED
    Red,
    /// Yellow LED
    Yellow,
    /// Raw 2-bit colour code
    Code(u8),
}

impl LedColor {
    /// The 2-bit colour code
    pub fn code(&self) -> u8 {
        match self {
            LedColor::Off => 0,
            LedColor::Green => 1,
            LedColor::Red => 2,
            LedColor::Yellow => 3,
            LedColor::Code(c) => c & 0x03,
        }
    }
}

impl FromStr for LedColor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LedColor::Off),
            "green" => Ok(LedColor::Green),
            "red" => Ok(LedColor::Red),
            "yellow" => Ok(LedColor::Yellow),
            other => other
                .parse::<u8>()
                .ok()
                .filter(|c| *c <= 3)
                .map(LedColor::Code)
                .ok_or_else(|| {
                    ProtocolError::InvalidParameter(format!("unknown LED color {:?}", s))
                }),
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedColor::Off => write!(f, "off"),
            LedColor::Green => write!(f, "green"),
            LedColor::Red => write!(f, "red"),
            LedColor::Yellow => write!(f, "yellow"),
            LedColor::Code(c) => write!(f, "{}", c),
        }
    }
}

/// Settings for one bypass write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassConfig {
    /// Base register value the other fields are OR-ed into
    pub value: Option<u8>,
    /// Mute (`true`) or unmute (`false`)
    pub mute: Option<bool>,
    /// LED colour
    pub led_color: Option<LedColor>,
    /// Pulsing (`true`) or solid (`false`) LED
    pub led_pulsing: Option<bool>,
    /// Swap LED on and off
    pub invert_led_enable: Option<bool>,
}

impl BypassConfig {
    /// Only set the mute bit
    pub fn mute(mute: bool) -> Self {
        Self {
            mute: Some(mute),
            ..Self::default()
        }
    }

    /// Assemble the register byte
    pub fn encode(&self) -> u8 {
        let mut value = self.value.unwrap_or(0);
        if let Some(mute) = self.mute {
            value |= u8::from(mute);
        }
        if let Some(color) = self.led_color {
            value |= color.code() << 1;
        }
        if let Some(pulsing) = self.led_pulsing {
            value |= u8::from(pulsing) << 3;
        }
        if let Some(invert) = self.invert_led_enable {
            value |= u8::from(invert) << 4;
        }
        value
    }
}

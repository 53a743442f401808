use anyhow::Context;
use clap::Args;
use gnet_core::device::{BypassConfig, DeviceHandle, LedColor};
use gnet_core::protocol::ProtocolError;

use super::{select_monitors, BusTransport, Session};
use crate::args::MonitorRef;
use crate::output::Output;

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// SAM monitor addresses or #serials (comma separated); all when omitted
    #[arg(short, long, value_name = "LIST", value_delimiter = ',')]
    pub monitors: Vec<MonitorRef>,
}

#[derive(Args, Debug)]
pub struct GainArgs {
    #[command(flatten)]
    pub monitors: MonitorArgs,

    /// Digital summing gain
    #[arg(long, allow_hyphen_values = true)]
    pub gain: i16,
}

#[derive(Args, Debug)]
pub struct BypassArgs {
    #[command(flatten)]
    pub monitors: MonitorArgs,

    /// Bypass register value to start from
    #[arg(long, hide = true)]
    pub value: Option<u8>,

    /// Mute sound
    #[arg(long, conflicts_with = "unmute")]
    pub mute: bool,

    /// Unmute sound
    #[arg(long)]
    pub unmute: bool,

    /// LED color (green, red, yellow), or off
    #[arg(long, value_name = "COLOR")]
    pub led_color: Option<LedColor>,

    /// Pulsing LED light
    #[arg(long, conflicts_with = "led_solid")]
    pub led_pulsing: bool,

    /// Solid LED light
    #[arg(long)]
    pub led_solid: bool,

    /// Invert LED on/off
    #[arg(long)]
    pub invert_led_enable: bool,
}

impl BypassArgs {
    pub fn config(&self) -> BypassConfig {
        BypassConfig {
            value: self.value,
            mute: flag_pair(self.mute, self.unmute),
            led_color: self.led_color,
            led_pulsing: flag_pair(self.led_pulsing, self.led_solid),
            invert_led_enable: self.invert_led_enable.then_some(true),
        }
    }
}

/// `--x` / `--no-x` style pair: unset when neither flag is given
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}

pub fn mute(
    session: &mut Session,
    args: &MonitorArgs,
    mute: bool,
    out: Output,
) -> anyhow::Result<()> {
    let verb = if mute { "Muting" } else { "Unmuting" };
    for_each_monitor(session, &args.monitors, |device| {
        out.note(&format!("{} monitor {}", verb, device.device()));
        device.mute(mute)
    })
}

pub fn gain(session: &mut Session, args: &GainArgs, out: Output) -> anyhow::Result<()> {
    for_each_monitor(session, &args.monitors.monitors, |device| {
        out.note(&format!(
            "Setting gain of monitor {} to {}",
            device.device(),
            args.gain
        ));
        device.set_digisum_gain(args.gain)
    })
}

pub fn bypass(session: &mut Session, args: &BypassArgs, out: Output) -> anyhow::Result<()> {
    let config = args.config();
    for_each_monitor(session, &args.monitors.monitors, |device| {
        out.note(&format!(
            "Setting monitor {} to bypass: {:#04x}",
            device.device(),
            config.encode()
        ));
        device.set_bypass(&config)
    })
}

fn for_each_monitor<F>(session: &mut Session, requested: &[MonitorRef], mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&mut DeviceHandle<'_, BusTransport>) -> Result<(), ProtocolError>,
{
    for address in select_monitors(session, requested)? {
        let Some(mut device) = session.device_mut(address) else {
            continue;
        };
        f(&mut device).with_context(|| format!("Monitor {}", device.device()))?;
    }
    Ok(())
}

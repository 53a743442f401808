mod bus;
mod discover;
mod monitor;
mod poll;

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use gnet_core::bus::BusSession;
use gnet_core::protocol::{HidDevice, TransportConfig, UsbTransport, ADAPTER_ADDRESS};
use gnet_core::sim::SimulatedBus;

use crate::args::MonitorRef;
use crate::output::Output;

pub use bus::VolumeArgs;
pub use monitor::{BypassArgs, GainArgs, MonitorArgs};
pub use poll::PollArgs;

/// Transport over whichever adapter the user picked
pub type BusTransport = UsbTransport<Box<dyn HidDevice>>;

pub type Session = BusSession<BusTransport>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover devices on the GLM network
    Discover,
    /// Set volume for all GLM devices
    SetVolume(VolumeArgs),
    /// Poll parameters of SAM monitors
    Poll(PollArgs),
    /// Wake up all SAM monitors
    Wakeup,
    /// Put all SAM monitors to sleep
    Shutdown,
    /// Keep all SAM monitors online
    StayOnline,
    /// Mute SAM monitors
    Mute(MonitorArgs),
    /// Unmute SAM monitors
    Unmute(MonitorArgs),
    /// Set SAM monitor gain
    Gain(GainArgs),
    /// Set monitor bypass
    Bypass(BypassArgs),
}

/// Options deciding how the bus is reached
#[derive(Args, Debug, Clone)]
pub struct BusOptions {
    /// Use a simulated bus with N monitors instead of the USB adapter
    #[arg(long, value_name = "N", global = true)]
    pub simulate: Option<usize>,

    /// Seed for the simulated bus
    #[arg(long, value_name = "SEED", global = true, requires = "simulate")]
    pub seed: Option<u64>,

    /// Read deadline per USB packet in milliseconds
    #[arg(long, value_name = "MS", default_value_t = gnet_core::protocol::DEFAULT_TIMEOUT_MS, global = true)]
    pub timeout_ms: u64,

    /// Maximum number of USB packets per response
    #[arg(long, value_name = "N", default_value_t = gnet_core::protocol::DEFAULT_MAX_SEGMENTS, global = true)]
    pub max_segments: usize,
}

impl BusOptions {
    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            max_segments: self.max_segments,
            read_timeout_ms: self.timeout_ms,
        }
    }
}

/// Open the bus once and run `commands` on it in order, stopping at the first error
pub fn run<I>(commands: I, opts: &BusOptions, out: Output) -> anyhow::Result<()>
where
    I: IntoIterator<Item = Command>,
{
    let mut session = open_session(opts)?;
    run_on(&mut session, commands, out)
}

fn run_on<I>(session: &mut Session, commands: I, out: Output) -> anyhow::Result<()>
where
    I: IntoIterator<Item = Command>,
{
    for command in commands {
        run_one(session, command, out)?;
    }
    Ok(())
}

fn run_one(session: &mut Session, command: Command, out: Output) -> anyhow::Result<()> {
    match command {
        Command::Discover => discover::run(session, out),
        Command::SetVolume(args) => bus::set_volume(session, &args, out),
        Command::Poll(args) => poll::run(session, &args, out),
        Command::Wakeup => {
            out.note("Waking up all SAM monitors");
            Ok(session.wakeup_all()?)
        }
        Command::Shutdown => {
            out.note("Putting all SAM monitors to sleep");
            Ok(session.shutdown_all()?)
        }
        Command::StayOnline => Ok(session.stay_online()?),
        Command::Mute(args) => monitor::mute(session, &args, true, out),
        Command::Unmute(args) => monitor::mute(session, &args, false, out),
        Command::Gain(args) => monitor::gain(session, &args, out),
        Command::Bypass(args) => monitor::bypass(session, &args, out),
    }
}

fn open_session(opts: &BusOptions) -> anyhow::Result<Session> {
    let device: Box<dyn HidDevice> = match opts.simulate {
        Some(monitors) => {
            tracing::info!("Using a simulated bus with {} monitors", monitors);
            Box::new(match opts.seed {
                Some(seed) => SimulatedBus::with_seed(monitors, seed),
                None => SimulatedBus::new(monitors),
            })
        }
        None => open_adapter()?,
    };
    Ok(BusSession::new(UsbTransport::with_config(
        device,
        opts.transport_config(),
    )))
}

#[cfg(feature = "hid")]
fn open_adapter() -> anyhow::Result<Box<dyn HidDevice>> {
    use gnet_core::protocol::{GLM_ADAPTER_PID, GLM_ADAPTER_VID};

    let device = gnet_core::hid::open_adapter(GLM_ADAPTER_VID, GLM_ADAPTER_PID)
        .context("Opening USB device")?;
    Ok(Box::new(device))
}

#[cfg(not(feature = "hid"))]
fn open_adapter() -> anyhow::Result<Box<dyn HidDevice>> {
    bail!("built without USB HID support; rebuild with `--features hid` or pass --simulate N")
}

/// Discover the bus and resolve the requested monitors
///
/// With no list, every discovered monitor is selected. The adapter is never a
/// target.
fn select_monitors(session: &mut Session, requested: &[MonitorRef]) -> anyhow::Result<Vec<u8>> {
    session
        .discover_all()
        .context("Discovering monitors")?;

    let monitors: Vec<u8> = session
        .addresses()
        .into_iter()
        .filter(|&a| a != ADAPTER_ADDRESS)
        .collect();
    if requested.is_empty() {
        return Ok(monitors);
    }

    let mut selected = Vec::with_capacity(requested.len());
    let mut missing = Vec::new();
    for monitor in requested {
        let address = match *monitor {
            MonitorRef::Address(a) => monitors.contains(&a).then_some(a),
            MonitorRef::Serial(s) => session.find_by_serial(s).map(|d| d.address()),
        };
        match address {
            Some(a) if !selected.contains(&a) => selected.push(a),
            Some(_) => {}
            None => missing.push(monitor.to_string()),
        }
    }
    if !missing.is_empty() {
        bail!(
            "Monitor list contains monitors that were not discovered: {}",
            missing.join(", ")
        );
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated(monitors: usize) -> Session {
        let opts = BusOptions {
            simulate: Some(monitors),
            seed: Some(3),
            timeout_ms: 10,
            max_segments: 3,
        };
        open_session(&opts).unwrap()
    }

    #[test]
    fn selects_all_monitors_by_default() {
        let mut session = simulated(3);
        assert_eq!(select_monitors(&mut session, &[]).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn selects_by_address_and_serial() {
        let mut session = simulated(3);
        select_monitors(&mut session, &[]).unwrap();
        let serial = session.device(4).and_then(|d| d.serial()).unwrap();

        let picked = select_monitors(
            &mut session,
            &[MonitorRef::Serial(serial), MonitorRef::Address(2), MonitorRef::Address(4)],
        )
        .unwrap();
        assert_eq!(picked, vec![4, 2]);
    }

    #[test]
    fn chained_commands_share_one_session() {
        let mut session = simulated(2);
        let out = Output::new(true);

        run_on(&mut session, [Command::Discover, Command::Shutdown], out).unwrap();
        assert_eq!(session.addresses(), vec![1, 2, 3]);
        // Sleeping monitors answer polls without telemetry
        assert!(session.device_mut(3).unwrap().poll().unwrap().is_empty());

        run_on(
            &mut session,
            [Command::Wakeup, Command::Shutdown, Command::Wakeup],
            out,
        )
        .unwrap();
        assert_eq!(session.device_mut(3).unwrap().poll().unwrap().len(), 3);
        // Discovery already ran, so nothing new turns up
        assert!(session.discover_all().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_monitors() {
        let mut session = simulated(1);
        let err = select_monitors(&mut session, &[MonitorRef::Address(9), MonitorRef::Address(1)])
            .unwrap_err();
        assert!(err.to_string().contains("9, 1"));
    }
}

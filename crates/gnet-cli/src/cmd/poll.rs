use anyhow::Context;
use clap::Args;
use std::time::Duration;

use super::Session;
use crate::args::parse_interval;
use crate::output::Output;

#[derive(Args, Debug)]
pub struct PollArgs {
    /// Poll N times
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub count: u32,

    /// Poll until interrupted
    #[arg(long)]
    pub continuous: bool,

    /// Seconds between rounds
    #[arg(long, value_name = "SECONDS", default_value = "1", value_parser = parse_interval)]
    pub interval: Duration,
}

pub fn run(session: &mut Session, args: &PollArgs, out: Output) -> anyhow::Result<()> {
    session.attach_adapter();
    session
        .discover_all()
        .context("Discovering monitors")?;

    let mut remaining = args.count;
    while args.continuous || remaining > 0 {
        remaining = remaining.saturating_sub(1);
        poll_round(session, out)?;

        if !args.interval.is_zero() && (args.continuous || remaining > 0) {
            // Pick up monitors that came online since the last round
            session
                .discover_all()
                .context("Discovering monitors")?;
            std::thread::sleep(args.interval);
        }
    }
    Ok(())
}

fn poll_round(session: &mut Session, out: Output) -> anyhow::Result<()> {
    for address in session.addresses() {
        let Some(mut device) = session.device_mut(address) else {
            continue;
        };
        match device.poll() {
            Ok(_) => {
                if !device.device().telemetry.is_empty() {
                    out.telemetry(device.device());
                }
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!("Timeout polling {}", device.device());
            }
            Err(e) => return Err(e).context(format!("Polling {}", device.device())),
        }
    }
    Ok(())
}

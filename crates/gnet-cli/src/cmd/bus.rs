use clap::Args;

use super::Session;
use crate::args::parse_volume;
use crate::output::Output;

#[derive(Args, Debug)]
pub struct VolumeArgs {
    /// Volume in dB (e.g. -20dB) or percent (e.g. 50%)
    #[arg(long, value_name = "VOLUME %/dB", value_parser = parse_volume, allow_hyphen_values = true)]
    pub volume: f64,
}

pub fn set_volume(session: &mut Session, args: &VolumeArgs, out: Output) -> anyhow::Result<()> {
    out.note(&format!("Setting volume to {:.2} dB", args.volume));
    session.set_volume(args.volume)?;
    Ok(())
}

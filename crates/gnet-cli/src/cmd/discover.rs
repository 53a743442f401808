use anyhow::Context;
use gnet_core::bus::DiscoveredDevice;
use gnet_core::device::DeviceHandle;
use gnet_core::protocol::{ProtocolError, Transport, ADAPTER_ADDRESS};

use super::Session;
use crate::output::Output;

pub fn run(session: &mut Session, out: Output) -> anyhow::Result<()> {
    out.adapter(&session.transport().info());

    let mut adapter = session.attach_adapter();
    identify(&mut adapter).context("Querying the GLM adapter")?;
    out.device(adapter.device());

    let found: Vec<DiscoveredDevice> = session
        .discover(true)
        .collect::<Result<_, _>>()
        .context("Discovering monitors")?;

    for monitor in found.iter().filter(|d| d.address != ADAPTER_ADDRESS) {
        let Some(mut handle) = session.device_mut(monitor.address) else {
            continue;
        };
        match identify(&mut handle) {
            Ok(()) => out.device(handle.device()),
            Err(e) if e.is_timeout() => {
                tracing::warn!("Timeout communicating with monitor {}", handle.device());
            }
            Err(e) => return Err(e).context(format!("Querying monitor {}", handle.device())),
        }
    }
    Ok(())
}

fn identify<T: Transport + ?Sized>(device: &mut DeviceHandle<'_, T>) -> Result<(), ProtocolError> {
    device.query_hardware()?;
    device.query_software()?;
    device.query_barcode()?;
    if device.device().is_adapter() {
        device.query_mic_serial()?;
    }
    Ok(())
}

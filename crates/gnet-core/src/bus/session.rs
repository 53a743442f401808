//! Bus session: the device group behind one adapter

use std::collections::BTreeMap;

use super::Discovery;
use crate::device::{Device, DeviceHandle};
use crate::protocol::{
    encode_sint24, Command, Frame, ProtocolError, Transport, ADAPTER_ADDRESS,
    FIRST_MONITOR_ADDRESS, GNET_BROADCAST_ADDR, GNET_MULTICAST_ADDR,
};

/// Full scale of the linear volume code
const VOLUME_FULL_SCALE: f64 = ((1 << 23) - 1) as f64;

/// Wakeup payloads, each broadcast twice
const WAKEUP_PAYLOADS: [[u8; 2]; 2] = [[0x03, 0x7F], [0x03, 0x01]];

/// Shutdown payloads, each broadcast twice
const SHUTDOWN_PAYLOADS: [[u8; 2]; 2] = [[0x03, 0x02], [0x03, 0x00]];

/// Largest serial number a monitor can announce
const MAX_SERIAL: u32 = 0xFF_FFFF;

/// Convert a volume in dB to the signed 24-bit linear code sent on the bus
///
/// The scaled ratio is truncated toward zero, so 0 dB maps to `0x7FFFFF` and
/// -20 dB to `0x0CCCCC`.
pub fn volume_code_from_db(db: f64) -> Result<i32, ProtocolError> {
    if !db.is_finite() {
        return Err(ProtocolError::InvalidParameter(format!(
            "volume {} dB is not a finite number",
            db
        )));
    }
    let linear = 10f64.powf(db / 20.0) * VOLUME_FULL_SCALE;
    if linear > VOLUME_FULL_SCALE {
        return Err(ProtocolError::InvalidParameter(format!(
            "volume {} dB is above full scale",
            db
        )));
    }
    Ok(linear as i32)
}

/// Coordinator for all devices on one Gnet bus
///
/// Owns the transport for its whole lifetime and keeps a record of every
/// address handed out. Addresses are assigned in increasing order and are
/// never reused within a session.
pub struct BusSession<T> {
    transport: T,
    devices: BTreeMap<u8, Device>,
}

impl<T: Transport> BusSession<T> {
    /// Create a session with no known devices
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            devices: BTreeMap::new(),
        }
    }

    /// The transport the session talks through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport, for raw requests
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// End the session and give back the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Register the adapter at address 1 (once) and return a handle to it
    pub fn attach_adapter(&mut self) -> DeviceHandle<'_, T> {
        let device = self
            .devices
            .entry(ADAPTER_ADDRESS)
            .or_insert_with(Device::adapter);
        DeviceHandle::new(&mut self.transport, device)
    }

    /// All known devices, in address order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// All known addresses, in increasing order
    pub fn addresses(&self) -> Vec<u8> {
        self.devices.keys().copied().collect()
    }

    /// A known device by address
    pub fn device(&self, address: u8) -> Option<&Device> {
        self.devices.get(&address)
    }

    /// Borrow a device together with the transport, to issue requests to it
    pub fn device_mut(&mut self, address: u8) -> Option<DeviceHandle<'_, T>> {
        let device = self.devices.get_mut(&address)?;
        Some(DeviceHandle::new(&mut self.transport, device))
    }

    /// Find a monitor by its serial number
    pub fn find_by_serial(&self, serial: u32) -> Option<&Device> {
        self.devices.values().find(|d| d.serial() == Some(serial))
    }

    /// The address the next discovered monitor will get
    pub fn next_address(&self) -> u16 {
        self.devices
            .keys()
            .next_back()
            .map_or(u16::from(FIRST_MONITOR_ADDRESS), |&a| u16::from(a) + 1)
            .max(u16::from(FIRST_MONITOR_ADDRESS))
    }

    pub(crate) fn register(&mut self, device: Device) {
        self.devices.insert(device.address(), device);
    }

    /// Send a command to every device; nothing answers a broadcast
    ///
    /// Commands that expect a reply are refused with
    /// [`ProtocolError::InvalidParameter`] before anything is sent.
    pub fn broadcast(&mut self, command: Command, payload: &[u8]) -> Result<(), ProtocolError> {
        if command.expects_response() {
            return Err(ProtocolError::InvalidParameter(format!(
                "{:?} expects a reply and cannot be broadcast",
                command
            )));
        }
        self.transport
            .send(&Frame::for_command(GNET_BROADCAST_ADDR, command, payload))
    }

    /// Set the group volume in dB (0 dB is full scale)
    pub fn set_volume(&mut self, db: f64) -> Result<(), ProtocolError> {
        let code = volume_code_from_db(db)?;
        tracing::debug!("volume ({} dB): {} ({:#08x})", db, code, code);
        self.broadcast(Command::VolumeGlm, &encode_sint24(code)?)
    }

    /// Wake up all monitors
    pub fn wakeup_all(&mut self) -> Result<(), ProtocolError> {
        self.broadcast_twice(&WAKEUP_PAYLOADS)
    }

    /// Put all monitors to sleep
    pub fn shutdown_all(&mut self) -> Result<(), ProtocolError> {
        self.broadcast_twice(&SHUTDOWN_PAYLOADS)
    }

    // The reference adapter sends every wakeup/shutdown message twice
    fn broadcast_twice(&mut self, payloads: &[[u8; 2]]) -> Result<(), ProtocolError> {
        for payload in payloads {
            self.broadcast(Command::Wakeup, payload)?;
            self.broadcast(Command::Wakeup, payload)?;
        }
        Ok(())
    }

    /// Broadcast a keep-alive
    pub fn stay_online(&mut self) -> Result<(), ProtocolError> {
        self.broadcast(Command::StayOnline, &[])
    }

    /// Ask one unassigned monitor for its serial number
    ///
    /// [`ProtocolError::Timeout`] means no unassigned monitor is left. A reply
    /// that is not a 3-byte serial gives [`ProtocolError::MalformedResponse`].
    pub fn race(&mut self) -> Result<u32, ProtocolError> {
        let resp = self
            .transport
            .send_receive(&Frame::for_command(GNET_MULTICAST_ADDR, Command::Race, Vec::new()))?;
        match resp.payload() {
            &[a, b, c] => Ok(u32::from_be_bytes([0, a, b, c])),
            other => Err(ProtocolError::MalformedResponse(format!(
                "race reply has {} bytes, expected a 3-byte serial",
                other.len()
            ))),
        }
    }

    /// Give the monitor with `serial` the bus address `address`
    pub fn assign_address(&mut self, serial: u32, address: u8) -> Result<(), ProtocolError> {
        if serial > MAX_SERIAL {
            return Err(ProtocolError::InvalidParameter(format!(
                "serial {} does not fit in 3 bytes",
                serial
            )));
        }
        let [_, s0, s1, s2] = serial.to_be_bytes();
        let frame = Frame::for_command(
            GNET_MULTICAST_ADDR,
            Command::SetRid,
            vec![s0, s1, s2, address],
        );

        let resp = self.transport.send_receive(&frame)?;
        if resp.payload() != [address].as_slice() {
            return Err(ProtocolError::AssignmentFailed {
                serial,
                address,
                response: resp.into_payload(),
            });
        }
        tracing::info!("Assigned address {} to monitor #{}", address, serial);
        Ok(())
    }

    /// Discover unassigned monitors, giving each the next free address
    ///
    /// With `include_known`, devices already in the session are yielded first.
    pub fn discover(&mut self, include_known: bool) -> Discovery<'_, T> {
        Discovery::new(self, include_known)
    }

    /// Run discovery to completion and return the newly found monitors
    pub fn discover_all(&mut self) -> Result<Vec<super::DiscoveredDevice>, ProtocolError> {
        self.discover(false).collect()
    }
}

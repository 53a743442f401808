//! Monitor discovery
//!
//! Discovery alternates a race, in which one unassigned monitor answers with its
//! serial number, with an address assignment for that serial, until a race times
//! out. The bus arbitrates between competing monitors.

use serde::{Deserialize, Serialize};
use std::vec;

use super::BusSession;
use crate::device::{Device, DeviceKind};
use crate::protocol::{ProtocolError, Transport, MAX_MONITOR_ADDRESS};

/// Summary of a device yielded by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Bus address of the device
    pub address: u8,
    #[serde(flatten)]
    /// Adapter, or monitor with its serial
    pub kind: DeviceKind,
}

impl DiscoveredDevice {
    fn of(device: &Device) -> Self {
        Self {
            address: device.address(),
            kind: device.kind(),
        }
    }

    /// Serial number, for monitors
    pub fn serial(&self) -> Option<u32> {
        match self.kind {
            DeviceKind::Monitor { serial } => Some(serial),
            DeviceKind::Adapter => None,
        }
    }
}

/// Pull-based discovery over a [`BusSession`]
///
/// Each call to `next` runs at most one race/assign round. Dropping the
/// iterator early stops discovery; addresses already assigned stay registered
/// in the session. After an error the iterator is exhausted.
pub struct Discovery<'a, T> {
    session: &'a mut BusSession<T>,
    known: vec::IntoIter<DiscoveredDevice>,
    next_address: u16,
    finished: bool,
}

impl<'a, T: Transport> Discovery<'a, T> {
    pub(crate) fn new(session: &'a mut BusSession<T>, include_known: bool) -> Self {
        let known: Vec<DiscoveredDevice> = if include_known {
            session.devices().map(DiscoveredDevice::of).collect()
        } else {
            Vec::new()
        };
        let next_address = session.next_address();
        Self {
            session,
            known: known.into_iter(),
            next_address,
            finished: false,
        }
    }

    fn discover_next(&mut self) -> Result<Option<DiscoveredDevice>, ProtocolError> {
        let address = match u8::try_from(self.next_address) {
            Ok(a) if a <= MAX_MONITOR_ADDRESS => a,
            _ => return Ok(None),
        };

        let serial = match self.session.race() {
            Ok(serial) => serial,
            Err(ProtocolError::Timeout) => return Ok(None),
            Err(e) => return Err(e),
        };

        self.session.assign_address(serial, address)?;
        let device = Device::monitor(address, serial);
        let found = DiscoveredDevice::of(&device);
        self.session.register(device);
        self.next_address += 1;

        tracing::info!("Discovered monitor #{} at address {}", serial, address);
        Ok(Some(found))
    }
}

impl<T: Transport> Iterator for Discovery<'_, T> {
    type Item = Result<DiscoveredDevice, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(known) = self.known.next() {
            return Some(Ok(known));
        }
        if self.finished {
            return None;
        }

        match self.discover_next() {
            Ok(Some(found)) => Some(Ok(found)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

//! USB HID access to a real GLM adapter
//!
//! Thin adapter from the `hidapi` crate to [`HidDevice`].

use hidapi::{DeviceInfo, HidApi, HidError};
use std::io;
use std::time::Duration;

use crate::protocol::{AdapterInfo, HidDevice, ProtocolError};

/// Information about an attached adapter
#[derive(Debug, Clone)]
pub struct AdapterPort {
    /// Platform device path
    pub path: String,

    /// USB vendor ID
    pub vid: u16,

    /// USB product ID
    pub pid: u16,

    /// Identity strings
    pub info: AdapterInfo,
}

impl From<&DeviceInfo> for AdapterPort {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            path: info.path().to_string_lossy().into_owned(),
            vid: info.vendor_id(),
            pid: info.product_id(),
            info: AdapterInfo {
                manufacturer: info.manufacturer_string().map(str::to_string),
                product: info.product_string().map(str::to_string),
                serial_number: info.serial_number().map(str::to_string),
            },
        }
    }
}

/// An opened GLM adapter
pub struct HidApiDevice {
    device: hidapi::HidDevice,
    info: AdapterInfo,
}

impl HidApiDevice {
    /// Open the first device matching `vid`/`pid`
    pub fn open(vid: u16, pid: u16) -> Result<Self, ProtocolError> {
        let api = HidApi::new().map_err(to_protocol_error)?;
        let device = api.open(vid, pid).map_err(to_protocol_error)?;

        let info = AdapterInfo {
            manufacturer: device.get_manufacturer_string().ok().flatten(),
            product: device.get_product_string().ok().flatten(),
            serial_number: device.get_serial_number_string().ok().flatten(),
        };
        tracing::info!(
            "Opened adapter {:04x}:{:04x} ({})",
            vid,
            pid,
            info.product.as_deref().unwrap_or("unknown product")
        );
        Ok(Self { device, info })
    }
}

impl HidDevice for HidApiDevice {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.device.write(data).map_err(to_io_error)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        self.device.read_timeout(buf, ms).map_err(to_io_error)
    }

    fn info(&self) -> AdapterInfo {
        self.info.clone()
    }
}

/// Open the GLM adapter with the given USB IDs
pub fn open_adapter(vid: u16, pid: u16) -> Result<HidApiDevice, ProtocolError> {
    HidApiDevice::open(vid, pid)
}

/// List attached devices matching `vid`/`pid`, ordered by path
pub fn list_adapters(vid: u16, pid: u16) -> Result<Vec<AdapterPort>, ProtocolError> {
    let api = HidApi::new().map_err(to_protocol_error)?;
    let mut ports: Vec<AdapterPort> = api
        .device_list()
        .filter(|d| d.vendor_id() == vid && d.product_id() == pid)
        .map(AdapterPort::from)
        .collect();
    ports.sort_by(|a, b| a.path.cmp(&b.path));
    ports.dedup_by(|a, b| a.path == b.path);
    Ok(ports)
}

fn to_io_error(e: HidError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

fn to_protocol_error(e: HidError) -> ProtocolError {
    ProtocolError::Io(to_io_error(e))
}

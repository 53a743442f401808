//! Per-device request helpers

use byteorder::{BigEndian, ByteOrder};

use super::{decode_text, BypassConfig, Device, HardwareInfo, Telemetry};
use crate::protocol::{Command, Frame, ProtocolError, Transport};

const BAR_CODE_ARG: [u8; 1] = [0x01];
const MIC_SERIAL_ARG: [u8; 2] = [0x82, 0x44];

/// A device borrowed together with the transport it is reached through
pub struct DeviceHandle<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    device: &'a mut Device,
}

impl<'a, T: Transport + ?Sized> DeviceHandle<'a, T> {
    pub(crate) fn new(transport: &'a mut T, device: &'a mut Device) -> Self {
        Self { transport, device }
    }

    /// Bus address of the device
    pub fn address(&self) -> u8 {
        self.device.address()
    }

    /// The device record this handle updates
    pub fn device(&self) -> &Device {
        self.device
    }

    /// Send `command` to this device and return the verified response payload
    pub fn request(&mut self, command: Command, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let frame = Frame::for_command(self.device.address(), command, payload);
        Ok(self.transport.send_receive(&frame)?.into_payload())
    }

    /// Query the hardware identification
    pub fn query_hardware(&mut self) -> Result<HardwareInfo, ProtocolError> {
        let payload = self.request(Command::HardwareQuery, &[])?;
        let hardware = HardwareInfo::parse(&decode_text(&payload)?)?;
        self.device.hardware = Some(hardware.clone());
        Ok(hardware)
    }

    /// Query the software version string
    pub fn query_software(&mut self) -> Result<String, ProtocolError> {
        let payload = self.request(Command::SoftwareQuery, &[])?;
        let software = decode_text(&payload)?;
        self.device.software = Some(software.clone());
        Ok(software)
    }

    /// Query the bar code
    pub fn query_barcode(&mut self) -> Result<String, ProtocolError> {
        let payload = self.request(Command::BarCode, &BAR_CODE_ARG)?;
        let barcode = decode_text(&payload)?;
        self.device.barcode = Some(barcode.clone());
        Ok(barcode)
    }

    /// Query the serial number of the calibration microphone plugged into the adapter
    pub fn query_mic_serial(&mut self) -> Result<String, ProtocolError> {
        if !self.device.is_adapter() {
            return Err(ProtocolError::Unsupported(format!(
                "microphone serial query on monitor {}",
                self.device
            )));
        }
        let payload = self.request(Command::MicSerial, &MIC_SERIAL_ARG)?;
        let serial = decode_text(&payload)?;
        self.device.mic_serial = Some(serial.clone());
        Ok(serial)
    }

    /// Poll for telemetry and merge the new fields into the device's record
    ///
    /// Returns only the fields carried by this reply; an empty reply yields none.
    pub fn poll(&mut self) -> Result<Telemetry, ProtocolError> {
        let payload = self.request(Command::Poll, &[])?;
        tracing::debug!("Poll {}: {:02x?}", self.device, payload);

        let fields = self.device.decode_poll(&payload)?;
        self.device
            .telemetry
            .extend(fields.iter().map(|(k, v)| (k.clone(), *v)));
        Ok(fields)
    }

    /// Write the bypass register
    pub fn set_bypass(&mut self, config: &BypassConfig) -> Result<(), ProtocolError> {
        let value = config.encode();
        tracing::debug!("Encoded bypass value for {}: {} ({:#010b})", self.device, value, value);
        self.request(Command::Bypass, &[value])?;
        Ok(())
    }

    /// Mute or unmute
    pub fn mute(&mut self, mute: bool) -> Result<(), ProtocolError> {
        self.set_bypass(&BypassConfig::mute(mute))
    }

    /// Set the digital summing gain
    pub fn set_digisum_gain(&mut self, gain: i16) -> Result<(), ProtocolError> {
        let mut data = [0u8; 2];
        BigEndian::write_i16(&mut data, gain);
        self.request(Command::DigisumGain, &data)?;
        Ok(())
    }
}

//! Simulated Gnet bus
//!
//! An in-process stand-in for the GLM adapter and a set of SAM monitors. It
//! speaks the same wire format as the real adapter (stuffed frames in, segmented
//! 64-byte packets out), so the full stack can be exercised without hardware.
//! Devices that would not answer on a real bus simply stay silent, and reads
//! then run into the transport deadline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::protocol::{
    checksum, escape, unescape, AdapterInfo, Command, Frame, HidDevice, Response, ADAPTER_ADDRESS,
    GNET_BROADCAST_ADDR, GNET_MULTICAST_ADDR, GNET_TERM, GNET_TIMEOUT, MAX_PACKET_LEN,
};

/// Status the simulated devices return for requests they do not understand
pub const SIM_NACK: u8 = 0x02;

/// Microphone reading reported by the adapter by default (60 dB SPL)
const DEFAULT_MIC_LEVEL: i32 = 20_000;

/// One simulated SAM monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimMonitor {
    /// Serial number announced in the race
    pub serial: u32,
    /// Bus address, once assigned
    pub address: Option<u8>,
    /// False after a shutdown broadcast
    pub awake: bool,
    /// Last bypass register written
    pub bypass: u8,
    /// Last digital summing gain written
    pub digisum_gain: i16,
}

/// Simulated adapter with monitors behind it
pub struct SimulatedBus {
    monitors: Vec<SimMonitor>,
    pending: VecDeque<[u8; MAX_PACKET_LEN]>,
    requests: Vec<Frame>,
    volume: Option<i32>,
    mic_level: i32,
    rng: StdRng,
}

impl SimulatedBus {
    /// A bus with `monitors` unassigned monitors and random serial numbers
    pub fn new(monitors: usize) -> Self {
        Self::with_rng(monitors, StdRng::from_entropy())
    }

    /// Like [`SimulatedBus::new`], but reproducible
    pub fn with_seed(monitors: usize, seed: u64) -> Self {
        Self::with_rng(monitors, StdRng::seed_from_u64(seed))
    }

    fn with_rng(count: usize, mut rng: StdRng) -> Self {
        let mut monitors: Vec<SimMonitor> = Vec::with_capacity(count);
        while monitors.len() < count {
            let serial = rng.gen_range(1..=0xFF_FFFF);
            if monitors.iter().all(|m| m.serial != serial) {
                monitors.push(SimMonitor {
                    serial,
                    address: None,
                    awake: true,
                    bypass: 0,
                    digisum_gain: 0,
                });
            }
        }

        Self {
            monitors,
            pending: VecDeque::new(),
            requests: Vec::new(),
            volume: None,
            mic_level: DEFAULT_MIC_LEVEL,
            rng,
        }
    }

    /// Monitors in the order they were created
    pub fn monitors(&self) -> &[SimMonitor] {
        &self.monitors
    }

    /// Look up a monitor by serial number
    pub fn monitor(&self, serial: u32) -> Option<&SimMonitor> {
        self.monitors.iter().find(|m| m.serial == serial)
    }

    /// Every frame written to the bus so far, decoded
    pub fn requests(&self) -> &[Frame] {
        &self.requests
    }

    /// Last volume code broadcast
    pub fn volume(&self) -> Option<i32> {
        self.volume
    }

    /// Linear reading the adapter reports for its microphone; 0 means none connected
    pub fn set_mic_level(&mut self, level: i32) {
        self.mic_level = level;
    }

    fn decode_request(data: &[u8]) -> io::Result<Frame> {
        let (&header, body) = data
            .split_first()
            .ok_or_else(|| invalid_data("empty write".to_string()))?;
        if usize::from(header) != 0x80 + body.len() {
            return Err(invalid_data(format!(
                "header {:#04x} does not match length {}",
                header,
                body.len()
            )));
        }

        let raw = unescape(body);
        let n = raw.len();
        if n < 5 || raw[n - 1] != GNET_TERM {
            return Err(invalid_data(format!("not a frame: {:02x?}", raw)));
        }
        let frame = Frame::new(raw[0], raw[1], raw[2..n - 3].to_vec());
        if frame.as_bytes() != raw.as_slice() {
            return Err(invalid_data(format!(
                "checksum mismatch: got {:02x?}, expected {:#06x}",
                &raw[n - 3..n - 1],
                checksum(&raw[..n - 3])
            )));
        }
        Ok(frame)
    }

    fn handle(&mut self, frame: &Frame) -> Option<Response> {
        let command = Command::from_code(frame.command());
        match frame.address() {
            GNET_BROADCAST_ADDR => {
                self.handle_broadcast(command, frame.payload());
                None
            }
            GNET_MULTICAST_ADDR => self.handle_multicast(command, frame.payload()),
            ADAPTER_ADDRESS => Some(self.handle_adapter(command)),
            address => {
                let index = self
                    .monitors
                    .iter()
                    .position(|m| m.address == Some(address))?;
                Some(self.handle_monitor(index, command, frame.payload()))
            }
        }
    }

    fn handle_broadcast(&mut self, command: Option<Command>, payload: &[u8]) {
        match (command, payload) {
            (Some(Command::Wakeup), [0x03, 0x7F] | [0x03, 0x01]) => {
                self.monitors.iter_mut().for_each(|m| m.awake = true);
            }
            (Some(Command::Wakeup), [0x03, 0x02] | [0x03, 0x00]) => {
                self.monitors.iter_mut().for_each(|m| m.awake = false);
            }
            (Some(Command::VolumeGlm), &[a, b, c]) => {
                self.volume = Some(crate::protocol::decode_sint24([a, b, c]));
            }
            _ => {}
        }
    }

    fn handle_multicast(&mut self, command: Option<Command>, payload: &[u8]) -> Option<Response> {
        match command? {
            Command::Race => {
                let reply = match self.monitors.iter().find(|m| m.address.is_none()) {
                    Some(m) => Response::ack(ADAPTER_ADDRESS, m.serial.to_be_bytes()[1..].to_vec()),
                    None => Response::new(ADAPTER_ADDRESS, GNET_TIMEOUT, Vec::new()),
                };
                Some(reply)
            }
            Command::SetRid => {
                let &[s0, s1, s2, address] = payload else {
                    return None;
                };
                let serial = u32::from_be_bytes([0, s0, s1, s2]);
                let monitor = self.monitors.iter_mut().find(|m| m.serial == serial)?;
                monitor.address = Some(address);
                Some(Response::ack(ADAPTER_ADDRESS, vec![address]))
            }
            _ => None,
        }
    }

    fn handle_adapter(&mut self, command: Option<Command>) -> Response {
        let text = |s: &str| Response::ack(ADAPTER_ADDRESS, s.as_bytes().to_vec());
        match command {
            Some(Command::HardwareQuery) => text("GLM Adapter 2.1 0 12 1"),
            Some(Command::SoftwareQuery) => text("GLM;adapter;2.1.0;2019-05-01;build 41"),
            Some(Command::BarCode) => text("GLMA0000001"),
            Some(Command::MicSerial) => text("012345"),
            Some(Command::Poll) => {
                let mut payload = vec![0u8; 7];
                payload[3..6].copy_from_slice(&self.mic_level.to_be_bytes()[1..]);
                Response::ack(ADAPTER_ADDRESS, payload)
            }
            _ => Response::new(ADAPTER_ADDRESS, SIM_NACK, Vec::new()),
        }
    }

    fn handle_monitor(&mut self, index: usize, command: Option<Command>, payload: &[u8]) -> Response {
        let serial = self.monitors[index].serial;
        let text = |s: String| Response::ack(ADAPTER_ADDRESS, s.into_bytes());
        match (command, payload) {
            (Some(Command::HardwareQuery), _) => text("8341A 1 0 2 1".to_string()),
            (Some(Command::SoftwareQuery), _) => {
                text("SAM;8341A;1.4.2;2020-03-11;build 219".to_string())
            }
            (Some(Command::BarCode), _) => text(format!("{:08}", serial)),
            (Some(Command::Poll), _) => {
                if !self.monitors[index].awake {
                    return Response::ack(ADAPTER_ADDRESS, Vec::new());
                }
                let temperature: u8 = self.rng.gen_range(20..=45);
                let input: i8 = self.rng.gen_range(-110..=-20);
                let output: i8 = self.rng.gen_range(-110..=-10);
                let mut payload = vec![
                    0x41, 0x16, 0x83, 0x00, 0x1E, 0x42, 0x96, 0x46, 0x93, 0x43, 0x80, 0x45, 0x82,
                    0x47, 0x01, 0x84, 0x01, 0x65,
                ];
                payload[1] = temperature;
                payload[6] = input as u8;
                payload[12] = output as u8;
                Response::ack(ADAPTER_ADDRESS, payload)
            }
            (Some(Command::Bypass), &[value]) => {
                self.monitors[index].bypass = value;
                Response::ack(ADAPTER_ADDRESS, Vec::new())
            }
            (Some(Command::DigisumGain), &[hi, lo]) => {
                self.monitors[index].digisum_gain = i16::from_be_bytes([hi, lo]);
                Response::ack(ADAPTER_ADDRESS, Vec::new())
            }
            _ => Response::new(ADAPTER_ADDRESS, SIM_NACK, Vec::new()),
        }
    }

    fn queue_response(&mut self, response: &Response) -> io::Result<()> {
        let escaped = escape(&response.to_bytes()).map_err(|e| invalid_data(e.to_string()))?;
        for chunk in escaped.chunks(MAX_PACKET_LEN - 1) {
            let mut packet = [0u8; MAX_PACKET_LEN];
            packet[0] = (MAX_PACKET_LEN - 1) as u8;
            packet[1..=chunk.len()].copy_from_slice(chunk);
            self.pending.push_back(packet);
        }
        Ok(())
    }
}

impl HidDevice for SimulatedBus {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let frame = Self::decode_request(data)?;
        let response = self.handle(&frame);
        self.requests.push(frame);
        if let Some(response) = response {
            self.queue_response(&response)?;
        }
        Ok(data.len())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        match self.pending.pop_front() {
            Some(packet) => {
                let n = packet.len().min(buf.len());
                buf[..n].copy_from_slice(&packet[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn info(&self) -> AdapterInfo {
        AdapterInfo {
            manufacturer: Some("Genelec".to_string()),
            product: Some("GLM Adapter (simulated)".to_string()),
            serial_number: Some("SIM0000001".to_string()),
        }
    }
}

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

use chrono::{DateTime, Utc};
use gnet_core::device::{Device, DeviceKind, Telemetry};
use gnet_core::protocol::AdapterInfo;
use serde::Serialize;

#[derive(Serialize)]
struct DeviceOutput<'a> {
    address: u8,
    #[serde(flatten)]
    kind: DeviceKind,
    model: Option<&'a str>,
    software: Option<&'a str>,
    barcode: Option<&'a str>,
    mic_serial: Option<&'a str>,
}

#[derive(Serialize)]
struct PollOutput<'a> {
    timestamp: DateTime<Utc>,
    address: u8,
    telemetry: &'a Telemetry,
}

/// Where command results go: human readable text or one JSON object per line
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// A progress message; suppressed in JSON mode
    pub fn note(&self, msg: &str) {
        if !self.json {
            println!("{msg}");
        }
    }

    pub fn adapter(&self, info: &AdapterInfo) {
        if self.json {
            print_json(info);
        } else {
            println!(
                "Found USB adapter: {} {} with serial #{}",
                info.manufacturer.as_deref().unwrap_or("?"),
                info.product.as_deref().unwrap_or("?"),
                info.serial_number.as_deref().unwrap_or("?")
            );
        }
    }

    pub fn device(&self, device: &Device) {
        if self.json {
            print_json(&DeviceOutput {
                address: device.address(),
                kind: device.kind(),
                model: device.hardware.as_ref().map(|h| h.model()),
                software: device.software.as_deref(),
                barcode: device.barcode.as_deref(),
                mic_serial: device.mic_serial.as_deref(),
            });
            return;
        }

        let model = device.hardware.as_ref().map_or("unknown", |h| h.model());
        println!("[{}] {}", device.address(), model);
        if let Some(serial) = device.serial() {
            println!("\tserial #{}", serial);
        }
        match (device.software_version(), device.software.as_deref()) {
            (Some((version, build)), _) => println!("\tsoftware {} {}", version, build),
            (None, Some(software)) => println!("\tsoftware {}", software),
            (None, None) => {}
        }
        if let Some(barcode) = &device.barcode {
            println!("\tbar code {}", barcode);
        }
        if let Some(mic) = &device.mic_serial {
            println!("\tmicrophone serial #{}", mic);
        }
    }

    pub fn telemetry(&self, device: &Device) {
        if self.json {
            print_json(&PollOutput {
                timestamp: Utc::now(),
                address: device.address(),
                telemetry: &device.telemetry,
            });
        } else {
            println!("[{}] {}", device.address(), format_telemetry(&device.telemetry));
        }
    }
}

pub fn format_telemetry(telemetry: &Telemetry) -> String {
    telemetry
        .iter()
        .map(|(field, value)| format!("{field}: {value:.3}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

//! Bus session and device discovery

mod discovery;
mod session;

pub use discovery::{DiscoveredDevice, Discovery};
pub use session::{volume_code_from_db, BusSession};

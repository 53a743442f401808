//! Argument types shared by several commands

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Lowest percentage accepted before mapping to dB; smaller values are clamped
const MIN_VOLUME_PCT: f64 = 0.0001;
const MAX_VOLUME_PCT: f64 = 100.0;

const MIN_VOLUME_DB: f64 = -130.0;
const MAX_VOLUME_DB: f64 = 0.0;

/// Longest pause accepted between poll rounds (one day)
const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Map a volume percentage to dB
pub fn db_from_percent(pct: f64) -> f64 {
    20.0 * (pct / 100.0).log10()
}

/// Parse a volume given as `<n>%` or `<n>dB` into dB
pub fn parse_volume(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();

    let db = if let Some(pct) = s.strip_suffix('%') {
        let pct: f64 = pct
            .trim()
            .parse()
            .map_err(|_| format!("{:?} is not a valid volume string", s))?;
        db_from_percent(pct.clamp(MIN_VOLUME_PCT, MAX_VOLUME_PCT))
    } else if let Some(db) = lower.strip_suffix("db") {
        db.trim()
            .parse()
            .map_err(|_| format!("{:?} is not a valid volume string", s))?
    } else {
        return Err("Please specify suffix '%' or 'dB'".to_string());
    };

    if !(MIN_VOLUME_DB..=MAX_VOLUME_DB).contains(&db) {
        return Err(format!(
            "{} dB is not in the range {} to {} dB",
            db, MIN_VOLUME_DB, MAX_VOLUME_DB
        ));
    }
    Ok(db)
}

/// Parse a poll interval in seconds; zero polls back to back
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("{:?} is not a number of seconds", s))?;
    if !(0.0..=MAX_INTERVAL_SECS).contains(&secs) {
        return Err(format!(
            "{} is not in the range 0 to {} seconds",
            s.trim(),
            MAX_INTERVAL_SECS
        ));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

/// A monitor named on the command line, by bus address or by `#serial`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitorRef {
    Address(u8),
    Serial(u32),
}

impl FromStr for MonitorRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || format!("{:?} is not a monitor address or #serial", s);
        match s.strip_prefix('#') {
            Some(serial) => serial.parse().map(MonitorRef::Serial).map_err(|_| invalid()),
            None => s.parse().map(MonitorRef::Address).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for MonitorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorRef::Address(a) => write!(f, "{}", a),
            MonitorRef::Serial(s) => write!(f, "#{}", s),
        }
    }
}

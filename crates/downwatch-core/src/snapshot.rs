use serde::Serialize;

/// Point-in-time view of a monitor, taken under its state lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorInfo {
    pub url: String,
    pub interval: u64,
    pub timeout: u64,
    pub retries: u32,
    pub available: Option<bool>,
    pub ping: Option<u64>,
    pub uptime: Option<u64>,
    pub unavailability: Option<u64>,
    pub consecutive_failures: u32,
    pub running: bool,
}

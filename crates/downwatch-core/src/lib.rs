pub mod config;
pub mod error;
pub mod event;
pub mod monitor;
pub mod probe;
pub mod snapshot;
mod state;

#[cfg(test)]
mod config_tests;

pub use config::{
    MonitorConfig, MonitorOptions, DEFAULT_INTERVAL, DEFAULT_RETRIES, DEFAULT_TIMEOUT, MIN_INTERVAL,
};
pub use error::{MonitorError, ProbeError};
pub use event::{EventKind, EventSubscription, MonitorEvent, OutageEvent, UpEvent};
pub use monitor::Monitor;
pub use probe::{HttpProber, ProbeResponse, Prober};
pub use snapshot::MonitorInfo;

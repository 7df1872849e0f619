use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::warn;

use crate::error::MonitorError;

pub const STOPPED_BY_CLIENT: &str = "Stopped by client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Up,
    Outage,
    Error,
    Restart,
    Stopped,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Up,
        EventKind::Outage,
        EventKind::Error,
        EventKind::Restart,
        EventKind::Stopped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Up => "up",
            EventKind::Outage => "outage",
            EventKind::Error => "error",
            EventKind::Restart => "restart",
            EventKind::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| MonitorError::InvalidArgument(format!("unknown event name {name:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpEvent {
    pub ts: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub status_text: Option<String>,
    pub ping: Option<u64>,
    pub uptime: Option<u64>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutageEvent {
    pub ts: DateTime<Utc>,
    pub status_code: Option<u16>,
    pub status_text: Option<String>,
    /// Last successful round trip, if any.
    pub ping: Option<u64>,
    pub unavailability: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MonitorEvent {
    Up(UpEvent),
    Outage(OutageEvent),
    Error(MonitorError),
    Restart,
    Stopped { reason: String },
}

impl MonitorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MonitorEvent::Up(_) => EventKind::Up,
            MonitorEvent::Outage(_) => EventKind::Outage,
            MonitorEvent::Error(_) => EventKind::Error,
            MonitorEvent::Restart => EventKind::Restart,
            MonitorEvent::Stopped { .. } => EventKind::Stopped,
        }
    }
}

/// Receiving end of a monitor's event stream, optionally narrowed to one kind.
pub struct EventSubscription {
    rx: broadcast::Receiver<MonitorEvent>,
    filter: Option<EventKind>,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<MonitorEvent>, filter: Option<EventKind>) -> Self {
        Self { rx, filter }
    }

    fn wants(&self, event: &MonitorEvent) -> bool {
        self.filter.map_or(true, |kind| event.kind() == kind)
    }

    /// Waits for the next matching event. `None` once the monitor is gone.
    pub async fn recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged behind");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns a matching event that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<MonitorEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged behind");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_parse_case_insensitively() {
        assert_eq!("outage".parse::<EventKind>(), Ok(EventKind::Outage));
        assert_eq!(" Up ".parse::<EventKind>(), Ok(EventKind::Up));
        assert!(matches!(
            "down".parse::<EventKind>(),
            Err(MonitorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let stopped = MonitorEvent::Stopped {
            reason: STOPPED_BY_CLIENT.to_string(),
        };
        let error = MonitorError::HostUnreachable("connection refused".to_string());

        let stopped = serde_json::to_value(&stopped).expect("serialize stopped");
        let error = serde_json::to_value(MonitorEvent::Error(error)).expect("serialize error");

        assert_eq!(stopped["type"], "stopped");
        assert_eq!(stopped["reason"], STOPPED_BY_CLIENT);
        assert_eq!(error["type"], "error");
        assert_eq!(error["kind"], "HostUnreachable");
        assert_eq!(error["message"], "connection refused");
    }

    #[test]
    fn filtered_subscription_skips_other_kinds() {
        let (tx, rx) = broadcast::channel(8);
        let mut restarts = EventSubscription::new(rx, Some(EventKind::Restart));

        tx.send(MonitorEvent::Stopped {
            reason: STOPPED_BY_CLIENT.to_string(),
        })
        .expect("send stopped");
        tx.send(MonitorEvent::Restart).expect("send restart");

        assert_eq!(restarts.try_recv(), Some(MonitorEvent::Restart));
        assert_eq!(restarts.try_recv(), None);
    }
}

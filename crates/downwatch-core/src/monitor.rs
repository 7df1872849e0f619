use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::runtime::Handle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::{validate_interval, MonitorConfig, MonitorOptions};
use crate::error::{MonitorError, ProbeError};
use crate::event::{
    EventKind, EventSubscription, MonitorEvent, OutageEvent, UpEvent, STOPPED_BY_CLIENT,
};
use crate::probe::{HttpProber, ProbeResponse, Prober};
use crate::snapshot::MonitorInfo;
use crate::state::{millis, MonitorState};

const EVENT_CAPACITY: usize = 64;

enum Outcome {
    Response { response: ProbeResponse, ping: Duration },
    TimedOut,
    Transport(ProbeError),
}

struct Schedule {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl Schedule {
    fn cancel(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

struct Shared<P> {
    prober: P,
    config: RwLock<MonitorConfig>,
    state: Mutex<MonitorState>,
    events: broadcast::Sender<MonitorEvent>,
    cycle: tokio::sync::Mutex<()>,
}

/// Polls one endpoint on a fixed interval and reports availability changes.
///
/// Ticks land every `interval` from the start. Cycles never overlap: a tick
/// that falls due while a check is still running fires as soon as it ends, and
/// manual [`Monitor::check`] calls queue behind it. `stop` and `restart`
/// invalidate whatever check is still in flight.
pub struct Monitor<P: Prober + 'static = HttpProber> {
    shared: Arc<Shared<P>>,
    schedule: Mutex<Option<Schedule>>,
}

impl Monitor<HttpProber> {
    pub fn new(url: impl Into<String>, options: MonitorOptions) -> Result<Self, MonitorError> {
        let config = MonitorConfig::new(url, options)?;
        let prober = HttpProber::new()?;
        Ok(Self::from_config(config, prober))
    }
}

impl<P: Prober + 'static> Monitor<P> {
    pub fn with_prober(
        url: impl Into<String>,
        options: MonitorOptions,
        prober: P,
    ) -> Result<Self, MonitorError> {
        let config = MonitorConfig::new(url, options)?;
        Ok(Self::from_config(config, prober))
    }

    fn from_config(config: MonitorConfig, prober: P) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                prober,
                config: RwLock::new(config),
                state: Mutex::new(MonitorState::new(Instant::now())),
                events,
                cycle: tokio::sync::Mutex::new(()),
            }),
            schedule: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.shared.events.subscribe(), None)
    }

    /// Subscribes to a single event kind, e.g. `monitor.on("outage".parse()?)`.
    pub fn on(&self, kind: EventKind) -> EventSubscription {
        EventSubscription::new(self.shared.events.subscribe(), Some(kind))
    }

    /// Starts the recurring check. A no-op while a schedule is already active.
    ///
    /// Fails with [`MonitorError::Unknown`] when called outside a Tokio runtime.
    pub fn start(&self) -> Result<(), MonitorError> {
        let (url, interval) = {
            let config = self.shared.config();
            (config.url.clone(), config.interval)
        };
        if url.is_empty() {
            return Err(MonitorError::MissingArgument(
                "url is required to start monitoring".to_string(),
            ));
        }

        let mut schedule = lock(&self.schedule);
        if schedule.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            debug!(%url, "monitor already running");
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|err| {
            MonitorError::Unknown(format!("start requires a tokio runtime: {err}"))
        })?;

        let epoch = lock(&self.shared.state).epoch;
        *schedule = Some(Self::spawn_schedule(
            &runtime,
            Arc::clone(&self.shared),
            epoch,
        ));
        info!(%url, interval_ms = millis(interval), "monitor started");
        Ok(())
    }

    pub fn stop(&self) {
        let was_running = self.cancel();
        info!(url = %self.shared.config().url, was_running, "monitor stopped");
        self.shared.emit(MonitorEvent::Stopped {
            reason: STOPPED_BY_CLIENT.to_string(),
        });
    }

    pub fn restart(&self) -> Result<(), MonitorError> {
        self.cancel();
        info!(url = %self.shared.config().url, "monitor restarting");
        self.shared.emit(MonitorEvent::Restart);
        self.start()
    }

    /// Takes effect from the next scheduled wait.
    pub fn set_interval(&self, interval: Duration) -> Result<(), MonitorError> {
        let interval = validate_interval(interval)?;
        self.shared.config_mut().interval = interval;
        info!(interval_ms = millis(interval), "monitor interval updated");
        Ok(())
    }

    pub fn set_url(&self, url: impl Into<String>) -> Result<(), MonitorError> {
        let url = url.into();
        if url.is_empty() {
            return Err(MonitorError::MissingArgument("url is required".to_string()));
        }
        self.shared.config_mut().url = url.clone();
        info!(%url, "monitor target updated");
        Ok(())
    }

    /// Runs one check right away and returns the event it produced, if any.
    pub async fn check(&self) -> Option<MonitorEvent> {
        let epoch = lock(&self.shared.state).epoch;
        self.shared.run_cycle(epoch).await
    }

    pub fn infos(&self) -> MonitorInfo {
        let running = self.is_running();
        let config = self.shared.config().clone();
        let state = lock(&self.shared.state);

        MonitorInfo {
            url: config.url,
            interval: millis(config.interval),
            timeout: millis(config.timeout),
            retries: config.retries,
            available: state.available,
            ping: state.ping.map(millis),
            uptime: state.uptime.map(millis),
            unavailability: state.unavailability.map(millis),
            consecutive_failures: state.consecutive_failures,
            running,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        lock(&self.shared.state).consecutive_failures
    }

    pub fn is_running(&self) -> bool {
        lock(&self.schedule)
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    fn cancel(&self) -> bool {
        let schedule = lock(&self.schedule).take();
        let was_running = schedule.is_some();
        if let Some(schedule) = schedule {
            schedule.cancel();
        }
        lock(&self.shared.state).epoch += 1;
        was_running
    }

    fn spawn_schedule(runtime: &Handle, shared: Arc<Shared<P>>, epoch: u64) -> Schedule {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut next_tick = Instant::now() + shared.config().interval;
            loop {
                tokio::select! {
                    _ = sleep_until(next_tick) => {
                        shared.run_cycle(epoch).await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
                // A cycle that overran its slot is followed right away, then the
                // cadence continues from there.
                next_tick = (next_tick + shared.config().interval).max(Instant::now());
            }
            debug!("monitor schedule finished");
        });

        Schedule {
            handle,
            shutdown_tx,
        }
    }
}

impl<P: Prober + 'static> Drop for Monitor<P> {
    fn drop(&mut self) {
        let schedule = self
            .schedule
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(schedule) = schedule {
            schedule.cancel();
        }
    }
}

impl<P: Prober> Shared<P> {
    fn config(&self) -> RwLockReadGuard<'_, MonitorConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn config_mut(&self) -> RwLockWriteGuard<'_, MonitorConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: MonitorEvent) {
        debug!(event = %event.kind(), "emitting monitor event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn run_cycle(&self, epoch: u64) -> Option<MonitorEvent> {
        let _serial = self.cycle.lock().await;

        let (url, headers, budget) = {
            let config = self.config();
            (config.url.clone(), config.headers.clone(), config.timeout)
        };

        let started = Instant::now();
        let outcome = match timeout(budget, self.prober.probe(&url, headers.as_ref())).await {
            Ok(Ok(response)) => Outcome::Response {
                response,
                ping: started.elapsed(),
            },
            Ok(Err(err)) => Outcome::Transport(err),
            Err(_) => Outcome::TimedOut,
        };

        self.apply(epoch, url, outcome)
    }

    /// Applies a finished check. State change and emission happen under one lock.
    fn apply(&self, epoch: u64, url: String, outcome: Outcome) -> Option<MonitorEvent> {
        let retries = self.config().retries;
        let mut state = lock(&self.state);
        if state.epoch != epoch {
            debug!(%url, "discarding result of a cancelled check");
            return None;
        }

        let now = Instant::now();
        let event = match outcome {
            Outcome::Response { response, ping } if response.is_success() => {
                if state.outage_signaled {
                    info!(%url, status = response.status_code, "endpoint recovered");
                }
                let uptime = state.record_success(now, ping);
                Some(MonitorEvent::Up(UpEvent {
                    ts: Utc::now(),
                    status_code: Some(response.status_code),
                    status_text: Some(response.status_text),
                    ping: Some(millis(ping)),
                    uptime: Some(millis(uptime)),
                    url,
                }))
            }
            Outcome::Response { response, .. } => failed_check(
                &mut state,
                now,
                retries,
                url,
                Some(response.status_code),
                response.status_text,
            ),
            Outcome::TimedOut => failed_check(
                &mut state,
                now,
                retries,
                url,
                None,
                MonitorError::Timeout.to_string(),
            ),
            Outcome::Transport(err) => {
                let error = MonitorError::from(err);
                warn!(%url, %error, "check could not reach the endpoint");
                Some(MonitorEvent::Error(error))
            }
        };

        if let Some(event) = &event {
            self.emit(event.clone());
        }
        event
    }
}

fn failed_check(
    state: &mut MonitorState,
    now: Instant,
    retries: u32,
    url: String,
    status_code: Option<u16>,
    status_text: String,
) -> Option<MonitorEvent> {
    let transition = state.record_failure(now, retries);
    warn!(
        %url,
        status = ?status_code,
        %status_text,
        failures = state.consecutive_failures,
        retries,
        "check failed"
    );

    let unavailability = transition?;
    warn!(%url, unavailability_ms = millis(unavailability), "endpoint is down");

    Some(MonitorEvent::Outage(OutageEvent {
        ts: Utc::now(),
        status_code,
        status_text: Some(status_text),
        ping: state.ping.map(millis),
        unavailability: millis(unavailability),
        url,
    }))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

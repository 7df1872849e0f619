use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde_json::Value;
use tracing::warn;

use crate::error::MonitorError;

pub const MIN_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);
pub const DEFAULT_FAILURES: u32 = 0;

/// Validated monitor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub url: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
    pub headers: Option<BTreeMap<String, String>>,
}

impl MonitorConfig {
    pub fn new(url: impl Into<String>, options: MonitorOptions) -> Result<Self, MonitorError> {
        let url = url.into();
        if url.is_empty() {
            return Err(MonitorError::InvalidArgument(
                "url is empty, provide the endpoint to monitor".to_string(),
            ));
        }

        let mut config = Self {
            url,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            headers: None,
        };

        if let Some(interval) = options.interval {
            if interval < MIN_INTERVAL {
                return Err(below_floor("interval", interval, MIN_INTERVAL));
            }
            config.interval = interval;
        }

        if let Some(retries) = options.retries {
            if retries < DEFAULT_RETRIES {
                return Err(MonitorError::OutOfRange(format!(
                    "retries should be at least the default of {DEFAULT_RETRIES}, got {retries}"
                )));
            }
            config.retries = retries;
        }

        // Checked against the default timeout, independent of the configured interval.
        if let Some(timeout) = options.timeout {
            if timeout < DEFAULT_TIMEOUT {
                return Err(below_floor("timeout", timeout, DEFAULT_TIMEOUT));
            }
            config.timeout = timeout;
        }

        if let Some(headers) = options.headers {
            validate_headers(&headers)?;
            config.headers = Some(headers);
        }

        Ok(config)
    }
}

/// Runtime interval change. Zero means "no value given".
pub fn validate_interval(interval: Duration) -> Result<Duration, MonitorError> {
    if interval.is_zero() {
        return Err(MonitorError::MissingArgument(
            "interval is required".to_string(),
        ));
    }
    if interval < MIN_INTERVAL {
        return Err(below_floor("interval", interval, MIN_INTERVAL));
    }
    Ok(interval)
}

fn below_floor(name: &str, value: Duration, floor: Duration) -> MonitorError {
    MonitorError::OutOfRange(format!(
        "{name} should be at least {}ms, got {}ms",
        floor.as_millis(),
        value.as_millis()
    ))
}

fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), MonitorError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| MonitorError::InvalidArgument(format!("header name {name:?}: {err}")))?;
        HeaderValue::from_str(value)
            .map_err(|err| MonitorError::InvalidArgument(format!("header {name:?} value: {err}")))?;
    }
    Ok(())
}

/// Optional overrides applied on top of the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorOptions {
    pub interval: Option<Duration>,
    pub retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub headers: Option<BTreeMap<String, String>>,
}

impl MonitorOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Reads options from a loosely typed JSON document such as an options file.
    ///
    /// Only value kinds are checked here; ranges are enforced by [`MonitorConfig::new`].
    /// Durations are whole milliseconds. `null` keeps the default.
    pub fn from_value(value: &Value) -> Result<Self, MonitorError> {
        let obj = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(obj) => obj,
            _ => {
                return Err(MonitorError::TypeMismatch(
                    "options should be an object".to_string(),
                ))
            }
        };

        let mut options = Self::default();
        for (key, field) in obj {
            match key.as_str() {
                "interval" => options.interval = millis_field(key, field)?.map(Duration::from_millis),
                "timeout" => options.timeout = millis_field(key, field)?.map(Duration::from_millis),
                "retries" => {
                    options.retries = match millis_field(key, field)? {
                        Some(n) => Some(u32::try_from(n).map_err(|_| {
                            MonitorError::OutOfRange(format!("retries {n} is too large"))
                        })?),
                        None => None,
                    }
                }
                "headers" => options.headers = headers_field(field)?,
                other => warn!(option = other, "ignoring unknown monitor option"),
            }
        }

        Ok(options)
    }
}

fn millis_field(key: &str, field: &Value) -> Result<Option<u64>, MonitorError> {
    match field {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_u64() {
            Some(v) => Ok(Some(v)),
            None if n.as_f64().is_some_and(|v| v < 0.0) => Err(MonitorError::OutOfRange(
                format!("{key} should not be negative"),
            )),
            None => Err(MonitorError::TypeMismatch(format!(
                "{key} should be a whole number"
            ))),
        },
        _ => Err(MonitorError::TypeMismatch(format!(
            "{key} should be a number"
        ))),
    }
}

fn headers_field(field: &Value) -> Result<Option<BTreeMap<String, String>>, MonitorError> {
    let obj = match field {
        Value::Null => return Ok(None),
        Value::Object(obj) => obj,
        _ => {
            return Err(MonitorError::TypeMismatch(
                "headers should be an object of strings".to_string(),
            ))
        }
    };

    obj.iter()
        .map(|(name, value)| match value.as_str() {
            Some(v) => Ok((name.clone(), v.to_string())),
            None => Err(MonitorError::TypeMismatch(format!(
                "header {name:?} should be a string"
            ))),
        })
        .collect::<Result<BTreeMap<_, _>, _>>()
        .map(Some)
}

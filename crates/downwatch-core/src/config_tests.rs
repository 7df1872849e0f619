use std::time::Duration;

use serde_json::json;

use crate::config::{
    validate_interval, MonitorConfig, MonitorOptions, DEFAULT_INTERVAL, DEFAULT_RETRIES,
    DEFAULT_TIMEOUT,
};
use crate::error::MonitorError;

const URL: &str = "https://example.com";

#[test]
fn omitted_options_keep_defaults() {
    // Act
    let config = MonitorConfig::new(URL, MonitorOptions::default()).expect("valid config");

    // Assert
    assert_eq!(config.url, URL);
    assert_eq!(config.interval, DEFAULT_INTERVAL);
    assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    assert_eq!(config.retries, DEFAULT_RETRIES);
    assert_eq!(config.headers, None);
}

#[test]
fn empty_url_is_rejected() {
    let err = MonitorConfig::new("", MonitorOptions::default()).expect_err("empty url");

    assert!(matches!(err, MonitorError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn interval_below_floor_is_out_of_range() {
    let options = MonitorOptions::default().with_interval(Duration::from_millis(2999));

    let err = MonitorConfig::new(URL, options).expect_err("interval below floor");

    assert!(matches!(err, MonitorError::OutOfRange(_)), "got {err:?}");
}

#[test]
fn retries_below_default_are_out_of_range() {
    let options = MonitorOptions::default().with_retries(2);

    let err = MonitorConfig::new(URL, options).expect_err("too few retries");

    assert!(matches!(err, MonitorError::OutOfRange(_)), "got {err:?}");
}

#[test]
fn timeout_is_checked_against_default_not_interval() {
    // Arrange
    let short = MonitorOptions::default()
        .with_interval(Duration::from_secs(10))
        .with_timeout(Duration::from_millis(2500));
    let longer_than_interval = MonitorOptions::default()
        .with_interval(Duration::from_secs(3))
        .with_timeout(Duration::from_secs(20));

    // Act
    let short = MonitorConfig::new(URL, short);
    let longer_than_interval = MonitorConfig::new(URL, longer_than_interval);

    // Assert
    assert!(matches!(short, Err(MonitorError::OutOfRange(_))));
    assert_eq!(
        longer_than_interval.expect("timeout above default").timeout,
        Duration::from_secs(20)
    );
}

#[test]
fn overrides_are_applied() {
    let options = MonitorOptions::default()
        .with_interval(Duration::from_secs(5))
        .with_retries(4)
        .with_timeout(Duration::from_secs(4))
        .with_header("Cache-Control", "no-cache");

    let config = MonitorConfig::new(URL, options).expect("valid config");

    assert_eq!(config.interval, Duration::from_secs(5));
    assert_eq!(config.retries, 4);
    assert_eq!(config.timeout, Duration::from_secs(4));
    assert_eq!(
        config
            .headers
            .as_ref()
            .and_then(|h| h.get("Cache-Control"))
            .map(String::as_str),
        Some("no-cache")
    );
}

#[test]
fn unusable_header_name_is_invalid_argument() {
    let options = MonitorOptions::default().with_header("bad header", "x");

    let err = MonitorConfig::new(URL, options).expect_err("space in header name");

    assert!(matches!(err, MonitorError::InvalidArgument(_)), "got {err:?}");
}

#[test]
fn runtime_interval_zero_is_missing() {
    assert!(matches!(
        validate_interval(Duration::ZERO),
        Err(MonitorError::MissingArgument(_))
    ));
    assert!(matches!(
        validate_interval(Duration::from_millis(2999)),
        Err(MonitorError::OutOfRange(_))
    ));
    assert_eq!(
        validate_interval(Duration::from_millis(5000)),
        Ok(Duration::from_millis(5000))
    );
}

#[test]
fn options_document_is_parsed() {
    // Arrange
    let doc = json!({
        "interval": 5000,
        "timeout": 4000,
        "retries": 5,
        "headers": { "Cache-Control": "no-cache" },
        "color": "blue"
    });

    // Act
    let options = MonitorOptions::from_value(&doc).expect("valid document");

    // Assert
    assert_eq!(options.interval, Some(Duration::from_millis(5000)));
    assert_eq!(options.timeout, Some(Duration::from_millis(4000)));
    assert_eq!(options.retries, Some(5));
    assert_eq!(
        options,
        MonitorOptions::default()
            .with_interval(Duration::from_millis(5000))
            .with_timeout(Duration::from_millis(4000))
            .with_retries(5)
            .with_header("Cache-Control", "no-cache")
    );
}

#[test]
fn null_fields_keep_defaults() {
    let options = MonitorOptions::from_value(&json!({ "interval": null, "headers": null }))
        .expect("nulls are allowed");

    assert_eq!(options, MonitorOptions::default());
}

#[test]
fn non_numeric_interval_is_type_mismatch() {
    let err = MonitorOptions::from_value(&json!({ "interval": "3000" })).expect_err("string");

    assert!(matches!(err, MonitorError::TypeMismatch(_)), "got {err:?}");
}

#[test]
fn fractional_and_negative_numbers_are_rejected() {
    let fractional = MonitorOptions::from_value(&json!({ "timeout": 3500.5 }));
    let negative = MonitorOptions::from_value(&json!({ "retries": -1 }));

    assert!(matches!(fractional, Err(MonitorError::TypeMismatch(_))));
    assert!(matches!(negative, Err(MonitorError::OutOfRange(_))));
}

#[test]
fn headers_must_be_a_map_of_strings() {
    let list = MonitorOptions::from_value(&json!({ "headers": ["Cache-Control"] }));
    let numeric = MonitorOptions::from_value(&json!({ "headers": { "X-Retry": 3 } }));

    assert!(matches!(list, Err(MonitorError::TypeMismatch(_))));
    assert!(matches!(numeric, Err(MonitorError::TypeMismatch(_))));
}

#[test]
fn options_document_must_be_an_object() {
    let err = MonitorOptions::from_value(&json!([1, 2])).expect_err("array");

    assert!(matches!(err, MonitorError::TypeMismatch(_)));
}

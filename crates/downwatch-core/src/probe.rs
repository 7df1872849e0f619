use std::collections::BTreeMap;
use std::error::Error as _;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Url};

use crate::error::ProbeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub status_text: String,
}

impl ProbeResponse {
    pub fn new(status_code: u16, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
        }
    }

    /// Anything up to 299 counts as reachable; redirects are followed by the client.
    pub fn is_success(&self) -> bool {
        self.status_code <= 299
    }
}

/// Issues a single request against the monitored endpoint.
///
/// Implementations do not enforce the probe timeout; the monitor races every
/// probe against its own timer and drops the loser.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        url: &str,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<ProbeResponse, ProbeError>;
}

#[async_trait]
impl<T: Prober + ?Sized> Prober for Arc<T> {
    async fn probe(
        &self,
        url: &str,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<ProbeResponse, ProbeError> {
        (**self).probe(url, headers).await
    }
}

pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(concat!("downwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ProbeError::Other(format!("failed to build http client: {err}")))?;

        Ok(Self { client })
    }

    fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ProbeError> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ProbeError::InvalidHeader(format!("{name:?}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ProbeError::InvalidHeader(format!("{}: {err}", name.as_str())))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    fn classify(err: reqwest::Error) -> ProbeError {
        let detail = match err.source() {
            Some(source) => format!("{err}: {source}"),
            None => err.to_string(),
        };

        if err.is_builder() {
            ProbeError::InvalidUrl(detail)
        } else if err.is_connect() {
            ProbeError::Unreachable(detail)
        } else {
            ProbeError::Other(detail)
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(
        &self,
        url: &str,
        headers: Option<&BTreeMap<String, String>>,
    ) -> Result<ProbeResponse, ProbeError> {
        let target =
            Url::parse(url).map_err(|err| ProbeError::InvalidUrl(format!("{url}: {err}")))?;

        let mut request = self.client.get(target);
        if let Some(headers) = headers {
            request = request.headers(Self::header_map(headers)?);
        }

        let response = request.send().await.map_err(Self::classify)?;
        let status = response.status();

        Ok(ProbeResponse::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relative_url_is_rejected_before_sending() {
        let prober = HttpProber::new().expect("client");

        let err = prober
            .probe("/healthz", None)
            .await
            .expect_err("relative url must fail");

        assert!(matches!(err, ProbeError::InvalidUrl(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let prober = HttpProber::new().expect("client");

        // Port 1 is never listening in the test environment.
        let err = prober
            .probe("http://127.0.0.1:1/", None)
            .await
            .expect_err("closed port must fail");

        assert!(matches!(err, ProbeError::Unreachable(_)), "got {err:?}");
    }

    #[test]
    fn bad_header_name_is_reported() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());

        let err = HttpProber::header_map(&headers).expect_err("space in header name");

        assert!(matches!(err, ProbeError::InvalidHeader(_)));
    }

    #[test]
    fn only_codes_up_to_299_count_as_success() {
        assert!(ProbeResponse::new(204, "No Content").is_success());
        assert!(ProbeResponse::new(101, "Switching Protocols").is_success());
        assert!(!ProbeResponse::new(301, "Moved Permanently").is_success());
        assert!(!ProbeResponse::new(503, "Service Unavailable").is_success());
    }
}

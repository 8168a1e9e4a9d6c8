use super::{Transport, TransportError};
use crate::domain::{DispatchResponse, Envelope, ResultEnvelope};
use async_trait::async_trait;
use std::time::Duration;

/// Path the dispatcher accepts envelopes on.
pub const TRANSLATE_PATH: &str = "/translate";

/// Posts envelopes to a dispatcher over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Applies a whole-request timeout on top of the dispatcher's own backend timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, TRANSLATE_PATH)
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: &Envelope, token: &str) -> Result<ResultEnvelope, TransportError> {
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(envelope)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(classify)?;

        // The body's status is authoritative; the HTTP status only matters when
        // there is no body to read.
        match serde_json::from_slice::<DispatchResponse>(&bytes) {
            Ok(body) => {
                tracing::debug!(http_status = status.as_u16(), status = body.status, "dispatcher replied");
                Ok(body.into_result_envelope())
            }
            Err(e) => Err(TransportError::Decode(format!("HTTP {}: {}", status.as_u16(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(HttpTransport::new("http://localhost:3000/").endpoint(), "http://localhost:3000/translate");
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        // Port 9 (discard) is not expected to be listening locally.
        let transport = HttpTransport::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = transport.send(&Envelope::query("tools", None), "tok").await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_) | TransportError::Timeout(_)));
    }
}

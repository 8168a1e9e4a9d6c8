use super::{BusError, MessageBus};
use async_nats::client::RequestErrorKind;
use async_trait::async_trait;

/// NATS-backed bus. Every request opens its own connection, which lives inside
/// the request future and is closed when that future finishes or is dropped.
#[derive(Debug, Clone)]
pub struct NatsBus {
    url: String,
}

/// Scoped connection: dropping it releases the client and closes the socket.
struct BusConnection {
    client: async_nats::Client,
    url: String,
}

impl BusConnection {
    async fn open(url: &str) -> Result<Self, BusError> {
        // Timeouts are owned by the dispatcher.
        let client = async_nats::ConnectOptions::new()
            .request_timeout(None)
            .connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        tracing::debug!(url, "bus connection opened");
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl Drop for BusConnection {
    fn drop(&mut self) {
        tracing::debug!(url = %self.url, "bus connection closed");
    }
}

impl NatsBus {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens and closes one connection; used by preflight checks.
    pub async fn ping(&self) -> Result<(), BusError> {
        let conn = BusConnection::open(&self.url).await?;
        conn.client
            .flush()
            .await
            .map_err(|e| BusError::Request(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn request(&self, subject: &str, payload: Vec<u8>) -> Result<Vec<u8>, BusError> {
        let conn = BusConnection::open(&self.url).await?;
        let reply = conn
            .client
            .request(subject.to_string(), payload.into())
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::NoResponders => BusError::NoResponders(subject.to_string()),
                _ => BusError::Request(e.to_string()),
            })?;
        Ok(reply.payload.to_vec())
    }
}

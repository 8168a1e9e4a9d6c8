use super::{Transport, TransportError};
use crate::app::dispatcher::Dispatcher;
use crate::domain::{Envelope, ResultEnvelope};
use async_trait::async_trait;
use std::sync::Arc;

/// Calls the dispatcher in-process. The envelope still goes through its JSON
/// form so both transports exercise the same parsing path.
#[derive(Clone)]
pub struct DirectTransport {
    dispatcher: Arc<Dispatcher>,
}

impl DirectTransport {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn send(&self, envelope: &Envelope, token: &str) -> Result<ResultEnvelope, TransportError> {
        let raw = envelope.to_json();
        let response = self.dispatcher.dispatch_raw(&raw, Some(token)).await;
        Ok(response.into_result_envelope())
    }
}

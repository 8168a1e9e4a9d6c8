use super::{BackendReply, BackendRequest, BusError, MessageBus};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Something that answers backend requests in-process.
#[async_trait]
pub trait BackendExecutor: Send + Sync {
    async fn handle(&self, subject: &str, request: BackendRequest) -> BackendReply;
}

#[async_trait]
impl<F> BackendExecutor for F
where
    F: Fn(&BackendRequest) -> BackendReply + Send + Sync,
{
    async fn handle(&self, _subject: &str, request: BackendRequest) -> BackendReply {
        self(&request)
    }
}

/// In-process bus. Decodes each request, hands it to the executor and records it.
#[derive(Clone)]
pub struct MemoryBus {
    executor: Arc<dyn BackendExecutor>,
    seen: Arc<Mutex<Vec<(String, BackendRequest)>>>,
}

impl MemoryBus {
    pub fn new(executor: impl BackendExecutor + 'static) -> Self {
        Self {
            executor: Arc::new(executor),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Subjects and requests received so far, oldest first.
    pub fn requests(&self) -> Vec<(String, BackendRequest)> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn last_request(&self) -> Option<BackendRequest> {
        self.requests().pop().map(|(_, r)| r)
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn request(&self, subject: &str, payload: Vec<u8>) -> Result<Vec<u8>, BusError> {
        let request: BackendRequest =
            serde_json::from_slice(&payload).map_err(|e| BusError::Request(e.to_string()))?;
        {
            let mut seen = match self.seen.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            seen.push((subject.to_string(), request.clone()));
        }
        tracing::debug!(subject, args = ?request.args, "memory bus request");
        let reply = self.executor.handle(subject, request).await;
        Ok(reply.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::bus::ReplyOutcome;
    use serde_json::json;

    #[tokio::test]
    async fn records_and_answers() {
        let bus = MemoryBus::new(|req: &BackendRequest| {
            BackendReply::success(json!({ "echo": req.target() }))
        });
        let payload = serde_json::to_vec(&BackendRequest {
            args: vec!["query".into(), "tools".into(), "select 1".into()],
            body: String::new(),
            channel: "x".into(),
            timeout: 1,
        })
        .unwrap();

        let reply = bus.request("backend", payload).await.unwrap();
        assert_eq!(
            BackendReply::decode(&reply).unwrap(),
            ReplyOutcome::Result(Some(json!({"echo": "select 1"})))
        );
        assert_eq!(bus.request_count(), 1);
        assert_eq!(bus.requests()[0].0, "backend");
    }

    #[tokio::test]
    async fn rejects_undecodable_payload() {
        let bus = MemoryBus::new(|_: &BackendRequest| BackendReply::success(json!(null)));
        assert!(matches!(bus.request("s", b"nope".to_vec()).await, Err(BusError::Request(_))));
        assert_eq!(bus.request_count(), 0);
    }
}

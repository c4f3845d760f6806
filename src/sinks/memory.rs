use crate::health::HealthEvent;
use crate::traits::sink::{HealthSink, SinkError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// In-memory sink that records every published event in order.
///
/// Used by tests and the dry-run binary. Can be told to fail the next N
/// publishes to exercise retry paths.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<RwLock<Vec<HealthEvent>>>,
    fail_remaining: Arc<Mutex<u32>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in publish order
    pub async fn events(&self) -> Vec<HealthEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Make the next `count` publishes fail with SinkError::Unavailable
    pub async fn fail_next(&self, count: u32) {
        *self.fail_remaining.lock().await = count;
    }
}

#[async_trait]
impl HealthSink for MemorySink {
    async fn publish(&self, event: &HealthEvent) -> Result<(), SinkError> {
        let mut remaining = self.fail_remaining.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(SinkError::Unavailable("injected failure".to_string()));
        }
        drop(remaining);
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

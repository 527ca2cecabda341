use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use relaypipe_runtime::PipelineQueue;

/// Where a relay task forwards a delivered payload — implemented once, for a
/// named pipeline's head queue.
#[async_trait]
pub(crate) trait RelaySink: Send + Sync {
    /// Delivers `payload`. Returns `false` if the sink is gone and the relay
    /// task that owns it should exit.
    async fn deliver(&self, payload: Box<dyn Any + Send>) -> bool;
}

/// Forwards into a pipeline's head queue, via a weak handle so a dropped
/// pipeline doesn't keep its relay task (or the broker's reference to it)
/// alive.
pub(crate) struct QueueSink<T> {
    queue: Weak<PipelineQueue<T>>,
}

impl<T> QueueSink<T> {
    pub(crate) fn new(queue: &Arc<PipelineQueue<T>>) -> Self {
        Self {
            queue: Arc::downgrade(queue),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> RelaySink for QueueSink<T> {
    async fn deliver(&self, payload: Box<dyn Any + Send>) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        match payload.downcast::<T>() {
            Ok(item) => queue.push_chunk(vec![*item]).await,
            Err(_) => tracing::warn!("dropping payload of unexpected type for this destination"),
        }
        true
    }
}

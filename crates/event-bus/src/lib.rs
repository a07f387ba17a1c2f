use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use searchads_core_types::AdsError;

/// Payload types that can travel on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

#[async_trait]
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), AdsError>;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus. Publishing without any live subscriber is an error
/// so browser glue notices when the ingest loop is not running.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    async fn publish(&self, event: E) -> Result<(), AdsError> {
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|err| AdsError::new(format!("event bus publish failed: {err}")))
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

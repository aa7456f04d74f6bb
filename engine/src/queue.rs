//! Deploy queue handoff
//!
//! The orchestrator hands deployment ids to the execution worker through
//! this seam. Enqueue is a non-blocking, fire-and-forget call; delivery
//! downstream is at-least-once.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::EngineError;

/// Fire-and-forget handoff to the execution worker
pub trait DeployQueue: Send + Sync {
    fn enqueue(&self, deployment_id: Uuid) -> Result<(), EngineError>;
}

/// Channel-backed queue paired with the worker's receiver
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl DeployQueue for ChannelQueue {
    fn enqueue(&self, deployment_id: Uuid) -> Result<(), EngineError> {
        self.tx
            .send(deployment_id)
            .map_err(|_| EngineError::Queue("deploy queue is closed".to_string()))
    }
}

/// Create a queue and the receiver the worker consumes
pub fn channel_queue() -> (ChannelQueue, mpsc::UnboundedReceiver<Uuid>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelQueue { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_delivers_in_order() {
        let (queue, mut rx) = channel_queue();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        queue.enqueue(first).unwrap();
        queue.enqueue(second).unwrap();

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_receiver_dropped() {
        let (queue, rx) = channel_queue();
        drop(rx);

        let err = queue.enqueue(Uuid::new_v4()).expect_err("closed queue must reject");
        assert!(matches!(err, EngineError::Queue(_)));
    }
}

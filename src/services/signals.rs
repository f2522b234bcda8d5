//! Readiness bus consumer

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::ReadinessCoordinator;
use crate::domain::ReadinessMessage;

/// Apply every bus message to the coordinator until the bus closes.
pub fn spawn_signal_listener(
    coordinator: ReadinessCoordinator,
    mut rx: broadcast::Receiver<ReadinessMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(message) => {
                    debug!("Readiness message: {:?}", message);
                    coordinator.apply_message(message).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Readiness listener lagged, {} messages skipped", skipped);
                }
                Err(RecvError::Closed) => {
                    info!("Readiness bus closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::domain::ReadinessSignal;

    #[tokio::test]
    async fn test_listener_applies_messages_until_closed() {
        let coordinator = ReadinessCoordinator::new(CoordinatorConfig::default());
        let (tx, rx) = broadcast::channel(16);
        let handle = spawn_signal_listener(coordinator.clone(), rx);

        tx.send(ReadinessMessage::Register {
            agent_id: "a".into(),
        })
        .unwrap();
        tx.send(ReadinessMessage::Register {
            agent_id: "b".into(),
        })
        .unwrap();
        tx.send(ReadinessMessage::Register {
            agent_id: "c".into(),
        })
        .unwrap();
        tx.send(ReadinessMessage::Ready(ReadinessSignal::ready("a", "0xpool", 3)))
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(coordinator.registered_agents().await, vec!["a", "b", "c"]);
        let state = coordinator.pool_state("0xpool").await;
        assert_eq!(state.ready_agents, vec!["a".to_string()]);
        assert_eq!(state.total_pending_commitments, 3);
    }
}

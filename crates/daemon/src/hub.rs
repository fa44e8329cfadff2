// Fan-out of sync events to connected sessions.
//
// A thin wrapper over a tokio broadcast channel: publishing never blocks,
// and a slow subscriber that falls behind the channel capacity observes a
// lag error rather than stalling everyone else. Events carry full state,
// so a lagged subscriber recovers on the next snapshot push.

use tokio::sync::broadcast;
use tracing::debug;

use cutsync_common::protocol::SyncEvent;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct SyncHub {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for SyncHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Publishing with no
    /// subscribers is a no-op, not an error.
    pub fn publish(&self, event: SyncEvent) {
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!(delivered, "sync event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cutsync_common::types::{ProjectId, Snapshot};

    fn snapshot_event(id: &str) -> SyncEvent {
        SyncEvent::SnapshotUpdate(Box::new(Snapshot::default_for(ProjectId::new(id), Utc::now())))
    }

    #[tokio::test]
    async fn all_subscribers_receive_in_publish_order() {
        let hub = SyncHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(snapshot_event("p1"));
        hub.publish(SyncEvent::ForceRefresh { timestamp: 7 });

        for receiver in [&mut a, &mut b] {
            assert!(matches!(receiver.recv().await.unwrap(), SyncEvent::SnapshotUpdate(_)));
            assert!(matches!(
                receiver.recv().await.unwrap(),
                SyncEvent::ForceRefresh { timestamp: 7 }
            ));
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let hub = SyncHub::new();
        hub.publish(snapshot_event("p1"));
        assert_eq!(hub.subscriber_count(), 0);

        // A subscriber joining afterwards sees only later events.
        let mut rx = hub.subscribe();
        hub.publish(SyncEvent::ForceRefresh { timestamp: 1 });
        assert!(matches!(rx.recv().await.unwrap(), SyncEvent::ForceRefresh { .. }));
    }

    #[tokio::test]
    async fn lagged_subscriber_sees_lag_then_newest() {
        let hub = SyncHub::new();
        let mut rx = hub.subscribe();

        for i in 0..(CHANNEL_CAPACITY + 10) {
            hub.publish(SyncEvent::ForceRefresh { timestamp: i as i64 });
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        assert!(rx.recv().await.is_ok());
    }
}

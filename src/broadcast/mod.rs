//! Fan-out of session snapshots to subscribers.
//!
//! Each send waits at most `send_timeout`. A subscriber that does not take
//! an update in time is dropped for good rather than receiving it late.

use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::debug;

use crate::{common::types::SessionId, configs::BroadcastConfig, state::models::SessionSnapshot};

pub struct Broadcaster {
    session_id: SessionId,
    subscribers: Mutex<Vec<flume::Sender<SessionSnapshot>>>,
    send_timeout: Duration,
    capacity: usize,
}

impl Broadcaster {
    pub fn new(session_id: SessionId, config: &BroadcastConfig) -> Self {
        Self {
            session_id,
            subscribers: Mutex::new(Vec::new()),
            send_timeout: config.send_timeout(),
            capacity: config.channel_capacity.max(1),
        }
    }

    #[cfg(test)]
    pub fn add_channel(&self) -> flume::Receiver<SessionSnapshot> {
        let (tx, rx) = flume::bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Registers a new subscriber whose channel already holds `initial`.
    /// Existing subscribers are not sent anything.
    pub fn add_channel_with(&self, initial: SessionSnapshot) -> flume::Receiver<SessionSnapshot> {
        let (tx, rx) = flume::bounded(self.capacity);
        // Fresh channel with capacity >= 1, so this cannot be full.
        let _ = tx.try_send(initial);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Drops every sender so receivers observe disconnection.
    pub fn close_all(&self) {
        let closed = std::mem::take(&mut *self.subscribers.lock());
        if !closed.is_empty() {
            debug!("[{}] Closed {} subscriber channels", self.session_id, closed.len());
        }
    }

    /// Sends `snapshot` to every subscriber and returns how many took it.
    pub async fn publish(&self, snapshot: SessionSnapshot) -> usize {
        // Never hold the subscriber lock across the sends.
        let senders: Vec<_> = self.subscribers.lock().clone();
        if senders.is_empty() {
            return 0;
        }

        let results = join_all(senders.iter().map(|tx| {
            let snapshot = snapshot.clone();
            async move {
                matches!(
                    tokio::time::timeout(self.send_timeout, tx.send_async(snapshot)).await,
                    Ok(Ok(()))
                )
            }
        }))
        .await;

        let dropped: Vec<_> = senders
            .iter()
            .zip(&results)
            .filter(|(_, delivered)| !**delivered)
            .map(|(tx, _)| tx)
            .collect();

        if !dropped.is_empty() {
            debug!(
                "[{}] Dropping {} slow or closed subscribers",
                self.session_id,
                dropped.len()
            );
            self.subscribers
                .lock()
                .retain(|tx| !dropped.iter().any(|d| d.same_channel(tx)));
        }

        results.iter().filter(|delivered| **delivered).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::CurrentlyPlaying;

    fn snapshot(voters: u32) -> SessionSnapshot {
        SessionSnapshot {
            session_id: SessionId(100000),
            admin_account_id: None,
            currently_playing: CurrentlyPlaying::default(),
            queue: Vec::new(),
            number_of_voters: voters,
            maximum_voters: 0,
        }
    }

    fn broadcaster(capacity: usize) -> Broadcaster {
        Broadcaster::new(
            SessionId(100000),
            &BroadcastConfig {
                send_timeout_ms: 20,
                channel_capacity: capacity,
            },
        )
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = broadcaster(4);
        let a = hub.add_channel();
        let b = hub.add_channel();

        assert_eq!(hub.publish(snapshot(1)).await, 2);
        assert_eq!(a.recv_async().await.unwrap().number_of_voters, 1);
        assert_eq!(b.recv_async().await.unwrap().number_of_voters, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_is_dropped_without_blocking_others() {
        let hub = broadcaster(1);
        let slow = hub.add_channel();
        let fast = hub.add_channel();

        assert_eq!(hub.publish(snapshot(1)).await, 2);
        fast.recv_async().await.unwrap();

        // `slow` never drains, so its single slot is still full.
        assert_eq!(hub.publish(snapshot(2)).await, 1);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(fast.recv_async().await.unwrap().number_of_voters, 2);

        assert_eq!(slow.recv_async().await.unwrap().number_of_voters, 1);
        assert!(slow.recv_async().await.is_err());
    }

    #[tokio::test]
    async fn test_closed_receiver_is_pruned() {
        let hub = broadcaster(4);
        let gone = hub.add_channel();
        drop(gone);
        let _kept = hub.add_channel();

        assert_eq!(hub.publish(snapshot(1)).await, 1);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_new_channel_gets_initial_snapshot_alone() {
        let hub = broadcaster(1);
        let existing = hub.add_channel();

        let joined = hub.add_channel_with(snapshot(7));
        assert_eq!(joined.recv_async().await.unwrap().number_of_voters, 7);
        assert!(existing.is_empty());
        assert_eq!(hub.subscriber_count(), 2);

        assert_eq!(hub.publish(snapshot(8)).await, 2);
        assert_eq!(existing.recv_async().await.unwrap().number_of_voters, 8);
        assert_eq!(joined.recv_async().await.unwrap().number_of_voters, 8);
    }

    #[tokio::test]
    async fn test_close_all_disconnects_receivers() {
        let hub = broadcaster(4);
        let rx = hub.add_channel();
        hub.close_all();

        assert_eq!(hub.subscriber_count(), 0);
        assert!(rx.recv_async().await.is_err());
        assert_eq!(hub.publish(snapshot(1)).await, 0);
    }
}

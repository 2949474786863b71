//! Live subscriber membership and delivery
//!
//! Each viewer gets an unbounded mpsc channel; delivery is a non-blocking
//! `send`, so one slow or dead connection can never stall the others or the
//! tick loop. Failed sends are collected during the delivery pass and the
//! offending subscribers removed afterwards.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::model::PlaybackUpdate;

pub type ConnectionId = String;
pub type UpdateSender = mpsc::UnboundedSender<PlaybackUpdate>;

#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<ConnectionId, UpdateSender>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber to the live set.
    ///
    /// `catch_up` is the cached snapshot to deliver immediately, if the
    /// engine decided it is still fresh enough; it reaches this subscriber
    /// only, ahead of any future broadcasts.
    pub fn admit(
        &self,
        catch_up: Option<PlaybackUpdate>,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<PlaybackUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(update) = catch_up {
            // rx is still alive here, the send cannot fail
            let _ = tx.send(update);
        }
        let connection_id: ConnectionId = nanoid::nanoid!();
        self.subscribers.insert(connection_id.clone(), tx);
        info!(
            connection_id = %connection_id,
            subscribers = self.subscribers.len(),
            "Viewer subscribed"
        );
        (connection_id, rx)
    }

    /// Remove a subscriber, called by the transport when a connection ends.
    pub fn remove(&self, connection_id: &str) {
        if self.subscribers.remove(connection_id).is_some() {
            info!(
                connection_id = %connection_id,
                subscribers = self.subscribers.len(),
                "Viewer unsubscribed"
            );
        }
    }

    /// Drop subscribers whose receiving side is gone. Runs at the start of
    /// every tick so dead entries never accumulate.
    pub fn prune(&self) {
        let before = self.subscribers.len();
        self.subscribers.retain(|_, sender| !sender.is_closed());
        let dropped = before - self.subscribers.len();
        if dropped > 0 {
            debug!(dropped, "Pruned closed subscriber channels");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an update to every live subscriber. Returns how many
    /// deliveries succeeded; failed subscribers are removed.
    pub fn broadcast(&self, update: &PlaybackUpdate) -> usize {
        let mut sent = 0;
        let mut failed: Vec<ConnectionId> = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().send(update.clone()) {
                Ok(()) => sent += 1,
                Err(_) => {
                    warn!(
                        connection_id = %entry.key(),
                        "Failed to deliver update, marking subscriber for removal"
                    );
                    failed.push(entry.key().clone());
                }
            }
        }

        for connection_id in failed {
            self.subscribers.remove(&connection_id);
        }

        sent
    }

    /// Close every subscriber channel; used when the process is stopping.
    pub fn shutdown(&self) {
        info!(
            subscribers = self.subscribers.len(),
            "Closing all subscriber channels"
        );
        self.subscribers.clear();
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription engine (`spec.md` §4.6): a single dispatcher over
//! `{topic -> list<writer>}`. Each connection's subscribed topics are also
//! indexed by `(connectionId, subscriptionId)` so re-subscribing with the
//! same id or disconnecting tears down bindings in O(that connection's
//! subscriptions), not O(all subscriptions).

use std::collections::HashMap;

use paseo_core::SubscriptionTarget;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use paseo_wire::Push;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// A connection's unique id, assigned by the hub on accept.
pub type ConnectionId = u64;

/// Whether a push event may be dropped under back-pressure instead of
/// blocking the writer (`spec.md` §4.6: "drops only *replaceable* updates").
fn is_replaceable(push: &Push) -> bool {
    matches!(push, Push::TerminalState { .. } | Push::CheckoutDiffUpdate { .. })
}

/// The two delivery lanes fanned out to each subscriber: `reliable` is a
/// bounded mpsc queue that every non-replaceable push travels through end to
/// end, while `replaceable` is a single-slot `watch` cell that always holds
/// only the most recent snapshot, so a slow subscriber can never observe a
/// stale `terminal_state`/`checkout_diff_update` once a fresher one has been
/// published (`spec.md` §4.6).
struct Subscriber {
    reliable: mpsc::Sender<Push>,
    replaceable: watch::Sender<Option<Push>>,
}

struct Binding {
    topic_key: String,
}

/// The receiving half handed back by [`SubscriptionHub::subscribe`]. Merges
/// the reliable queue and the replaceable slot into a single `recv` so
/// callers don't need to know which lane a given push traveled on.
pub struct PushReceiver {
    reliable: mpsc::Receiver<Push>,
    replaceable: watch::Receiver<Option<Push>>,
}

impl PushReceiver {
    pub async fn recv(&mut self) -> Option<Push> {
        loop {
            tokio::select! {
                biased;
                msg = self.reliable.recv() => return msg,
                changed = self.replaceable.changed() => {
                    if changed.is_err() {
                        return self.reliable.recv().await;
                    }
                    if let Some(push) = self.replaceable.borrow_and_update().clone() {
                        return Some(push);
                    }
                }
            }
        }
    }
}

#[derive(Default)]
pub struct SubscriptionHub {
    /// topic_key -> (connection_id, subscription_id) -> subscriber.
    topics: Mutex<HashMap<String, HashMap<(ConnectionId, String), Subscriber>>>,
    /// (connection_id, subscription_id) -> binding, for O(1) teardown and
    /// replace-on-resubscribe.
    bindings: Mutex<HashMap<(ConnectionId, String), Binding>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a subscription, replacing any previous binding with the same
    /// `(connection_id, subscription_id)` pair first (`spec.md` §3.5).
    /// Returns the receiving half of the new channel.
    pub fn subscribe(
        &self,
        connection_id: ConnectionId,
        subscription_id: String,
        target: &SubscriptionTarget,
    ) -> PushReceiver {
        self.unsubscribe(connection_id, &subscription_id);

        let (reliable_tx, reliable_rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let (replaceable_tx, replaceable_rx) = watch::channel(None);
        let topic_key = target.topic_key();
        let key = (connection_id, subscription_id);

        self.topics
            .lock()
            .entry(topic_key.clone())
            .or_default()
            .insert(key.clone(), Subscriber { reliable: reliable_tx, replaceable: replaceable_tx });
        self.bindings.lock().insert(key, Binding { topic_key });
        PushReceiver { reliable: reliable_rx, replaceable: replaceable_rx }
    }

    pub fn unsubscribe(&self, connection_id: ConnectionId, subscription_id: &str) {
        let key = (connection_id, subscription_id.to_string());
        if let Some(binding) = self.bindings.lock().remove(&key) {
            if let Some(subscribers) = self.topics.lock().get_mut(&binding.topic_key) {
                subscribers.remove(&key);
            }
        }
    }

    /// Tears down every subscription owned by a disconnecting connection.
    pub fn remove_connection(&self, connection_id: ConnectionId) {
        let keys: Vec<(ConnectionId, String)> = self
            .bindings
            .lock()
            .keys()
            .filter(|(conn, _)| *conn == connection_id)
            .cloned()
            .collect();
        for (conn, sub_id) in keys {
            self.unsubscribe(conn, &sub_id);
        }
    }

    /// Publishes `push` to every subscriber of `topic_key`. Replaceable
    /// pushes always overwrite the subscriber's single-slot `watch` cell, so
    /// the freshest snapshot wins even if the subscriber hasn't drained the
    /// previous one yet; every other push is delivered even if it means the
    /// writer briefly blocks the publisher end.
    pub async fn publish(&self, topic_key: &str, push: Push) {
        let replaceable = is_replaceable(&push);
        let reliable_senders: Vec<mpsc::Sender<Push>> = {
            let topics = self.topics.lock();
            match topics.get(topic_key) {
                Some(subscribers) => {
                    if replaceable {
                        for subscriber in subscribers.values() {
                            let _ = subscriber.replaceable.send(Some(push.clone()));
                        }
                        return;
                    }
                    subscribers.values().map(|s| s.reliable.clone()).collect()
                }
                None => return,
            }
        };
        for sender in reliable_senders {
            let _ = sender.send(push.clone()).await;
        }
    }

    /// Whether `topic_key` currently has at least one live subscriber.
    /// Used to derive `Agent::unobserved_completion` (`spec.md` §3.1): a
    /// turn that completes with nobody subscribed to its stream needs
    /// attention the next time a client looks.
    pub fn has_subscribers(&self, topic_key: &str) -> bool {
        self.topics.lock().get(topic_key).is_some_and(|s| !s.is_empty())
    }

    #[cfg(test)]
    fn subscriber_count(&self, topic_key: &str) -> usize {
        self.topics.lock().get(topic_key).map(HashMap::len).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;

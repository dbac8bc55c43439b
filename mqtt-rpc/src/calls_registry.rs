use std::collections::{HashMap, HashSet};

use futures::channel::oneshot::{channel as one_channel, Receiver as OneReceiver, Sender as OneSender};
use log::{debug, trace, warn};
use serde_json::Value;

/// Identity of one in-flight call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CallKey {
    pub driver: String,
    pub service: String,
    pub method: String,
    pub packet_id: i64,
}

impl CallKey {
    pub fn new(driver: &str, service: &str, method: &str, packet_id: i64) -> Self {
        Self {
            driver: driver.to_owned(),
            service: service.to_owned(),
            method: method.to_owned(),
            packet_id,
        }
    }
}

/// A registry of pending calls, which can be added, resulting in a packet id,
/// and resolved when a matching reply arrives. Also tracks which reply topics
/// the client has already subscribed to.
///
/// The table never retains stale entries: resolution, timeout and
/// cancellation all remove the entry.
pub(crate) struct CallsRegistry {
    id_counter: i64,
    /// Pending calls
    calls: HashMap<CallKey, OneSender<crate::Result<Value>>>,
    /// Reply topics already subscribed to. Grows monotonically: subscriptions
    /// are process-lifetime, not call-lifetime
    subscriptions: HashSet<(String, String, String)>,
}

impl CallsRegistry {
    pub fn new() -> Self {
        Self {
            id_counter: 0,
            calls: HashMap::new(),
            subscriptions: HashSet::new(),
        }
    }

    /// Add a pending call for the (driver, service, method) target. Returns
    /// the allocated packet id and the receiver resolved by a matching reply
    pub fn add_call(
        &mut self,
        driver: &str,
        service: &str,
        method: &str,
    ) -> (i64, OneReceiver<crate::Result<Value>>) {
        let (sender, receiver) = one_channel();
        let id = self.next_id();

        self.calls
            .insert(CallKey::new(driver, service, method, id), sender);

        trace!("Add new call {id} to {driver}/{service}/{method}");

        (id, receiver)
    }

    /// Record that the triple's reply topic needs a subscription. Returns
    /// `true` only the first time a triple is seen
    pub fn ensure_subscription(&mut self, driver: &str, service: &str, method: &str) -> bool {
        self.subscriptions
            .insert((driver.to_owned(), service.to_owned(), method.to_owned()))
    }

    /// Resolve and remove a pending call. A missing entry means the call
    /// already timed out or was never ours, and the response is dropped
    pub fn resolve(&mut self, key: &CallKey, response: crate::Result<Value>) {
        match self.calls.remove(key) {
            Some(channel) => {
                if channel.send(response).is_err() {
                    warn!(
                        "Caller dropped the handle for call {}. Failed to send a response",
                        key.packet_id
                    );
                } else {
                    debug!("Succesfully resolved call {}", key.packet_id);
                }
            }
            None => debug!(
                "Late or unknown reply for call {}. Dropping",
                key.packet_id
            ),
        }
    }

    /// Remove a pending call without resolving it. Used by the timeout path
    pub fn remove(&mut self, key: &CallKey) -> bool {
        self.calls.remove(key).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.calls.len()
    }

    fn next_id(&mut self) -> i64 {
        self.id_counter += 1;
        self.id_counter
    }
}

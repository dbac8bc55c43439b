use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use futures::{lock::Mutex, FutureExt};
use log::{debug, trace, warn};
use serde_json::Value;

use crate::{
    calls_registry::{CallKey, CallsRegistry},
    error::Error,
    message::{Id, Params, Request, Response, ResponsePayload},
    topic,
    transport::Transport,
};

/// Stand-in for an unbounded wait. Effectively infinite, but bounded below
/// the tokio timer horizon
const NO_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Handle to an issued call. Resolves with the call result once a matching
/// reply arrives; never times out on its own, the owner decides how long to
/// wait
pub struct PendingCall {
    packet_id: i64,
    result: Pin<Box<dyn Future<Output = crate::Result<Value>> + Send>>,
}

impl PendingCall {
    /// Packet id the call was issued with. Unique within the client
    pub fn packet_id(&self) -> i64 {
        self.packet_id
    }
}

impl Future for PendingCall {
    type Output = crate::Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.result.as_mut().poll(cx)
    }
}

/// RPC client: issues calls over the transport and correlates asynchronous
/// replies back to their pending calls.
///
/// One client owns one transport client identifier. Sharing a connection
/// between several logical clients is not supported: reply topics embed the
/// client id, so a second client with the same id would steal replies.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    client_id: String,
    registry: Arc<Mutex<CallsRegistry>>,
}

impl RpcClient {
    /// Make a new client publishing under `client_id`. The id is sanitized
    /// to fit into a single topic segment
    pub fn new(transport: Arc<dyn Transport>, client_id: &str) -> Self {
        trace!("Making new RPC client `{client_id}`");

        Self {
            transport,
            client_id: topic::sanitize_client_id(client_id),
            registry: Arc::new(Mutex::new(CallsRegistry::new())),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Issue a call and return an awaitable handle.
    ///
    /// Allocates the next packet id, registers the pending entry, lazily
    /// subscribes to the triple's reply topic (once per distinct triple),
    /// and publishes the encoded request. On failure the pending entry is
    /// removed again and the error returned
    pub async fn call_async(
        &self,
        driver: &str,
        service: &str,
        method: &str,
        params: Params,
    ) -> crate::Result<PendingCall> {
        let (packet_id, receiver, needs_subscribe) = {
            let mut registry = self.registry.lock().await;

            let (packet_id, receiver) = registry.add_call(driver, service, method);
            let needs_subscribe = registry.ensure_subscription(driver, service, method);

            (packet_id, receiver, needs_subscribe)
        };

        debug!("New call {packet_id} to {driver}/{service}/{method}");

        if needs_subscribe {
            let reply_topic = topic::reply_topic(driver, service, method, &self.client_id);

            debug!("Subscribing to replies at {reply_topic}");

            if let Err(e) = self.transport.subscribe(&reply_topic).await {
                self.abandon(driver, service, method, packet_id).await;
                return Err(e);
            }
        }

        let request = Request::new(params, Id::Num(packet_id));
        let payload = match request.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                self.abandon(driver, service, method, packet_id).await;
                return Err(e);
            }
        };

        let call_topic = topic::call_topic(driver, service, method, &self.client_id);
        if let Err(e) = self.transport.publish(&call_topic, &payload, false).await {
            self.abandon(driver, service, method, packet_id).await;
            return Err(e);
        }

        let result = receiver.map(|chan_result| match chan_result {
            Ok(response) => response,
            // Channel disconnected
            Err(_) => Err(Error::Internal(
                "pending call dropped without resolution".to_owned(),
            )),
        });

        Ok(PendingCall {
            packet_id,
            result: Box::pin(result),
        })
    }

    /// Issue a call and block the calling task until a reply arrives or the
    /// timeout expires. `None` waits effectively forever.
    ///
    /// On timeout the pending entry is removed before [Error::Timeout] is
    /// returned, so a late reply finds no entry and is silently dropped
    pub async fn call(
        &self,
        driver: &str,
        service: &str,
        method: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> crate::Result<Value> {
        let pending = self.call_async(driver, service, method, params).await?;
        let packet_id = pending.packet_id();

        match tokio::time::timeout(timeout.unwrap_or(NO_TIMEOUT), pending).await {
            Ok(result) => result,
            Err(_) => {
                self.abandon(driver, service, method, packet_id).await;

                warn!("Call {packet_id} to {driver}/{service}/{method} timed out");

                Err(Error::Timeout)
            }
        }
    }

    /// Inbound message callback.
    ///
    /// Returns `false` if the topic is not a reply addressed to this client,
    /// so a shared delivery callback can chain to other consumers. Matching
    /// replies that decode badly, carry a non-integer id, or correlate to no
    /// pending call are logged and dropped; that's not an error
    pub async fn on_message(&self, message_topic: &str, payload: &[u8]) -> bool {
        if !topic::is_reply_for(message_topic, &self.client_id) {
            return false;
        }

        let address = match topic::CallAddress::parse_reply(message_topic) {
            Ok(address) => address,
            Err(e) => {
                debug!("Dropping reply with malformed topic: {e}");
                return true;
            }
        };

        let response = match Response::from_bytes(payload) {
            Ok(response) => response,
            Err(e) => {
                warn!("Dropping undecodable reply on {message_topic}: {e}");
                return true;
            }
        };

        let packet_id = match response.id() {
            Some(Id::Num(packet_id)) => *packet_id,
            other => {
                debug!("Dropping reply with non-integer id {other:?}");
                return true;
            }
        };

        let result = match response.into_payload() {
            ResponsePayload::Result(value) => Ok(value),
            ResponsePayload::Error(e) => Err(Error::Call(e)),
        };

        let key = CallKey::new(
            &address.driver,
            &address.service,
            &address.method,
            packet_id,
        );

        self.registry.lock().await.resolve(&key, result);

        true
    }

    /// Number of in-flight calls
    pub async fn pending_calls(&self) -> usize {
        self.registry.lock().await.pending_count()
    }

    async fn abandon(&self, driver: &str, service: &str, method: &str, packet_id: i64) {
        self.registry
            .lock()
            .await
            .remove(&CallKey::new(driver, service, method, packet_id));
    }
}

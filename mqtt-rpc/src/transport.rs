use async_trait::async_trait;

/// The pub/sub transport collaborator.
///
/// The connection itself (reconnects, backoff, broker authentication) is
/// owned by the implementer. The implementer is also responsible for
/// delivering inbound messages matching any active subscription to
/// [crate::client::RpcClient::on_message] and
/// [crate::server::RpcServer::on_message] from its receive loop.
///
/// The subscription pattern language supports `+` as a single-level
/// wildcard, as in [crate::topic::matches]. Delivery is assumed
/// reliable-ordered per topic.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload. `retain` asks the broker to keep the message for
    /// late subscribers
    async fn publish(&self, topic: &str, payload: &[u8], retain: bool) -> crate::Result<()>;

    /// Subscribe to every topic matching the pattern
    async fn subscribe(&self, topic_pattern: &str) -> crate::Result<()>;
}

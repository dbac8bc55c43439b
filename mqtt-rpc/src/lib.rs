/*!
RPC over topic-based pub/sub transports.

The library turns asymmetric, connectionless pub/sub messaging into
correlated request/response calls with timeouts, typed errors, and retained
service advertisements:

- Clients issue calls addressed by a `(driver, service, method)` triple and
  await the reply, with per-call correlation and optional timeouts;
- Servers register handlers in a [dispatcher::Dispatcher], advertise them
  with retained messages, and translate every handler outcome into a
  well-formed reply;
- Both sides share one wire codec and one topic scheme:
  `rpc/v1/{driver}/{service}/{method}/{client_id}` for calls, the same topic
  with a `/reply` suffix for replies.

The broker connection itself is not part of the library. The application
supplies it behind the [transport::Transport] trait and feeds inbound
messages to [client::RpcClient::on_message] / [server::RpcServer::on_message]
from its delivery loop. Both callbacks return whether the message was theirs,
so one shared connection can serve several consumers. The delivery loop must
never block for long: handlers run on it, so keep them short or hand work
off internally.

# Examples

Calling a remote method:

```
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mqtt_rpc::{client::RpcClient, message::Params, transport::Transport};

struct MqttConnection;

#[async_trait]
impl Transport for MqttConnection {
    async fn publish(&self, _topic: &str, _payload: &[u8], _retain: bool) -> mqtt_rpc::Result<()> {
        Ok(())
    }

    async fn subscribe(&self, _pattern: &str) -> mqtt_rpc::Result<()> {
        Ok(())
    }
}

async fn call() {
    let client = RpcClient::new(Arc::new(MqttConnection), "reader-1");

    let params = Params::named([("foo", "a".into()), ("bar", "b".into())]);
    let response = client
        .call("Driver", "main", "foobar", params, Some(Duration::from_secs(1)))
        .await;

    println!("Call response: {response:?}");
}
```

Serving methods:

```
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use mqtt_rpc::{dispatcher::Dispatcher, server::RpcServer, transport::Transport};

struct MqttConnection;

#[async_trait]
impl Transport for MqttConnection {
    async fn publish(&self, _topic: &str, _payload: &[u8], _retain: bool) -> mqtt_rpc::Result<()> {
        Ok(())
    }

    async fn subscribe(&self, _pattern: &str) -> mqtt_rpc::Result<()> {
        Ok(())
    }
}

async fn serve() {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register("main", "add", |params| {
        let (a, b): (i64, i64) = params.parse()?;
        Ok(json!(a + b))
    });

    let server = RpcServer::new(Arc::new(MqttConnection), "Driver", dispatcher);
    server.setup().await.unwrap();

    // From the connection's delivery loop:
    // server.on_message(topic, payload).await;
}
```

See `tests/` for complete end-to-end examples.
*/

mod calls_registry;
mod error;

pub mod client;
pub mod dispatcher;
pub mod message;
pub mod response_manager;
pub mod server;
pub mod topic;
pub mod transport;

pub use error::*;

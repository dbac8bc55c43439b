use std::sync::Arc;

use log::{debug, trace, warn};

use crate::{dispatcher::Dispatcher, response_manager, topic, transport::Transport};

/// Retained advertisement payload marking a route as served
pub const ADVERT_PAYLOAD: &[u8] = b"1";

/// RPC server: advertises the registered methods of one driver, receives
/// calls and publishes replies.
///
/// The dispatcher is taken by value: all handler registration happens before
/// the server is constructed
pub struct RpcServer {
    transport: Arc<dyn Transport>,
    driver_id: String,
    dispatcher: Dispatcher,
}

impl RpcServer {
    pub fn new(transport: Arc<dyn Transport>, driver_id: &str, dispatcher: Dispatcher) -> Self {
        trace!("Making new RPC server for driver `{driver_id}`");

        Self {
            transport,
            driver_id: driver_id.to_owned(),
            dispatcher,
        }
    }

    pub fn driver_id(&self) -> &str {
        &self.driver_id
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Advertise every registered method with a retained message and
    /// subscribe to its call topics for all client segments
    pub async fn setup(&self) -> crate::Result<()> {
        for (service, method) in self.dispatcher.methods() {
            let advert_topic = topic::advert_topic(&self.driver_id, service, method);

            debug!("Advertising {advert_topic}");

            self.transport
                .publish(&advert_topic, ADVERT_PAYLOAD, true)
                .await?;
            self.transport
                .subscribe(&topic::call_pattern(&self.driver_id, service, method))
                .await?;
        }

        Ok(())
    }

    /// Inbound message callback.
    ///
    /// Returns `false` if the topic is not a call addressed to this driver,
    /// so a shared delivery callback can chain to other consumers. Topics
    /// that don't parse may belong to unrelated traffic and are dropped
    /// silently
    pub async fn on_message(&self, message_topic: &str, payload: &[u8]) -> bool {
        let address = match topic::CallAddress::parse(message_topic) {
            Ok(address) => address,
            Err(_) => {
                trace!("Ignoring non-call topic {message_topic}");
                return false;
            }
        };

        if address.driver != self.driver_id {
            trace!("Ignoring call for foreign driver {}", address.driver);
            return false;
        }

        debug!(
            "Incoming call to {}/{} from client {}",
            address.service, address.method, address.client_id
        );

        let response =
            response_manager::handle(payload, &address.service, &address.method, &self.dispatcher);

        match response {
            Some(response) => {
                let reply_topic = topic::reply_topic(
                    &address.driver,
                    &address.service,
                    &address.method,
                    &address.client_id,
                );

                match response.to_bytes() {
                    Ok(payload) => {
                        if let Err(e) = self.transport.publish(&reply_topic, &payload, false).await
                        {
                            warn!("Failed to publish reply to {reply_topic}: {e}");
                        }
                    }
                    Err(e) => warn!("Failed to encode reply to {reply_topic}: {e}"),
                }
            }
            None => trace!("No reply to publish"),
        }

        true
    }
}

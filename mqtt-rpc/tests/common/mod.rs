#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use mqtt_rpc::{client::RpcClient, server::RpcServer, topic, transport::Transport};

#[derive(Default)]
struct EndpointState {
    subscriptions: Vec<String>,
    inbox: VecDeque<(String, Vec<u8>)>,
}

#[derive(Default)]
struct BrokerState {
    endpoints: Vec<EndpointState>,
    retained: HashMap<String, Vec<u8>>,
}

/// In-memory pub/sub broker. Each endpoint is one logical connection with
/// its own subscriptions and inbox; tests pump inboxes into the client and
/// server callbacks
#[derive(Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self) -> MemoryEndpoint {
        let mut state = self.state.lock().unwrap();

        state.endpoints.push(EndpointState::default());

        MemoryEndpoint {
            state: self.state.clone(),
            index: state.endpoints.len() - 1,
        }
    }
}

#[derive(Clone)]
pub struct MemoryEndpoint {
    state: Arc<Mutex<BrokerState>>,
    index: usize,
}

impl MemoryEndpoint {
    /// Next undelivered message for this endpoint
    pub fn pop(&self) -> Option<(String, Vec<u8>)> {
        self.state.lock().unwrap().endpoints[self.index]
            .inbox
            .pop_front()
    }

    pub fn retained(&self, message_topic: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .retained
            .get(message_topic)
            .cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().unwrap().endpoints[self.index]
            .subscriptions
            .len()
    }
}

#[async_trait]
impl Transport for MemoryEndpoint {
    async fn publish(
        &self,
        message_topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> mqtt_rpc::Result<()> {
        let mut state = self.state.lock().unwrap();

        if retain {
            state
                .retained
                .insert(message_topic.to_owned(), payload.to_vec());
        }

        for endpoint in &mut state.endpoints {
            if endpoint
                .subscriptions
                .iter()
                .any(|pattern| topic::matches(pattern, message_topic))
            {
                endpoint
                    .inbox
                    .push_back((message_topic.to_owned(), payload.to_vec()));
            }
        }

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> mqtt_rpc::Result<()> {
        let mut state = self.state.lock().unwrap();

        // Retained messages are delivered to a late subscriber
        let matching: Vec<(String, Vec<u8>)> = state
            .retained
            .iter()
            .filter(|(message_topic, _)| topic::matches(pattern, message_topic))
            .map(|(message_topic, payload)| (message_topic.clone(), payload.clone()))
            .collect();

        let endpoint = &mut state.endpoints[self.index];

        endpoint.subscriptions.push(pattern.to_owned());
        endpoint.inbox.extend(matching);

        Ok(())
    }
}

/// Deliver broker traffic to the server and client callbacks until the
/// surrounding `select!` drops it
pub async fn drive(
    server_end: &MemoryEndpoint,
    server: &RpcServer,
    client_end: &MemoryEndpoint,
    client: &RpcClient,
) {
    loop {
        let mut idle = true;

        while let Some((message_topic, payload)) = server_end.pop() {
            server.on_message(&message_topic, &payload).await;
            idle = false;
        }

        while let Some((message_topic, payload)) = client_end.pop() {
            client.on_message(&message_topic, &payload).await;
            idle = false;
        }

        if idle {
            tokio::task::yield_now().await;
        }
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

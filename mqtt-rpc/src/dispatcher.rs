use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::{error::HandlerError, message::Params};

/// A registered method implementation.
///
/// Handlers are synchronous and run on the transport's delivery context, so
/// they must stay short. A handler doing long-running work must hand it off
/// internally, otherwise it stalls message delivery for the whole connection.
pub type Handler = Box<dyn Fn(&Params) -> Result<Value, HandlerError> + Send + Sync>;

/// A registry mapping (service, method) pairs to handlers.
///
/// All registration happens at setup time: the registry is passed into
/// [crate::server::RpcServer] by value, which excludes mutation during
/// request handling.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<(String, String), Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single handler. Registering the same (service, method) key
    /// again replaces the previous handler, which allows hot-patching
    /// handlers in test setups
    pub fn register<F>(&mut self, service: &str, method: &str, handler: F)
    where
        F: Fn(&Params) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let replaced = self
            .handlers
            .insert((service.to_owned(), method.to_owned()), Box::new(handler));

        if replaced.is_some() {
            debug!("Replacing registered handler for {service}/{method}");
        }
    }

    /// Register all methods of one service from an explicit enumeration
    pub fn register_service<M: Into<String>>(
        &mut self,
        service: &str,
        methods: impl IntoIterator<Item = (M, Handler)>,
    ) {
        for (method, handler) in methods {
            let method = method.into();

            if self
                .handlers
                .insert((service.to_owned(), method.clone()), handler)
                .is_some()
            {
                debug!("Replacing registered handler for {service}/{method}");
            }
        }
    }

    /// Register handlers from ((service, method), handler) pairs
    pub fn register_mapping(
        &mut self,
        entries: impl IntoIterator<Item = ((String, String), Handler)>,
    ) {
        for ((service, method), handler) in entries {
            if self
                .handlers
                .insert((service.clone(), method.clone()), handler)
                .is_some()
            {
                debug!("Replacing registered handler for {service}/{method}");
            }
        }
    }

    pub fn lookup(&self, service: &str, method: &str) -> Option<&Handler> {
        self.handlers.get(&(service.to_owned(), method.to_owned()))
    }

    /// Registered (service, method) pairs, in no particular order. Used for
    /// advertisement
    pub fn methods(&self) -> impl Iterator<Item = (&str, &str)> {
        self.handlers
            .keys()
            .map(|(service, method)| (service.as_str(), method.as_str()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

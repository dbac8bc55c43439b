//! Server-side request handling: decodes an inbound call payload, invokes
//! the registered handler and translates every outcome into a well-formed
//! response, or into no response at all for notifications.

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
};

use log::{debug, error, trace, warn};
use serde_json::{json, Value};

use crate::{
    dispatcher::Dispatcher,
    error::{Error, HandlerError, RpcError},
    message::{Request, Response},
};

/// Handle one inbound call payload addressed to `(service, method)`.
///
/// Returns `None` when no reply must be published: the request was a
/// notification. Handler faults never propagate out of this function.
pub fn handle(
    payload: &[u8],
    service: &str,
    method: &str,
    dispatcher: &Dispatcher,
) -> Option<Response> {
    let request = match Request::from_bytes(payload) {
        Ok(request) => request,
        Err(Error::ParseError(e)) => {
            warn!("Failed to parse inbound request payload: {e}");
            return Some(Response::error(RpcError::parse_error(), None));
        }
        Err(e) => {
            warn!("Inbound request has invalid shape: {e}");
            return Some(Response::error(RpcError::invalid_request(), None));
        }
    };

    let response = dispatch(&request, service, method, dispatcher);

    if request.is_notification() {
        trace!("Suppressing reply to a notification");
        None
    } else {
        Some(response)
    }
}

fn dispatch(request: &Request, service: &str, method: &str, dispatcher: &Dispatcher) -> Response {
    let id = request.id().cloned();

    let Some(handler) = dispatcher.lookup(service, method) else {
        debug!("No handler registered for {service}/{method}");
        return Response::error(RpcError::method_not_found(), id);
    };

    match catch_unwind(AssertUnwindSafe(|| handler(request.params()))) {
        Ok(Ok(result)) => Response::result(result, id),
        Ok(Err(HandlerError::Rpc(e))) => {
            debug!("Handler for {service}/{method} returned an error: {e}");
            Response::error(e, id)
        }
        Ok(Err(HandlerError::InvalidParams(message))) => {
            debug!("Invalid params for {service}/{method}: {message}");
            Response::error(
                RpcError::invalid_params(fault_data("InvalidParams", &message)),
                id,
            )
        }
        Ok(Err(HandlerError::Other(e))) => {
            error!("Handler fault in {service}/{method}: {e:#}");
            Response::error(
                RpcError::server_error(fault_data("HandlerFault", &e.to_string())),
                id,
            )
        }
        Err(panic) => {
            let message = panic_message(panic);
            error!("Handler for {service}/{method} panicked: {message}");
            Response::error(RpcError::server_error(fault_data("Panic", &message)), id)
        }
    }
}

fn fault_data(kind: &str, message: &str) -> Value {
    json!({
        "type": kind,
        "args": [],
        "message": message,
    })
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

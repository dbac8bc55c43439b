use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Protocol-level error object carried in the `error` field of a response.
///
/// `data` is optional diagnostic payload and is omitted from the wire when
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Payload is not valid structured data
    pub const PARSE_ERROR: i64 = -32700;
    /// Request field set violates the allowed field constraints
    pub const INVALID_REQUEST: i64 = -32600;
    /// No handler registered for the requested (service, method) pair
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Supplied arguments don't match the handler's parameter shape
    pub const INVALID_PARAMS: i64 = -32602;
    /// Any other handler fault
    pub const SERVER_ERROR: i64 = -32000;

    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "Parse error", None)
    }

    pub fn invalid_request() -> Self {
        Self::new(Self::INVALID_REQUEST, "Invalid Request", None)
    }

    pub fn method_not_found() -> Self {
        Self::new(Self::METHOD_NOT_FOUND, "Method not found", None)
    }

    pub fn invalid_params(data: Value) -> Self {
        Self::new(Self::INVALID_PARAMS, "Invalid params", Some(data))
    }

    pub fn server_error(data: Value) -> Self {
        Self::new(Self::SERVER_ERROR, "Server error", Some(data))
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Payload is not parseable as structured data
    #[error("Failed to parse message payload: {0}")]
    ParseError(String),
    /// Request field set or field types violate the wire contract
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Response field set or field types violate the wire contract
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// A received topic doesn't match the expected segment structure
    #[error("Malformed topic: {0}")]
    MalformedTopic(String),
    /// No reply arrived within the deadline. Client-local, never on the wire
    #[error("Call timed out")]
    Timeout,
    /// The transport collaborator failed to publish or subscribe
    #[error("Transport failure: {0}")]
    Transport(String),
    /// The peer replied with a protocol error object
    #[error("Call returned an error: {0}")]
    Call(RpcError),
    /// Internal library error. Should never happen
    #[error("Internal mqtt-rpc error: {0}. Please report the issue")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes a registered handler can report.
///
/// `Other` accepts any [anyhow::Error], so handlers can propagate arbitrary
/// faults with `?`. The response manager translates it into a generic
/// server-error response and logs it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Declared domain error. Its code, message and data go on the wire
    /// verbatim
    #[error("{0}")]
    Rpc(#[from] RpcError),
    /// The supplied arguments don't satisfy the handler's parameter shape
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// Any other fault
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

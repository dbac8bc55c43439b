use std::fmt;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, HandlerError, RpcError};

static EMPTY_KWARGS: Lazy<Map<String, Value>> = Lazy::new(Map::new);

const REQUEST_REQUIRED_FIELDS: &[&str] = &[];
const REQUEST_POSSIBLE_FIELDS: &[&str] = &["params", "id"];
const RESPONSE_REQUIRED_FIELDS: &[&str] = &["error", "id"];
const RESPONSE_POSSIBLE_FIELDS: &[&str] = &["error", "id", "result"];

/// Call parameters: either positional, named, or absent. The two shapes are
/// never combined in one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Params {
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Positional(values.into_iter().collect())
    }

    pub fn named<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Named(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Positional arguments view. Empty unless the params are a sequence
    pub fn args(&self) -> &[Value] {
        match self {
            Self::Positional(args) => args,
            _ => &[],
        }
    }

    /// Named arguments view. Empty unless the params are a mapping
    pub fn kwargs(&self) -> &Map<String, Value> {
        match self {
            Self::Named(kwargs) => kwargs,
            _ => &EMPTY_KWARGS,
        }
    }

    /// Deserialize the params into a concrete shape: a tuple for positional
    /// arguments, a struct with named fields for a mapping.
    ///
    /// A mismatch is reported as [HandlerError::InvalidParams], which the
    /// response manager turns into an invalid-params response. The
    /// classification is best-effort: it attributes any deserialization
    /// failure at this boundary to the caller's arguments.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let value = match self {
            Self::None => Value::Null,
            Self::Positional(args) => Value::Array(args.clone()),
            Self::Named(kwargs) => Value::Object(kwargs.clone()),
        };

        serde_json::from_value(value).map_err(|e| HandlerError::InvalidParams(e.to_string()))
    }

    fn to_value(&self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Positional(args) => Some(Value::Array(args.clone())),
            Self::Named(kwargs) => Some(Value::Object(kwargs.clone())),
        }
    }

    fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Array(args) => Ok(Self::Positional(args)),
            Value::Object(kwargs) => Ok(Self::Named(kwargs)),
            other => Err(Error::InvalidRequest(format!(
                "params should be a sequence or a mapping, got {other}"
            ))),
        }
    }
}

/// Request or response correlation id: a string or an integer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Id {
    Num(i64),
    Str(String),
}

impl Id {
    fn to_value(&self) -> Value {
        match self {
            Self::Num(id) => Value::from(*id),
            Self::Str(id) => Value::from(id.clone()),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(id) => id.as_i64().map(Self::Num),
            Value::String(id) => Some(Self::Str(id.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(id) => write!(f, "{id}"),
            Self::Str(id) => write!(f, "{id}"),
        }
    }
}

/// An RPC request.
///
/// A request with no id is a notification: no reply is expected or sent for
/// it. The encoded form omits the `id` field entirely in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    params: Params,
    id: Option<Id>,
    notification: bool,
}

impl Request {
    pub fn new(params: Params, id: Id) -> Self {
        Self {
            params,
            id: Some(id),
            notification: false,
        }
    }

    pub fn notification(params: Params) -> Self {
        Self {
            params,
            id: None,
            notification: true,
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn is_notification(&self) -> bool {
        self.notification
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        let mut object = Map::new();

        if let Some(params) = self.params.to_value() {
            object.insert("params".to_owned(), params);
        }

        if !self.notification {
            object.insert(
                "id".to_owned(),
                self.id.as_ref().map_or(Value::Null, Id::to_value),
            );
        }

        serde_json::to_vec(&Value::Object(object)).map_err(|e| Error::Internal(e.to_string()))
    }

    pub fn from_bytes(payload: &[u8]) -> crate::Result<Self> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| Error::ParseError(e.to_string()))?;

        let Value::Object(mut object) = value else {
            return Err(Error::InvalidRequest(
                "request should be an object".to_owned(),
            ));
        };

        check_fields(&object, REQUEST_REQUIRED_FIELDS, REQUEST_POSSIBLE_FIELDS)
            .map_err(Error::InvalidRequest)?;

        let params = match object.remove("params") {
            Some(params) => Params::from_value(params)?,
            None => Params::None,
        };

        let (id, notification) = match object.remove("id") {
            None => (None, true),
            Some(Value::Null) => (None, false),
            Some(id) => {
                let id = Id::from_value(&id).ok_or_else(|| {
                    Error::InvalidRequest("id should be a string or an integer".to_owned())
                })?;
                (Some(id), false)
            }
        };

        Ok(Self {
            params,
            id,
            notification,
        })
    }
}

/// Response body: exactly one of a result value or an error object. The
/// mutual exclusion is enforced by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(RpcError),
}

/// An RPC response.
///
/// The encoded form always carries the `error` and `id` fields (`error` is
/// `null` on success); `result` is present only on success. A `null` id means
/// the id could not be determined from a malformed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    payload: ResponsePayload,
    id: Option<Id>,
}

impl Response {
    pub fn result(value: Value, id: Option<Id>) -> Self {
        Self {
            payload: ResponsePayload::Result(value),
            id,
        }
    }

    pub fn error(error: RpcError, id: Option<Id>) -> Self {
        Self {
            payload: ResponsePayload::Error(error),
            id,
        }
    }

    pub fn id(&self) -> Option<&Id> {
        self.id.as_ref()
    }

    pub fn payload(&self) -> &ResponsePayload {
        &self.payload
    }

    pub fn into_payload(self) -> ResponsePayload {
        self.payload
    }

    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        let mut object = Map::new();

        match &self.payload {
            ResponsePayload::Result(value) => {
                object.insert("result".to_owned(), value.clone());
                object.insert("error".to_owned(), Value::Null);
            }
            ResponsePayload::Error(error) => {
                let error =
                    serde_json::to_value(error).map_err(|e| Error::Internal(e.to_string()))?;
                object.insert("error".to_owned(), error);
            }
        }

        object.insert(
            "id".to_owned(),
            self.id.as_ref().map_or(Value::Null, Id::to_value),
        );

        serde_json::to_vec(&Value::Object(object)).map_err(|e| Error::Internal(e.to_string()))
    }

    pub fn from_bytes(payload: &[u8]) -> crate::Result<Self> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| Error::ParseError(e.to_string()))?;

        let Value::Object(mut object) = value else {
            return Err(Error::InvalidResponse(
                "response should be an object".to_owned(),
            ));
        };

        check_fields(&object, RESPONSE_REQUIRED_FIELDS, RESPONSE_POSSIBLE_FIELDS)
            .map_err(Error::InvalidResponse)?;

        // Presence of both fields is checked above
        let error = object.remove("error").unwrap_or(Value::Null);
        let id_value = object.remove("id").unwrap_or(Value::Null);
        let result = object.remove("result").filter(|value| !value.is_null());

        let payload = match (error, result) {
            (Value::Null, Some(result)) => ResponsePayload::Result(result),
            (Value::Null, None) => {
                return Err(Error::InvalidResponse(
                    "either result or error should be set".to_owned(),
                ))
            }
            (error, None) => {
                let error: RpcError = serde_json::from_value(error)
                    .map_err(|e| Error::InvalidResponse(format!("invalid error object: {e}")))?;
                ResponsePayload::Error(error)
            }
            (_, Some(_)) => {
                return Err(Error::InvalidResponse(
                    "result and error are mutually exclusive".to_owned(),
                ))
            }
        };

        let id = match &id_value {
            Value::Null => None,
            value => Some(Id::from_value(value).ok_or_else(|| {
                Error::InvalidResponse("id should be a string or an integer".to_owned())
            })?),
        };

        Ok(Self { payload, id })
    }
}

fn check_fields(
    object: &Map<String, Value>,
    required: &[&str],
    possible: &[&str],
) -> Result<(), String> {
    let extra: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|key| !possible.contains(key))
        .collect();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|key| !object.contains_key(*key))
        .collect();

    if extra.is_empty() && missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "extra fields: {extra:?}, missing fields: {missing:?}"
        ))
    }
}

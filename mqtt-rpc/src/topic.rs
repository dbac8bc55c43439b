//! Topic addressing scheme.
//!
//! Layout:
//! - call: `rpc/v1/{driver}/{service}/{method}/{client_id}`
//! - reply: `rpc/v1/{driver}/{service}/{method}/{client_id}/reply`
//! - advertisement (retained): `rpc/v1/{driver}/{service}/{method}`
//!
//! Segments are `/`-separated, so no identifier may itself contain `/`.
//! Client ids are sanitized with [sanitize_client_id]; driver, service and
//! method identifiers are the caller's responsibility.

use crate::error::Error;

const CALL_TOPIC_SEGMENTS: usize = 6;
const REPLY_SUFFIX: &str = "reply";

pub fn call_topic(driver: &str, service: &str, method: &str, client_id: &str) -> String {
    format!("rpc/v1/{driver}/{service}/{method}/{client_id}")
}

pub fn reply_topic(driver: &str, service: &str, method: &str, client_id: &str) -> String {
    format!(
        "{}/{REPLY_SUFFIX}",
        call_topic(driver, service, method, client_id)
    )
}

/// Advertisement topic has no client segment. The server publishes a retained
/// sentinel there, so late-joining clients see that the route is served
pub fn advert_topic(driver: &str, service: &str, method: &str) -> String {
    format!("rpc/v1/{driver}/{service}/{method}")
}

/// Pattern matching calls from any client to one (driver, service, method)
pub fn call_pattern(driver: &str, service: &str, method: &str) -> String {
    format!("{}/+", advert_topic(driver, service, method))
}

/// Pattern matching every reply addressed to `client_id`, whatever the
/// target triple
pub fn reply_pattern(client_id: &str) -> String {
    format!("rpc/v1/+/+/+/{client_id}/{REPLY_SUFFIX}")
}

/// Substitute `/` in a client identifier so it fits into a single topic
/// segment
pub fn sanitize_client_id(client_id: &str) -> String {
    client_id.replace('/', "_")
}

/// Test a concrete topic against a subscription pattern. `+` matches exactly
/// one segment; literal segments match exactly. Mirrors the single-level
/// wildcard semantics of the transport's own pattern language
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }

    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let topic_segments: Vec<&str> = topic.split('/').collect();

    if pattern_segments.len() != topic_segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(&topic_segments)
        .all(|(pattern, segment)| *pattern == "+" || pattern == segment)
}

/// Is the topic a reply addressed to this client?
pub fn is_reply_for(topic: &str, client_id: &str) -> bool {
    matches(&reply_pattern(client_id), topic)
}

/// Routing components parsed out of a call topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAddress {
    pub driver: String,
    pub service: String,
    pub method: String,
    pub client_id: String,
}

impl CallAddress {
    /// Parse a call topic. Fails with [Error::MalformedTopic] if the prefix
    /// or the segment count doesn't match, which usually means the message
    /// belongs to unrelated traffic on the same connection
    pub fn parse(topic: &str) -> crate::Result<Self> {
        let segments: Vec<&str> = topic.split('/').collect();

        if segments.len() != CALL_TOPIC_SEGMENTS || segments[0] != "rpc" || segments[1] != "v1" {
            return Err(Error::MalformedTopic(topic.to_owned()));
        }

        Ok(Self {
            driver: segments[2].to_owned(),
            service: segments[3].to_owned(),
            method: segments[4].to_owned(),
            client_id: segments[5].to_owned(),
        })
    }

    /// Parse a reply topic: a call topic with the `/reply` suffix
    pub fn parse_reply(topic: &str) -> crate::Result<Self> {
        topic
            .strip_suffix("/reply")
            .ok_or_else(|| Error::MalformedTopic(topic.to_owned()))
            .and_then(Self::parse)
    }
}

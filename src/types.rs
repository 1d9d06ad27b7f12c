use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::Payload;

/// Classified response body.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Empty,
    /// Body that is not an XML document, kept verbatim.
    Text(String),
    /// XML document parsed into a structured value.
    Structured(JsonValue),
}

impl ResponseBody {
    pub fn as_structured(&self) -> Option<&JsonValue> {
        match self {
            Self::Structured(value) => Some(value),
            _ => None,
        }
    }
}

/// Normalized successful response (status < 400).
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Response headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl Response {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A message retrieved from a queue.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub message_id: Option<String>,
    /// Absent for peeked messages.
    pub pop_receipt: Option<String>,
    pub dequeue_count: Option<u32>,
    pub insertion_time: Option<DateTime<Utc>>,
    pub expiration_time: Option<DateTime<Utc>>,
    /// Absent for peeked messages.
    pub time_next_visible: Option<DateTime<Utc>>,
    /// Decoded payload, or the decode failure description as text.
    pub content: Payload,
    /// Set when the message text could not be decoded.
    pub decode_error: Option<String>,
}

/// One page of a queue listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueList {
    pub names: Vec<String>,
    /// Continuation marker; `None` when the listing is complete.
    pub next_marker: Option<String>,
}

/// New visibility data returned by an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatedMessage {
    pub pop_receipt: Option<String>,
    pub time_next_visible: Option<DateTime<Utc>>,
}

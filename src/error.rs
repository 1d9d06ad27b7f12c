use serde_json::Value as JsonValue;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Connection-level failure from `reqwest`.
    ///
    /// `code` is the system error code (`ECONNREFUSED`, `ETIMEDOUT`, ...)
    /// when one could be derived from the underlying I/O error.
    #[error("transport error{}: {source}", code_suffix(.code))]
    Transport {
        code: Option<String>,
        #[source]
        source: reqwest::Error,
        retries_made: u32,
    },
    /// HTTP status >= 400 returned by the queue service.
    #[error("service error {status} ({code})")]
    Service {
        status: u16,
        /// Service-assigned error code, or `UnknownBody`.
        code: String,
        /// Parsed `Error` element, or the raw body when it had no such element.
        detail: JsonValue,
        retries_made: u32,
    },
    /// Response body announced XML but could not be parsed.
    #[error("xml parse error: {message}")]
    XmlParse { message: String, retries_made: u32 },
    /// The transport produced neither a response nor an error.
    #[error("unknown error")]
    Unknown { retries_made: u32 },
    /// Success status the calling operation does not expect.
    #[error("unexpected status {status}")]
    UnexpectedStatus { status: u16 },
    /// Success body did not have the shape the operation expects.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Payload does not match the requested message encoding.
    #[error("encode error: {0}")]
    Encode(String),
    /// Invalid client settings.
    #[error("config error: {0}")]
    Config(String),
}

pub(crate) const XML_PARSE_ERROR_CODE: &str = "XMLParseError";
pub(crate) const UNKNOWN_ERROR_CODE: &str = "UnknownError";
pub(crate) const UNKNOWN_BODY_CODE: &str = "UnknownBody";

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|code| format!(" ({code})"))
        .unwrap_or_default()
}

impl QueueError {
    /// Error code: service code, transport system code or a generic marker.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Transport { code, .. } => code.as_deref(),
            Self::Service { code, .. } => Some(code),
            Self::XmlParse { .. } => Some(XML_PARSE_ERROR_CODE),
            Self::Unknown { .. } => Some(UNKNOWN_ERROR_CODE),
            _ => None,
        }
    }

    /// HTTP status, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } | Self::UnexpectedStatus { status } => Some(*status),
            _ => None,
        }
    }

    /// Number of retries made before this error was surfaced.
    ///
    /// `None` for errors raised outside the request pipeline.
    pub fn retries_made(&self) -> Option<u32> {
        match self {
            Self::Transport { retries_made, .. }
            | Self::Service { retries_made, .. }
            | Self::XmlParse { retries_made, .. }
            | Self::Unknown { retries_made } => Some(*retries_made),
            _ => None,
        }
    }

    pub(crate) fn with_retries_made(mut self, retries: u32) -> Self {
        match &mut self {
            Self::Transport { retries_made, .. }
            | Self::Service { retries_made, .. }
            | Self::XmlParse { retries_made, .. }
            | Self::Unknown { retries_made } => *retries_made = retries,
            _ => {}
        }
        self
    }
}

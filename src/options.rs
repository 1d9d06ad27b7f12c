/// Resolved message encoding mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MessageEncoding {
    /// Payloads are JSON objects/arrays serialized to text.
    pub json: bool,
    /// Message text is base64 encoded even in json mode.
    pub base64: bool,
}

impl Default for MessageEncoding {
    fn default() -> Self {
        Self {
            json: true,
            base64: false,
        }
    }
}

/// Per-call encoding overrides. `None` defers to the client default.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EncodingOptions {
    pub json: Option<bool>,
    pub base64: Option<bool>,
}

impl EncodingOptions {
    pub fn json() -> Self {
        Self {
            json: Some(true),
            base64: None,
        }
    }

    pub fn raw() -> Self {
        Self {
            json: Some(false),
            base64: None,
        }
    }

    pub fn base64() -> Self {
        Self {
            json: None,
            base64: Some(true),
        }
    }

    /// Resolves these overrides against the client defaults.
    pub fn resolve(&self, defaults: MessageEncoding) -> MessageEncoding {
        MessageEncoding {
            json: self.json.unwrap_or(defaults.json),
            base64: self.base64.unwrap_or(defaults.base64),
        }
    }
}

/// Options shared by operations that only take a server-side timeout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RequestOptions {
    /// Server-side timeout in seconds.
    pub timeout: Option<u32>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListQueuesOptions {
    pub prefix: Option<String>,
    /// Continuation marker from a previous listing.
    pub marker: Option<String>,
    pub max_results: Option<u32>,
    pub timeout: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PutMessageOptions {
    pub encoding: EncodingOptions,
    /// Seconds before the message becomes visible.
    pub visibility_timeout: Option<u32>,
    /// Message time-to-live in seconds.
    pub message_ttl: Option<u32>,
    pub timeout: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GetMessagesOptions {
    pub encoding: EncodingOptions,
    pub visibility_timeout: Option<u32>,
    /// Number of messages to retrieve (service allows 1..=32).
    pub max_messages: Option<u32>,
    pub timeout: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PeekMessagesOptions {
    pub encoding: EncodingOptions,
    pub max_messages: Option<u32>,
    pub timeout: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UpdateMessageOptions {
    pub encoding: EncodingOptions,
    pub timeout: Option<u32>,
}

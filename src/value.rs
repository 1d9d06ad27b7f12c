use serde_json::Value as JsonValue;

/// Logical message payload.
///
/// Structured values travel as JSON text; bytes and text travel base64
/// encoded unless the codec is told otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(JsonValue),
    Bytes(Vec<u8>),
    Text(String),
}

impl Payload {
    pub fn json(value: impl Into<JsonValue>) -> Self {
        Self::Json(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Returns the structured value, if this payload holds one.
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text, if this payload holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the raw bytes of a byte or text payload.
    ///
    /// Raw-mode messages cannot tell bytes from text on the wire, so decoding
    /// yields `Text` for valid UTF-8; this reads either back as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            Self::Text(value) => Some(value.as_bytes()),
            Self::Json(_) => None,
        }
    }

    /// Owned form of [`Payload::as_bytes`].
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(value) => Some(value),
            Self::Text(value) => Some(value.into_bytes()),
            Self::Json(_) => None,
        }
    }
}

impl From<JsonValue> for Payload {
    fn from(value: JsonValue) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::Payload;

    #[test]
    fn helper_constructors() {
        assert_eq!(Payload::json(json!([1])), Payload::Json(json!([1])));
        assert_eq!(Payload::bytes(vec![1, 2]), Payload::Bytes(vec![1, 2]));
        assert_eq!(Payload::text("abc"), Payload::Text("abc".to_owned()));
    }

    #[test]
    fn accessors_match_variant() {
        let payload: Payload = "hello".into();
        assert_eq!(payload.as_text(), Some("hello"));
        assert!(payload.as_json().is_none());

        let payload: Payload = json!({"a": 1}).into();
        assert_eq!(payload.as_json(), Some(&json!({"a": 1})));
    }

    #[test]
    fn bytes_view_covers_text_and_bytes() {
        assert_eq!(Payload::text("hi").as_bytes(), Some(&b"hi"[..]));
        assert_eq!(Payload::bytes(vec![0xff]).as_bytes(), Some(&[0xff][..]));
        assert_eq!(Payload::json(json!([1])).as_bytes(), None);
        assert_eq!(Payload::text("hi").into_bytes(), Some(b"hi".to_vec()));
    }
}

use base64::{
    alphabet,
    engine::{
        general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD},
        DecodePaddingMode,
    },
    Engine,
};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::{xml, Message, MessageEncoding, Payload, QueueError, Result};

const ENVELOPE_OPEN: &str = "<QueueMessage><MessageText>";
const ENVELOPE_CLOSE: &str = "</MessageText></QueueMessage>";

/// Accepts message text with or without padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes `payload` into the `QueueMessage` wire envelope.
///
/// In json mode the payload must be an object or array; it is serialized
/// and only `<` and `&` are escaped. When json mode is off, or base64 is
/// forced, the text is base64 encoded instead, which needs no escaping.
pub fn encode_message(encoding: MessageEncoding, payload: &Payload) -> Result<String> {
    let text = if encoding.json {
        let serialized = match payload {
            Payload::Json(value @ (JsonValue::Object(_) | JsonValue::Array(_))) => {
                serde_json::to_string(value).map_err(|err| {
                    QueueError::Encode(format!("message could not be serialized: {err}"))
                })?
            }
            _ => {
                return Err(QueueError::Encode(
                    "message must be an object or array in json mode".to_owned(),
                ))
            }
        };
        if encoding.base64 {
            STANDARD.encode(serialized)
        } else {
            escape_text(&serialized)
        }
    } else {
        match payload {
            Payload::Bytes(bytes) => STANDARD.encode(bytes),
            Payload::Text(text) => STANDARD.encode(text),
            Payload::Json(_) => {
                return Err(QueueError::Encode(
                    "message must be bytes or text when json mode is off".to_owned(),
                ))
            }
        }
    };

    Ok(format!("{ENVELOPE_OPEN}{text}{ENVELOPE_CLOSE}"))
}

/// Decodes one `QueueMessage` element as parsed by the XML reader.
///
/// Never fails: a corrupt text is reported in-band as the message content
/// and in [`Message::decode_error`], so one bad message does not abort a
/// batch.
///
/// With json mode off the wire does not say whether bytes or text were
/// sent: valid UTF-8 decodes to [`Payload::Text`], anything else to
/// [`Payload::Bytes`]. [`Payload::as_bytes`] reads either back as bytes.
///
/// Base64 text is decoded leniently: padding is optional, whitespace is
/// ignored and the URL-safe `-`/`_` characters are accepted.
pub fn decode_message(encoding: MessageEncoding, raw: &JsonValue) -> Message {
    let field = |name: &str| xml::text(raw.get(name));
    let raw_text = field("messageText").unwrap_or_default();
    let mut decode_error = None;

    let looks_like_json = raw_text.starts_with('{') || raw_text.starts_with('[');
    let bytes = if encoding.base64 || !looks_like_json {
        match decode_base64(raw_text) {
            Ok(bytes) => bytes,
            Err(err) => {
                let reason = format!("invalid base64 message text: {err}");
                #[cfg(feature = "tracing")]
                tracing::debug!("{reason}");
                decode_error = Some(reason.clone());
                reason.into_bytes()
            }
        }
    } else {
        raw_text.as_bytes().to_vec()
    };

    let content = if encoding.json {
        match serde_json::from_slice::<JsonValue>(&bytes) {
            Ok(value) => Payload::Json(value),
            Err(err) => {
                let reason = format!("invalid json message text: {err}");
                #[cfg(feature = "tracing")]
                tracing::debug!("{reason}");
                if decode_error.is_none() {
                    decode_error = Some(reason.clone());
                }
                Payload::Text(reason)
            }
        }
    } else {
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(err) => Payload::Bytes(err.into_bytes()),
        }
    };

    Message {
        message_id: field("messageId").map(str::to_owned),
        pop_receipt: field("popReceipt").map(str::to_owned),
        dequeue_count: field("dequeueCount").and_then(|value| value.trim().parse().ok()),
        insertion_time: field("insertionTime").and_then(parse_timestamp),
        expiration_time: field("expirationTime").and_then(parse_timestamp),
        time_next_visible: field("timeNextVisible").and_then(parse_timestamp),
        content,
        decode_error,
    }
}

fn decode_base64(text: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = text
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .map(|ch| match ch {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    LENIENT.decode(normalized)
}

/// Parses an RFC 1123 timestamp such as `Thu, 03 Jul 2014 08:54:30 GMT`.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '&' => escaped.push_str("&amp;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{decode_message, encode_message};
    use crate::{xml, MessageEncoding, Payload, QueueError};

    const JSON: MessageEncoding = MessageEncoding {
        json: true,
        base64: false,
    };
    const RAW: MessageEncoding = MessageEncoding {
        json: false,
        base64: false,
    };
    const JSON_BASE64: MessageEncoding = MessageEncoding {
        json: true,
        base64: true,
    };

    fn wire_record(body: &str) -> serde_json::Value {
        let doc = xml::parse_document(&format!("<?xml version=\"1.0\"?>{body}"))
            .expect("envelope must parse");
        doc["queueMessage"].clone()
    }

    #[test]
    fn json_payload_escapes_only_lt_and_amp() {
        let body = encode_message(
            JSON,
            &Payload::json(json!({"value1": "ABCD<EFG&", "value2": 123})),
        )
        .expect("must encode");
        assert_eq!(
            body,
            "<QueueMessage><MessageText>{\"value1\":\"ABCD&lt;EFG&amp;\",\"value2\":123}</MessageText></QueueMessage>"
        );
    }

    #[test]
    fn text_payload_is_base64_when_json_is_off() {
        let body = encode_message(RAW, &Payload::text("♩ust testing ☑")).expect("must encode");
        assert_eq!(
            body,
            "<QueueMessage><MessageText>4pmpdXN0IHRlc3Rpbmcg4piR</MessageText></QueueMessage>"
        );
    }

    #[test]
    fn forced_base64_wraps_serialized_json() {
        let body = encode_message(JSON_BASE64, &Payload::json(json!({"abc": 1}))).expect("must encode");
        assert_eq!(
            body,
            "<QueueMessage><MessageText>eyJhYmMiOjF9</MessageText></QueueMessage>"
        );
    }

    #[test]
    fn json_mode_rejects_primitives_and_text() {
        for payload in [Payload::json(json!(5)), Payload::text("plain")] {
            let err = encode_message(JSON, &payload).expect_err("must fail");
            assert!(matches!(err, QueueError::Encode(_)));
        }
    }

    #[test]
    fn raw_mode_rejects_structured_values() {
        let err = encode_message(RAW, &Payload::json(json!({"a": 1}))).expect_err("must fail");
        assert!(matches!(err, QueueError::Encode(_)));
    }

    #[test]
    fn decodes_metadata_and_json_text() {
        let raw = json!({
            "messageId": "f00c98a4-1547-4d65-a5ea-ec233a85d7af",
            "insertionTime": "Thu, 03 Jul 2014 08:54:30 GMT",
            "expirationTime": "Thu, 10 Jul 2014 08:54:30 GMT",
            "dequeueCount": "1",
            "popReceipt": "sK52prNk0QgBAAAA",
            "timeNextVisible": "Thu, 03 Jul 2014 08:55:19 GMT",
            "messageText": "{\"value1\":\"ABCD<EFG&\",\"value2\":123}"
        });

        let message = decode_message(JSON, &raw);
        assert_eq!(message.dequeue_count, Some(1));
        assert_eq!(
            message.insertion_time,
            Some(Utc.with_ymd_and_hms(2014, 7, 3, 8, 54, 30).unwrap())
        );
        assert_eq!(
            message.time_next_visible,
            Some(Utc.with_ymd_and_hms(2014, 7, 3, 8, 55, 19).unwrap())
        );
        assert_eq!(message.pop_receipt.as_deref(), Some("sK52prNk0QgBAAAA"));
        assert_eq!(
            message.content,
            Payload::json(json!({"value1": "ABCD<EFG&", "value2": 123}))
        );
        assert!(message.decode_error.is_none());
    }

    #[test]
    fn peeked_message_without_receipt_passes_through() {
        let raw = json!({
            "messageId": "a6599b16",
            "dequeueCount": "1",
            "messageText": "{\"test\":true}"
        });
        let message = decode_message(JSON, &raw);
        assert!(message.pop_receipt.is_none());
        assert!(message.time_next_visible.is_none());
        assert_eq!(message.content, Payload::json(json!({"test": true})));
    }

    #[test]
    fn base64_text_decodes_to_string() {
        let raw = json!({ "messageText": "4pmpdXN0IHRlc3Rpbmcg4piR" });
        let message = decode_message(RAW, &raw);
        assert_eq!(message.content, Payload::text("♩ust testing ☑"));
    }

    #[test]
    fn base64_wrapped_json_decodes_when_forced() {
        let raw = json!({ "messageText": "eyJhYmMiOjF9" });
        let message = decode_message(JSON_BASE64, &raw);
        assert_eq!(message.content, Payload::json(json!({"abc": 1})));
    }

    #[test]
    fn corrupt_text_is_reported_in_band() {
        let raw = json!({ "messageText": "not base64!!" });
        let message = decode_message(JSON, &raw);
        assert!(message.decode_error.is_some());
        match message.content {
            Payload::Text(reason) => assert!(reason.contains("json")),
            other => panic!("expected in-band error text, got {other:?}"),
        }
    }

    #[test]
    fn json_round_trip_through_wire_envelope() {
        let payload = Payload::json(json!({"nested": {"a": [1, 2, "<&>"]}, "b": null}));
        let body = encode_message(JSON, &payload).expect("must encode");
        let message = decode_message(JSON, &wire_record(&body));
        assert_eq!(message.content, payload);
    }

    #[test]
    fn unpadded_and_wrapped_base64_decode() {
        for text in ["aGVsbG8", "aGVsbG8=", "aGVs\nbG8=", " aGVsbG8 "] {
            let message = decode_message(RAW, &json!({ "messageText": text }));
            assert!(message.decode_error.is_none(), "{text:?} must decode");
            assert_eq!(message.content, Payload::text("hello"));
        }

        let message = decode_message(RAW, &json!({ "messageText": "-_8" }));
        assert_eq!(message.content.as_bytes(), Some(&[0xfb, 0xff][..]));
    }

    #[test]
    fn utf8_bytes_round_trip_as_bytes() {
        let payload = Payload::bytes(b"hello".to_vec());
        let body = encode_message(RAW, &payload).expect("must encode");
        let message = decode_message(RAW, &wire_record(&body));
        assert!(message.decode_error.is_none());
        assert_eq!(message.content.as_bytes(), payload.as_bytes());
        assert_eq!(message.content.into_bytes(), Some(b"hello".to_vec()));
    }

    #[test]
    fn text_round_trips_unchanged() {
        let payload = Payload::text("♩ust testing ☑");
        let body = encode_message(RAW, &payload).expect("must encode");
        let message = decode_message(RAW, &wire_record(&body));
        assert_eq!(message.content, payload);
    }

    #[test]
    fn bytes_round_trip_through_wire_envelope() {
        let payload = Payload::bytes(vec![0xff, 0x00, 0x10, 0x80]);
        let body = encode_message(RAW, &payload).expect("must encode");
        let message = decode_message(RAW, &wire_record(&body));
        assert_eq!(message.content, payload);
    }
}

use std::collections::BTreeMap;
use std::io;

use reqwest::header::HeaderMap;
use serde_json::Value as JsonValue;

use crate::{
    error::UNKNOWN_BODY_CODE, xml, QueueError, Response, ResponseBody, Result,
};

/// Response as read off the transport, before classification.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Classifies a transport response into a success or a structured error.
///
/// `None` stands for a transport that produced neither a response nor an
/// error.
pub(crate) fn normalize(raw: Option<RawResponse>) -> Result<Response> {
    let Some(raw) = raw else {
        return Err(QueueError::Unknown { retries_made: 0 });
    };

    let body = classify_body(raw.body)?;

    if raw.status >= 400 {
        let (code, detail) = match &body {
            ResponseBody::Structured(value) => match value.get("error") {
                Some(error) => (
                    error
                        .get("code")
                        .and_then(JsonValue::as_str)
                        .unwrap_or(UNKNOWN_BODY_CODE)
                        .to_owned(),
                    error.clone(),
                ),
                None => (UNKNOWN_BODY_CODE.to_owned(), value.clone()),
            },
            ResponseBody::Text(text) => (UNKNOWN_BODY_CODE.to_owned(), JsonValue::String(text.clone())),
            ResponseBody::Empty => (UNKNOWN_BODY_CODE.to_owned(), JsonValue::Null),
        };
        return Err(QueueError::Service {
            status: raw.status,
            code,
            detail,
            retries_made: 0,
        });
    }

    Ok(Response {
        status: raw.status,
        headers: raw.headers,
        body,
    })
}

fn classify_body(body: String) -> Result<ResponseBody> {
    if body.is_empty() {
        return Ok(ResponseBody::Empty);
    }
    if !xml::is_xml_document(&body) {
        return Ok(ResponseBody::Text(body));
    }
    xml::parse_document(&body)
        .map(ResponseBody::Structured)
        .map_err(|message| QueueError::XmlParse {
            message,
            retries_made: 0,
        })
}

/// Wraps a `reqwest` failure, deriving a system error code when possible.
pub(crate) fn transport_error(err: reqwest::Error) -> QueueError {
    QueueError::Transport {
        code: transport_code(&err).map(str::to_owned),
        source: err,
        retries_made: 0,
    }
}

fn transport_code(err: &reqwest::Error) -> Option<&'static str> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(code) = inner.downcast_ref::<io::Error>().and_then(io_error_code) {
            return Some(code);
        }
        source = inner.source();
    }

    if err.is_timeout() {
        if err.is_connect() {
            Some("ETIMEDOUT")
        } else {
            Some("ESOCKETTIMEDOUT")
        }
    } else if err.is_connect() {
        Some("ECONNREFUSED")
    } else {
        None
    }
}

fn io_error_code(err: &io::Error) -> Option<&'static str> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
        io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        io::ErrorKind::AddrInUse => Some("EADDRINUSE"),
        io::ErrorKind::AddrNotAvailable => Some("EADDRNOTAVAIL"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        io::ErrorKind::NotConnected => Some("ENOTCONN"),
        _ => None,
    }
}

/// Copies response headers into a name → value map. Repeated headers are
/// joined with `", "`; values that are not visible ASCII are skipped.
pub(crate) fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_owned())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }
    map
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;

    use super::{header_map, normalize, RawResponse};
    use crate::{QueueError, ResponseBody};

    fn raw(status: u16, body: &str) -> RawResponse {
        let mut headers = BTreeMap::new();
        headers.insert("x-ms-popreceipt".to_owned(), "DKtBR2tl0QgBAAAA".to_owned());
        RawResponse {
            status,
            headers,
            body: body.to_owned(),
        }
    }

    #[test]
    fn missing_response_is_unknown_error() {
        let err = normalize(None).expect_err("must fail");
        assert!(matches!(err, QueueError::Unknown { .. }));
        assert_eq!(err.code(), Some("UnknownError"));
    }

    #[test]
    fn service_error_carries_code_and_detail() {
        let err = normalize(Some(raw(
            400,
            "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?><Error>\
             <Code>OutOfRangeQueryParameterValue</Code>\
             <Message>One of the query parameters is outside the permissible range.</Message>\
             <QueryParameterName>messagettl</QueryParameterName>\
             <QueryParameterValue>691200</QueryParameterValue>\
             <MinimumAllowed>1</MinimumAllowed><MaximumAllowed>604800</MaximumAllowed></Error>",
        )))
        .expect_err("must fail");

        match err {
            QueueError::Service {
                status,
                code,
                detail,
                retries_made,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, "OutOfRangeQueryParameterValue");
                assert_eq!(retries_made, 0);
                assert_eq!(
                    detail,
                    json!({
                        "code": "OutOfRangeQueryParameterValue",
                        "message": "One of the query parameters is outside the permissible range.",
                        "queryParameterName": "messagettl",
                        "queryParameterValue": "691200",
                        "minimumAllowed": "1",
                        "maximumAllowed": "604800"
                    })
                );
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn error_without_error_element_uses_unknown_body() {
        let err = normalize(Some(raw(503, "Service Unavailable"))).expect_err("must fail");
        assert_eq!(err.code(), Some("UnknownBody"));
        assert_eq!(err.status(), Some(503));

        let err = normalize(Some(raw(500, ""))).expect_err("must fail");
        assert_eq!(err.code(), Some("UnknownBody"));
    }

    #[test]
    fn malformed_xml_fails_regardless_of_status() {
        for status in [200, 500] {
            let err = normalize(Some(raw(status, "<?xml version=\"1.0\"?><A><B></A>")))
                .expect_err("must fail");
            assert!(matches!(err, QueueError::XmlParse { .. }));
        }
    }

    #[test]
    fn success_keeps_headers_and_classified_body() {
        let response = normalize(Some(raw(
            200,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessagesList />",
        )))
        .expect("must succeed");
        assert_eq!(response.status, 200);
        assert_eq!(response.header("x-ms-popreceipt"), Some("DKtBR2tl0QgBAAAA"));
        assert_eq!(
            response.body,
            ResponseBody::Structured(json!({ "queueMessagesList": "" }))
        );

        let response = normalize(Some(raw(204, ""))).expect("must succeed");
        assert_eq!(response.body, ResponseBody::Empty);
    }

    #[test]
    fn header_map_joins_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("x-ms-meta", HeaderValue::from_static("a"));
        headers.append("x-ms-meta", HeaderValue::from_static("b"));
        headers.insert("content-type", HeaderValue::from_static("application/xml"));

        let map = header_map(&headers);
        assert_eq!(map.get("x-ms-meta").map(String::as_str), Some("a, b"));
        assert_eq!(
            map.get("content-type").map(String::as_str),
            Some("application/xml")
        );
    }
}

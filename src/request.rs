use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use reqwest::{Method, Url};

use crate::{QueryParams, QueueError, Result};

pub(crate) const API_VERSION: &str = "2014-02-14";
pub(crate) const CONTENT_TYPE: &str = "application/xml;charset=\"utf-8\"";
pub(crate) const USER_AGENT: &str = concat!("storage-queue-http/", env!("CARGO_PKG_VERSION"));

/// A prospective request: everything needed to sign and send it.
///
/// Header names are stored lower-cased. The descriptor is built fresh per
/// call and only mutated to attach the `authorization` header.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub query: QueryParams,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl RequestDescriptor {
    /// Builds a descriptor for `path` relative to `account_url`, stamped
    /// with `now` in both `date` and `x-ms-date`.
    pub fn new(
        method: Method,
        account_url: &str,
        path: &str,
        query: QueryParams,
        body: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let url = Url::parse(&format!("{account_url}{path}"))
            .map_err(|err| QueueError::Config(format!("invalid request url: {err}")))?;
        let date = format_http_date(now);
        let content_length = body.as_ref().map_or(0, |body| body.len());

        let mut headers = BTreeMap::new();
        headers.insert("date".to_owned(), date.clone());
        headers.insert("user-agent".to_owned(), USER_AGENT.to_owned());
        headers.insert("content-type".to_owned(), CONTENT_TYPE.to_owned());
        headers.insert("content-length".to_owned(), content_length.to_string());
        headers.insert("x-ms-date".to_owned(), date);
        headers.insert("x-ms-version".to_owned(), API_VERSION.to_owned());

        Ok(Self {
            method,
            url,
            query,
            headers,
            body,
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }
}

/// Formats a timestamp as an RFC 1123 HTTP date.
pub(crate) fn format_http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use reqwest::Method;

    use super::{RequestDescriptor, API_VERSION};
    use crate::QueryParams;

    #[test]
    fn descriptor_carries_protocol_headers() {
        let now = Utc.with_ymd_and_hms(2014, 7, 2, 9, 8, 7).unwrap();
        let request = RequestDescriptor::new(
            Method::PUT,
            "http://127.0.0.1:10001/devstoreaccount1/",
            "testqueue",
            QueryParams::new(),
            None,
            now,
        )
        .expect("must build descriptor");

        assert_eq!(request.url.path(), "/devstoreaccount1/testqueue");
        assert_eq!(request.header("date"), Some("Wed, 02 Jul 2014 09:08:07 GMT"));
        assert_eq!(request.header("x-ms-date"), request.header("date"));
        assert_eq!(request.header("x-ms-version"), Some(API_VERSION));
        assert_eq!(request.header("content-length"), Some("0"));
    }

    #[test]
    fn descriptor_counts_body_bytes() {
        let request = RequestDescriptor::new(
            Method::POST,
            "https://acct.queue.example.net/",
            "q/messages",
            QueryParams::new(),
            Some("é".to_owned()),
            Utc::now(),
        )
        .expect("must build descriptor");

        assert_eq!(request.header("content-length"), Some("2"));
    }

    #[test]
    fn descriptor_rejects_unparseable_url() {
        let err = RequestDescriptor::new(
            Method::GET,
            "not a url",
            "",
            QueryParams::new(),
            None,
            Utc::now(),
        )
        .expect_err("must fail");
        assert!(matches!(err, crate::QueueError::Config(_)));
    }
}

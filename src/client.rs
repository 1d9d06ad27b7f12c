use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::Value as JsonValue;

use crate::{
    codec,
    response::{self, RawResponse},
    signer, ClientSettings, EncodingOptions, Message, MessageEncoding, Payload, QueryParams,
    RequestDescriptor, Response, Result, RetryMode, SettingsOverride,
};

#[derive(Clone)]
/// HTTP client for the queue service REST API.
///
/// Each client holds an immutable configuration. Use [`QueueClient::derive`]
/// to obtain a client with some settings replaced.
pub struct QueueClient {
    http: reqwest::Client,
    settings: Arc<ClientSettings>,
    key: Arc<Vec<u8>>,
    retry: RetryMode,
}

impl fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueClient")
            .field("account_url", &self.settings.account_url)
            .field("account_name", &self.settings.account_name)
            .field("account_key", &"<redacted>")
            .field("timeout_ms", &self.settings.timeout_ms)
            .field("encoding", &self.settings.encoding())
            .field("retry", &self.retry)
            .finish()
    }
}

impl QueueClient {
    /// Creates a client, validating the settings and decoding the account key.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use storage_queue_http::{ClientSettings, QueueClient};
    ///
    /// let settings = ClientSettings::new(
    ///     "https://myaccount.queue.core.windows.net/",
    ///     "myaccount",
    ///     "c2VjcmV0LWtleQ==",
    /// );
    /// let client = QueueClient::new(settings).expect("valid settings");
    /// ```
    pub fn new(settings: ClientSettings) -> Result<Self> {
        Self::with_http(reqwest::Client::new(), settings)
    }

    fn with_http(http: reqwest::Client, settings: ClientSettings) -> Result<Self> {
        let key = settings.validate()?;
        let retry = settings.retry.to_mode();
        Ok(Self {
            http,
            settings: Arc::new(settings),
            key: Arc::new(key),
            retry,
        })
    }

    /// Creates a client from the connection string in `CLOUD_STORAGE_ACCOUNT`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use storage_queue_http::QueueClient;
    ///
    /// let client = QueueClient::from_env().expect("missing CLOUD_STORAGE_ACCOUNT");
    /// ```
    pub fn from_env() -> Result<Self> {
        Self::new(ClientSettings::from_env()?)
    }

    /// Returns a new client whose settings are this client's merged with
    /// `overrides`. The connection pool is shared with this client.
    ///
    /// A custom retry mode installed with [`QueueClient::with_retry`] is kept
    /// unless `overrides` sets `retry`.
    pub fn derive(&self, overrides: &SettingsOverride) -> Result<Self> {
        let mut derived = Self::with_http(self.http.clone(), self.settings.merge(overrides))?;
        if overrides.retry.is_none() {
            derived.retry = self.retry.clone();
        }
        Ok(derived)
    }

    /// Replaces the retry behavior, e.g. with [`RetryMode::Custom`].
    pub fn with_retry(mut self, retry: RetryMode) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn retry_mode(&self) -> &RetryMode {
        &self.retry
    }

    /// Client-default message encoding.
    pub fn encoding(&self) -> MessageEncoding {
        self.settings.encoding()
    }

    /// Encodes `payload` into a queue message body, resolving `options`
    /// against the client defaults.
    pub fn encode_message(&self, options: &EncodingOptions, payload: &Payload) -> Result<String> {
        codec::encode_message(options.resolve(self.encoding()), payload)
    }

    /// Decodes one structured queue message. Decode failures are reported in
    /// [`Message::decode_error`].
    pub fn decode_message(&self, options: &EncodingOptions, raw: &JsonValue) -> Message {
        codec::decode_message(options.resolve(self.encoding()), raw)
    }

    /// Builds, signs and sends a request for `path` (relative to the account
    /// url), retrying per the client's retry mode.
    ///
    /// The request is built and signed once; every attempt sends the same
    /// headers.
    pub async fn issue_signed_request(
        &self,
        method: Method,
        path: &str,
        query: QueryParams,
        body: Option<String>,
    ) -> Result<Response> {
        let mut request = RequestDescriptor::new(
            method,
            &self.settings.account_url,
            path,
            query,
            body,
            Utc::now(),
        )?;
        if !self.key.is_empty() {
            signer::sign_request(&mut request, &self.settings.account_name, &self.key);
        }

        self.retry.run(|| self.send_once(&request)).await
    }

    async fn send_once(&self, request: &RequestDescriptor) -> Result<Response> {
        #[cfg(feature = "tracing")]
        tracing::debug!(method = %request.method, url = %request.url, "sending queue request");

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .timeout(Duration::from_millis(self.settings.timeout_ms));

        if !request.query.is_empty() {
            builder = builder.query(request.query.as_pairs());
        }

        // A bodied request is framed by the transport; without a body the
        // descriptor's `content-length: 0` goes out as is.
        let framed = request.body.is_some();
        for (name, value) in request
            .headers
            .iter()
            .filter(|(name, _)| !(framed && name.as_str() == "content-length"))
        {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(response::transport_error)?;
        let status = response.status().as_u16();
        let headers = response::header_map(response.headers());
        let body = response.text().await.map_err(response::transport_error)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(status, "received queue response");

        response::normalize(Some(RawResponse {
            status,
            headers,
            body,
        }))
    }
}

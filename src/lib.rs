//! `storage-queue-http` is an async HTTP client for a cloud queue storage
//! REST API authenticated with SharedKey signatures.
//!
//! The crate wraps the queue endpoints with ergonomic methods:
//! - [`QueueClient::create_queue`], [`QueueClient::list_queues`],
//!   [`QueueClient::delete_queue`], [`QueueClient::count_messages`]
//! - [`QueueClient::put_message`], [`QueueClient::get_messages`],
//!   [`QueueClient::peek_messages`], [`QueueClient::update_message`],
//!   [`QueueClient::delete_message`], [`QueueClient::clear_messages`]
//!
//! Every call goes through [`QueueClient::issue_signed_request`], which
//! signs the request, sends it, normalizes the XML response and retries
//! transient failures with jittered exponential backoff.

mod client;
mod codec;
mod error;
mod operations;
mod options;
mod query;
mod request;
mod response;
mod retry;
mod settings;
pub mod signer;
mod types;
mod value;
pub mod xml;

pub use client::QueueClient;
pub use codec::{decode_message, encode_message};
pub use error::QueueError;
pub use options::{
    EncodingOptions, GetMessagesOptions, ListQueuesOptions, MessageEncoding, PeekMessagesOptions,
    PutMessageOptions, RequestOptions, UpdateMessageOptions,
};
pub use query::QueryParams;
pub use request::RequestDescriptor;
pub use retry::{default_transient_errors, RetryFn, RetryMode, RetryPolicy, TransientError};
pub use settings::{
    parse_account_string, AccountCredentials, ClientSettings, RetryConfig, RetrySetting,
    SettingsOverride, ACCOUNT_ENV_VAR,
};
pub use types::{Message, QueueList, Response, ResponseBody, UpdatedMessage};
pub use value::Payload;

/// Re-exported so callers can name request methods without a direct
/// `reqwest` dependency.
pub use reqwest::Method;

pub type Result<T> = std::result::Result<T, QueueError>;

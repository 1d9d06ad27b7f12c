use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::{MessageEncoding, QueueError, Result, RetryMode, RetryPolicy, TransientError};

/// Environment variable holding an account connection string.
pub const ACCOUNT_ENV_VAR: &str = "CLOUD_STORAGE_ACCOUNT";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Immutable client configuration.
///
/// Can be deserialized from any serde source; missing optional fields take
/// their defaults.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Queue endpoint, e.g. `https://account.queue.core.windows.net/`.
    pub account_url: String,
    pub account_name: String,
    /// Base64 encoded shared key.
    pub account_key: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Default message mode: JSON payloads when true, base64 bytes/text otherwise.
    #[serde(default = "default_json")]
    pub json: bool,
    /// Forces base64 message text even in json mode.
    #[serde(default)]
    pub base64: bool,
    #[serde(default)]
    pub retry: RetrySetting,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_json() -> bool {
    true
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("account_url", &self.account_url)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .field("json", &self.json)
            .field("base64", &self.base64)
            .field("retry", &self.retry)
            .finish()
    }
}

impl ClientSettings {
    /// Creates settings for an account with all other values defaulted.
    pub fn new(
        account_url: impl Into<String>,
        account_name: impl Into<String>,
        account_key: impl Into<String>,
    ) -> Self {
        Self {
            account_url: account_url.into(),
            account_name: account_name.into(),
            account_key: account_key.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            json: true,
            base64: false,
            retry: RetrySetting::default(),
        }
    }

    /// Builds settings from a `QueueEndpoint=...;AccountName=...;AccountKey=...`
    /// connection string.
    pub fn from_account_string(account_string: &str) -> Result<Self> {
        let credentials = parse_account_string(account_string).ok_or_else(|| {
            QueueError::Config(
                "account string must contain QueueEndpoint, AccountName and AccountKey".to_owned(),
            )
        })?;
        Ok(Self::new(
            credentials.account_url,
            credentials.account_name,
            credentials.account_key,
        ))
    }

    /// Builds settings from the `CLOUD_STORAGE_ACCOUNT` environment variable.
    pub fn from_env() -> Result<Self> {
        let value = std::env::var(ACCOUNT_ENV_VAR).map_err(|_| {
            QueueError::Config(format!("missing {ACCOUNT_ENV_VAR} environment variable"))
        })?;
        Self::from_account_string(&value)
    }

    /// Returns a new configuration with every field set in `overrides`
    /// replacing the value from `self`.
    pub fn merge(&self, overrides: &SettingsOverride) -> Self {
        let overrides = overrides.clone();
        Self {
            account_url: overrides.account_url.unwrap_or_else(|| self.account_url.clone()),
            account_name: overrides
                .account_name
                .unwrap_or_else(|| self.account_name.clone()),
            account_key: overrides.account_key.unwrap_or_else(|| self.account_key.clone()),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            json: overrides.json.unwrap_or(self.json),
            base64: overrides.base64.unwrap_or(self.base64),
            retry: overrides.retry.unwrap_or_else(|| self.retry.clone()),
        }
    }

    /// Default message encoding for clients built from these settings.
    pub fn encoding(&self) -> MessageEncoding {
        MessageEncoding {
            json: self.json,
            base64: self.base64,
        }
    }

    /// Checks required fields and decodes the shared key.
    pub(crate) fn validate(&self) -> Result<Vec<u8>> {
        if self.account_url.trim().is_empty()
            || self.account_name.trim().is_empty()
            || self.account_key.trim().is_empty()
        {
            return Err(QueueError::Config(format!(
                "provide account_url, account_name and account_key in settings or in env {ACCOUNT_ENV_VAR}"
            )));
        }
        STANDARD
            .decode(self.account_key.trim())
            .map_err(|err| QueueError::Config(format!("account_key is not valid base64: {err}")))
    }
}

/// Partial settings used to derive a configuration from another one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverride {
    pub account_url: Option<String>,
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub timeout_ms: Option<u64>,
    pub json: Option<bool>,
    pub base64: Option<bool>,
    pub retry: Option<RetrySetting>,
}

/// Retry configuration as it appears in settings: `true`/absent for the
/// default policy, `false` to disable, or an object of custom parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetrySetting {
    Enabled(bool),
    Custom(RetryConfig),
}

impl Default for RetrySetting {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl RetrySetting {
    pub fn to_mode(&self) -> RetryMode {
        match self {
            Self::Enabled(false) => RetryMode::Disabled,
            Self::Enabled(true) => RetryMode::default(),
            Self::Custom(config) => RetryMode::Policy(config.to_policy()),
        }
    }
}

/// Custom retry parameters. Non-positive values fall back to the defaults;
/// `variability` accepts any number, including zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: Option<i64>,
    pub first_delay_ms: Option<i64>,
    pub next_delay_mult: Option<f64>,
    pub variability: Option<f64>,
    pub transient_errors: Option<Vec<TransientError>>,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            retries: self
                .retries
                .filter(|value| *value > 0)
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(defaults.retries),
            first_delay: self
                .first_delay_ms
                .filter(|value| *value > 0)
                .map(|value| std::time::Duration::from_millis(value as u64))
                .unwrap_or(defaults.first_delay),
            next_delay_mult: self
                .next_delay_mult
                .filter(|value| *value > 0.0)
                .unwrap_or(defaults.next_delay_mult),
            variability: self
                .variability
                .filter(|value| value.is_finite())
                .unwrap_or(defaults.variability),
            transient_errors: self
                .transient_errors
                .clone()
                .unwrap_or(defaults.transient_errors),
        }
    }
}

/// Credentials extracted from an account connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account_url: String,
    pub account_name: String,
    pub account_key: String,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account_url", &self.account_url)
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .finish()
    }
}

/// Parses `QueueEndpoint=...;AccountName=...;AccountKey=...`.
///
/// Unknown keys are ignored, values may contain `=`. Returns `None` when the
/// string is too short, malformed, or any of the three keys is missing.
pub fn parse_account_string(account_string: &str) -> Option<AccountCredentials> {
    let trimmed = account_string.trim();
    if trimmed.len() < 30 {
        return None;
    }
    let segments: Vec<&str> = trimmed.split(';').collect();
    if segments.len() < 3 {
        return None;
    }

    let mut account_url = None;
    let mut account_name = None;
    let mut account_key = None;
    for segment in segments {
        let (key, value) = segment.split_once('=')?;
        match key {
            "QueueEndpoint" => account_url = Some(value.to_owned()),
            "AccountName" => account_name = Some(value.to_owned()),
            "AccountKey" => account_key = Some(value.to_owned()),
            _ => {}
        }
    }

    Some(AccountCredentials {
        account_url: account_url?,
        account_name: account_name?,
        account_key: account_key?,
    })
}

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::TokenError;

/// Third-party services that data can be imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataImportSource {
    Strava,
    Github,
}

impl DataImportSource {
    pub const ALL: [DataImportSource; 2] = [DataImportSource::Strava, DataImportSource::Github];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strava => "strava",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for DataImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataImportSource {
    type Err = TokenError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| TokenError::InvalidConfigValue {
                name: "data_import_source".to_string(),
                value: value.to_string(),
            })
    }
}

/// Provider-agnostic OAuth access token as persisted in the token store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl AccessToken {
    /// A token is fresh only when it carries an expiry strictly after `now`.
    pub fn is_fresh_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at > now)
    }
}

/// OAuth app registration for one import source.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthAppDetails {
    pub id: String,
    pub secret: String,
    pub token_url: String,
    pub client_side_fetching: bool,
}

impl OAuthAppDetails {
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            token_url: token_url.into(),
            client_side_fetching: false,
        }
    }

    pub fn with_client_side_fetching(mut self, client_side_fetching: bool) -> Self {
        self.client_side_fetching = client_side_fetching;
        self
    }
}

impl fmt::Debug for OAuthAppDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthAppDetails")
            .field("id", &self.id)
            .field("secret_set", &!self.secret.is_empty())
            .field("token_url", &self.token_url)
            .field("client_side_fetching", &self.client_side_fetching)
            .finish()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

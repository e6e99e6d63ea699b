use serde_json::Value;

use crate::{AccessToken, DataImportSource, OAuthAppDetails};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestFormat {
    Json,
    Form,
}

/// One provider-specific POST against a token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub url: String,
    pub format: TokenRequestFormat,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
}

impl TokenRequest {
    pub fn new(url: impl Into<String>, format: TokenRequestFormat) -> Self {
        Self {
            url: url.into(),
            format,
            headers: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn json(url: impl Into<String>) -> Self {
        Self::new(url, TokenRequestFormat::Json)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Per-provider OAuth quirks.
///
/// A provider returns `None` from [`ImportProvider::code_request`] or
/// [`ImportProvider::refresh_request`] when it has no client-side handler for
/// that grant; code exchange then goes through the backend instead.
pub trait ImportProvider: Send + Sync {
    fn source(&self) -> DataImportSource;
    fn default_token_url(&self) -> &'static str;

    fn prefers_client_side_fetching(&self) -> bool {
        false
    }

    fn tokens_expire(&self) -> bool {
        true
    }

    fn code_request(&self, _details: &OAuthAppDetails, _code: &str) -> Option<TokenRequest> {
        None
    }

    fn refresh_request(
        &self,
        _details: &OAuthAppDetails,
        _refresh_token: &str,
    ) -> Option<TokenRequest> {
        None
    }

    fn normalize(&self, previous: Option<&AccessToken>, raw: &Value) -> Option<AccessToken> {
        crate::normalize::map_token_response(previous, raw)
    }
}

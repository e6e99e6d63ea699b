use std::collections::HashMap;
use std::time::Duration;

use crate::{DataImportSource, OAuthAppDetails, TokenError};

const DEFAULT_BASE_API_URL: &str = "http://localhost:8080/api";

/// OAuth app details for every import source the process can connect.
///
/// Built once at startup and shared read-only with the token manager.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    apps: HashMap<DataImportSource, OAuthAppDetails>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, source: DataImportSource, details: OAuthAppDetails) -> Self {
        self.apps.insert(source, details);
        self
    }

    pub fn lookup(&self, source: DataImportSource) -> Result<&OAuthAppDetails, TokenError> {
        self.apps
            .get(&source)
            .ok_or(TokenError::Configuration(source))
    }

    /// Reads `<SOURCE>_CLIENT_ID`, `<SOURCE>_CLIENT_SECRET`, `<SOURCE>_TOKEN_URL`
    /// and `<SOURCE>_CLIENT_SIDE_FETCHING` from the process environment.
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Sources without a client id are left unregistered.
    pub fn from_vars<F>(var: F) -> Result<Self, TokenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut registry = Self::new();
        for source in DataImportSource::ALL {
            let prefix = source.as_str().to_ascii_uppercase();
            let Some(id) = var(&format!("{prefix}_CLIENT_ID")).filter(|id| !id.is_empty()) else {
                continue;
            };

            let provider = source.provider();
            let secret = var(&format!("{prefix}_CLIENT_SECRET")).unwrap_or_default();
            let token_url = var(&format!("{prefix}_TOKEN_URL"))
                .unwrap_or_else(|| provider.default_token_url().to_string());
            let flag_name = format!("{prefix}_CLIENT_SIDE_FETCHING");
            let client_side_fetching = match var(&flag_name) {
                Some(value) => parse_bool(&flag_name, &value)?,
                None => provider.prefers_client_side_fetching(),
            };

            registry = registry.with_app(
                source,
                OAuthAppDetails::new(id, secret, token_url)
                    .with_client_side_fetching(client_side_fetching),
            );
        }
        Ok(registry)
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Backend base url serving `/oauth/access_token`.
    pub base_api_url: String,
    pub timeout: Option<Duration>,
    /// Try the refresh grant before re-minting when a cached token is stale.
    pub refresh_on_expiry: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_API_URL)
    }
}

impl ManagerConfig {
    pub fn new(base_api_url: impl Into<String>) -> Self {
        Self {
            base_api_url: base_api_url.into(),
            timeout: None,
            refresh_on_expiry: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_refresh_on_expiry(mut self, refresh_on_expiry: bool) -> Self {
        self.refresh_on_expiry = refresh_on_expiry;
        self
    }

    /// Reads `BASE_API_URL`, `TOKEN_HTTP_TIMEOUT_SECS` and `TOKEN_REFRESH_ON_EXPIRY`.
    pub fn from_env() -> Result<Self, TokenError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self, TokenError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config =
            Self::new(var("BASE_API_URL").unwrap_or_else(|| DEFAULT_BASE_API_URL.to_string()));

        if let Some(value) = var("TOKEN_HTTP_TIMEOUT_SECS") {
            let secs = value
                .trim()
                .parse::<u64>()
                .map_err(|_| TokenError::InvalidConfigValue {
                    name: "TOKEN_HTTP_TIMEOUT_SECS".to_string(),
                    value: value.clone(),
                })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        if let Some(value) = var("TOKEN_REFRESH_ON_EXPIRY") {
            config = config.with_refresh_on_expiry(parse_bool("TOKEN_REFRESH_ON_EXPIRY", &value)?);
        }

        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, TokenError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(TokenError::InvalidConfigValue {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn lookup_of_unregistered_source_is_a_configuration_error() {
        let registry = ProviderRegistry::new();
        let result = registry.lookup(DataImportSource::Strava);
        assert!(matches!(
            result,
            Err(TokenError::Configuration(DataImportSource::Strava))
        ));
    }

    #[test]
    fn registers_only_sources_with_a_client_id() {
        let registry = ProviderRegistry::from_vars(vars(&[
            ("STRAVA_CLIENT_ID", "1234"),
            ("STRAVA_CLIENT_SECRET", "shh"),
        ]))
        .unwrap();

        let strava = registry.lookup(DataImportSource::Strava).unwrap();
        assert_eq!(strava.id, "1234");
        assert_eq!(strava.secret, "shh");
        assert_eq!(strava.token_url, "https://www.strava.com/oauth/token");
        assert!(strava.client_side_fetching);
        assert!(registry.lookup(DataImportSource::Github).is_err());
    }

    #[test]
    fn env_overrides_provider_defaults() {
        let registry = ProviderRegistry::from_vars(vars(&[
            ("GITHUB_CLIENT_ID", "gh"),
            ("GITHUB_TOKEN_URL", "http://localhost/token"),
            ("GITHUB_CLIENT_SIDE_FETCHING", "1"),
        ]))
        .unwrap();

        let github = registry.lookup(DataImportSource::Github).unwrap();
        assert_eq!(github.token_url, "http://localhost/token");
        assert!(github.client_side_fetching);
        assert_eq!(github.secret, "");
    }

    #[test]
    fn rejects_malformed_flags() {
        let result = ProviderRegistry::from_vars(vars(&[
            ("STRAVA_CLIENT_ID", "1234"),
            ("STRAVA_CLIENT_SIDE_FETCHING", "sometimes"),
        ]));
        assert!(matches!(result, Err(TokenError::InvalidConfigValue { .. })));
    }

    #[test]
    fn manager_config_reads_env() {
        let config = ManagerConfig::from_vars(vars(&[
            ("BASE_API_URL", "https://api.example.test"),
            ("TOKEN_HTTP_TIMEOUT_SECS", "15"),
            ("TOKEN_REFRESH_ON_EXPIRY", "true"),
        ]))
        .unwrap();
        assert_eq!(config.base_api_url, "https://api.example.test");
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
        assert!(config.refresh_on_expiry);

        let defaults = ManagerConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(defaults.base_api_url, DEFAULT_BASE_API_URL);
        assert!(!defaults.refresh_on_expiry);
        assert!(ManagerConfig::from_vars(vars(&[("TOKEN_HTTP_TIMEOUT_SECS", "soon")])).is_err());
    }
}

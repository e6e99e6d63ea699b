use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::normalize::normalize;
use crate::types::unix_now;
use crate::{
    AccessToken, DataImportSource, ManagerConfig, OAuthAppDetails, ProviderRegistry, TokenError,
    TokenExchange, TokenStorage, TokenStore,
};

/// Outcome of [`TokenManager::get_access_token`].
///
/// The mint path never raises: every failure ends up in
/// [`TokenLookup::Unavailable`] so callers can show a generic retry prompt.
#[derive(Debug)]
pub enum TokenLookup {
    Cached(AccessToken),
    Refreshed(AccessToken),
    Minted(AccessToken),
    Unavailable(TokenError),
}

impl TokenLookup {
    pub fn token(&self) -> Option<&AccessToken> {
        match self {
            Self::Cached(token) | Self::Refreshed(token) | Self::Minted(token) => Some(token),
            Self::Unavailable(_) => None,
        }
    }

    pub fn into_token(self) -> Option<AccessToken> {
        self.into_result().ok()
    }

    pub fn into_result(self) -> Result<AccessToken, TokenError> {
        match self {
            Self::Cached(token) | Self::Refreshed(token) | Self::Minted(token) => Ok(token),
            Self::Unavailable(err) => Err(err),
        }
    }

    pub fn is_available(&self) -> bool {
        self.token().is_some()
    }
}

/// Acquires, caches and refreshes OAuth tokens for data import sources.
#[derive(Debug, Clone)]
pub struct TokenManager {
    registry: Arc<ProviderRegistry>,
    store: TokenStore,
    exchange: TokenExchange,
    config: ManagerConfig,
}

impl TokenManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        storage: Arc<dyn TokenStorage>,
        config: ManagerConfig,
    ) -> Result<Self, TokenError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_http_client(registry, storage, config, http))
    }

    pub fn with_http_client(
        registry: Arc<ProviderRegistry>,
        storage: Arc<dyn TokenStorage>,
        config: ManagerConfig,
        http: Client,
    ) -> Self {
        let exchange = TokenExchange::new(http, config.base_api_url.clone());
        Self {
            registry,
            store: TokenStore::new(storage),
            exchange,
            config,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns a usable token for `source`, minting one from `code` when the
    /// cached token is missing or stale.
    ///
    /// Authorization codes are single-use: after an `Unavailable` result the
    /// caller must obtain a fresh code rather than retry with the same one.
    pub async fn get_access_token(&self, source: DataImportSource, code: &str) -> TokenLookup {
        match self.try_get_access_token(source, code).await {
            Ok(lookup) => lookup,
            Err(err) => {
                error!(
                    source = %source,
                    error = %err,
                    "minting oauth token failed, check if code has expired"
                );
                TokenLookup::Unavailable(err)
            }
        }
    }

    async fn try_get_access_token(
        &self,
        source: DataImportSource,
        code: &str,
    ) -> Result<TokenLookup, TokenError> {
        let details = self.registry.lookup(source)?;
        let provider = source.provider();

        if let Some(cached) = self.store.get(source).await? {
            if !provider.tokens_expire() || cached.is_fresh_at(unix_now()) {
                debug!(source = %source, "using cached oauth token");
                return Ok(TokenLookup::Cached(cached));
            }

            if self.config.refresh_on_expiry && cached.refresh_token.is_some() {
                match self.refresh_with(source, details, &cached).await {
                    Ok(token) => return Ok(TokenLookup::Refreshed(token)),
                    Err(err) => warn!(
                        source = %source,
                        error = %err,
                        "refreshing stale oauth token failed, minting a new one"
                    ),
                }
            }
        }

        let response = if details.client_side_fetching {
            debug!(source = %source, "exchanging authorization code with provider");
            self.exchange
                .exchange_code(provider, details, code)
                .await?
                .ok_or(TokenError::Unsupported {
                    provider: source,
                    operation: "client-side code exchange",
                })?
        } else {
            debug!(source = %source, "exchanging authorization code via backend");
            self.exchange.exchange_via_server(source, code).await?
        };

        let payload = response.into_payload()?;
        let token = normalize(provider, None, &payload)
            .ok_or(TokenError::Normalization { provider: source })?;

        self.store.put(source, &token).await?;
        info!(source = %source, expires_at = ?token.expires_at, "minted oauth token");
        Ok(TokenLookup::Minted(token))
    }

    /// Exchanges `current.refresh_token` for a new token and persists it.
    ///
    /// Errors propagate. On failure the stored token is left untouched.
    pub async fn refresh_and_save(
        &self,
        source: DataImportSource,
        current: &AccessToken,
    ) -> Result<AccessToken, TokenError> {
        let details = self.registry.lookup(source)?;
        self.refresh_with(source, details, current)
            .await
            .inspect_err(|err| {
                error!(source = %source, error = %err, "oauth token refresh failed");
            })
    }

    async fn refresh_with(
        &self,
        source: DataImportSource,
        details: &OAuthAppDetails,
        current: &AccessToken,
    ) -> Result<AccessToken, TokenError> {
        let provider = source.provider();
        let refresh_token = current
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(TokenError::MissingRefreshToken(source))?;

        let response = self
            .exchange
            .exchange_refresh(provider, details, refresh_token)
            .await?
            .ok_or(TokenError::Unsupported {
                provider: source,
                operation: "token refresh",
            })?;

        let payload = response.into_payload()?;
        let token = normalize(provider, Some(current), &payload)
            .ok_or(TokenError::Normalization { provider: source })?;

        self.store.put(source, &token).await?;
        info!(source = %source, expires_at = ?token.expires_at, "refreshed oauth token");
        Ok(token)
    }
}

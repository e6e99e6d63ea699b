//! OAuth token acquisition and lifecycle management for third-party data imports.
//!
//! [`TokenManager`] hands out access tokens per [`DataImportSource`]: it serves
//! fresh cached tokens, mints new ones from authorization codes (directly with
//! the provider or through the backend, per [`OAuthAppDetails`]), refreshes
//! them and persists every result through a [`TokenStorage`] backend.

mod config;
mod error;
mod exchange;
mod manager;
pub mod normalize;
mod providers;
mod store;
mod types;

pub use config::{ManagerConfig, ProviderRegistry};
pub use error::{BoxError, TokenError};
pub use exchange::{ExchangeResponse, TokenExchange};
pub use manager::{TokenLookup, TokenManager};
pub use providers::{
    GithubProvider, ImportProvider, StravaProvider, TokenRequest, TokenRequestFormat,
};
pub use store::{FileTokenStorage, MemoryTokenStorage, TokenStorage, TokenStore};
pub use types::{AccessToken, DataImportSource, OAuthAppDetails};

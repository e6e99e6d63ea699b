mod github;
mod provider;
mod strava;

pub use github::GithubProvider;
pub use provider::{ImportProvider, TokenRequest, TokenRequestFormat};
pub use strava::StravaProvider;

use crate::DataImportSource;

impl DataImportSource {
    /// Handler implementing this source's OAuth quirks.
    pub fn provider(self) -> &'static dyn ImportProvider {
        match self {
            Self::Strava => &StravaProvider,
            Self::Github => &GithubProvider,
        }
    }
}

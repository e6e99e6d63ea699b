use crate::{DataImportSource, ImportProvider};

const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// GitHub OAuth app tokens do not expire unless unused for a year, and the
/// code exchange needs the client secret, so it only runs on the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct GithubProvider;

impl ImportProvider for GithubProvider {
    fn source(&self) -> DataImportSource {
        DataImportSource::Github
    }

    fn default_token_url(&self) -> &'static str {
        TOKEN_URL
    }

    fn tokens_expire(&self) -> bool {
        false
    }
}

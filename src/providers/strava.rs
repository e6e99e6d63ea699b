use crate::{DataImportSource, ImportProvider, OAuthAppDetails, TokenRequest};

// References:
// - https://developers.strava.com/docs/authentication/#tokenexchange
// - https://developers.strava.com/docs/authentication/#refreshingexpiredaccesstokens

const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

#[derive(Debug, Clone, Copy, Default)]
pub struct StravaProvider;

impl ImportProvider for StravaProvider {
    fn source(&self) -> DataImportSource {
        DataImportSource::Strava
    }

    fn default_token_url(&self) -> &'static str {
        TOKEN_URL
    }

    fn prefers_client_side_fetching(&self) -> bool {
        true
    }

    fn code_request(&self, details: &OAuthAppDetails, code: &str) -> Option<TokenRequest> {
        Some(
            client_request(details)
                .with_param("code", code)
                .with_param("grant_type", "authorization_code"),
        )
    }

    fn refresh_request(
        &self,
        details: &OAuthAppDetails,
        refresh_token: &str,
    ) -> Option<TokenRequest> {
        Some(
            client_request(details)
                .with_param("refresh_token", refresh_token)
                .with_param("grant_type", "refresh_token"),
        )
    }
}

fn client_request(details: &OAuthAppDetails) -> TokenRequest {
    TokenRequest::json(&details.token_url)
        .with_header("Content-Type", "application/json")
        .with_param("client_id", &details.id)
        .with_param("client_secret", &details.secret)
}

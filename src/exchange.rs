use reqwest::{
    Client, RequestBuilder,
    header::{CONTENT_TYPE, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};
use url::Url;

use crate::{
    DataImportSource, ImportProvider, OAuthAppDetails, TokenError, TokenRequest,
    TokenRequestFormat,
};

const SERVER_EXCHANGE_PATH: &str = "oauth/access_token";

/// Status and body of a single token endpoint call, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeResponse {
    pub status: u16,
    pub body: String,
}

impl ExchangeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rejects non-2xx responses and 2xx bodies that embed an `error` field.
    pub fn into_payload(self) -> Result<Value, TokenError> {
        let payload = serde_json::from_str::<Value>(&self.body).ok();
        let error = payload.as_ref().and_then(error_message);

        if !self.is_success() {
            return Err(TokenError::Exchange {
                status: self.status,
                message: error.unwrap_or(self.body),
            });
        }

        if let Some(message) = error {
            return Err(TokenError::Exchange {
                status: self.status,
                message,
            });
        }

        payload.ok_or_else(|| TokenError::InvalidResponse {
            message: "token response is not valid json".to_string(),
            body: self.body,
        })
    }
}

fn error_message(payload: &Value) -> Option<String> {
    let error = payload.get("error").filter(|error| !error.is_null())?;
    let mut message = match error {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if let Some(description) = payload.get("error_description").and_then(Value::as_str) {
        message.push_str(": ");
        message.push_str(description);
    }
    Some(message)
}

/// Performs provider and backend token exchanges. One attempt per call.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    http: Client,
    base_api_url: String,
}

impl TokenExchange {
    pub fn new(http: Client, base_api_url: impl Into<String>) -> Self {
        Self {
            http,
            base_api_url: base_api_url.into(),
        }
    }

    /// Returns `Ok(None)` when the provider has no client-side code exchange.
    pub async fn exchange_code(
        &self,
        provider: &dyn ImportProvider,
        details: &OAuthAppDetails,
        code: &str,
    ) -> Result<Option<ExchangeResponse>, TokenError> {
        match provider.code_request(details, code) {
            Some(request) => self.send(request).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns `Ok(None)` when the provider has no refresh exchange.
    pub async fn exchange_refresh(
        &self,
        provider: &dyn ImportProvider,
        details: &OAuthAppDetails,
        refresh_token: &str,
    ) -> Result<Option<ExchangeResponse>, TokenError> {
        match provider.refresh_request(details, refresh_token) {
            Some(request) => self.send(request).await.map(Some),
            None => Ok(None),
        }
    }

    /// Lets the backend redeem the code so the client secret never leaves it.
    pub async fn exchange_via_server(
        &self,
        source: DataImportSource,
        code: &str,
    ) -> Result<ExchangeResponse, TokenError> {
        let url = self.server_exchange_url(source, code)?;
        let response = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;
        read_response(response).await
    }

    pub fn server_exchange_url(
        &self,
        source: DataImportSource,
        code: &str,
    ) -> Result<Url, TokenError> {
        let base = self.base_api_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{SERVER_EXCHANGE_PATH}"))?;
        url.query_pairs_mut()
            .append_pair("state", source.as_str())
            .append_pair("code", code);
        Ok(url)
    }

    async fn send(&self, request: TokenRequest) -> Result<ExchangeResponse, TokenError> {
        let mut builder = self.http.post(&request.url);
        builder = apply_headers(builder, &request.headers)?;

        let response = match request.format {
            TokenRequestFormat::Json => {
                let body: Map<String, Value> = request
                    .params
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect();
                builder.json(&body).send().await?
            }
            TokenRequestFormat::Form => builder.form(&request.params).send().await?,
        };

        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<ExchangeResponse, TokenError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(ExchangeResponse { status, body })
}

fn apply_headers(
    mut builder: RequestBuilder,
    headers: &[(String, String)],
) -> Result<RequestBuilder, TokenError> {
    for (name, value) in headers {
        let name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| TokenError::InvalidHeader {
                name: name.clone(),
                value: value.clone(),
            })?;
        let value = HeaderValue::from_str(value).map_err(|_| TokenError::InvalidHeader {
            name: name.to_string(),
            value: value.clone(),
        })?;
        builder = builder.header(name, value);
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn response(status: u16, body: &str) -> ExchangeResponse {
        ExchangeResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn accepts_successful_json_payload() {
        let payload = response(200, r#"{"access_token":"a1"}"#)
            .into_payload()
            .unwrap();
        assert_eq!(payload["access_token"], "a1");
    }

    #[test]
    fn non_success_status_uses_error_field() {
        let err = response(401, r#"{"error":"invalid_grant"}"#)
            .into_payload()
            .unwrap_err();
        assert!(matches!(
            err,
            TokenError::Exchange { status: 401, ref message } if message == "invalid_grant"
        ));
    }

    #[test]
    fn non_success_status_without_json_keeps_body() {
        let err = response(502, "bad gateway").into_payload().unwrap_err();
        assert!(matches!(
            err,
            TokenError::Exchange { status: 502, ref message } if message == "bad gateway"
        ));
    }

    #[test]
    fn success_status_with_error_field_is_rejected() {
        let err = response(
            200,
            r#"{"error":"bad_verification_code","error_description":"The code is incorrect"}"#,
        )
        .into_payload()
        .unwrap_err();
        assert!(matches!(
            err,
            TokenError::Exchange { status: 200, ref message }
                if message == "bad_verification_code: The code is incorrect"
        ));
    }

    #[test]
    fn null_error_field_is_ignored() {
        let payload = response(200, r#"{"access_token":"a1","error":null}"#)
            .into_payload()
            .unwrap();
        assert_eq!(payload["access_token"], "a1");
    }

    #[test]
    fn success_status_with_non_json_body_is_invalid() {
        let err = response(200, "<html>").into_payload().unwrap_err();
        assert!(matches!(err, TokenError::InvalidResponse { .. }));
    }

    #[test]
    fn server_exchange_url_carries_state_and_code() {
        let exchange = TokenExchange::new(Client::new(), "https://api.example.test/");
        let url = exchange
            .server_exchange_url(DataImportSource::Github, "a b&c")
            .unwrap();
        assert_eq!(url.path(), "/oauth/access_token");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("state".to_string(), "github".to_string()),
                ("code".to_string(), "a b&c".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn strava_code_exchange_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "client_id": "1234",
                "client_secret": "shh",
                "code": "code-1",
                "grant_type": "authorization_code"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "a1"})))
            .expect(1)
            .mount(&server)
            .await;

        let details = OAuthAppDetails::new("1234", "shh", format!("{}/oauth/token", server.uri()))
            .with_client_side_fetching(true);
        let exchange = TokenExchange::new(Client::new(), server.uri());
        let response = exchange
            .exchange_code(DataImportSource::Strava.provider(), &details, "code-1")
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.into_payload().unwrap()["access_token"], "a1");
    }

    struct FormProvider;

    impl ImportProvider for FormProvider {
        fn source(&self) -> DataImportSource {
            DataImportSource::Strava
        }

        fn default_token_url(&self) -> &'static str {
            "http://127.0.0.1:9/token"
        }

        fn refresh_request(
            &self,
            details: &OAuthAppDetails,
            refresh_token: &str,
        ) -> Option<TokenRequest> {
            Some(
                TokenRequest::new(&details.token_url, TokenRequestFormat::Form)
                    .with_header("Accept", "application/json")
                    .with_param("grant_type", "refresh_token")
                    .with_param("refresh_token", refresh_token),
            )
        }
    }

    #[tokio::test]
    async fn form_requests_are_url_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=r%2F1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "a2"})))
            .expect(1)
            .mount(&server)
            .await;

        let details = OAuthAppDetails::new("id", "secret", format!("{}/token", server.uri()));
        let exchange = TokenExchange::new(Client::new(), server.uri());
        let response = exchange
            .exchange_refresh(&FormProvider, &details, "r/1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn invalid_header_names_are_rejected() {
        let builder = Client::new().post("http://127.0.0.1:9/token");
        let result = apply_headers(builder, &[("bad header".to_string(), "x".to_string())]);
        assert!(matches!(result, Err(TokenError::InvalidHeader { .. })));
    }

    #[tokio::test]
    async fn github_has_no_client_side_exchange() {
        let details = OAuthAppDetails::new("id", "secret", "http://127.0.0.1:9/unused");
        let exchange = TokenExchange::new(Client::new(), "http://127.0.0.1:9");
        let response = exchange
            .exchange_code(DataImportSource::Github.provider(), &details, "code-1")
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn server_exchange_queries_backend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("state", "github"))
            .and(query_param("code", "code-1"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_grant"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let exchange = TokenExchange::new(Client::new(), server.uri());
        let response = exchange
            .exchange_via_server(DataImportSource::Github, "code-1")
            .await
            .unwrap();
        assert_eq!(response.status, 401);
        assert!(response.into_payload().is_err());
    }
}

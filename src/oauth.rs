use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::error::Error;
use crate::launch::LaunchSession;

/// HTTP client for the SMART launch sequence: the authorization-code token
/// exchange here, and bearer-authenticated FHIR reads in [`crate::fhir`].
///
/// Stateless and cheap to share; all per-launch state lives in
/// [`AuthSession`](crate::flow::AuthSession).
pub struct SmartClient {
    pub(crate) http: reqwest::Client,
}

/// Token endpoint response for a patient-scoped launch.
///
/// `access_token` and `patient` are required; everything else the server
/// sends is optional and unknown fields never fail the parse.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    /// Patient the issued token is scoped to (SMART launch context).
    pub patient: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token-endpoint form parameters, in wire order.
///
/// `client_id` is always in the body, even for confidential clients that also
/// send the `Basic` header; some authorization servers require both.
pub(crate) fn token_request(launch: &LaunchSession, code: &str) -> [(&'static str, String); 4] {
    [
        ("code", code.to_string()),
        ("grant_type", "authorization_code".to_string()),
        ("redirect_uri", launch.redirect_uri.to_string()),
        ("client_id", launch.client.client_id().to_string()),
    ]
}

impl SmartClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Exchanges an authorization code for an access token.
    ///
    /// Issues exactly one POST and never retries: the code is single-use, and
    /// retrying after a transport error could re-send an already-consumed
    /// code. Dropping the returned future cancels the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenExchange`] on transport failure, on a
    /// non-success status (carrying the status and response body), or on a
    /// success body missing `access_token`/`patient`.
    pub async fn exchange_code(
        &self,
        launch: &LaunchSession,
        code: &str,
    ) -> Result<TokenResponse, Error> {
        let mut request = self
            .http
            .post(launch.token_uri.clone())
            .form(&token_request(launch, code));
        if let Some(basic) = launch.client.basic_header() {
            request = request.header(AUTHORIZATION, basic);
        }

        let response = request.send().await.map_err(|e| Error::TokenExchange {
            status: None,
            detail: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::TokenExchange {
            status: Some(status.as_u16()),
            detail: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(Error::TokenExchange {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::TokenExchange {
            status: Some(status.as_u16()),
            detail: format!("malformed token response: {e}"),
        })
    }
}

impl Default for SmartClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::ClientAuth;

    fn public_launch() -> LaunchSession {
        LaunchSession {
            token_uri: "https://auth.example/token".parse().unwrap(),
            client: ClientAuth::Public { client_id: "app1".into() },
            service_uri: "https://fhir.example".parse().unwrap(),
            redirect_uri: "https://app/afterlaunch".parse().unwrap(),
        }
    }

    #[test]
    fn body_is_pure_function_of_session_and_code() {
        let body = serde_urlencoded::to_string(token_request(&public_launch(), "XYZ")).unwrap();
        assert_eq!(
            body,
            "code=XYZ&grant_type=authorization_code\
             &redirect_uri=https%3A%2F%2Fapp%2Fafterlaunch&client_id=app1"
        );
    }

    #[test]
    fn confidential_client_keeps_client_id_in_body() {
        let mut launch = public_launch();
        launch.client = ClientAuth::Confidential {
            client_id: "app1".into(),
            secret: "s3cr3t".into(),
        };
        let body = serde_urlencoded::to_string(token_request(&launch, "XYZ")).unwrap();
        assert!(body.ends_with("&client_id=app1"));
        assert!(launch.client.basic_header().is_some());
    }

    #[test]
    fn token_response_ignores_unknown_fields() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"tok1","patient":"pat1","id_token":"x","need_patient_banner":true}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "tok1");
        assert_eq!(token.patient, "pat1");
        assert_eq!(token.expires_in, None);
    }

    #[test]
    fn missing_access_token_fails_decode() {
        assert!(serde_json::from_str::<TokenResponse>(r#"{"patient":"pat1"}"#).is_err());
    }
}

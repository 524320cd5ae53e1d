use std::collections::HashMap;
use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// OAuth2 client credentials for the token exchange.
///
/// The optional client secret is modeled as a sum type rather than an
/// `Option` field: header construction matches exhaustively, so a
/// confidential client can never silently lose its `Basic` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAuth {
    /// Public client, identified by `client_id` alone.
    Public { client_id: String },
    /// Confidential client, authenticated via `Basic base64(client_id:secret)`.
    Confidential { client_id: String, secret: String },
}

impl ClientAuth {
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::Public { client_id } | Self::Confidential { client_id, .. } => client_id,
        }
    }

    /// `Authorization` header value for the token exchange, if any.
    ///
    /// `None` for public clients; `Basic base64(client_id:secret)` for
    /// confidential clients.
    #[must_use]
    pub fn basic_header(&self) -> Option<String> {
        match self {
            Self::Public { .. } => None,
            Self::Confidential { client_id, secret } => Some(format!(
                "Basic {}",
                STANDARD.encode(format!("{client_id}:{secret}"))
            )),
        }
    }
}

/// Pending launch parameters written by the external launcher before it
/// redirected the user agent to the authorization server.
///
/// Read-only from this crate's perspective. The record is logically
/// single-use: the authorization code it pairs with is consumed by the first
/// token exchange.
#[derive(Debug, Clone)]
pub struct LaunchSession {
    /// Token endpoint of the authorization server.
    pub token_uri: Url,
    /// Client credentials registered with the authorization server.
    pub client: ClientAuth,
    /// FHIR base URL the issued token is scoped to.
    pub service_uri: Url,
    /// Redirect URI used when the launch was initiated.
    pub redirect_uri: Url,
}

/// Wire shape of a stored launch record.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaunchRecord {
    token_uri: Url,
    client_id: String,
    #[serde(default)]
    secret: Option<String>,
    service_uri: Url,
    redirect_uri: Url,
}

impl LaunchSession {
    /// Parses a stored launch record (JSON) into a session.
    ///
    /// An empty `secret` counts as absent: the launcher writes `""` for
    /// public clients on some deployments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSession`] if the record is not valid JSON or
    /// is missing required fields.
    pub fn from_record(raw: &str) -> Result<Self, Error> {
        let record: LaunchRecord =
            serde_json::from_str(raw).map_err(|e| Error::MalformedSession(e.to_string()))?;
        let client = match record.secret.filter(|s| !s.is_empty()) {
            Some(secret) => ClientAuth::Confidential {
                client_id: record.client_id,
                secret,
            },
            None => ClientAuth::Public {
                client_id: record.client_id,
            },
        };
        Ok(Self {
            token_uri: record.token_uri,
            client,
            service_uri: record.service_uri,
            redirect_uri: record.redirect_uri,
        })
    }
}

/// Consumer-provided store of pending launch records, keyed by the OAuth
/// `state` nonce.
///
/// The launcher writes records before redirecting; this crate only reads.
/// Distinct nonces belong to unrelated sessions, so concurrent reads need no
/// coordination.
///
/// # Example
///
/// ```rust,ignore
/// impl LaunchStore for MyAppState {
///     async fn fetch(
///         &self,
///         nonce: &str,
///     ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
///         self.redis.get(nonce).await
///     }
/// }
/// ```
pub trait LaunchStore: Send + Sync + 'static {
    /// Look up the raw launch record for a nonce. `None` if no launch is pending.
    fn fetch(
        &self,
        nonce: &str,
    ) -> impl Future<Output = Result<Option<String>, Box<dyn std::error::Error + Send + Sync>>> + Send;
}

/// In-memory [`LaunchStore`] for tests and local development.
///
/// Replaces the browser session storage of classic SMART launch samples with
/// an explicitly injected store.
#[derive(Debug, Default, Clone)]
pub struct MemoryLaunchStore {
    records: HashMap<String, String>,
}

impl MemoryLaunchStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending launch record under its nonce.
    pub fn insert(&mut self, nonce: impl Into<String>, record: impl Into<String>) {
        self.records.insert(nonce.into(), record.into());
    }
}

impl LaunchStore for MemoryLaunchStore {
    async fn fetch(
        &self,
        nonce: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.records.get(nonce).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_with_secret_is_confidential() {
        let session = LaunchSession::from_record(
            r#"{"tokenUri":"https://auth.example/token","clientId":"app1","secret":"s3cr3t",
                "serviceUri":"https://fhir.example","redirectUri":"https://app/afterlaunch"}"#,
        )
        .unwrap();

        assert_eq!(
            session.client,
            ClientAuth::Confidential {
                client_id: "app1".into(),
                secret: "s3cr3t".into(),
            }
        );
        assert_eq!(session.token_uri.as_str(), "https://auth.example/token");
    }

    #[test]
    fn record_without_secret_is_public() {
        let session = LaunchSession::from_record(
            r#"{"tokenUri":"https://auth.example/token","clientId":"app1",
                "serviceUri":"https://fhir.example","redirectUri":"https://app/afterlaunch"}"#,
        )
        .unwrap();

        assert_eq!(session.client, ClientAuth::Public { client_id: "app1".into() });
        assert_eq!(session.client.basic_header(), None);
    }

    #[test]
    fn empty_secret_is_public() {
        let session = LaunchSession::from_record(
            r#"{"tokenUri":"https://auth.example/token","clientId":"app1","secret":"",
                "serviceUri":"https://fhir.example","redirectUri":"https://app/afterlaunch"}"#,
        )
        .unwrap();

        assert_eq!(session.client, ClientAuth::Public { client_id: "app1".into() });
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = LaunchSession::from_record(r#"{"clientId":"app1"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedSession(_)));
    }

    #[test]
    fn garbage_record_is_malformed() {
        let err = LaunchSession::from_record("not json at all").unwrap_err();
        assert!(matches!(err, Error::MalformedSession(_)));
    }

    #[test]
    fn basic_header_is_rfc_vector() {
        // RFC 7617 test vector
        let client = ClientAuth::Confidential {
            client_id: "Aladdin".into(),
            secret: "open sesame".into(),
        };
        assert_eq!(
            client.basic_header().unwrap(),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }
}

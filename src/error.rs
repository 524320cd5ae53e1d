use crate::flow::Phase;

/// Error taxonomy for the SMART launch flow.
///
/// Every failure path in the crate yields one of these variants; nothing is
/// swallowed or retried behind the caller's back.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A required redirect parameter (`state` or `code`) was absent or empty.
    #[error("missing callback parameter: {0}")]
    MissingParameter(&'static str),
    /// No pending launch session matches the callback `state`.
    #[error("no launch session for state '{0}'")]
    SessionNotFound(String),
    /// A launch record was found but could not be parsed into the required fields.
    #[error("malformed launch session record: {0}")]
    MalformedSession(String),
    /// The launch session store itself failed.
    #[error("launch store error: {0}")]
    Store(String),
    /// Token endpoint returned a non-success status, an unusable body, or the
    /// transport failed. `status` is `None` for transport-level failures.
    #[error("token exchange failed: {detail}")]
    TokenExchange {
        status: Option<u16>,
        detail: String,
    },
    /// Resource read attempted without an access token. No network call was made.
    #[error("not authenticated: no access token available")]
    NotAuthenticated,
    /// The FHIR server rejected the access token (HTTP 401).
    #[error("unauthorized: the FHIR server rejected the access token")]
    Unauthorized,
    /// The requested resource does not exist (HTTP 404).
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Any other resource retrieval failure.
    #[error("resource fetch failed: {detail}")]
    ResourceFetch {
        status: Option<u16>,
        detail: String,
    },
    /// The resource decoded, but lacks fields the flow requires.
    #[error("malformed resource: {0}")]
    MalformedResource(String),
    /// Operation invoked in a phase where it is not defined.
    #[error("'{operation}' is not permitted in phase {phase}")]
    IllegalPhase {
        operation: &'static str,
        phase: Phase,
    },
}

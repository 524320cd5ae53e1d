use std::collections::HashMap;
use std::fmt;

use crate::callback::{self, ResolvedLaunch};
use crate::error::Error;
use crate::fhir::PatientSummary;
use crate::launch::LaunchStore;
use crate::oauth::SmartClient;

/// Phase of one launch attempt.
///
/// Moves monotonically forward; `Error` is reachable from any non-terminal
/// phase; `Ready` and `Error` are terminal. There is no retry path out of a
/// terminal phase — the authorization code is consumed, so recovery means a
/// fresh launch and a fresh [`AuthSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    AwaitingToken,
    Authenticated,
    Fetching,
    Ready,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "unauthenticated",
            Self::AwaitingToken => "awaiting-token",
            Self::Authenticated => "authenticated",
            Self::Fetching => "fetching",
            Self::Ready => "ready",
            Self::Error => "error",
        })
    }
}

/// One in-flight SMART launch attempt.
///
/// Owns the credentials accumulated along the way and drives the callback
/// resolution, token exchange and patient fetch in order. Every operation
/// takes `&mut self`, so a session is single-flight by construction: no
/// second exchange or fetch can be outstanding, and the ordering guarantee
/// (no fetch before a successful exchange) is a phase check, not timing.
///
/// All async operations are drop-cancelled: dropping the future aborts the
/// in-flight HTTP request and its eventual response is discarded, so a
/// torn-down caller never leaves a response mutating an abandoned session.
#[derive(Debug, Default)]
pub struct AuthSession {
    phase: Phase,
    launch: Option<ResolvedLaunch>,
    access_token: Option<String>,
    patient_id: Option<String>,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Unauthenticated
    }
}

impl AuthSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[must_use]
    pub fn patient_id(&self) -> Option<&str> {
        self.patient_id.as_deref()
    }

    /// The resolved launch, once the callback has been processed.
    #[must_use]
    pub fn launch(&self) -> Option<&ResolvedLaunch> {
        self.launch.as_ref()
    }

    /// Resolves the redirect callback against the pending-launch store.
    ///
    /// `Unauthenticated → AwaitingToken` on success, `Error` on failure.
    ///
    /// # Errors
    ///
    /// Propagates [`callback::resolve_callback`] errors verbatim, or
    /// [`Error::IllegalPhase`] if the session already left `Unauthenticated`.
    pub async fn resolve_callback(
        &mut self,
        params: &HashMap<String, String>,
        store: &impl LaunchStore,
    ) -> Result<(), Error> {
        self.guard(Phase::Unauthenticated, "resolve callback")?;

        match callback::resolve_callback(params, store).await {
            Ok(resolved) => {
                tracing::debug!(nonce = %resolved.nonce, "launch session resolved");
                self.launch = Some(resolved);
                self.phase = Phase::AwaitingToken;
                Ok(())
            }
            Err(e) => Err(self.fail("callback resolution failed", e)),
        }
    }

    /// Exchanges the authorization code for an access token.
    ///
    /// `AwaitingToken → Authenticated` on success, `Error` on failure. The
    /// phase guard makes the exchange structurally unrepeatable: after a
    /// success (or failure) the session is no longer in `AwaitingToken`, so
    /// the consumed code cannot be sent a second time through this session.
    ///
    /// # Errors
    ///
    /// [`Error::TokenExchange`] from the client, or [`Error::IllegalPhase`]
    /// (without any network call) when invoked out of order.
    pub async fn exchange_token(&mut self, client: &SmartClient) -> Result<(), Error> {
        self.guard(Phase::AwaitingToken, "exchange token")?;
        let Some(launch) = self.launch.as_ref() else {
            return Err(Error::IllegalPhase {
                operation: "exchange token",
                phase: self.phase,
            });
        };

        match client.exchange_code(&launch.session, &launch.code).await {
            Ok(token) => {
                tracing::debug!(patient = %token.patient, "token exchange succeeded");
                self.access_token = Some(token.access_token);
                self.patient_id = Some(token.patient);
                self.phase = Phase::Authenticated;
                Ok(())
            }
            Err(e) => Err(self.fail("token exchange failed", e)),
        }
    }

    /// Fetches the launch patient with the held token.
    ///
    /// `Authenticated → Fetching` at dispatch, then `Ready` on success or
    /// `Error` on failure. Fails with [`Error::NotAuthenticated`] before any
    /// network call if no access token is held.
    ///
    /// A fetch failure does not invalidate the access token; a caller that
    /// wants to retry the idempotent GET can use
    /// [`SmartClient::read_patient`] directly.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`], [`Error::IllegalPhase`], or any resource
    /// retrieval error from [`SmartClient::read_patient`].
    pub async fn fetch_patient(&mut self, client: &SmartClient) -> Result<PatientSummary, Error> {
        self.guard(Phase::Authenticated, "fetch patient")?;

        let (Some(token), Some(patient_id)) =
            (self.access_token.clone(), self.patient_id.clone())
        else {
            return Err(self.fail("patient fetch precondition failed", Error::NotAuthenticated));
        };
        let service_uri = match self.launch.as_ref() {
            Some(launch) => launch.session.service_uri.clone(),
            None => {
                return Err(
                    self.fail("patient fetch precondition failed", Error::NotAuthenticated)
                );
            }
        };

        self.phase = Phase::Fetching;
        match client.read_patient(&service_uri, &patient_id, &token).await {
            Ok(summary) => {
                tracing::debug!(patient = %summary.id, "patient fetched");
                self.phase = Phase::Ready;
                Ok(summary)
            }
            Err(e) => Err(self.fail("patient fetch failed", e)),
        }
    }

    /// Phase guard. A violation is caller misuse, not a flow failure, so the
    /// session is left untouched (terminal phases stay terminal, and an
    /// in-progress session is not invalidated by a stray call).
    fn guard(&self, expected: Phase, operation: &'static str) -> Result<(), Error> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::IllegalPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn fail(&mut self, context: &'static str, error: Error) -> Error {
        tracing::warn!(error = %error, "{context}");
        self.phase = Phase::Error;
        error
    }
}

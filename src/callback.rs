use std::collections::HashMap;

use crate::error::Error;
use crate::launch::{LaunchSession, LaunchStore};

/// A pending launch session matched to its redirect callback.
#[derive(Debug, Clone)]
pub struct ResolvedLaunch {
    /// The `state` nonce that keyed the launch record.
    pub nonce: String,
    /// Launch parameters written by the launcher before redirect.
    pub session: LaunchSession,
    /// Single-use authorization code from the callback.
    pub code: String,
}

/// Resolves an authorization-server redirect against the pending-launch store.
///
/// Both `state` and `code` are required; an absent or empty parameter is a
/// protocol violation and fails before the store is consulted. The lookup is
/// the only side effect.
///
/// # Errors
///
/// - [`Error::MissingParameter`] if `state` or `code` is absent or empty.
/// - [`Error::Store`] if the store lookup itself fails.
/// - [`Error::SessionNotFound`] if no record is keyed by `state`.
/// - [`Error::MalformedSession`] if the record does not parse.
pub async fn resolve_callback(
    params: &HashMap<String, String>,
    store: &impl LaunchStore,
) -> Result<ResolvedLaunch, Error> {
    let state = require(params, "state")?;
    let code = require(params, "code")?;

    let raw = store
        .fetch(state)
        .await
        .map_err(|e| Error::Store(e.to_string()))?
        .ok_or_else(|| Error::SessionNotFound(state.to_string()))?;

    let session = LaunchSession::from_record(&raw)?;

    Ok(ResolvedLaunch {
        nonce: state.to_string(),
        session,
        code: code.to_string(),
    })
}

fn require<'a>(params: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str, Error> {
    match params.get(name).map(String::as_str) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::MissingParameter(name)),
    }
}

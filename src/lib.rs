#![doc = include_str!("../README.md")]

pub mod callback;
pub mod error;
pub mod fhir;
pub mod flow;
pub mod launch;
pub mod oauth;

// Re-exports for convenient access
pub use callback::{ResolvedLaunch, resolve_callback};
pub use error::Error;
pub use fhir::{PatientIdentifier, PatientSummary};
pub use flow::{AuthSession, Phase};
pub use launch::{ClientAuth, LaunchSession, LaunchStore, MemoryLaunchStore};
pub use oauth::{SmartClient, TokenResponse};

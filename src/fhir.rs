use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::oauth::SmartClient;

/// Wire schema for the subset of a FHIR Patient this crate consumes.
///
/// Decoded once at the boundary; everything the server sends beyond these
/// fields is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PatientResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<Vec<HumanName>>,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    identifier: Vec<IdentifierEntry>,
}

#[derive(Debug, Deserialize)]
struct HumanName {
    #[serde(default)]
    given: Vec<String>,
    #[serde(default)]
    family: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifierEntry {
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// An entry from the patient's `identifier` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientIdentifier {
    pub system: Option<String>,
    pub value: Option<String>,
}

/// Minimal view of the launch patient.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PatientSummary {
    pub id: String,
    /// Given names of the first `name` entry, in order.
    pub given_names: Vec<String>,
    /// Family names of the first `name` entry, in order.
    pub family_names: Vec<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub identifiers: Vec<PatientIdentifier>,
}

impl PatientSummary {
    /// Given names joined with a single space.
    #[must_use]
    pub fn given(&self) -> String {
        self.given_names.join(" ")
    }

    /// Family names joined with a single space.
    #[must_use]
    pub fn family(&self) -> String {
        self.family_names.join(" ")
    }

    fn from_resource(resource: PatientResource, fallback_id: &str) -> Result<Self, Error> {
        let primary = resource
            .name
            .and_then(|names| names.into_iter().next())
            .ok_or_else(|| Error::MalformedResource("patient resource has no name entry".into()))?;

        Ok(Self {
            id: resource.id.unwrap_or_else(|| fallback_id.to_string()),
            given_names: primary.given,
            family_names: primary.family,
            birth_date: resource.birth_date,
            gender: resource.gender,
            identifiers: resource
                .identifier
                .into_iter()
                .map(|entry| PatientIdentifier {
                    system: entry.system,
                    value: entry.value,
                })
                .collect(),
        })
    }
}

impl SmartClient {
    /// Reads the launch patient (`GET <service_uri>/Patient/<patient_id>`)
    /// with a bearer token.
    ///
    /// The GET is idempotent, so callers may retry a failed read without
    /// re-running the token exchange.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] on HTTP 401.
    /// - [`Error::ResourceNotFound`] on HTTP 404.
    /// - [`Error::ResourceFetch`] on any other non-success or transport failure.
    /// - [`Error::MalformedResource`] if the body is not a Patient with at
    ///   least one `name` entry.
    pub async fn read_patient(
        &self,
        service_uri: &Url,
        patient_id: &str,
        access_token: &str,
    ) -> Result<PatientSummary, Error> {
        let body = self
            .read_raw(service_uri, &format!("/Patient/{patient_id}"), access_token)
            .await?;
        let resource: PatientResource =
            serde_json::from_value(body).map_err(|e| Error::MalformedResource(e.to_string()))?;
        PatientSummary::from_resource(resource, patient_id)
    }

    /// Bearer-authenticated GET of an arbitrary path under the FHIR base,
    /// returning the decoded JSON body.
    ///
    /// Same status mapping as [`read_patient`](Self::read_patient); useful
    /// for resources outside the minimal Patient schema.
    pub async fn read_raw(
        &self,
        service_uri: &Url,
        path: &str,
        access_token: &str,
    ) -> Result<Value, Error> {
        let url = format!("{}{}", service_uri.as_str().trim_end_matches('/'), path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::ResourceFetch {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => Err(Error::Unauthorized),
            StatusCode::NOT_FOUND => Err(Error::ResourceNotFound(path.to_string())),
            s if s.is_success() => response
                .json()
                .await
                .map_err(|e| Error::MalformedResource(e.to_string())),
            s => {
                let detail = response.text().await.unwrap_or_default();
                Err(Error::ResourceFetch {
                    status: Some(s.as_u16()),
                    detail,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Result<PatientSummary, Error> {
        let resource: PatientResource = serde_json::from_str(json).unwrap();
        PatientSummary::from_resource(resource, "pat1")
    }

    #[test]
    fn summary_from_minimal_patient() {
        let summary = decode(
            r#"{"name":[{"given":["Jane"],"family":["Doe"]}],
                "birthDate":"1980-01-01","gender":"female"}"#,
        )
        .unwrap();

        assert_eq!(summary.id, "pat1");
        assert_eq!(summary.given_names, vec!["Jane"]);
        assert_eq!(summary.family_names, vec!["Doe"]);
        assert_eq!(summary.birth_date.as_deref(), Some("1980-01-01"));
        assert_eq!(summary.gender.as_deref(), Some("female"));
        assert!(summary.identifiers.is_empty());
    }

    #[test]
    fn multiple_names_join_with_single_space() {
        let summary = decode(
            r#"{"name":[{"given":["Mary","Jane"],"family":["van","Doe"]}]}"#,
        )
        .unwrap();

        assert_eq!(summary.given(), "Mary Jane");
        assert_eq!(summary.family(), "van Doe");
    }

    #[test]
    fn only_first_name_entry_is_used() {
        let summary = decode(
            r#"{"name":[{"given":["Jane"],"family":["Doe"]},
                        {"given":["J"],"family":["D"]}]}"#,
        )
        .unwrap();

        assert_eq!(summary.given_names, vec!["Jane"]);
    }

    #[test]
    fn resource_id_wins_over_fallback() {
        let summary = decode(r#"{"id":"abc","name":[{"given":["Jane"]}]}"#).unwrap();
        assert_eq!(summary.id, "abc");
    }

    #[test]
    fn identifiers_are_carried_in_order() {
        let summary = decode(
            r#"{"name":[{"given":["Jane"]}],
                "identifier":[{"system":"urn:mrn","value":"12345"},{"value":"x"}]}"#,
        )
        .unwrap();

        assert_eq!(summary.identifiers.len(), 2);
        assert_eq!(summary.identifiers[0].system.as_deref(), Some("urn:mrn"));
        assert_eq!(summary.identifiers[0].value.as_deref(), Some("12345"));
    }

    #[test]
    fn missing_name_array_is_malformed() {
        let err = decode(r#"{"birthDate":"1980-01-01"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResource(_)));
    }

    #[test]
    fn empty_name_array_is_malformed() {
        let err = decode(r#"{"name":[]}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResource(_)));
    }
}

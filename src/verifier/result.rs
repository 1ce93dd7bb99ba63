//! Recognition of verification results among the messages pushed by the verifier.
//!
//! The verifier does not version its notification payloads; recognition looks for the fields
//! known to appear in final results and ignores everything else.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::{debug, info};

use crate::fhir::{normalize_all, NormalizedResources};

/// Credential name the verifier uses for the enclosing presentation's own policy results.
const VERIFIABLE_PRESENTATION: &str = "VerifiablePresentation";

/// The outcome of a completed presentation session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum PresentationResult {
    /// Health records extracted from the verified credentials.
    HealthRecords(NormalizedResources),
    /// A prescription delivered as-is by the verifier.
    Prescription(Prescription),
}

impl PresentationResult {
    pub fn health_records(&self) -> Option<&NormalizedResources> {
        match self {
            PresentationResult::HealthRecords(records) => Some(records),
            PresentationResult::Prescription(_) => None,
        }
    }

    pub fn prescription(&self) -> Option<&Prescription> {
        match self {
            PresentationResult::Prescription(prescription) => Some(prescription),
            PresentationResult::HealthRecords(_) => None,
        }
    }
}

/// A verified medical prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub prescription_id: Json,
    pub medication_ref_data: Json,
    /// Directory identifier of the prescribed medication, when it could be looked up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_pid: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Json>,
}

impl Prescription {
    /// GTIN of the prescribed medication, when the reference data carries one.
    pub fn gtin(&self) -> Option<&str> {
        self.medication_ref_data.get("gtin").and_then(Json::as_str)
    }
}

/// Recognize a final verification result in a pushed `message`.
///
/// Returns `None` for intermediate protocol messages.
pub fn recognize(message: &Json) -> Option<PresentationResult> {
    if let Some(results) = message
        .pointer("/policyResults/results")
        .and_then(Json::as_array)
    {
        let credentials = verified_credentials(results);
        debug!(
            credentials = credentials.len(),
            "received policy results"
        );
        return Some(PresentationResult::HealthRecords(normalize_all(credentials)));
    }

    if is_truthy(message.get("prescriptionId")) && is_truthy(message.get("medicationRefData")) {
        return serde_json::from_value(message.clone())
            .ok()
            .map(PresentationResult::Prescription);
    }

    None
}

/// Verified credentials of each policy result, skipping the presentation's own entry.
fn verified_credentials(results: &[Json]) -> Vec<&Json> {
    results
        .iter()
        .filter_map(|result| {
            let first = result.pointer("/policyResults/0");
            if result.get("credential").and_then(Json::as_str) == Some(VERIFIABLE_PRESENTATION) {
                let success = first.and_then(|r| r.get("is_success")).and_then(Json::as_bool);
                info!(?success, "verifiable presentation verification");
                return None;
            }
            first?.pointer("/result/vc").filter(|vc| !vc.is_null())
        })
        .collect()
}

fn is_truthy(value: Option<&Json>) -> bool {
    match value {
        None | Some(Json::Null) | Some(Json::Bool(false)) => false,
        Some(Json::String(s)) => !s.is_empty(),
        Some(Json::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn intermediate_messages() {
        assert_eq!(recognize(&json!({ "status": "REQUEST_RETRIEVED" })), None);
        assert_eq!(recognize(&json!({ "policyResults": { "success": true } })), None);
        assert_eq!(recognize(&json!("hello")), None);
    }

    #[test]
    fn health_records() {
        let message = json!({
            "policyResults": {
                "results": [
                    {
                        "credential": "VerifiablePresentation",
                        "policyResults": [{ "is_success": true, "result": {} }]
                    },
                    {
                        "credential": "SmartHealthCard",
                        "policyResults": [{
                            "is_success": true,
                            "result": {
                                "vc": {
                                    "credentialSubject": {
                                        "fhirBundle": {
                                            "entry": [{
                                                "fullUrl": "resource:0",
                                                "resource": {
                                                    "resourceType": "Patient",
                                                    "name": [{ "given": ["Jane"], "family": "Doe" }]
                                                }
                                            }]
                                        }
                                    }
                                }
                            }
                        }]
                    },
                    { "credential": "SmartHealthCard", "policyResults": [] }
                ]
            }
        });

        let result = recognize(&message).unwrap();
        let records = result.health_records().unwrap();
        assert_eq!(records.patient.as_ref().unwrap().name(), Some("Jane Doe"));
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn empty_results_are_final() {
        let result = recognize(&json!({ "policyResults": { "results": [] } })).unwrap();
        assert!(result.health_records().unwrap().is_empty());
    }

    #[test]
    fn prescription() {
        let message = json!({
            "prescriptionId": "RX-42",
            "medicationRefData": { "gtin": "7680475040157" },
            "patient": "Jane Doe"
        });

        let result = recognize(&message).unwrap();
        let prescription = result.prescription().unwrap();
        assert_eq!(prescription.prescription_id, json!("RX-42"));
        assert_eq!(prescription.gtin(), Some("7680475040157"));
        assert_eq!(prescription.other.get("patient"), Some(&json!("Jane Doe")));
        assert_eq!(prescription.medication_pid, None);

        assert_eq!(recognize(&json!({ "prescriptionId": "RX-42" })), None);
    }
}

//! Normalization of FHIR resources carried by verified credentials.
//!
//! Every supported resource is projected onto a flat [NormalizedRecord]. Extraction never
//! fails: absent or mistyped fields become `None` (or an empty string for patient fields), and
//! resources of unknown kinds become [RecordData::Unsupported] records.
//!
//! | Kind | Source paths |
//! |------|--------------|
//! | `Patient` | `name[0].given`, `name[0].family`, `birthDate`, `gender`, `address[0].{line,city,country}` |
//! | `AllergyIntolerance` | `code`, `criticality`, `clinicalStatus`, `verificationStatus`, `recordedDate`, `type`, `category` |
//! | `MedicationRequest` | `medicationCodeableConcept`, `intent`, `status`, `authoredOn`, `dosageInstruction` |
//! | `Condition` | `code`, `clinicalStatus`, `verificationStatus`, `onsetDateTime` |
//! | `Immunization` | `vaccineCode`, `status`, `occurrenceDateTime` |
//! | `Procedure` | `code`, `status`, `performedPeriod.{start,end}` |
//! | `DiagnosticReport` | `code`, `status`, `effectiveDateTime`, `valueQuantity.{value,unit}` |
//! | `Device` | `type`, `status`, `manufacturer`, `model`, `version` |
//!
//! Coded fields read `coding[0].display` (falling back to `text`), `coding[0].code` and
//! `coding[0].system` of the listed concept.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

pub use self::{
    dosage::{format_dosage_instructions, NO_DOSAGE_INSTRUCTIONS, NO_SPECIFIC_DOSAGE_INSTRUCTIONS},
    records::*,
};

pub mod dosage;
mod records;

/// Records of one normalization pass, bucketed by kind in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResources {
    /// The first patient encountered; later patients are dropped.
    pub patient: Option<NormalizedRecord>,
    pub allergies: Vec<NormalizedRecord>,
    pub medications: Vec<NormalizedRecord>,
    pub conditions: Vec<NormalizedRecord>,
    pub immunizations: Vec<NormalizedRecord>,
    pub procedures: Vec<NormalizedRecord>,
    pub results: Vec<NormalizedRecord>,
    pub devices: Vec<NormalizedRecord>,
    pub other: Vec<NormalizedRecord>,
}

impl NormalizedResources {
    /// File `record` under its kind.
    pub fn push(&mut self, record: NormalizedRecord) {
        let bucket = match record.kind() {
            ResourceKind::Patient => {
                if self.patient.is_none() {
                    self.patient = Some(record);
                } else {
                    debug!(uri = %record.uri, "ignoring additional patient resource");
                }
                return;
            }
            ResourceKind::AllergyIntolerance => &mut self.allergies,
            ResourceKind::MedicationRequest => &mut self.medications,
            ResourceKind::Condition => &mut self.conditions,
            ResourceKind::Immunization => &mut self.immunizations,
            ResourceKind::Procedure => &mut self.procedures,
            ResourceKind::DiagnosticReport => &mut self.results,
            ResourceKind::Device => &mut self.devices,
            ResourceKind::Unsupported => &mut self.other,
        };
        bucket.push(record);
    }

    /// Number of records retained, patient included.
    pub fn len(&self) -> usize {
        usize::from(self.patient.is_some())
            + self.allergies.len()
            + self.medications.len()
            + self.conditions.len()
            + self.immunizations.len()
            + self.procedures.len()
            + self.results.len()
            + self.devices.len()
            + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize every resource found in `credentials`.
///
/// A credential contributes resources when it is
/// - a SMART Health Card (`credentialSubject.fhirBundle.entry[]`),
/// - a FHIR `Bundle` (`entry[]`),
/// - or a single FHIR resource, referenced as `<resourceType>/<id>`.
pub fn normalize_all<'a>(credentials: impl IntoIterator<Item = &'a Json>) -> NormalizedResources {
    let mut resources = NormalizedResources::default();

    for credential in credentials {
        for (resource, uri) in contained_resources(credential) {
            resources.push(normalize(resource, &uri));
        }
    }

    debug!(records = resources.len(), "normalized credential payloads");
    resources
}

fn contained_resources(credential: &Json) -> Vec<(&Json, String)> {
    let entries = credential
        .pointer("/credentialSubject/fhirBundle/entry")
        .or_else(|| {
            (str_at(credential, "/resourceType").as_deref() == Some("Bundle"))
                .then(|| credential.get("entry"))
                .flatten()
        });

    if let Some(entries) = entries {
        return entries
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let resource = entry.get("resource")?;
                let uri = str_at(entry, "/fullUrl").unwrap_or_default();
                Some((resource, uri))
            })
            .collect();
    }

    match str_at(credential, "/resourceType") {
        Some(resource_type) => {
            let uri = str_at(credential, "/id")
                .map(|id| format!("{resource_type}/{id}"))
                .unwrap_or_default();
            vec![(credential, uri)]
        }
        None => {
            debug!("credential carries no FHIR resources");
            vec![]
        }
    }
}

/// Project one resource onto its [NormalizedRecord].
pub fn normalize(resource: &Json, uri: &str) -> NormalizedRecord {
    let resource_type = str_at(resource, "/resourceType");
    let kind = resource_type
        .as_deref()
        .map(ResourceKind::from_resource_type)
        .unwrap_or(ResourceKind::Unsupported);

    let data = match kind {
        ResourceKind::Patient => RecordData::Patient(patient(resource)),
        ResourceKind::AllergyIntolerance => RecordData::AllergyIntolerance(AllergyIntolerance {
            coded: coded(resource, "/code"),
            criticality: str_at(resource, "/criticality"),
            clinical_status: str_at(resource, "/clinicalStatus/coding/0/code"),
            verification_status: str_at(resource, "/verificationStatus/coding/0/code"),
            recorded_date: str_at(resource, "/recordedDate"),
            allergy_type: str_at(resource, "/type"),
            category: resource.get("category").and_then(Json::as_array).map(|c| {
                c.iter()
                    .filter_map(Json::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            }),
        }),
        ResourceKind::MedicationRequest => RecordData::MedicationRequest(MedicationRequest {
            coded: coded(resource, "/medicationCodeableConcept"),
            intent: str_at(resource, "/intent"),
            status: str_at(resource, "/status"),
            authored_on: str_at(resource, "/authoredOn"),
            dosage_instructions: format_dosage_instructions(
                resource
                    .get("dosageInstruction")
                    .and_then(Json::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default(),
            ),
        }),
        ResourceKind::Condition => RecordData::Condition(Condition {
            coded: coded(resource, "/code"),
            clinical_status: str_at(resource, "/clinicalStatus/coding/0/code"),
            verification_status: str_at(resource, "/verificationStatus/coding/0/code"),
            onset_date_time: str_at(resource, "/onsetDateTime"),
        }),
        ResourceKind::Immunization => RecordData::Immunization(Immunization {
            coded: coded(resource, "/vaccineCode"),
            status: str_at(resource, "/status"),
            date: str_at(resource, "/occurrenceDateTime"),
        }),
        ResourceKind::Procedure => RecordData::Procedure(Procedure {
            coded: coded(resource, "/code"),
            status: str_at(resource, "/status"),
            performed_start: str_at(resource, "/performedPeriod/start"),
            performed_end: str_at(resource, "/performedPeriod/end"),
        }),
        ResourceKind::DiagnosticReport => RecordData::DiagnosticReport(DiagnosticReport {
            coded: coded(resource, "/code"),
            status: str_at(resource, "/status"),
            effective_date_time: str_at(resource, "/effectiveDateTime"),
            value: resource
                .pointer("/valueQuantity/value")
                .and_then(Json::as_f64),
            unit: str_at(resource, "/valueQuantity/unit"),
        }),
        ResourceKind::Device => RecordData::Device(Device {
            coded: coded(resource, "/type"),
            status: str_at(resource, "/status"),
            manufacturer: str_at(resource, "/manufacturer"),
            model: str_at(resource, "/model"),
            version: str_at(resource, "/version"),
        }),
        ResourceKind::Unsupported => {
            debug!(?resource_type, uri, "unsupported resource type");
            RecordData::Unsupported(Unsupported {
                name: format!(
                    "Unsupported resource type: {}",
                    resource_type.as_deref().unwrap_or("unknown")
                ),
                resource_type,
            })
        }
    };

    NormalizedRecord {
        uri: uri.to_owned(),
        data,
    }
}

fn patient(resource: &Json) -> Patient {
    let given = resource
        .pointer("/name/0/given")
        .and_then(Json::as_array)
        .map(|given| {
            given
                .iter()
                .filter_map(Json::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    let family = str_at(resource, "/name/0/family").unwrap_or_default();

    let name = [given.as_str(), family.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Patient {
        name: if name.is_empty() {
            "Unknown".to_owned()
        } else {
            name
        },
        birth_date: str_at(resource, "/birthDate").unwrap_or_default(),
        gender: str_at(resource, "/gender").unwrap_or_default(),
        address: resource
            .pointer("/address/0/line")
            .and_then(Json::as_array)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(Json::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
        city: str_at(resource, "/address/0/city").unwrap_or_default(),
        country: str_at(resource, "/address/0/country").unwrap_or_default(),
    }
}

/// Name and first coding of the `CodeableConcept` at `pointer`.
fn coded(resource: &Json, pointer: &str) -> Coded {
    let Some(concept) = resource.pointer(pointer) else {
        return Coded::default();
    };
    Coded {
        name: str_at(concept, "/coding/0/display").or_else(|| str_at(concept, "/text")),
        code: str_at(concept, "/coding/0/code"),
        code_system: str_at(concept, "/coding/0/system"),
    }
}

/// Non-empty string at `pointer`.
fn str_at(value: &Json, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Json::as_str)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

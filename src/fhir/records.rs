use serde::{Deserialize, Serialize};

/// Closed set of resource kinds the normalizer recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Patient,
    AllergyIntolerance,
    MedicationRequest,
    Condition,
    Immunization,
    Procedure,
    DiagnosticReport,
    Device,
    Unsupported,
}

impl ResourceKind {
    pub fn from_resource_type(resource_type: &str) -> Self {
        match resource_type {
            "Patient" => Self::Patient,
            "AllergyIntolerance" => Self::AllergyIntolerance,
            "MedicationRequest" => Self::MedicationRequest,
            "Condition" => Self::Condition,
            "Immunization" => Self::Immunization,
            "Procedure" => Self::Procedure,
            "DiagnosticReport" => Self::DiagnosticReport,
            "Device" => Self::Device,
            _ => Self::Unsupported,
        }
    }
}

/// The flattened projection of one source resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Reference to the originating resource within the payload.
    pub uri: String,
    #[serde(flatten)]
    pub data: RecordData,
}

impl NormalizedRecord {
    pub fn kind(&self) -> ResourceKind {
        match &self.data {
            RecordData::Patient(_) => ResourceKind::Patient,
            RecordData::AllergyIntolerance(_) => ResourceKind::AllergyIntolerance,
            RecordData::MedicationRequest(_) => ResourceKind::MedicationRequest,
            RecordData::Condition(_) => ResourceKind::Condition,
            RecordData::Immunization(_) => ResourceKind::Immunization,
            RecordData::Procedure(_) => ResourceKind::Procedure,
            RecordData::DiagnosticReport(_) => ResourceKind::DiagnosticReport,
            RecordData::Device(_) => ResourceKind::Device,
            RecordData::Unsupported(_) => ResourceKind::Unsupported,
        }
    }

    /// Display name of the record, whatever its kind.
    pub fn name(&self) -> Option<&str> {
        match &self.data {
            RecordData::Patient(p) => Some(&p.name),
            RecordData::AllergyIntolerance(r) => r.coded.name.as_deref(),
            RecordData::MedicationRequest(r) => r.coded.name.as_deref(),
            RecordData::Condition(r) => r.coded.name.as_deref(),
            RecordData::Immunization(r) => r.coded.name.as_deref(),
            RecordData::Procedure(r) => r.coded.name.as_deref(),
            RecordData::DiagnosticReport(r) => r.coded.name.as_deref(),
            RecordData::Device(r) => r.coded.name.as_deref(),
            RecordData::Unsupported(r) => Some(&r.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RecordData {
    Patient(Patient),
    AllergyIntolerance(AllergyIntolerance),
    MedicationRequest(MedicationRequest),
    Condition(Condition),
    Immunization(Immunization),
    Procedure(Procedure),
    DiagnosticReport(DiagnosticReport),
    Device(Device),
    Unsupported(Unsupported),
}

/// Name and coding shared by every coded clinical resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coded {
    pub name: Option<String>,
    pub code: Option<String>,
    pub code_system: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub name: String,
    pub birth_date: String,
    pub gender: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllergyIntolerance {
    #[serde(flatten)]
    pub coded: Coded,
    pub criticality: Option<String>,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    pub recorded_date: Option<String>,
    #[serde(rename = "type")]
    pub allergy_type: Option<String>,
    pub category: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRequest {
    #[serde(flatten)]
    pub coded: Coded,
    pub intent: Option<String>,
    pub status: Option<String>,
    pub authored_on: Option<String>,
    pub dosage_instructions: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(flatten)]
    pub coded: Coded,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
    pub onset_date_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Immunization {
    #[serde(flatten)]
    pub coded: Coded,
    pub status: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    #[serde(flatten)]
    pub coded: Coded,
    pub status: Option<String>,
    pub performed_start: Option<String>,
    pub performed_end: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport {
    #[serde(flatten)]
    pub coded: Coded,
    pub status: Option<String>,
    pub effective_date_time: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(flatten)]
    pub coded: Coded,
    pub status: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
}

/// A resource of a kind outside [ResourceKind], passed through with a diagnostic name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unsupported {
    pub resource_type: Option<String>,
    pub name: String,
}

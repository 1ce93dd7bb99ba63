use oid4vp_session::fhir::{normalize_all, RecordData, ResourceKind};
use serde_json::{json, Value as Json};

fn smart_health_card() -> Json {
    serde_json::from_str(include_str!("fixtures/smart_health_card.json")).unwrap()
}

#[test]
fn smart_health_card_resources() {
    let credential = smart_health_card();
    let records = normalize_all([&credential]);

    let patient = records.patient.as_ref().unwrap();
    assert_eq!(patient.uri, "resource:0");
    let RecordData::Patient(fields) = &patient.data else {
        panic!("expected a patient record")
    };
    assert_eq!(fields.name, "Adah626 Altenwerth646");
    assert_eq!(fields.birth_date, "1951-09-30");
    assert_eq!(fields.gender, "female");
    assert_eq!(fields.address, "705 Hirthe Common");
    assert_eq!(fields.city, "Bellingham");
    assert_eq!(fields.country, "US");

    assert_eq!(records.allergies.len(), 2);
    let RecordData::AllergyIntolerance(allergy) = &records.allergies[0].data else {
        panic!("expected an allergy record")
    };
    assert_eq!(allergy.coded.name.as_deref(), Some("Allergy to grass pollen"));
    assert_eq!(allergy.coded.code.as_deref(), Some("418689008"));
    assert_eq!(allergy.coded.code_system.as_deref(), Some("http://snomed.info/sct"));
    assert_eq!(allergy.criticality.as_deref(), Some("low"));
    assert_eq!(allergy.clinical_status.as_deref(), Some("active"));
    assert_eq!(allergy.category, Some(vec!["environment".to_owned()]));

    // Falls back to the concept's text when there is no coding.
    assert_eq!(records.allergies[1].name(), Some("Allergy to peanuts"));

    let RecordData::MedicationRequest(medication) = &records.medications[0].data else {
        panic!("expected a medication record")
    };
    assert_eq!(
        medication.coded.name.as_deref(),
        Some("lisinopril 10 MG Oral Tablet")
    );
    assert_eq!(
        medication.dosage_instructions,
        "With or after food. Quantity of 1, once per day."
    );

    assert_eq!(records.conditions[0].name(), Some("Hypertension"));
    assert_eq!(records.immunizations.len(), 1);
    assert!(records.procedures.is_empty());
    assert!(records.results.is_empty());
    assert!(records.devices.is_empty());

    assert_eq!(records.other.len(), 1);
    assert_eq!(records.other[0].kind(), ResourceKind::Unsupported);
    assert_eq!(
        records.other[0].name(),
        Some("Unsupported resource type: Observation")
    );
}

#[test]
fn records_serialize_flat() {
    let credential = smart_health_card();
    let records = normalize_all([&credential]);

    let json = serde_json::to_value(&records).unwrap();
    assert_eq!(
        json["allergies"][0],
        json!({
            "uri": "resource:1",
            "kind": "AllergyIntolerance",
            "name": "Allergy to grass pollen",
            "code": "418689008",
            "codeSystem": "http://snomed.info/sct",
            "criticality": "low",
            "clinicalStatus": "active",
            "verificationStatus": "confirmed",
            "recordedDate": "1962-05-13T05:39:42+00:00",
            "type": "allergy",
            "category": ["environment"]
        })
    );
    assert_eq!(json["immunizations"][0]["date"], "2021-10-18T05:39:42+00:00");
}

#[test]
fn credentials_accumulate_in_order() {
    let first = smart_health_card();
    let second = json!({
        "resourceType": "Bundle",
        "entry": [
            {
                "fullUrl": "urn:uuid:7e1f",
                "resource": {
                    "resourceType": "Patient",
                    "name": [{ "given": ["Someone"], "family": "Else" }]
                }
            },
            {
                "fullUrl": "urn:uuid:8a2c",
                "resource": {
                    "resourceType": "AllergyIntolerance",
                    "code": { "text": "Allergy to penicillin" }
                }
            }
        ]
    });

    let records = normalize_all([&first, &second]);

    assert_eq!(records.patient.as_ref().unwrap().uri, "resource:0");
    let allergies: Vec<_> = records.allergies.iter().filter_map(|r| r.name()).collect();
    assert_eq!(
        allergies,
        [
            "Allergy to grass pollen",
            "Allergy to peanuts",
            "Allergy to penicillin"
        ]
    );
}

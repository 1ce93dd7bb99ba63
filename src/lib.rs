//! This library drives the verifier side of an [OID4VP] presentation of health credentials,
//! and flattens the FHIR resources they carry into records an application can display.
//!
//! [OID4VP]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Presentation Sessions
//!
//! An [`Orchestrator`] runs one presentation session at a time against a verifier service:
//!
//! 1. it asks the verifier to create a transaction for a credential type,
//! 2. extracts the session identifier from the returned authorization URI and, optionally,
//!    renders the URI as a QR code for the wallet to scan,
//! 3. subscribes to the verifier's push notifications for that session,
//! 4. and completes once the verification result arrives.
//!
//! Prescriptions can be completed with the directory identifier of their medication by
//! configuring a [`MedicationLookup`](crate::verifier::medication::MedicationLookup).
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use oid4vp_session::config::Config;
//! use oid4vp_session::core::util::ReqwestClient;
//! use oid4vp_session::core::visual_code::QrCodeService;
//! use oid4vp_session::verifier::{websocket::WebSocketTransport, Orchestrator};
//!
//! let config = Config::from_env()?;
//! let http_client = Arc::new(ReqwestClient::new()?);
//!
//! let mut orchestrator = Orchestrator::builder()
//!     .with_config(config.clone())
//!     .with_http_client(http_client.clone())
//!     .with_transport(Arc::new(WebSocketTransport))
//!     .with_visual_encoder(Arc::new(QrCodeService::new(
//!         config.qr_code_endpoint()?,
//!         http_client,
//!     )))
//!     .build()?;
//!
//! let session = orchestrator.start(Some("SmartHealthCard")).await?;
//! let qr_code = session.visual_code().map(|code| code.to_data_url());
//!
//! // Once the wallet has presented its credentials.
//! let result = orchestrator.wait_for_result().await?;
//! if let Some(records) = result.health_records() {
//!     println!("{}", serde_json::to_string_pretty(records)?);
//! }
//! ```
//!
//! Progress can be observed without holding the orchestrator through
//! [`Orchestrator::subscribe`], and any session can be abandoned with [`Orchestrator::reset`].
//!
//! [`Orchestrator`]: crate::verifier::Orchestrator
//! [`Orchestrator::subscribe`]: crate::verifier::Orchestrator::subscribe
//! [`Orchestrator::reset`]: crate::verifier::Orchestrator::reset
//!
//! # Health Records
//!
//! The [`fhir`] module normalizes SMART Health Cards, FHIR bundles and bare FHIR resources
//! into [`NormalizedResources`], including a plain-language rendering of medication dosage
//! instructions. It can be used on its own:
//!
//! ```
//! use oid4vp_session::fhir::normalize_all;
//! use serde_json::json;
//!
//! let allergy = json!({
//!     "resourceType": "AllergyIntolerance",
//!     "id": "a1",
//!     "code": { "coding": [{ "display": "Grass pollen", "code": "418689008" }] }
//! });
//!
//! let records = normalize_all([&allergy]);
//! assert_eq!(records.allergies[0].uri, "AllergyIntolerance/a1");
//! assert_eq!(records.allergies[0].name(), Some("Grass pollen"));
//! ```
//!
//! [`NormalizedResources`]: crate::fhir::NormalizedResources

pub mod config;
pub mod core;
mod error;
pub mod fhir;
pub mod verifier;

pub use error::Error;

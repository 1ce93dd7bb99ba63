use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use http::{Request, Response, StatusCode};
use oid4vp_session::{
    config::{BaseUrl, Config},
    core::{util::AsyncHttpClient, visual_code::QrCodeService},
    verifier::{
        medication::MedicationDirectory,
        notification::{ChannelError, Connection, Transport},
        Orchestrator,
    },
};
use serde_json::{json, Value as Json};
use tokio::sync::mpsc;
use url::Url;

pub const BASE_URL: &str = "https://pis.example.com";

pub const SESSION_ID: &str = "RHQj1Xx9QovW";

pub const AUTHORIZATION_URI: &str = "openid4vp://authorize?response_type=vp_token&client_id=https%3A%2F%2Fpis.example.com%2Fopenid4vc%2Fverify&response_mode=direct_post&state=RHQj1Xx9QovW&presentation_definition_uri=https%3A%2F%2Fpis.example.com%2Fopenid4vc%2Fpd%2FRHQj1Xx9QovW&client_id_scheme=redirect_uri&nonce=42ddc87a-1d53-4f6b-89f2-b93075f13887&response_uri=https%3A%2F%2Fpis.example.com%2Fopenid4vc%2Fverify%2FRHQj1Xx9QovW";

pub const MEDICATION_SEARCH_URL: &str = "https://med.example.com/search/quick/terms/";

pub const PNG_HEADER: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

pub fn orchestrator(verifier: Arc<MockVerifier>, push: Arc<MockPush>) -> Orchestrator {
    let config = Config::new(BaseUrl::try_from(BASE_URL).unwrap());

    Orchestrator::builder()
        .with_config(config.clone())
        .with_http_client(verifier.clone())
        .with_transport(push)
        .with_visual_encoder(Arc::new(QrCodeService::new(
            config.qr_code_endpoint().unwrap(),
            verifier.clone(),
        )))
        .with_medication_lookup(Arc::new(MedicationDirectory::new(
            BaseUrl::try_from(MEDICATION_SEARCH_URL).unwrap(),
            verifier,
        )))
        .build()
        .unwrap()
}

pub fn smart_health_card() -> Json {
    serde_json::from_str(include_str!("fixtures/smart_health_card.json")).unwrap()
}

/// The terminal message of a presentation, as pushed by the verifier.
pub fn policy_results(vc: Json) -> Json {
    json!({
        "id": SESSION_ID,
        "policyResults": {
            "results": [
                {
                    "credential": "VerifiablePresentation",
                    "policyResults": [
                        { "policy": "signature", "is_success": true, "result": {} }
                    ]
                },
                {
                    "credential": "SmartHealthCard",
                    "policyResults": [
                        { "policy": "signature", "is_success": true, "result": { "vc": vc } }
                    ]
                }
            ]
        }
    })
}

/// Serves the verifier's HTTP endpoints, and the medication directory's.
#[derive(Debug, Default)]
pub struct MockVerifier {
    pub transaction_status: Option<StatusCode>,
    /// Directory entries by GTIN; unknown GTINs have no terms.
    pub medications: Vec<(&'static str, &'static str)>,
    pub requests: Mutex<Vec<Request<Vec<u8>>>>,
}

#[async_trait]
impl AsyncHttpClient for MockVerifier {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let path = request.uri().path().to_owned();
        self.requests.lock().unwrap().push(request);

        let response = match path.as_str() {
            "/vp/request" => {
                let status = self.transaction_status.unwrap_or(StatusCode::OK);
                let body = if status.is_success() {
                    format!("{AUTHORIZATION_URI}\n")
                } else {
                    "Invalid presentation definition".to_owned()
                };
                Response::builder().status(status).body(body.into_bytes())?
            }
            "/utils/qrcode" => Response::builder()
                .header("Content-Type", "image/png")
                .body(PNG_HEADER.to_vec())?,
            path if path.starts_with("/search/quick/terms/") => {
                let gtin = path.trim_start_matches("/search/quick/terms/");
                let terms: Vec<Json> = self
                    .medications
                    .iter()
                    .filter(|(known, _)| *known == gtin)
                    .map(|(_, pid)| json!({ "pid": pid, "title": "DAFALGAN Tabl 500 mg" }))
                    .collect();
                Response::builder()
                    .header("Content-Type", "application/json")
                    .body(serde_json::to_vec(&terms)?)?
            }
            _ => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(vec![])?,
        };
        Ok(response)
    }
}

/// Serves the verifier's push notifications; frames are queued until read.
#[derive(Debug, Default)]
pub struct MockPush {
    connections: Mutex<Vec<(Url, mpsc::UnboundedSender<Result<String, ChannelError>>)>>,
}

impl MockPush {
    pub fn targets(&self) -> Vec<Url> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// Send `frame` on the latest connection.
    pub fn push(&self, frame: impl ToString) {
        self.send(Ok(frame.to_string()))
    }

    pub fn fail(&self, error: ChannelError) {
        self.send(Err(error))
    }

    /// Close every connection from the verifier's side.
    pub fn disconnect(&self) {
        self.connections.lock().unwrap().clear();
    }

    fn send(&self, frame: Result<String, ChannelError>) {
        let connections = self.connections.lock().unwrap();
        let (_, frames) = connections.last().expect("no open connection");
        frames.send(frame).unwrap();
    }
}

#[async_trait]
impl Transport for MockPush {
    async fn connect(&self, target: &Url) -> Result<Box<dyn Connection>, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.lock().unwrap().push((target.clone(), tx));
        Ok(Box::new(MockConnection(rx)))
    }
}

struct MockConnection(mpsc::UnboundedReceiver<Result<String, ChannelError>>);

#[async_trait]
impl Connection for MockConnection {
    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        self.0.recv().await
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        self.0.close();
        Ok(())
    }
}

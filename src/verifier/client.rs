use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    Request,
};
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

use crate::{
    config::Config,
    core::{
        authorization_request::parameters::ResponseMode,
        util::{body_text, AsyncHttpClient},
    },
    Error,
};

/// Opens presentation transactions with a verifier.
#[async_trait]
pub trait PresentationRequester: Debug {
    /// Create a transaction requesting `credential_type` and return its authorization URI.
    async fn request_presentation(&self, credential_type: &str) -> Result<String, Error>;
}

/// Body of the verifier's transaction-creation call.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub authorize_base_url: String,
    pub response_mode: ResponseMode,
    pub success_redirect_uri: Option<Url>,
    pub error_redirect_uri: Option<Url>,
    pub status_callback_uri: Url,
    pub presentation_definition: RequestedCredentials,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestedCredentials {
    pub request_credentials: Vec<RequestedCredential>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestedCredential {
    pub format: String,
    #[serde(rename = "type")]
    pub credential_type: String,
}

/// A [PresentationRequester] talking to the verifier's `vp/request` endpoint.
#[derive(Clone)]
pub struct RequestClient {
    config: Config,
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
}

impl Debug for RequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RequestClient {
    pub fn new(config: Config, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// The transaction body requesting one `credential_type` credential.
    pub fn transaction_request(&self, credential_type: &str) -> Result<TransactionRequest, Error> {
        let status_callback_uri = self
            .config
            .status_callback_uri()
            .map_err(|e| Error::invalid_argument(format!("{e:#}")))?;

        Ok(TransactionRequest {
            authorize_base_url: self.config.authorize_base_url.clone(),
            response_mode: self.config.response_mode.clone(),
            success_redirect_uri: self.config.success_redirect_uri.clone(),
            error_redirect_uri: self.config.error_redirect_uri.clone(),
            status_callback_uri,
            presentation_definition: RequestedCredentials {
                request_credentials: vec![RequestedCredential {
                    format: self.config.credential_format.clone(),
                    credential_type: credential_type.to_owned(),
                }],
            },
        })
    }
}

#[async_trait]
impl PresentationRequester for RequestClient {
    async fn request_presentation(&self, credential_type: &str) -> Result<String, Error> {
        if credential_type.is_empty() {
            return Err(Error::invalid_argument("credential type is required"));
        }

        let endpoint = self
            .config
            .request_endpoint()
            .map_err(|e| Error::invalid_argument(format!("{e:#}")))?;
        let body = serde_json::to_vec(&self.transaction_request(credential_type)?)
            .map_err(Error::http)?;

        let request = Request::builder()
            .method("POST")
            .uri(endpoint.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/plain")
            .body(body)
            .map_err(Error::http)?;

        debug!(%endpoint, credential_type, "requesting presentation transaction");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(Error::http)?;

        let status = response.status();
        let body = body_text(&response);
        debug!(%status, "verifier answered transaction request");

        if !status.is_success() {
            error!(%status, body = %body, "presentation transaction was rejected");
            return Err(Error::RequestFailed { status, body });
        }

        let uri = body.trim();
        if uri.is_empty() {
            return Err(Error::EmptyResponse);
        }

        Ok(uri.to_owned())
    }
}

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use base64::prelude::*;
use http::{
    header::{ACCEPT, CONTENT_TYPE},
    Request,
};
use tracing::debug;
use url::Url;

use crate::{
    core::util::{body_text, AsyncHttpClient},
    Error,
};

/// Opaque image bytes encoding an authorization URI (typically a PNG QR code).
#[derive(Clone, PartialEq, Eq)]
pub struct VisualCode(Vec<u8>);

impl VisualCode {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Render as a `data:` URL that an image element can display directly.
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", BASE64_STANDARD.encode(&self.0))
    }
}

impl Debug for VisualCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VisualCode({} bytes)", self.0.len())
    }
}

/// Turns an authorization URI into a scannable code.
#[async_trait]
pub trait VisualEncoder: Debug {
    async fn encode(&self, text: &str) -> Result<VisualCode, Error>;
}

/// A [VisualEncoder] delegating to the verifier's QR code endpoint.
#[derive(Clone)]
pub struct QrCodeService {
    endpoint: Url,
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
}

impl Debug for QrCodeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QrCodeService")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl QrCodeService {
    pub fn new(endpoint: Url, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }
}

#[async_trait]
impl VisualEncoder for QrCodeService {
    async fn encode(&self, text: &str) -> Result<VisualCode, Error> {
        let request = Request::builder()
            .method("POST")
            .uri(self.endpoint.as_str())
            .header(CONTENT_TYPE, "text/plain")
            .header(ACCEPT, "image/png")
            .body(text.as_bytes().to_vec())
            .map_err(|e| Error::VisualCode(e.to_string()))?;

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(Error::http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RequestFailed {
                status,
                body: body_text(&response),
            });
        }

        let bytes = response.into_body();
        debug!("received {} byte visual code", bytes.len());
        Ok(VisualCode(bytes))
    }
}

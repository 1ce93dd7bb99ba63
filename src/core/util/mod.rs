use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{Request, Response};
use tracing::debug;

/// Carries every HTTP exchange of a presentation session: creating the transaction, rendering
/// its QR code and looking up prescribed medications.
///
/// Requests and responses are buffered; none of these exchanges stream. Implementations only
/// fail when no response was received, a non-success status is returned as a response.
#[async_trait]
pub trait AsyncHttpClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>>;
}

/// Upper bound on a single exchange with the verifier or the medication directory.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// An [AsyncHttpClient] over reqwest with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestClient(reqwest::Client);

impl AsRef<reqwest::Client> for ReqwestClient {
    fn as_ref(&self) -> &reqwest::Client {
        &self.0
    }
}

impl From<reqwest::Client> for ReqwestClient {
    fn from(client: reqwest::Client) -> Self {
        Self(client)
    }
}

impl ReqwestClient {
    /// A client giving up on any exchange after [DEFAULT_TIMEOUT].
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .context("unable to build http_client")
            .map(Self)
    }
}

#[async_trait]
impl AsyncHttpClient for ReqwestClient {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = self
            .0
            .execute(
                request
                    .try_into()
                    .with_context(|| format!("unable to convert request to {uri}"))?,
            )
            .await
            .with_context(|| format!("{method} {uri} failed"))?;

        debug!(%method, %uri, status = %response.status(), "http exchange");

        let mut builder = Response::builder()
            .status(response.status())
            .version(response.version());

        builder
            .headers_mut()
            .context("unable to set headers")?
            .extend(response.headers().clone());

        builder
            .body(
                response
                    .bytes()
                    .await
                    .context("failed to extract response body")?
                    .to_vec(),
            )
            .context("unable to construct response")
    }
}

/// Reads a response body as UTF-8, replacing invalid sequences so that diagnostics survive.
pub(crate) fn body_text(response: &Response<Vec<u8>>) -> String {
    String::from_utf8_lossy(response.body()).into_owned()
}

#[cfg(test)]
mod test {
    use http::{Request, Response, StatusCode};

    use super::*;

    #[test]
    fn lossy_body() {
        let response = Response::builder()
            .status(StatusCode::BAD_GATEWAY)
            .body(vec![b'o', b'k', 0xff])
            .unwrap();
        assert_eq!(body_text(&response), "ok\u{fffd}");
    }

    #[tokio::test]
    async fn relative_endpoint_is_rejected() {
        let client = ReqwestClient::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/vp/request")
            .body(b"{}".to_vec())
            .unwrap();

        let err = client.execute(request).await.unwrap_err();
        assert_eq!(err.to_string(), "unable to convert request to /vp/request");
    }
}

//! Resolution of prescribed medications against a medication directory.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use http::{header::ACCEPT, Request};
use serde_json::Value as Json;
use tracing::debug;
use url::Url;

use crate::{
    config::BaseUrl,
    core::util::{body_text, AsyncHttpClient},
    Error,
};

/// Directory searched when no other is configured.
pub const DEFAULT_MEDICATION_SEARCH_URL: &str = "https://med.mymedi.ch/search/quick/terms/";

/// Finds the product identifier (PID) of a medication from its GTIN.
#[async_trait]
pub trait MedicationLookup: Debug {
    async fn medication_pid(&self, gtin: &str) -> Result<String, Error>;
}

/// A [MedicationLookup] querying `<search_url>/<gtin>` and taking the `pid` of the first term.
#[derive(Clone)]
pub struct MedicationDirectory {
    search_url: BaseUrl,
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
}

impl Debug for MedicationDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MedicationDirectory")
            .field("search_url", &self.search_url.as_str())
            .finish_non_exhaustive()
    }
}

impl MedicationDirectory {
    pub fn new(search_url: BaseUrl, http_client: Arc<dyn AsyncHttpClient + Send + Sync>) -> Self {
        Self {
            search_url,
            http_client,
        }
    }

    fn term_url(&self, gtin: &str) -> Result<Url, Error> {
        let mut url: Url = (*self.search_url).clone();
        url.path_segments_mut()
            .map_err(|_| Error::invalid_argument("medication search URL cannot have a path"))?
            .pop_if_empty()
            .push(gtin);
        Ok(url)
    }
}

#[async_trait]
impl MedicationLookup for MedicationDirectory {
    async fn medication_pid(&self, gtin: &str) -> Result<String, Error> {
        if gtin.is_empty() {
            return Err(Error::invalid_argument("GTIN is required"));
        }

        let url = self.term_url(gtin)?;
        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header(ACCEPT, "application/json")
            .body(vec![])
            .map_err(Error::http)?;

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

        let terms: Json = serde_json::from_slice(response.body()).map_err(Error::http)?;
        debug!(gtin, terms = ?terms.as_array().map(Vec::len), "medication search");

        match terms.pointer("/0/pid") {
            Some(Json::String(pid)) if !pid.is_empty() => Ok(pid.clone()),
            Some(Json::Number(pid)) => Ok(pid.to_string()),
            _ => Err(Error::MedicationNotFound(gtin.to_owned())),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use anyhow::Result;
    use http::{Response, StatusCode};

    use super::*;

    #[derive(Default)]
    struct MockHttpClient {
        status: Option<StatusCode>,
        body: &'static str,
        requests: Mutex<Vec<Request<Vec<u8>>>>,
    }

    #[async_trait]
    impl AsyncHttpClient for MockHttpClient {
        async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
            self.requests.lock().unwrap().push(request);
            Ok(Response::builder()
                .status(self.status.unwrap_or(StatusCode::OK))
                .body(self.body.as_bytes().to_vec())?)
        }
    }

    fn directory(mock: Arc<MockHttpClient>) -> MedicationDirectory {
        MedicationDirectory::new(
            BaseUrl::try_from(DEFAULT_MEDICATION_SEARCH_URL).unwrap(),
            mock,
        )
    }

    #[tokio::test]
    async fn first_term_pid() {
        let mock = Arc::new(MockHttpClient {
            body: r#"[{ "pid": "1234567", "title": "DAFALGAN Tabl 500 mg" }, { "pid": "7654321" }]"#,
            ..Default::default()
        });

        let pid = directory(mock.clone())
            .medication_pid("7680475040157")
            .await
            .unwrap();
        assert_eq!(pid, "1234567");

        let requests = mock.requests.lock().unwrap();
        assert_eq!(requests[0].method(), "GET");
        assert_eq!(
            requests[0].uri(),
            "https://med.mymedi.ch/search/quick/terms/7680475040157"
        );
        assert_eq!(requests[0].headers()[ACCEPT], "application/json");
    }

    #[tokio::test]
    async fn numeric_pid() {
        let mock = Arc::new(MockHttpClient {
            body: r#"[{ "pid": 1234567 }]"#,
            ..Default::default()
        });

        assert_eq!(
            directory(mock).medication_pid("7680475040157").await.unwrap(),
            "1234567"
        );
    }

    #[tokio::test]
    async fn no_terms() {
        for body in ["[]", "{}", r#"[{ "title": "no pid" }]"#] {
            let mock = Arc::new(MockHttpClient {
                body,
                ..Default::default()
            });

            assert!(matches!(
                directory(mock).medication_pid("7680475040157").await,
                Err(Error::MedicationNotFound(gtin)) if gtin == "7680475040157"
            ));
        }
    }

    #[tokio::test]
    async fn directory_errors() {
        let mock = Arc::new(MockHttpClient {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            body: "maintenance",
            ..Default::default()
        });
        assert!(matches!(
            directory(mock).medication_pid("7680475040157").await,
            Err(Error::RequestFailed { body, .. }) if body == "maintenance"
        ));

        let mock = Arc::new(MockHttpClient {
            body: "<html>",
            ..Default::default()
        });
        assert!(matches!(
            directory(mock).medication_pid("7680475040157").await,
            Err(Error::Http(_))
        ));
    }
}

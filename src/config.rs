use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::core::authorization_request::parameters::ResponseMode;

/// Verifier service used when `PIS_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://pis.healthwallet.li";

/// Environment variable overriding the verifier service location.
pub const BASE_URL_ENV: &str = "PIS_BASE_URL";

/// Location of the verifier service and the defaults of every transaction opened with it.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub base: BaseUrl,
    #[serde(default = "default_authorize_base_url")]
    pub authorize_base_url: String,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default = "default_credential_format")]
    pub credential_format: String,
    #[serde(default)]
    pub success_redirect_uri: Option<Url>,
    #[serde(default)]
    pub error_redirect_uri: Option<Url>,
}

fn default_authorize_base_url() -> String {
    "openid4vp://authorize".into()
}

fn default_credential_format() -> String {
    "jwt_vc_json".into()
}

impl Config {
    pub fn new(base: BaseUrl) -> Self {
        Self {
            base,
            authorize_base_url: default_authorize_base_url(),
            response_mode: ResponseMode::default(),
            credential_format: default_credential_format(),
            success_redirect_uri: None,
            error_redirect_uri: None,
        }
    }

    /// Read the verifier location from `PIS_BASE_URL`, falling back to [DEFAULT_BASE_URL].
    pub fn from_env() -> Result<Self> {
        let base = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let base = BaseUrl::try_from(base)
            .with_context(|| format!("{BASE_URL_ENV} is not a valid URL"))?;
        Ok(Self::new(base))
    }

    /// Transaction-creation endpoint.
    pub fn request_endpoint(&self) -> Result<Url> {
        self.base
            .join("vp/request")
            .context("unable to build the request endpoint")
    }

    /// Where the verifier reports status changes of a transaction.
    pub fn status_callback_uri(&self) -> Result<Url> {
        self.base
            .join("vp/status")
            .context("unable to build the status callback URI")
    }

    pub fn qr_code_endpoint(&self) -> Result<Url> {
        self.base
            .join("utils/qrcode")
            .context("unable to build the QR code endpoint")
    }

    /// Push notification target for one transaction: `ws(s)://<host>/notifications/<session_id>`.
    pub fn notification_endpoint(&self, session_id: &str) -> Result<Url> {
        let mut url = self
            .base
            .join("notifications/")
            .context("unable to build the notification endpoint")?;
        {
            let Ok(mut path) = url.path_segments_mut() else {
                bail!("invalid base URL for the notification endpoint")
            };
            path.pop_if_empty().push(session_id);
        }
        let scheme = match url.scheme() {
            "http" => "ws",
            _ => "wss",
        };
        if url.set_scheme(scheme).is_err() {
            bail!("cannot derive a {scheme} URL from '{}'", self.base.as_str())
        }
        Ok(url)
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}

impl TryFrom<&str> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        url.to_owned().try_into()
    }
}

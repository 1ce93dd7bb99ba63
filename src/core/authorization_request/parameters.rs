use std::fmt;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use url::Url;

use crate::core::object::{TypedParameter, UntypedObject};

/// Declares a newtype parameter carried as a plain JSON string.
macro_rules! string_parameter {
    ($(#[$meta:meta])* $name:ident, $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl TypedParameter for $name {
            const KEY: &'static str = $key;
        }

        impl TryFrom<Json> for $name {
            type Error = Error;

            fn try_from(value: Json) -> Result<Self, Self::Error> {
                Ok(Self(serde_json::from_value(value)?))
            }
        }

        impl From<$name> for Json {
            fn from(value: $name) -> Self {
                Json::String(value.0)
            }
        }
    };
}

/// Declares a newtype parameter carried as a URL string.
macro_rules! url_parameter {
    ($(#[$meta:meta])* $name:ident, $key:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub Url);

        impl TypedParameter for $name {
            const KEY: &'static str = $key;
        }

        impl TryFrom<Json> for $name {
            type Error = Error;

            fn try_from(value: Json) -> Result<Self, Self::Error> {
                Ok(serde_json::from_value(value).map(Self)?)
            }
        }

        impl From<$name> for Json {
            fn from(value: $name) -> Self {
                value.0.to_string().into()
            }
        }
    };
}

string_parameter!(
    /// `state` field: the transaction identifier the verifier pushes notifications under.
    State,
    "state"
);
string_parameter!(Nonce, "nonce");
string_parameter!(ClientId, "client_id");
string_parameter!(ClientIdScheme, "client_id_scheme");
url_parameter!(
    /// `response_uri` field: where the wallet posts its response.
    ResponseUri,
    "response_uri"
);
url_parameter!(PresentationDefinitionUri, "presentation_definition_uri");

/// `client_metadata` field in the Authorization Request, transported as JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMetadata(pub UntypedObject);

impl TypedParameter for ClientMetadata {
    const KEY: &'static str = "client_metadata";
}

impl From<ClientMetadata> for Json {
    fn from(cm: ClientMetadata) -> Self {
        cm.0.into()
    }
}

impl TryFrom<Json> for ClientMetadata {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        match value {
            // Left as text when the decoder could not parse it.
            Json::String(s) => bail!("client_metadata is not a JSON object: {s}"),
            other => Ok(ClientMetadata(other.try_into()?)),
        }
    }
}

const DIRECT_POST: &str = "direct_post";
const DIRECT_POST_JWT: &str = "direct_post.jwt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ResponseMode {
    /// The `direct_post` response mode.
    DirectPost,
    /// The `direct_post.jwt` response mode.
    DirectPostJwt,
    /// A response mode this crate does not interpret, kept verbatim.
    Other(String),
}

impl TypedParameter for ResponseMode {
    const KEY: &'static str = "response_mode";
}

impl Default for ResponseMode {
    fn default() -> Self {
        Self::DirectPost
    }
}

impl From<String> for ResponseMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            DIRECT_POST => ResponseMode::DirectPost,
            DIRECT_POST_JWT => ResponseMode::DirectPostJwt,
            _ => ResponseMode::Other(s),
        }
    }
}

impl From<ResponseMode> for String {
    fn from(rm: ResponseMode) -> Self {
        match rm {
            ResponseMode::DirectPost => DIRECT_POST.into(),
            ResponseMode::DirectPostJwt => DIRECT_POST_JWT.into(),
            ResponseMode::Other(o) => o,
        }
    }
}

impl TryFrom<Json> for ResponseMode {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value::<String>(value)
            .map(Into::into)
            .map_err(Error::from)
    }
}

impl From<ResponseMode> for Json {
    fn from(rm: ResponseMode) -> Self {
        Json::String(rm.into())
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::DirectPost => DIRECT_POST,
            ResponseMode::DirectPostJwt => DIRECT_POST_JWT,
            ResponseMode::Other(o) => o,
        }
        .fmt(f)
    }
}

const VP_TOKEN: &str = "vp_token";
const VP_TOKEN_ID_TOKEN: &str = "vp_token id_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseType {
    VpToken,
    VpTokenIdToken,
    Other(String),
}

impl TypedParameter for ResponseType {
    const KEY: &'static str = "response_type";
}

impl From<String> for ResponseType {
    fn from(s: String) -> Self {
        match s.as_str() {
            VP_TOKEN => ResponseType::VpToken,
            VP_TOKEN_ID_TOKEN => ResponseType::VpTokenIdToken,
            _ => ResponseType::Other(s),
        }
    }
}

impl From<ResponseType> for String {
    fn from(rt: ResponseType) -> Self {
        match rt {
            ResponseType::VpToken => VP_TOKEN.into(),
            ResponseType::VpTokenIdToken => VP_TOKEN_ID_TOKEN.into(),
            ResponseType::Other(o) => o,
        }
    }
}

impl TryFrom<Json> for ResponseType {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        serde_json::from_value::<String>(value)
            .map(Into::into)
            .map_err(Error::from)
    }
}

impl From<ResponseType> for Json {
    fn from(rt: ResponseType) -> Self {
        Json::String(rt.into())
    }
}

//! Codec for `openid4vp://authorize?...` authorization request URIs.
//!
//! Values are percent-encoded component by component. Object-valued parameters (such as
//! `client_metadata`) travel as percent-encoded JSON text and are parsed back into objects
//! when decoded.

use std::{fmt, str::FromStr};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value as Json;

use crate::{
    core::object::{ParsingErrorContext, TypedParameter, UntypedObject},
    Error,
};

use self::parameters::{
    ClientId, ClientMetadata, Nonce, PresentationDefinitionUri, ResponseMode, ResponseType, State,
};

pub mod parameters;

/// Characters left untouched by a URI component encoder.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Build a query string from `params`.
///
/// String values are encoded verbatim, every other value is encoded as its JSON text.
/// ```
/// # use oid4vp_session::core::authorization_request::encode;
/// # use oid4vp_session::core::object::UntypedObject;
/// let params: UntypedObject = serde_json::from_value(serde_json::json!({
///     "state": "a b",
///     "client_metadata": { "alg": "ES256" }
/// })).unwrap();
///
/// let query = encode(&params);
/// assert!(query.contains("state=a%20b"));
/// assert!(query.contains("client_metadata=%7B%22alg%22%3A%22ES256%22%7D"));
/// ```
pub fn encode(params: &UntypedObject) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!(
                "{}={}",
                utf8_percent_encode(key, COMPONENT),
                utf8_percent_encode(&text, COMPONENT)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse the query parameters out of an authorization request URI.
///
/// Fails with [Error::MalformedUri] when the URI has no query component, or when a component
/// is not valid percent-encoded UTF-8. Values that look like JSON objects are parsed, falling
/// back to the decoded text when they are not valid JSON.
pub fn decode(uri: &str) -> Result<UntypedObject, Error> {
    let Some((_, query)) = uri.split_once('?') else {
        return Err(Error::malformed_uri("no query parameters found"));
    };
    if query.is_empty() {
        return Err(Error::malformed_uri("no query parameters found"));
    }
    decode_query(query)
}

fn decode_query(query: &str) -> Result<UntypedObject, Error> {
    let mut params = UntypedObject::default();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key)?;
        let value = decode_component(value)?;
        params.insert_raw(key, parse_value(value));
    }
    Ok(params)
}

fn decode_component(component: &str) -> Result<String, Error> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::malformed_uri(format!("invalid percent-encoding in '{component}': {e}")))
}

fn parse_value(decoded: String) -> Json {
    if decoded.starts_with('{') && decoded.ends_with('}') {
        if let Ok(object @ Json::Object(_)) = serde_json::from_str(&decoded) {
            return object;
        }
    }
    Json::String(decoded)
}

/// An authorization request URI, split into its base and its decoded parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationUri {
    base: String,
    params: UntypedObject,
}

impl AuthorizationUri {
    pub fn new(base: impl Into<String>, params: UntypedObject) -> Self {
        Self {
            base: base.into(),
            params,
        }
    }

    /// Base of the URI, e.g. `openid4vp://authorize`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn params(&self) -> &UntypedObject {
        &self.params
    }

    pub fn get<T: TypedParameter>(&self) -> Option<anyhow::Result<T>> {
        self.params.get()
    }

    /// The transaction identifier carried in the `state` parameter.
    pub fn state(&self) -> Result<State, Error> {
        let state: State = self
            .params
            .get()
            .parsing_error()
            .map_err(|e| Error::malformed_uri(format!("{e:#}")))?;
        if state.0.is_empty() {
            return Err(Error::malformed_uri("'state' is empty"));
        }
        Ok(state)
    }

    /// Identifier of the verifier, e.g. its response endpoint under the `redirect_uri` scheme.
    pub fn client_id(&self) -> Option<ClientId> {
        self.params.get().and_then(Result::ok)
    }

    /// Where the wallet fetches the presentation definition, when it is passed by reference.
    pub fn presentation_definition_uri(&self) -> Option<PresentationDefinitionUri> {
        self.params.get().and_then(Result::ok)
    }

    pub fn nonce(&self) -> Option<Nonce> {
        self.params.get().and_then(Result::ok)
    }

    pub fn response_type(&self) -> Option<ResponseType> {
        self.params.get().and_then(Result::ok)
    }

    pub fn response_mode(&self) -> Option<ResponseMode> {
        self.params.get().and_then(Result::ok)
    }

    pub fn client_metadata(&self) -> Option<ClientMetadata> {
        self.params.get().and_then(Result::ok)
    }
}

impl FromStr for AuthorizationUri {
    type Err = Error;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let params = decode(uri)?;
        let base = uri.split_once('?').map(|(base, _)| base).unwrap_or(uri);
        Ok(Self::new(base, params))
    }
}

impl fmt::Display for AuthorizationUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.base, encode(&self.params))
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::{
        parameters::{ClientIdScheme, ResponseUri},
        *,
    };

    fn object(value: Json) -> UntypedObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decode_verifier_uri() {
        let uri = "openid4vp://authorize?response_type=vp_token&client_id=http%3A%2F%2Fhost.docker.internal%3A7003%2Fopenid4vc%2Fverify&response_mode=direct_post&state=RHQj1Xx9QovW&presentation_definition_uri=http%3A%2F%2Fhost.docker.internal%3A7003%2Fopenid4vc%2Fpd%2FRHQj1Xx9QovW&client_id_scheme=redirect_uri&client_metadata=%7B%22authorization_encrypted_response_alg%22%3A%22ECDH-ES%22%2C%22authorization_encrypted_response_enc%22%3A%22A256GCM%22%7D&nonce=42ddc87a-1d53-4f6b-89f2-b93075f13887&response_uri=http%3A%2F%2Fhost.docker.internal%3A7003%2Fopenid4vc%2Fverify%2FRHQj1Xx9QovW";

        let uri: AuthorizationUri = uri.parse().unwrap();

        assert_eq!(uri.base(), "openid4vp://authorize");
        assert_eq!(uri.state().unwrap().0, "RHQj1Xx9QovW");
        assert_eq!(uri.response_type(), Some(ResponseType::VpToken));
        assert_eq!(uri.response_mode(), Some(ResponseMode::DirectPost));
        assert_eq!(
            uri.client_id().unwrap().0,
            "http://host.docker.internal:7003/openid4vc/verify"
        );
        assert_eq!(
            uri.presentation_definition_uri().unwrap().0.as_str(),
            "http://host.docker.internal:7003/openid4vc/pd/RHQj1Xx9QovW"
        );
        assert_eq!(
            uri.nonce(),
            Some(Nonce("42ddc87a-1d53-4f6b-89f2-b93075f13887".into()))
        );
        assert_eq!(
            uri.get::<ClientIdScheme>().unwrap().unwrap().0,
            "redirect_uri"
        );
        assert_eq!(
            uri.get::<ResponseUri>().unwrap().unwrap().0.as_str(),
            "http://host.docker.internal:7003/openid4vc/verify/RHQj1Xx9QovW"
        );
        assert_eq!(
            uri.client_metadata().unwrap().0,
            object(json!({
                "authorization_encrypted_response_alg": "ECDH-ES",
                "authorization_encrypted_response_enc": "A256GCM"
            }))
        );
    }

    #[test]
    fn missing_query_is_malformed() {
        assert!(matches!(
            decode("openid4vp://authorize"),
            Err(Error::MalformedUri(_))
        ));
        assert!(matches!(
            decode("openid4vp://authorize?"),
            Err(Error::MalformedUri(_))
        ));
    }

    #[test]
    fn missing_state_is_malformed() {
        let uri: AuthorizationUri = "openid4vp://authorize?nonce=1".parse().unwrap();
        assert!(matches!(uri.state(), Err(Error::MalformedUri(_))));

        let uri: AuthorizationUri = "openid4vp://authorize?state=&nonce=1".parse().unwrap();
        assert!(matches!(uri.state(), Err(Error::MalformedUri(_))));
    }

    #[test]
    fn invalid_json_object_stays_text() {
        let params = decode("openid4vp://authorize?client_metadata=%7Bnot%20json%7D").unwrap();
        assert_eq!(
            params.get_raw("client_metadata"),
            Some(&json!("{not json}"))
        );
    }

    #[test]
    fn plus_is_not_a_space() {
        let params = decode("openid4vp://authorize?nonce=a+b").unwrap();
        assert_eq!(params.get_raw("nonce"), Some(&json!("a+b")));
    }

    #[test]
    fn round_trip() {
        let params = object(json!({
            "response_type": "vp_token",
            "state": "abc/def ghi",
            "nonce": "äöü&=?",
            "client_metadata": {
                "authorization_encrypted_response_alg": "ECDH-ES",
                "nested": { "list": [1, 2, 3] }
            }
        }));

        assert_eq!(decode(&format!("openid4vp://authorize?{}", encode(&params))).unwrap(), params);

        // Other scalars travel as their JSON text and come back as strings.
        let scalars = object(json!({ "n": 42, "b": true }));
        assert_eq!(encode(&scalars), "n=42&b=true");
        assert_eq!(
            decode(&format!("openid4vp://authorize?{}", encode(&scalars))).unwrap(),
            object(json!({ "n": "42", "b": "true" }))
        );
    }

    #[test]
    fn display_reencodes() {
        let uri: AuthorizationUri = "openid4vp://authorize?state=abc&nonce=1".parse().unwrap();
        let reparsed: AuthorizationUri = uri.to_string().parse().unwrap();
        assert_eq!(uri, reparsed);
    }
}

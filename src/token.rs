//! Token endpoint request body and response validation.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::{Error, Result};

/// `grant_type` for the OAuth2 JWT-bearer grant (RFC 7523).
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Form body for exchanging a signed assertion at the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRequest {
    assertion: String,
}

impl TokenRequest {
    /// Wraps a compact JWT produced by
    /// [`JwtAssertionBuilder`](crate::JwtAssertionBuilder).
    pub fn new(assertion: String) -> Self {
        Self { assertion }
    }

    /// The signed assertion.
    pub fn assertion(&self) -> &str {
        &self.assertion
    }

    /// Content type of [`TokenRequest::form_body`].
    pub fn content_type(&self) -> &'static str {
        "application/x-www-form-urlencoded"
    }

    /// The url-encoded `grant_type` and `assertion` pair.
    pub fn form_body(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT_TYPE)
            .append_pair("assertion", &self.assertion)
            .finish()
    }
}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &JWT_BEARER_GRANT_TYPE)
            .finish_non_exhaustive()
    }
}

/// A successful token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    /// Bearer token for API calls. Never empty.
    pub access_token: String,
    /// Base URL of the instance the token is valid for. Never empty.
    pub instance_url: String,
    /// Identity URL of the user.
    pub id: Option<String>,
    /// Usually `Bearer`.
    pub token_type: Option<String>,
    /// Issue time as reported by the provider (milliseconds since the epoch
    /// for Salesforce).
    #[serde(deserialize_with = "string_or_number")]
    pub issued_at: Option<String>,
    /// Provider signature over `id` and `issued_at`.
    pub signature: Option<String>,
    /// Token lifetime in seconds, when the provider reports one.
    #[serde(deserialize_with = "integer_or_string")]
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    /// Parses a token endpoint body. Field names match case-insensitively and
    /// unknown fields are ignored; `access_token` and `instance_url` must be
    /// present and non-empty.
    pub fn parse(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body).map_err(|e| {
            warn!(error = %e, "token response is not valid JSON");
            Error::MalformedResponse(e.to_string())
        })?;

        let Value::Object(fields) = value else {
            warn!("token response is not a JSON object");
            return Err(Error::MalformedResponse(
                "expected a JSON object".to_string(),
            ));
        };

        let response: TokenResponse =
            serde_json::from_value(Value::Object(fold_keys(fields))).map_err(|e| {
                warn!(error = %e, "token response has unexpected field types");
                Error::MalformedResponse(e.to_string())
            })?;

        for (name, value) in [
            ("access_token", &response.access_token),
            ("instance_url", &response.instance_url),
        ] {
            if value.is_empty() {
                warn!(field = name, "token response is missing a required field");
                return Err(Error::MissingField(name));
            }
        }

        debug!(instance_url = %response.instance_url, "parsed token response");
        Ok(response)
    }
}

/// Lower-cases every key and drops `null` members. When two spellings collide
/// after folding, one of them wins; which one follows the map's iteration order.
fn fold_keys(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => Some(s),
        StringOrNumber::Number(n) => Some(n.to_string()),
    })
}

fn integer_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expires_in `{n}` is not a non-negative integer"))),
        StringOrNumber::String(s) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expires_in `{s}` is not an integer"))),
    }
}

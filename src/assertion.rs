//! RS256 JWT assertion construction.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::key::RsaPrivateKeyMaterial;

/// How long an assertion stays valid after it is signed.
pub const ASSERTION_LIFETIME_SECS: i64 = 300;

#[derive(Debug, Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

const RS256_HEADER: JwtHeader = JwtHeader {
    alg: "RS256",
    typ: "JWT",
};

/// Registered claims carried by a JWT-bearer assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// OAuth client identifier.
    pub iss: String,
    /// User the token is requested for.
    pub sub: String,
    /// Login URL of the identity provider.
    pub aud: String,
    /// Expiry, in seconds since the Unix epoch.
    pub exp: i64,
}

/// Builds signed assertions for one client/user/audience triple.
///
/// The identity is validated once in [`JwtAssertionBuilder::new`]; every
/// call to [`build`](JwtAssertionBuilder::build) then produces a fresh token
/// expiring [`ASSERTION_LIFETIME_SECS`] after the signing instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtAssertionBuilder {
    client_id: String,
    username: String,
    login_url: String,
    login_endpoint: Url,
}

impl JwtAssertionBuilder {
    /// Validates the identity fields. `login_url` has to be an absolute
    /// `http` or `https` URL and is used verbatim as the `aud` claim.
    pub fn new(
        client_id: impl Into<String>,
        username: impl Into<String>,
        login_url: impl Into<String>,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let username = username.into();
        let login_url = login_url.into();

        require_non_empty("client_id", &client_id)?;
        require_non_empty("username", &username)?;
        let login_endpoint = parse_login_url(&login_url)?;

        Ok(Self {
            client_id,
            username,
            login_url,
            login_endpoint,
        })
    }

    /// The `aud` value, exactly as supplied.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// `login_url` as a parsed URL, for resolving endpoints against.
    pub(crate) fn login_endpoint(&self) -> &Url {
        &self.login_endpoint
    }

    /// Claims for an assertion signed at `issued_at`.
    pub fn claims_at(&self, issued_at: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            iss: self.client_id.clone(),
            sub: self.username.clone(),
            aud: self.login_url.clone(),
            exp: issued_at.timestamp() + ASSERTION_LIFETIME_SECS,
        }
    }

    /// Signs an assertion valid from now.
    pub fn build(&self, key: &RsaPrivateKeyMaterial) -> Result<String> {
        self.build_at(key, Utc::now())
    }

    /// Signs an assertion as of `issued_at`, returning the compact
    /// `header.claims.signature` serialization.
    pub fn build_at(&self, key: &RsaPrivateKeyMaterial, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = self.claims_at(issued_at);
        let signing_input = format!(
            "{}.{}",
            encode_segment(&RS256_HEADER)?,
            encode_segment(&claims)?
        );

        let signature = sign_rs256(key, signing_input.as_bytes())?;

        debug!(
            iss = %claims.iss,
            aud = %claims.aud,
            exp = claims.exp,
            "signed JWT bearer assertion"
        );
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!("{name} must not be empty")));
    }
    Ok(())
}

/// Parses `login_url`, accepting only absolute `http`/`https` URLs with a host.
fn parse_login_url(login_url: &str) -> Result<Url> {
    let url = Url::parse(login_url).map_err(|e| {
        Error::InvalidArgument(format!("login_url `{login_url}` is not an absolute URL: {e}"))
    })?;

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        scheme => Err(Error::InvalidArgument(format!(
            "login_url must be an http or https URL with a host, got scheme `{scheme}`"
        ))),
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_vec(value)
        .map_err(|e| Error::SigningFailure(format!("failed to serialize JWT segment: {e}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// RSASSA-PKCS1-v1_5 over SHA-256.
fn sign_rs256(key: &RsaPrivateKeyMaterial, message: &[u8]) -> Result<Vec<u8>> {
    let signing_key = SigningKey::<Sha256>::new(rsa_private_key(key)?);
    let signature = signing_key
        .try_sign(message)
        .map_err(|e| Error::SigningFailure(e.to_string()))?;
    Ok(signature.to_vec())
}

/// Rebuilds an `rsa` key from the extracted integers. The `rsa` crate
/// recomputes the CRT values from `d`, `p` and `q`, so the ones carried in
/// the DER are checked against them here.
fn rsa_private_key(key: &RsaPrivateKeyMaterial) -> Result<RsaPrivateKey> {
    let int = BigUint::from_bytes_be;
    let one = BigUint::from(1u32);

    let d = int(key.private_exponent());
    let p = int(key.prime1());
    let q = int(key.prime2());
    if p <= one || q <= one {
        return Err(Error::SigningFailure("RSA primes must be greater than one".into()));
    }

    if &d % (&p - &one) != int(key.exponent1()) {
        return Err(Error::SigningFailure("exponent1 is not d mod (p-1)".into()));
    }
    if &d % (&q - &one) != int(key.exponent2()) {
        return Err(Error::SigningFailure("exponent2 is not d mod (q-1)".into()));
    }
    if (&q * int(key.coefficient())) % &p != one {
        return Err(Error::SigningFailure("coefficient is not q^-1 mod p".into()));
    }

    let private_key = RsaPrivateKey::from_components(
        int(key.modulus()),
        int(key.public_exponent()),
        d,
        vec![p, q],
    )
    .map_err(|e| Error::SigningFailure(e.to_string()))?;
    private_key
        .validate()
        .map_err(|e| Error::SigningFailure(e.to_string()))?;

    Ok(private_key)
}

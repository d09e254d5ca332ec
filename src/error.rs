use thiserror::Error;

use crate::der::DerError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for everything that can go wrong between a PEM key and a
/// parsed token response.
///
/// Every variant is terminal for the call that produced it: no partial key
/// material or half-built assertion is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The text did not contain a well-formed `RSA PRIVATE KEY` or `PRIVATE KEY` PEM block.
    #[error("malformed PEM: {0}")]
    MalformedPem(&'static str),

    /// The PEM body was not valid base64.
    #[error("invalid base64 in PEM body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The DER structure did not have the shape of an RSA private key.
    #[error("invalid RSA key structure while reading `{field}`: {source}")]
    InvalidKeyStructure {
        /// The ASN.1 field being parsed when the problem was detected.
        field: &'static str,
        /// The underlying DER failure, carrying the byte offset.
        #[source]
        source: DerError,
    },

    /// The `RSAPrivateKey` version was not `0` (two-prime).
    #[error("unsupported RSA key version {version:02x?}")]
    UnsupportedKeyVersion {
        /// Content bytes of the version INTEGER.
        version: Vec<u8>,
    },

    /// A caller supplied identity or URL field was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The RSA primitive refused the extracted key material.
    #[error("signing failed: {0}")]
    SigningFailure(String),

    /// The token endpoint body was not a JSON object of the expected shape.
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// A required token response field was absent, `null` or empty.
    #[error("token response is missing required field `{0}`")]
    MissingField(&'static str),
}

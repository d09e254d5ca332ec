//! RSA private key extraction from PKCS#1 and PKCS#8 DER.
//!
//! ```text
//! RSAPrivateKey ::= SEQUENCE {              -- PKCS#1
//!     version           INTEGER,  -- 0
//!     modulus           INTEGER,  -- n
//!     publicExponent    INTEGER,  -- e
//!     privateExponent   INTEGER,  -- d
//!     prime1            INTEGER,  -- p
//!     prime2            INTEGER,  -- q
//!     exponent1         INTEGER,  -- d mod (p-1)
//!     exponent2         INTEGER,  -- d mod (q-1)
//!     coefficient       INTEGER,  -- (inverse of q) mod p
//! }
//!
//! PrivateKeyInfo ::= SEQUENCE {             -- PKCS#8
//!     version                   INTEGER,  -- 0
//!     privateKeyAlgorithm       AlgorithmIdentifier,
//!     privateKey                OCTET STRING,  -- RSAPrivateKey
//! }
//! ```

use std::fmt;

use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::der::{DerError, DerNode, DerReader, Tag};
use crate::error::{Error, Result};
use crate::pem;

/// The eight integers of a two-prime RSA private key, each as unsigned
/// big-endian bytes without a sign pad.
///
/// Buffers are wiped when the value is dropped.
#[derive(PartialEq, Eq)]
pub struct RsaPrivateKeyMaterial {
    modulus: Vec<u8>,
    public_exponent: Vec<u8>,
    private_exponent: Vec<u8>,
    prime1: Vec<u8>,
    prime2: Vec<u8>,
    exponent1: Vec<u8>,
    exponent2: Vec<u8>,
    coefficient: Vec<u8>,
}

impl RsaPrivateKeyMaterial {
    /// Decodes the first `RSA PRIVATE KEY` or `PRIVATE KEY` block of `pem`
    /// and extracts the key from the DER inside.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let der = Zeroizing::new(pem::decode(pem)?);
        Self::from_der(&der)
    }

    /// Extracts the key from PKCS#1 `RSAPrivateKey` DER, unwrapping a PKCS#8
    /// `PrivateKeyInfo` envelope first when one is present.
    ///
    /// Elements after `coefficient` are not read.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let fields = match KeyShape::classify(der)? {
            KeyShape::Pkcs1(fields) => fields,
            KeyShape::Pkcs8(private_key) => {
                debug!(
                    offset = private_key.content_offset,
                    len = private_key.len(),
                    "unwrapping PKCS#8 PrivateKeyInfo"
                );
                let (version, fields) = open(private_key.children())?;
                check_version(version)?;
                fields
            }
        };

        let key = read_fields(fields)?;
        debug!(modulus_bits = key.modulus_bits(), "extracted RSA private key");
        Ok(key)
    }

    /// `n`
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// `e`
    pub fn public_exponent(&self) -> &[u8] {
        &self.public_exponent
    }

    /// `d`
    pub fn private_exponent(&self) -> &[u8] {
        &self.private_exponent
    }

    /// `p`
    pub fn prime1(&self) -> &[u8] {
        &self.prime1
    }

    /// `q`
    pub fn prime2(&self) -> &[u8] {
        &self.prime2
    }

    /// `d mod (p-1)`
    pub fn exponent1(&self) -> &[u8] {
        &self.exponent1
    }

    /// `d mod (q-1)`
    pub fn exponent2(&self) -> &[u8] {
        &self.exponent2
    }

    /// `q^-1 mod p`
    pub fn coefficient(&self) -> &[u8] {
        &self.coefficient
    }

    /// Size of the modulus in bits.
    pub fn modulus_bits(&self) -> usize {
        match self.modulus.iter().position(|b| *b != 0) {
            Some(first) => {
                (self.modulus.len() - first) * 8
                    - self.modulus[first].leading_zeros() as usize
            }
            None => 0,
        }
    }
}

impl fmt::Debug for RsaPrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKeyMaterial")
            .field("modulus_bits", &self.modulus_bits())
            .finish_non_exhaustive()
    }
}

impl Drop for RsaPrivateKeyMaterial {
    fn drop(&mut self) {
        self.modulus.zeroize();
        self.public_exponent.zeroize();
        self.private_exponent.zeroize();
        self.prime1.zeroize();
        self.prime2.zeroize();
        self.exponent1.zeroize();
        self.exponent2.zeroize();
        self.coefficient.zeroize();
    }
}

/// What the outer SEQUENCE turned out to be.
enum KeyShape<'a> {
    /// `RSAPrivateKey`, positioned just after a zero version.
    Pkcs1(DerReader<'a>),
    /// `PrivateKeyInfo`; holds the `privateKey` OCTET STRING.
    Pkcs8(DerNode<'a>),
}

impl<'a> KeyShape<'a> {
    fn classify(der: &'a [u8]) -> Result<Self> {
        let (version, mut fields) = open(DerReader::new(der))?;

        if is_zero(version) && fields.peek_tag() == Ok(Tag::Sequence) {
            fields
                .skip_node()
                .map_err(invalid("privateKeyAlgorithm"))?;
            let private_key = fields
                .read_octet_string()
                .map_err(invalid("privateKey"))?;
            return Ok(KeyShape::Pkcs8(private_key));
        }

        check_version(version)?;
        Ok(KeyShape::Pkcs1(fields))
    }
}

/// Enters the outer SEQUENCE and reads its leading version INTEGER.
fn open(mut reader: DerReader<'_>) -> Result<(&[u8], DerReader<'_>)> {
    let mut fields = reader.read_sequence().map_err(invalid("RSAPrivateKey"))?;
    let version = fields.read_integer().map_err(invalid("version"))?;
    Ok((version, fields))
}

fn check_version(version: &[u8]) -> Result<()> {
    if is_zero(version) {
        Ok(())
    } else {
        Err(Error::UnsupportedKeyVersion {
            version: version.to_vec(),
        })
    }
}

fn read_fields(mut fields: DerReader<'_>) -> Result<RsaPrivateKeyMaterial> {
    let mut next = |field: &'static str| {
        fields
            .read_integer()
            .map(<[u8]>::to_vec)
            .map_err(invalid(field))
    };

    Ok(RsaPrivateKeyMaterial {
        modulus: next("modulus")?,
        public_exponent: next("publicExponent")?,
        private_exponent: next("privateExponent")?,
        prime1: next("prime1")?,
        prime2: next("prime2")?,
        exponent1: next("exponent1")?,
        exponent2: next("exponent2")?,
        coefficient: next("coefficient")?,
    })
}

fn is_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

fn invalid(field: &'static str) -> impl FnOnce(DerError) -> Error {
    move |source| Error::InvalidKeyStructure { field, source }
}

//! COSE public key decoding
//!
//! Credential public keys arrive as COSE_Key maps (RFC 8152, integer keys)
//! embedded in attested credential data. This module gives them a typed view
//! and re-encodes them bit-compatibly through `coset`.

use coset::iana::{self, EnumI64};
use coset::{CborSerializable, CoseKey, Label};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::cbor;
use crate::error::{WebAuthnError, WebAuthnResult};

/// COSE algorithm identifiers this relying party understands.
///
/// ES512 is recognized on the wire but has no verification backend; it is
/// rejected at configuration time and reported as unsupported when a response
/// carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    /// ECDSA over P-256 with SHA-256 (-7)
    Es256,
    /// EdDSA over Ed25519 (-8)
    Eddsa,
    /// ECDSA over P-384 with SHA-384 (-35)
    Es384,
    /// ECDSA over P-521 with SHA-512 (-36)
    Es512,
    /// RSASSA-PSS with SHA-256 (-37)
    Ps256,
    /// RSASSA-PKCS1-v1_5 with SHA-256 (-257)
    Rs256,
}

impl CoseAlgorithm {
    pub fn id(self) -> i64 {
        match self {
            CoseAlgorithm::Es256 => -7,
            CoseAlgorithm::Eddsa => -8,
            CoseAlgorithm::Es384 => -35,
            CoseAlgorithm::Es512 => -36,
            CoseAlgorithm::Ps256 => -37,
            CoseAlgorithm::Rs256 => -257,
        }
    }

    fn to_iana(self) -> iana::Algorithm {
        match self {
            CoseAlgorithm::Es256 => iana::Algorithm::ES256,
            CoseAlgorithm::Eddsa => iana::Algorithm::EdDSA,
            CoseAlgorithm::Es384 => iana::Algorithm::ES384,
            CoseAlgorithm::Es512 => iana::Algorithm::ES512,
            CoseAlgorithm::Ps256 => iana::Algorithm::PS256,
            CoseAlgorithm::Rs256 => iana::Algorithm::RS256,
        }
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = WebAuthnError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -7 => Ok(CoseAlgorithm::Es256),
            -8 => Ok(CoseAlgorithm::Eddsa),
            -35 => Ok(CoseAlgorithm::Es384),
            -36 => Ok(CoseAlgorithm::Es512),
            -37 => Ok(CoseAlgorithm::Ps256),
            -257 => Ok(CoseAlgorithm::Rs256),
            other => Err(WebAuthnError::UnsupportedAlgorithm(other)),
        }
    }
}

impl Serialize for CoseAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.id())
    }
}

impl<'de> Deserialize<'de> for CoseAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = i64::deserialize(deserializer)?;
        CoseAlgorithm::try_from(id).map_err(D::Error::custom)
    }
}

/// Elliptic curves carried in EC2 keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    fn crv(self) -> i64 {
        match self {
            EcCurve::P256 => iana::EllipticCurve::P_256.to_i64(),
            EcCurve::P384 => iana::EllipticCurve::P_384.to_i64(),
            EcCurve::P521 => iana::EllipticCurve::P_521.to_i64(),
        }
    }

    fn coordinate_length(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

const CRV_ED25519: i64 = 6;
const MAX_RSA_MODULUS_BYTES: usize = 1024;
const MAX_RSA_EXPONENT_BYTES: usize = 8;

/// Typed credential public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosePublicKey {
    Ec2 { alg: CoseAlgorithm, curve: EcCurve, x: Vec<u8>, y: Vec<u8> },
    Rsa { alg: CoseAlgorithm, n: Vec<u8>, e: Vec<u8> },
    Okp { alg: CoseAlgorithm, x: Vec<u8> },
}

impl CosePublicKey {
    pub fn alg(&self) -> CoseAlgorithm {
        match self {
            CosePublicKey::Ec2 { alg, .. }
            | CosePublicKey::Rsa { alg, .. }
            | CosePublicKey::Okp { alg, .. } => *alg,
        }
    }

    /// Decodes a COSE_Key, enforcing kty/alg/curve consistency and coordinate
    /// lengths. The input must be exactly one CBOR map.
    pub fn decode(data: &[u8]) -> WebAuthnResult<Self> {
        // Strict pre-pass: duplicate labels and trailing bytes are malformed.
        cbor::decode(data)?;
        let key = CoseKey::from_slice(data)
            .map_err(|e| WebAuthnError::MalformedData(format!("COSE key: {e}")))?;

        let alg = match &key.alg {
            Some(coset::Algorithm::Assigned(a)) => CoseAlgorithm::try_from(a.to_i64())?,
            Some(coset::Algorithm::PrivateUse(id)) => {
                return Err(WebAuthnError::UnsupportedAlgorithm(*id))
            }
            Some(coset::Algorithm::Text(_)) => {
                return Err(WebAuthnError::MalformedData("textual COSE alg label".to_string()))
            }
            None => return Err(WebAuthnError::MalformedData("COSE key missing alg".to_string())),
        };

        match key.kty {
            coset::KeyType::Assigned(iana::KeyType::EC2) => Self::decode_ec2(&key, alg),
            coset::KeyType::Assigned(iana::KeyType::RSA) => Self::decode_rsa(&key, alg),
            coset::KeyType::Assigned(iana::KeyType::OKP) => Self::decode_okp(&key, alg),
            _ => Err(WebAuthnError::MalformedData("unsupported COSE key type".to_string())),
        }
    }

    fn decode_ec2(key: &CoseKey, alg: CoseAlgorithm) -> WebAuthnResult<Self> {
        let curve = match alg {
            CoseAlgorithm::Es256 => EcCurve::P256,
            CoseAlgorithm::Es384 => EcCurve::P384,
            CoseAlgorithm::Es512 => EcCurve::P521,
            _ => {
                return Err(WebAuthnError::MalformedData(
                    "EC2 key with non-ECDSA algorithm".to_string(),
                ))
            }
        };
        let crv = param_int(key, -1)
            .ok_or_else(|| WebAuthnError::MalformedData("EC2 key missing crv".to_string()))?;
        if crv != curve.crv() {
            return Err(WebAuthnError::MalformedData("EC2 curve does not match alg".to_string()));
        }
        let x = param_bytes(key, -2)
            .ok_or_else(|| WebAuthnError::MalformedData("EC2 key missing x".to_string()))?;
        let y = param_bytes(key, -3)
            .ok_or_else(|| WebAuthnError::MalformedData("EC2 key missing y".to_string()))?;
        let expected = curve.coordinate_length();
        if x.len() != expected || y.len() != expected {
            return Err(WebAuthnError::MalformedData("EC2 coordinate length".to_string()));
        }
        Ok(CosePublicKey::Ec2 { alg, curve, x, y })
    }

    fn decode_rsa(key: &CoseKey, alg: CoseAlgorithm) -> WebAuthnResult<Self> {
        if !matches!(alg, CoseAlgorithm::Rs256 | CoseAlgorithm::Ps256) {
            return Err(WebAuthnError::MalformedData(
                "RSA key with non-RSA algorithm".to_string(),
            ));
        }
        let n = param_bytes(key, -1)
            .ok_or_else(|| WebAuthnError::MalformedData("RSA key missing modulus".to_string()))?;
        let e = param_bytes(key, -2)
            .ok_or_else(|| WebAuthnError::MalformedData("RSA key missing exponent".to_string()))?;
        if n.is_empty() || n.len() > MAX_RSA_MODULUS_BYTES {
            return Err(WebAuthnError::MalformedData("RSA modulus length".to_string()));
        }
        if e.is_empty() || e.len() > MAX_RSA_EXPONENT_BYTES {
            return Err(WebAuthnError::MalformedData("RSA exponent length".to_string()));
        }
        Ok(CosePublicKey::Rsa { alg, n, e })
    }

    fn decode_okp(key: &CoseKey, alg: CoseAlgorithm) -> WebAuthnResult<Self> {
        if alg != CoseAlgorithm::Eddsa {
            return Err(WebAuthnError::MalformedData(
                "OKP key with non-EdDSA algorithm".to_string(),
            ));
        }
        let crv = param_int(key, -1)
            .ok_or_else(|| WebAuthnError::MalformedData("OKP key missing crv".to_string()))?;
        if crv != CRV_ED25519 {
            return Err(WebAuthnError::MalformedData("unsupported OKP curve".to_string()));
        }
        let x = param_bytes(key, -2)
            .ok_or_else(|| WebAuthnError::MalformedData("OKP key missing x".to_string()))?;
        if x.len() != 32 {
            return Err(WebAuthnError::MalformedData("Ed25519 key length".to_string()));
        }
        Ok(CosePublicKey::Okp { alg, x })
    }

    /// Re-encodes as a COSE_Key map with integer keys.
    pub fn encode(&self) -> WebAuthnResult<Vec<u8>> {
        let key = match self {
            CosePublicKey::Ec2 { alg, curve, x, y } => CoseKey {
                kty: coset::KeyType::Assigned(iana::KeyType::EC2),
                alg: Some(coset::Algorithm::Assigned(alg.to_iana())),
                params: vec![
                    (Label::Int(-1), ciborium::Value::from(curve.crv())),
                    (Label::Int(-2), ciborium::Value::Bytes(x.clone())),
                    (Label::Int(-3), ciborium::Value::Bytes(y.clone())),
                ],
                ..Default::default()
            },
            CosePublicKey::Rsa { alg, n, e } => CoseKey {
                kty: coset::KeyType::Assigned(iana::KeyType::RSA),
                alg: Some(coset::Algorithm::Assigned(alg.to_iana())),
                params: vec![
                    (Label::Int(-1), ciborium::Value::Bytes(n.clone())),
                    (Label::Int(-2), ciborium::Value::Bytes(e.clone())),
                ],
                ..Default::default()
            },
            CosePublicKey::Okp { alg, x } => CoseKey {
                kty: coset::KeyType::Assigned(iana::KeyType::OKP),
                alg: Some(coset::Algorithm::Assigned(alg.to_iana())),
                params: vec![
                    (Label::Int(-1), ciborium::Value::from(CRV_ED25519)),
                    (Label::Int(-2), ciborium::Value::Bytes(x.clone())),
                ],
                ..Default::default()
            },
        };
        key.to_vec()
            .map_err(|e| WebAuthnError::InternalCryptoError(format!("COSE encode: {e}")))
    }
}

fn param_int(key: &CoseKey, label: i64) -> Option<i64> {
    key.params
        .iter()
        .find(|(l, _)| *l == Label::Int(label))
        .and_then(|(_, v)| v.as_integer())
        .and_then(|i| i64::try_from(i).ok())
}

fn param_bytes(key: &CoseKey, label: i64) -> Option<Vec<u8>> {
    key.params
        .iter()
        .find(|(l, _)| *l == Label::Int(label))
        .and_then(|(_, v)| v.as_bytes())
        .map(|b| b.to_vec())
}

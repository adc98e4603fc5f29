//! `tpm` attestation
//!
//! The statement carries two TPM 2.0 structures: `pubArea` (TPMT_PUBLIC, the
//! key the TPM claims to have created) and `certInfo` (TPMS_ATTEST, the
//! signed certify statement). Verification ties them together:
//!
//! - `pubArea` must describe the same key as the credential public key;
//! - `certInfo.extraData` must equal `SHA256(authData || clientDataHash)`;
//! - `certInfo.attested.name` must be `nameAlg || H_nameAlg(pubArea)`;
//! - the AIK leaf certificate signs `certInfo` and conforms to the TPM
//!   attestation identity key profile.
//!
//! All parsing is length-driven with bounds checks; both structures must be
//! consumed exactly.

use ciborium::Value;
use sha2::{Digest, Sha256, Sha384};
use x509_parser::prelude::*;

use crate::codec::cbor;
use crate::codec::cose::{CoseAlgorithm, CosePublicKey, EcCurve};
use crate::crypto;
use crate::error::{WebAuthnError, WebAuthnResult};
use crate::types::{AttestationType, Warning};

use super::{packed::decode_certificate_array, AttestationContext, VerifiedAttestation};

// TPM generated value ("\xFFTCG") guarding TPMS_ATTEST.
const TPM_GENERATED_VALUE: u32 = 0xff54_4347;
// TPM_ST_ATTEST_CERTIFY
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

// TPM_ALG_* identifiers
const TPM_ALG_RSA: u16 = 0x0001;
const TPM_ALG_SHA256: u16 = 0x000b;
const TPM_ALG_SHA384: u16 = 0x000c;
const TPM_ALG_NULL: u16 = 0x0010;
const TPM_ALG_ECC: u16 = 0x0023;

// TPM_ECC_CURVE identifiers
const TPM_ECC_NIST_P256: u16 = 0x0003;
const TPM_ECC_NIST_P384: u16 = 0x0004;

// tcg-kp-AIKCertificate (2.23.133.8.3) extended key usage, DER-encoded:
// 2.23 -> 0x57, 133 -> 0x81 0x05, 8 -> 0x08, 3 -> 0x03
const OID_TCG_KP_AIK_CERTIFICATE: [u8; 5] = [0x57, 0x81, 0x05, 0x08, 0x03];

pub(super) fn verify(
    att_stmt: &[(Value, Value)],
    ctx: &AttestationContext<'_>,
    warnings: &mut Vec<Warning>,
) -> WebAuthnResult<VerifiedAttestation> {
    let version = cbor::map_text(att_stmt, "ver")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("tpm: missing ver".to_string()))?;
    if version != "2.0" {
        return Err(WebAuthnError::InvalidAttestation(format!(
            "tpm: unsupported version {version}"
        )));
    }
    let alg_id = cbor::map_int(att_stmt, "alg")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("tpm: missing alg".to_string()))?;
    let alg = CoseAlgorithm::try_from(alg_id)?;
    let signature = cbor::map_bytes(att_stmt, "sig")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("tpm: missing sig".to_string()))?;
    let cert_info = cbor::map_bytes(att_stmt, "certInfo")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("tpm: missing certInfo".to_string()))?;
    let pub_area = cbor::map_bytes(att_stmt, "pubArea")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("tpm: missing pubArea".to_string()))?;
    let x5c = cbor::map_array(att_stmt, "x5c")
        .ok_or_else(|| WebAuthnError::InvalidAttestation("tpm: missing x5c".to_string()))?;
    let chain = decode_certificate_array(x5c)?;

    let public = TpmtPublic::parse(pub_area)?;
    let credential = ctx.attested_credential()?;
    check_pub_area_matches_credential(&public, &credential.public_key)?;

    let attest = TpmsAttest::parse(cert_info)?;
    if attest.extra_data != crypto::sha256(&ctx.signed_message()) {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: extraData does not match attToBeSigned hash".to_string(),
        ));
    }
    check_attested_name(&attest, &public, pub_area)?;

    let leaf = crypto::chain::parse_certificate(&chain[0])?;
    crypto::verify_with_certificate(alg, &leaf, cert_info, signature, warnings).map_err(|e| {
        match e {
            WebAuthnError::SignatureInvalid => WebAuthnError::InvalidAttestation(
                "tpm: certInfo signature verification failed".to_string(),
            ),
            other => other,
        }
    })?;

    check_aik_certificate(&leaf)?;

    Ok(VerifiedAttestation { attestation_type: AttestationType::AttCa, trust_path: chain })
}

// ---------------------------------------------------------------------------
// Binary structures
// ---------------------------------------------------------------------------

/// Bounds-checked big-endian reader over a TPM structure.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> WebAuthnResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| WebAuthnError::MalformedData("tpm: structure truncated".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> WebAuthnResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> WebAuthnResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// TPM2B: u16 length prefix followed by that many bytes.
    fn read_tpm2b(&mut self) -> WebAuthnResult<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.take(len)
    }

    fn finish(&self) -> WebAuthnResult<()> {
        if self.pos != self.data.len() {
            return Err(WebAuthnError::MalformedData(
                "tpm: trailing bytes in structure".to_string(),
            ));
        }
        Ok(())
    }
}

/// The TPMT_PUBLIC fields verification acts on.
#[derive(Debug)]
struct TpmtPublic {
    name_alg: u16,
    unique: TpmuPublicId,
}

#[derive(Debug)]
enum TpmuPublicId {
    Rsa { modulus: Vec<u8>, exponent: u32 },
    Ecc { curve: u16, x: Vec<u8>, y: Vec<u8> },
}

impl TpmtPublic {
    fn parse(data: &[u8]) -> WebAuthnResult<Self> {
        let mut reader = Reader::new(data);
        let key_type = reader.read_u16()?;
        let name_alg = reader.read_u16()?;
        let _object_attributes = reader.read_u32()?;
        let _auth_policy = reader.read_tpm2b()?;

        let unique = match key_type {
            TPM_ALG_RSA => {
                read_symmetric(&mut reader)?;
                read_scheme(&mut reader)?;
                let _key_bits = reader.read_u16()?;
                let exponent = reader.read_u32()?;
                let modulus = reader.read_tpm2b()?.to_vec();
                TpmuPublicId::Rsa { modulus, exponent }
            }
            TPM_ALG_ECC => {
                read_symmetric(&mut reader)?;
                read_scheme(&mut reader)?;
                let curve = reader.read_u16()?;
                read_scheme(&mut reader)?; // kdf
                let x = reader.read_tpm2b()?.to_vec();
                let y = reader.read_tpm2b()?.to_vec();
                TpmuPublicId::Ecc { curve, x, y }
            }
            other => {
                return Err(WebAuthnError::InvalidAttestation(format!(
                    "tpm: unsupported pubArea type {other:#06x}"
                )))
            }
        };

        reader.finish()?;
        Ok(Self { name_alg, unique })
    }
}

/// TPMT_SYM_DEF_OBJECT: algorithm, then key bits and mode unless null.
fn read_symmetric(reader: &mut Reader<'_>) -> WebAuthnResult<()> {
    let algorithm = reader.read_u16()?;
    if algorithm != TPM_ALG_NULL {
        let _key_bits = reader.read_u16()?;
        let _mode = reader.read_u16()?;
    }
    Ok(())
}

/// TPMT_*_SCHEME: algorithm, then a hash algorithm unless null.
fn read_scheme(reader: &mut Reader<'_>) -> WebAuthnResult<()> {
    let scheme = reader.read_u16()?;
    if scheme != TPM_ALG_NULL {
        let _hash_alg = reader.read_u16()?;
    }
    Ok(())
}

/// The TPMS_ATTEST fields verification acts on.
#[derive(Debug)]
struct TpmsAttest {
    extra_data: Vec<u8>,
    attested_name: Vec<u8>,
}

impl TpmsAttest {
    fn parse(data: &[u8]) -> WebAuthnResult<Self> {
        let mut reader = Reader::new(data);
        let magic = reader.read_u32()?;
        if magic != TPM_GENERATED_VALUE {
            return Err(WebAuthnError::InvalidAttestation(
                "tpm: certInfo magic is not TPM_GENERATED".to_string(),
            ));
        }
        let attest_type = reader.read_u16()?;
        if attest_type != TPM_ST_ATTEST_CERTIFY {
            return Err(WebAuthnError::InvalidAttestation(
                "tpm: certInfo type is not TPM_ST_ATTEST_CERTIFY".to_string(),
            ));
        }
        let _qualified_signer = reader.read_tpm2b()?;
        let extra_data = reader.read_tpm2b()?.to_vec();
        // clockInfo: clock(8) + resetCount(4) + restartCount(4) + safe(1)
        let _clock_info = reader.take(17)?;
        let _firmware_version = reader.take(8)?;
        let attested_name = reader.read_tpm2b()?.to_vec();
        let _qualified_name = reader.read_tpm2b()?;
        reader.finish()?;
        Ok(Self { extra_data, attested_name })
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_pub_area_matches_credential(
    public: &TpmtPublic,
    credential_key: &CosePublicKey,
) -> WebAuthnResult<()> {
    let matches = match (&public.unique, credential_key) {
        (TpmuPublicId::Rsa { modulus, exponent }, CosePublicKey::Rsa { n, e, .. }) => {
            let tpm_exponent = if *exponent == 0 { 65_537 } else { u64::from(*exponent) };
            strip_leading_zeros(modulus) == strip_leading_zeros(n)
                && tpm_exponent == be_bytes_to_u64(e)
        }
        (TpmuPublicId::Ecc { curve, x, y }, CosePublicKey::Ec2 { curve: cose_curve, x: kx, y: ky, .. }) => {
            let curve_matches = matches!(
                (*curve, cose_curve),
                (TPM_ECC_NIST_P256, EcCurve::P256) | (TPM_ECC_NIST_P384, EcCurve::P384)
            );
            curve_matches
                && strip_leading_zeros(x) == strip_leading_zeros(kx)
                && strip_leading_zeros(y) == strip_leading_zeros(ky)
        }
        _ => false,
    };

    if !matches {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: pubArea does not describe the credential public key".to_string(),
        ));
    }
    Ok(())
}

fn check_attested_name(
    attest: &TpmsAttest,
    public: &TpmtPublic,
    raw_pub_area: &[u8],
) -> WebAuthnResult<()> {
    if attest.attested_name.len() < 2 {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: attested name too short".to_string(),
        ));
    }
    let name_alg = u16::from_be_bytes([attest.attested_name[0], attest.attested_name[1]]);
    if name_alg != public.name_alg {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: attested name algorithm does not match pubArea nameAlg".to_string(),
        ));
    }
    let digest: Vec<u8> = match name_alg {
        TPM_ALG_SHA256 => Sha256::digest(raw_pub_area).to_vec(),
        TPM_ALG_SHA384 => Sha384::digest(raw_pub_area).to_vec(),
        other => {
            return Err(WebAuthnError::InvalidAttestation(format!(
                "tpm: unsupported nameAlg {other:#06x}"
            )))
        }
    };
    if attest.attested_name[2..] != digest[..] {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: attested name does not match pubArea digest".to_string(),
        ));
    }
    Ok(())
}

/// TPM attestation identity key certificate profile: v3, empty subject with a
/// critical SAN, the AIK extended key usage, and no CA flag.
fn check_aik_certificate(leaf: &X509Certificate<'_>) -> WebAuthnResult<()> {
    if leaf.version() != X509Version::V3 {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: AIK certificate is not v3".to_string(),
        ));
    }

    if leaf.subject().iter().next().is_some() {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: AIK certificate subject must be empty".to_string(),
        ));
    }

    let san = leaf
        .extensions()
        .iter()
        .find(|ext| matches!(ext.parsed_extension(), ParsedExtension::SubjectAlternativeName(_)));
    match san {
        Some(extension) if extension.critical => {}
        Some(_) => {
            return Err(WebAuthnError::InvalidAttestation(
                "tpm: AIK subject alternative name must be critical".to_string(),
            ))
        }
        None => {
            return Err(WebAuthnError::InvalidAttestation(
                "tpm: AIK certificate lacks a subject alternative name".to_string(),
            ))
        }
    }

    let has_aik_eku = match leaf.extended_key_usage() {
        Ok(Some(eku)) => eku
            .value
            .other
            .iter()
            .any(|oid| oid.as_bytes() == OID_TCG_KP_AIK_CERTIFICATE),
        _ => false,
    };
    if !has_aik_eku {
        return Err(WebAuthnError::InvalidAttestation(
            "tpm: AIK certificate lacks the tcg-kp-AIKCertificate key usage".to_string(),
        ));
    }

    match leaf.basic_constraints() {
        Ok(Some(constraints)) if constraints.value.ca => Err(WebAuthnError::InvalidAttestation(
            "tpm: AIK certificate must not be a CA".to_string(),
        )),
        Ok(_) => Ok(()),
        Err(_) => Err(WebAuthnError::InvalidAttestation(
            "tpm: malformed basic constraints".to_string(),
        )),
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first_nonzero..]
}

fn be_bytes_to_u64(bytes: &[u8]) -> u64 {
    strip_leading_zeros(bytes)
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

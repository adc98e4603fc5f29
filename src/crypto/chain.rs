//! X.509 attestation chain validation
//!
//! Path validation for attestation trust decisions: validity windows against
//! the injected clock, issuer/subject linkage, cryptographic signature of
//! every link, and root membership in the metadata-provided anchor set.
//! Revocation is not consulted.

use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use crate::error::{WebAuthnError, WebAuthnResult};

/// Parses one DER certificate, returning a view borrowing `der`.
pub fn parse_certificate(der: &[u8]) -> WebAuthnResult<X509Certificate<'_>> {
    let (_, certificate) = X509Certificate::from_der(der)
        .map_err(|e| WebAuthnError::MalformedData(format!("certificate: {e:?}")))?;
    Ok(certificate)
}

/// Validates `chain` (leaf first) up to one of `trusted_roots`.
///
/// The chain terminates at an anchor either by containing it verbatim or by
/// its last certificate being issued and signed by one. Any path failure
/// reports `UntrustedAttestation`; structural failures report
/// `MalformedData`.
pub fn verify_chain(
    chain: &[Vec<u8>],
    trusted_roots: &[Vec<u8>],
    now: DateTime<Utc>,
) -> WebAuthnResult<()> {
    if chain.is_empty() {
        return Err(WebAuthnError::UntrustedAttestation);
    }

    let mut parsed_chain = Vec::with_capacity(chain.len());
    for (i, der) in chain.iter().enumerate() {
        let (_, certificate) = X509Certificate::from_der(der)
            .map_err(|e| WebAuthnError::MalformedData(format!("chain certificate {i}: {e:?}")))?;
        parsed_chain.push(certificate);
    }

    let mut parsed_roots = Vec::with_capacity(trusted_roots.len());
    for (i, der) in trusted_roots.iter().enumerate() {
        let (_, certificate) = X509Certificate::from_der(der)
            .map_err(|e| WebAuthnError::MalformedData(format!("trust anchor {i}: {e:?}")))?;
        parsed_roots.push(certificate);
    }

    // Validity windows for every certificate in the presented chain.
    for (i, certificate) in parsed_chain.iter().enumerate() {
        if !within_validity(certificate, now) {
            tracing::warn!(
                cert_index = i,
                not_before = %certificate.validity().not_before,
                not_after = %certificate.validity().not_after,
                "certificate outside its validity window"
            );
            return Err(WebAuthnError::UntrustedAttestation);
        }
    }

    // Each certificate must be issued and signed by its successor.
    for i in 0..parsed_chain.len() - 1 {
        let certificate = &parsed_chain[i];
        let issuer = &parsed_chain[i + 1];
        if certificate.issuer() != issuer.subject() {
            tracing::warn!(cert_index = i, "chain hierarchy mismatch");
            return Err(WebAuthnError::UntrustedAttestation);
        }
        if certificate.verify_signature(Some(issuer.public_key())).is_err() {
            tracing::warn!(cert_index = i, "chain signature verification failed");
            return Err(WebAuthnError::UntrustedAttestation);
        }
    }

    // Terminate at an anchor: the last chain certificate either is one, or is
    // issued and signed by one.
    let last = parsed_chain.last().expect("chain is non-empty");
    let anchored = parsed_roots.iter().any(|root| is_same_certificate(last, root))
        || parsed_roots.iter().any(|root| {
            last.issuer() == root.subject()
                && last.verify_signature(Some(root.public_key())).is_ok()
        });

    if !anchored {
        tracing::warn!(chain_length = chain.len(), "chain does not terminate at a trust anchor");
        return Err(WebAuthnError::UntrustedAttestation);
    }

    Ok(())
}

fn within_validity(certificate: &X509Certificate<'_>, now: DateTime<Utc>) -> bool {
    let now_ts = now.timestamp();
    let validity = certificate.validity();
    now_ts >= validity.not_before.timestamp() && now_ts <= validity.not_after.timestamp()
}

/// Compares certificates by key material, names, and serial so an anchor
/// cannot be spoofed by a certificate that merely shares its subject.
fn is_same_certificate(a: &X509Certificate<'_>, b: &X509Certificate<'_>) -> bool {
    a.public_key().raw == b.public_key().raw
        && a.subject() == b.subject()
        && a.issuer() == b.issuer()
        && a.raw_serial() == b.raw_serial()
}

/// Extracts the Subject Key Identifier extension, used to key metadata
/// lookups for U2F authenticators that carry no AAGUID.
pub fn subject_key_identifier(certificate: &X509Certificate<'_>) -> Option<Vec<u8>> {
    certificate.extensions().iter().find_map(|ext| match ext.parsed_extension() {
        ParsedExtension::SubjectKeyIdentifier(KeyIdentifier(id)) => Some(id.to_vec()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_verify_chain_rejects_empty_chain() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid");
        assert!(matches!(
            verify_chain(&[], &[], now),
            Err(WebAuthnError::UntrustedAttestation)
        ));
    }

    #[test]
    fn test_verify_chain_rejects_garbage_der() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid");
        let chain = vec![vec![0xde, 0xad, 0xbe, 0xef]];
        assert!(matches!(
            verify_chain(&chain, &[], now),
            Err(WebAuthnError::MalformedData(_))
        ));
    }
}

//! Chain-of-trust verification of a leaf certificate against a trust store.
//!
//! Checks run in a fixed order and stop at the first failure, so the same bad
//! certificate always produces the same diagnostic:
//!
//! 1. DER parses into a certificate
//! 2. signature verifies under the root's public key
//! 3. the verification time lies within `[notBefore, notAfter]`
//! 4. the issuer name equals the root's subject
//!
//! Only after all four pass is the embedded public key handed back.
//!
//! A failed signature is reported as [`Error::SignatureMismatch`] when the leaf
//! points at the trusted root (matching authority key identifier or issuer
//! name), and as [`Error::UntrustedIssuer`] when it points elsewhere.

use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use openssl::asn1::Asn1Time;
use tracing::debug;

use crate::certificate::{Certificate, TrustStore};
use crate::error::{Error, Result};
use crate::key_pair::PublicKey;

/// Verifies leaf certificates against an explicit [`TrustStore`].
#[derive(Debug, Default, Clone, Copy)]
pub struct CertificateVerifier;

impl CertificateVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify DER certificate bytes at the current system time
    pub fn verify(&self, certificate_der: &[u8], trust_store: &TrustStore) -> Result<PublicKey> {
        self.verify_at(certificate_der, trust_store, unix_now())
    }

    /// Verify DER certificate bytes as of `unix_time` (seconds)
    pub fn verify_at(
        &self,
        certificate_der: &[u8],
        trust_store: &TrustStore,
        unix_time: i64,
    ) -> Result<PublicKey> {
        let certificate = Certificate::from_der(certificate_der)?;
        self.verify_certificate_at(&certificate, trust_store, unix_time)
    }

    /// Verify an already parsed certificate at the current system time
    pub fn verify_certificate(
        &self,
        certificate: &Certificate,
        trust_store: &TrustStore,
    ) -> Result<PublicKey> {
        self.verify_certificate_at(certificate, trust_store, unix_now())
    }

    pub fn verify_certificate_at(
        &self,
        certificate: &Certificate,
        trust_store: &TrustStore,
        unix_time: i64,
    ) -> Result<PublicKey> {
        let root = trust_store.root();
        let root_key = root.public_key()?;
        let x509 = certificate.x509();

        // A key mismatch surfaces from OpenSSL as an error rather than `false`
        let signature_ok = x509.verify(root_key.pkey()).unwrap_or(false);
        if !signature_ok {
            if root.is_claimed_by(certificate)? {
                return Err(Error::SignatureMismatch {
                    subject: certificate.subject_name(),
                });
            }
            return Err(Error::UntrustedIssuer {
                issuer: certificate.issuer_name(),
                trusted: root.subject_name(),
            });
        }

        let now = Asn1Time::from_unix(unix_time)?;
        let started = x509.not_before().compare(&now)? != Ordering::Greater;
        let not_ended = x509.not_after().compare(&now)? != Ordering::Less;
        if !(started && not_ended) {
            return Err(Error::ExpiredCertificate {
                subject: certificate.subject_name(),
                not_before: certificate.not_before(),
                not_after: certificate.not_after(),
            });
        }

        if !root.is_named_issuer_of(certificate)? {
            return Err(Error::UntrustedIssuer {
                issuer: certificate.issuer_name(),
                trusted: root.subject_name(),
            });
        }

        debug!(
            subject = %certificate.subject_name(),
            issuer = %root.subject_name(),
            fingerprint = %certificate.fingerprint()?,
            "certificate verified"
        );
        certificate.public_key()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

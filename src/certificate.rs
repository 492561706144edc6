//! X.509 certificates, trust roots and the trust store.
//!
//! The core speaks DER at its boundary. PEM helpers exist for callers that
//! store or display certificates, and are not used by verification itself.

use std::fmt;

use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::key_pair::PublicKey;

/// An issued certificate binding a subject name to a public key.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    /// Parse DER bytes into a certificate
    ///
    /// # Errors
    /// Returns [`Error::CertificateParse`] if the bytes are not a well-formed X.509 structure.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let x509 = X509::from_der(der).map_err(|e| Error::CertificateParse(e.to_string()))?;
        Ok(Self { x509 })
    }

    /// Parse a PEM-armored certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let x509 = X509::from_pem(pem).map_err(|e| Error::CertificateParse(e.to_string()))?;
        Ok(Self { x509 })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.x509.to_der()?)
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.x509.to_pem()?)
    }

    /// Common name of the subject
    pub fn subject_name(&self) -> String {
        common_name(self.x509.subject_name())
    }

    /// Common name of the issuer
    pub fn issuer_name(&self) -> String {
        common_name(self.x509.issuer_name())
    }

    /// Serial number as upper-case hex
    pub fn serial_number(&self) -> Result<String> {
        let bn = self.x509.serial_number().to_bn()?;
        Ok(bn.to_hex_str()?.to_string())
    }

    pub fn not_before(&self) -> String {
        self.x509.not_before().to_string()
    }

    pub fn not_after(&self) -> String {
        self.x509.not_after().to_string()
    }

    /// The public key embedded in the certificate
    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::from_pkey(self.x509.public_key()?))
    }

    /// SHA-256 fingerprint of the DER encoding, lower-case hex
    pub fn fingerprint(&self) -> Result<String> {
        Ok(hex::encode(Sha256::digest(self.to_der()?)))
    }

    /// True when issuer and subject are the same name and the certificate
    /// verifies under its own key
    pub fn is_self_signed(&self) -> Result<bool> {
        if !names_equal(self.x509.issuer_name(), self.x509.subject_name())? {
            return Ok(false);
        }
        let key = self.x509.public_key()?;
        Ok(self.x509.verify(&key).unwrap_or(false))
    }

    pub(crate) fn from_x509(x509: X509) -> Self {
        Self { x509 }
    }

    pub(crate) fn x509(&self) -> &X509 {
        &self.x509
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject_name())
            .field("issuer", &self.issuer_name())
            .field("not_before", &self.not_before())
            .field("not_after", &self.not_after())
            .finish()
    }
}

/// A self-signed certificate a verifying party has chosen to trust.
#[derive(Debug, Clone)]
pub struct TrustRoot {
    certificate: Certificate,
}

impl TrustRoot {
    /// Designate `certificate` as a trust root
    ///
    /// # Errors
    /// Returns [`Error::InvalidTrustRoot`] if the certificate is not self-signed.
    pub fn new(certificate: Certificate) -> Result<Self> {
        if !certificate.is_self_signed()? {
            return Err(Error::InvalidTrustRoot(format!(
                "'{}' is not self-signed (issuer '{}')",
                certificate.subject_name(),
                certificate.issuer_name()
            )));
        }
        Ok(Self { certificate })
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Self::new(Certificate::from_der(der)?)
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::new(Certificate::from_pem(pem)?)
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn subject_name(&self) -> String {
        self.certificate.subject_name()
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        self.certificate.public_key()
    }

    /// True when `certificate` points at this root, either through its
    /// authority key identifier or through its issuer name
    ///
    /// The two live in disjoint parts of the signed body, so a single corrupted
    /// byte cannot clear both.
    pub(crate) fn is_claimed_by(&self, certificate: &Certificate) -> Result<bool> {
        let key_id_match = match (
            certificate.x509().authority_key_id(),
            self.certificate.x509().subject_key_id(),
        ) {
            (Some(aki), Some(ski)) => aki.as_slice() == ski.as_slice(),
            _ => false,
        };
        Ok(key_id_match || self.is_named_issuer_of(certificate)?)
    }

    /// True when `certificate` names this root as its issuer
    pub(crate) fn is_named_issuer_of(&self, certificate: &Certificate) -> Result<bool> {
        names_equal(
            certificate.x509().issuer_name(),
            self.certificate.x509().subject_name(),
        )
    }
}

/// Trust anchors held by a verifying party.
///
/// Exactly one root per trust domain. The store is passed explicitly into every
/// verification call; there is no process-wide pool.
#[derive(Debug, Clone)]
pub struct TrustStore {
    root: TrustRoot,
}

impl TrustStore {
    pub fn new(root: TrustRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TrustRoot {
        &self.root
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .map(|entry| String::from_utf8_lossy(entry.data().as_slice()).into_owned())
        .unwrap_or_default()
}

fn names_equal(a: &X509NameRef, b: &X509NameRef) -> Result<bool> {
    Ok(a.to_der()? == b.to_der()?)
}

//! Certificate Authority Module
//!
//! Issues the self-signed trust root and the leaf certificates that bind a
//! participant's name to its public key.
//!
//! # Hierarchy
//! ```text
//! Root CA (self-signed, CA=true)
//!   └── Leaf certificate (signed by Root, CA=false)
//! ```
//!
//! # Certificate Properties
//! - **Version**: X.509v3, SHA-256 with RSA signatures
//! - **Serial Number**: random 128-bit number
//! - **Root**: BasicConstraints CA=true (critical), KeyUsage keyCertSign, cRLSign, digitalSignature,
//!   SubjectKeyIdentifier, validity now .. now + 5 years
//! - **Leaf**: BasicConstraints CA=false (critical), KeyUsage digitalSignature, keyEncipherment,
//!   ExtendedKeyUsage serverAuth or clientAuth, SAN DNS = subject, Subject/Authority Key Identifier,
//!   validity now .. now + 1 year
//!
//! # Example
//! ```rust,no_run
//! use pki_handshake::certificate_authority::CertificateAuthority;
//! use pki_handshake::key_pair::KeyPair;
//! # fn example() -> pki_handshake::error::Result<()> {
//! let (root, root_keys) = CertificateAuthority::issue_root("RootCA")?;
//! let server = KeyPair::generate()?;
//! let leaf = CertificateAuthority::issue_leaf(&root, &root_keys, "server.example", &server.public_key()?)?;
//! assert_eq!(leaf.issuer_name(), "RootCA");
//! # Ok(())
//! # }
//! ```

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Builder, X509Name, X509};
use tracing::info;

use crate::certificate::{Certificate, TrustRoot, TrustStore};
use crate::error::{Error, Result};
use crate::key_pair::{KeyPair, KeyPairGenerator, PublicKey, RSA_KEY_SIZE_DEFAULT};

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const SERIAL_BITS: i32 = 128;
/// Default root validity: 5 years
pub const ROOT_VALIDITY_DAYS_DEFAULT: u32 = 5 * 365;
/// Default leaf validity: 1 year
pub const LEAF_VALIDITY_DAYS_DEFAULT: u32 = 365;

/// Validity window of a certificate being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// From now until `n` days from now
    DaysFromNow(u32),
    /// Explicit window in Unix seconds
    Window { not_before: i64, not_after: i64 },
}

impl Validity {
    fn apply(&self, builder: &mut X509Builder) -> Result<()> {
        let (not_before, not_after) = match *self {
            Validity::DaysFromNow(days) => {
                (Asn1Time::days_from_now(0)?, Asn1Time::days_from_now(days)?)
            }
            Validity::Window {
                not_before,
                not_after,
            } => (Asn1Time::from_unix(not_before)?, Asn1Time::from_unix(not_after)?),
        };
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        Ok(())
    }
}

/// Role a leaf certificate is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeafUsage {
    #[default]
    Server,
    Client,
}

// ================= Root CA Builder =================

/// Builder for the self-signed root certificate and its key pair
pub struct RootCABuilder {
    subject_common_name: String,
    organization: Option<String>,
    validity: Validity,
    key_bits: u32,
}

impl RootCABuilder {
    pub fn new(subject_common_name: impl Into<String>) -> Self {
        Self {
            subject_common_name: subject_common_name.into(),
            organization: None,
            validity: Validity::DaysFromNow(ROOT_VALIDITY_DAYS_DEFAULT),
            key_bits: RSA_KEY_SIZE_DEFAULT,
        }
    }

    /// Set the organization (O) for the certificate
    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Set validity period in days from now
    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity = Validity::DaysFromNow(days);
        self
    }

    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    /// Modulus size of the generated root key (minimum 2048)
    pub fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Generate the root key pair and self-sign the root certificate
    pub fn build(self) -> Result<(TrustRoot, KeyPair)> {
        let key_pair = KeyPairGenerator::new(self.key_bits)?.generate()?;
        let name = build_name(&self.subject_common_name, self.organization.as_deref())?;

        let mut builder = new_builder()?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        self.validity.apply(&mut builder)?;
        builder.set_pubkey(key_pair.private_key())?;

        let mut bc = BasicConstraints::new();
        bc.critical().ca();
        builder.append_extension(bc.build()?)?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.key_cert_sign();
        ku.crl_sign();
        ku.digital_signature();
        builder.append_extension(ku.build()?)?;

        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(ski)?;

        builder
            .sign(key_pair.private_key(), MessageDigest::sha256())
            .map_err(|e| Error::Signing(format!("failed to self-sign root: {}", e)))?;

        let certificate = Certificate::from_x509(builder.build());
        info!(
            subject = %self.subject_common_name,
            serial = %certificate.serial_number()?,
            not_after = %certificate.not_after(),
            "issued root certificate"
        );
        Ok((TrustRoot::new(certificate)?, key_pair))
    }
}

// ================= Leaf Certificate Builder =================

/// Builder for a leaf certificate signed by the root
pub struct LeafCertificateBuilder<'a> {
    trust_root: &'a TrustRoot,
    root_key_pair: &'a KeyPair,
    subject_common_name: String,
    subject_public_key: &'a PublicKey,
    organization: Option<String>,
    validity: Validity,
    usage: LeafUsage,
}

impl<'a> LeafCertificateBuilder<'a> {
    pub fn new(
        trust_root: &'a TrustRoot,
        root_key_pair: &'a KeyPair,
        subject_common_name: impl Into<String>,
        subject_public_key: &'a PublicKey,
    ) -> Self {
        Self {
            trust_root,
            root_key_pair,
            subject_common_name: subject_common_name.into(),
            subject_public_key,
            organization: None,
            validity: Validity::DaysFromNow(LEAF_VALIDITY_DAYS_DEFAULT),
            usage: LeafUsage::default(),
        }
    }

    pub fn organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn validity_days(mut self, days: u32) -> Self {
        self.validity = Validity::DaysFromNow(days);
        self
    }

    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    pub fn usage(mut self, usage: LeafUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Build and sign the leaf certificate
    ///
    /// # Errors
    /// Returns [`Error::Signing`] if the root key pair does not match the public
    /// key embedded in the trust root.
    pub fn build(self) -> Result<Certificate> {
        let root_public = self.trust_root.public_key()?;
        if !self.root_key_pair.matches(&root_public) {
            return Err(Error::Signing(format!(
                "key pair does not belong to trust root '{}'",
                self.trust_root.subject_name()
            )));
        }

        let root_x509 = self.trust_root.certificate().x509();
        let name = build_name(&self.subject_common_name, self.organization.as_deref())?;

        let mut builder = new_builder()?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(root_x509.subject_name())?;
        self.validity.apply(&mut builder)?;
        builder.set_pubkey(self.subject_public_key.pkey())?;

        // No .ca() call - end-entity certificate
        let mut bc = BasicConstraints::new();
        bc.critical();
        builder.append_extension(bc.build()?)?;

        let mut ku = KeyUsage::new();
        ku.critical();
        ku.digital_signature();
        ku.key_encipherment();
        builder.append_extension(ku.build()?)?;

        let mut eku = ExtendedKeyUsage::new();
        match self.usage {
            LeafUsage::Server => eku.server_auth(),
            LeafUsage::Client => eku.client_auth(),
        };
        builder.append_extension(eku.build()?)?;

        let san = SubjectAlternativeName::new()
            .dns(&self.subject_common_name)
            .build(&builder.x509v3_context(Some(root_x509), None))?;
        builder.append_extension(san)?;

        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(Some(root_x509), None))?;
        builder.append_extension(ski)?;

        // Points at the root key independently of the issuer name
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(root_x509), None))?;
        builder.append_extension(aki)?;

        builder
            .sign(self.root_key_pair.private_key(), MessageDigest::sha256())
            .map_err(|e| Error::Signing(format!("failed to sign certificate: {}", e)))?;

        let certificate = Certificate::from_x509(builder.build());
        info!(
            subject = %self.subject_common_name,
            issuer = %self.trust_root.subject_name(),
            serial = %certificate.serial_number()?,
            usage = ?self.usage,
            "issued leaf certificate"
        );
        Ok(certificate)
    }
}

fn new_builder() -> Result<X509Builder> {
    let mut builder = X509::builder()?;
    builder.set_version(X509_VERSION_3)?;

    let mut serial = BigNum::new()?;
    serial.rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;
    Ok(builder)
}

fn build_name(common_name: &str, organization: Option<&str>) -> Result<X509Name> {
    let mut name_builder = X509Name::builder()?;
    name_builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .map_err(|e| Error::Signing(format!("failed to set CN '{}': {}", common_name, e)))?;
    if let Some(org) = organization {
        name_builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, org)?;
    }
    Ok(name_builder.build())
}

// ================= Certificate Authority =================

/// A root key pair together with its self-signed certificate.
///
/// The root key pair never leaves the authority. The authority is `Send + Sync`
/// and only ever read after creation, so concurrent handshakes may share one
/// behind an `Arc` without locking.
#[derive(Debug)]
pub struct CertificateAuthority {
    trust_root: TrustRoot,
    key_pair: KeyPair,
    leaf_validity: Validity,
    leaf_key_bits: u32,
}

impl CertificateAuthority {
    /// Issue a self-signed root with the default 5-year validity
    pub fn issue_root(subject_name: &str) -> Result<(TrustRoot, KeyPair)> {
        RootCABuilder::new(subject_name).build()
    }

    /// Issue a 1-year server leaf for `subject_public_key`, signed by the root
    pub fn issue_leaf(
        trust_root: &TrustRoot,
        root_key_pair: &KeyPair,
        subject_name: &str,
        subject_public_key: &PublicKey,
    ) -> Result<Certificate> {
        LeafCertificateBuilder::new(trust_root, root_key_pair, subject_name, subject_public_key)
            .build()
    }

    /// Create an authority with a freshly issued root
    pub fn new(subject_name: &str) -> Result<Self> {
        let (trust_root, key_pair) = Self::issue_root(subject_name)?;
        Self::from_parts(trust_root, key_pair)
    }

    /// Assemble an authority from an existing root and its key pair
    pub fn from_parts(trust_root: TrustRoot, key_pair: KeyPair) -> Result<Self> {
        if !key_pair.matches(&trust_root.public_key()?) {
            return Err(Error::Signing(format!(
                "key pair does not belong to trust root '{}'",
                trust_root.subject_name()
            )));
        }
        Ok(Self {
            trust_root,
            key_pair,
            leaf_validity: Validity::DaysFromNow(LEAF_VALIDITY_DAYS_DEFAULT),
            leaf_key_bits: RSA_KEY_SIZE_DEFAULT,
        })
    }

    pub fn with_leaf_validity_days(mut self, days: u32) -> Self {
        self.leaf_validity = Validity::DaysFromNow(days);
        self
    }

    pub fn with_leaf_key_bits(mut self, bits: u32) -> Self {
        self.leaf_key_bits = bits;
        self
    }

    pub fn trust_root(&self) -> &TrustRoot {
        &self.trust_root
    }

    /// A trust store anchored at this authority's root
    pub fn trust_store(&self) -> TrustStore {
        TrustStore::new(self.trust_root.clone())
    }

    /// Sign a leaf for a public key the subject generated itself
    pub fn issue(
        &self,
        subject_name: &str,
        subject_public_key: &PublicKey,
        usage: LeafUsage,
    ) -> Result<Certificate> {
        LeafCertificateBuilder::new(
            &self.trust_root,
            &self.key_pair,
            subject_name,
            subject_public_key,
        )
        .validity(self.leaf_validity)
        .usage(usage)
        .build()
    }

    /// Generate a key pair for `subject_name` and sign a leaf for it
    pub fn issue_key_pair(
        &self,
        subject_name: &str,
        usage: LeafUsage,
    ) -> Result<(KeyPair, Certificate)> {
        let key_pair = KeyPairGenerator::new(self.leaf_key_bits)?.generate()?;
        let certificate = self.issue(subject_name, &key_pair.public_key()?, usage)?;
        Ok((key_pair, certificate))
    }

    /// Export the root key as PKCS#8 PEM for offline storage
    pub fn root_key_to_pem(&self) -> Result<secrecy::SecretVec<u8>> {
        self.key_pair.private_key_to_pem()
    }
}

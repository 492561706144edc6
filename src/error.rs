//! Error types for issuance, verification, key transport and record encryption.
//!
//! Messages name subjects, lengths and stages. They never carry key bytes or
//! plaintext.

use std::fmt;

use openssl::error::ErrorStack;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the individual protocol components.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Certificate bytes are not a well-formed X.509 DER structure
    #[error("certificate parse error: {0}")]
    CertificateParse(String),

    /// Certificate body does not verify under the issuer's public key
    #[error("signature mismatch: certificate for '{subject}' was not signed by the trusted root")]
    SignatureMismatch { subject: String },

    /// Current time lies outside the certificate validity window
    #[error("certificate for '{subject}' is outside its validity window ({not_before} .. {not_after})")]
    ExpiredCertificate {
        subject: String,
        not_before: String,
        not_after: String,
    },

    /// Certificate was issued by an authority this trust store does not hold
    #[error("untrusted issuer: '{issuer}' (trusted root is '{trusted}')")]
    UntrustedIssuer { issuer: String, trusted: String },

    /// Payload does not fit under the peer modulus with the chosen padding
    #[error("key too large for transport: {len} bytes (max {max})")]
    KeyTooLarge { len: usize, max: usize },

    /// Sealed key was not produced for this key pair or is malformed
    #[error("key transport decryption failed")]
    Decryption,

    /// Cipher record is truncated or not block aligned
    #[error("invalid cipher record: {len} bytes")]
    InvalidRecord { len: usize },

    /// Record padding is not self-consistent
    #[error("invalid record padding")]
    Padding,

    /// Root key pair cannot sign for the given trust root
    #[error("signing error: {0}")]
    Signing(String),

    /// Key pair generation failed or was requested below the minimum size
    #[error("key generation error: {0}")]
    KeyGeneration(String),

    /// Certificate cannot serve as a trust root
    #[error("invalid trust root: {0}")]
    InvalidTrustRoot(String),

    /// Mutual authentication requested without a local certificate
    #[error("no identity configured for client authentication")]
    MissingIdentity,

    /// Handshake step invoked from the wrong state
    #[error("out of order: expected state {expected}, found {actual}")]
    OutOfOrder {
        expected: &'static str,
        actual: &'static str,
    },

    /// Session was closed after a failure or by its owner
    #[error("session closed")]
    SessionClosed,

    /// Underlying OpenSSL failure
    #[error("crypto error: {0}")]
    Crypto(#[from] ErrorStack),
}

/// Protocol step in which a handshake failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Authentication,
    KeyExchange,
    SecureExchange,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandshakeStage::Authentication => "authentication",
            HandshakeStage::KeyExchange => "key exchange",
            HandshakeStage::SecureExchange => "payload exchange",
        };
        f.write_str(name)
    }
}

/// A component error tagged with the handshake step it terminated.
#[derive(Debug, thiserror::Error)]
#[error("handshake aborted during {stage}: {source}")]
pub struct HandshakeError {
    pub stage: HandshakeStage,
    #[source]
    pub source: Error,
}

impl HandshakeError {
    pub fn new(stage: HandshakeStage, source: Error) -> Self {
        Self { stage, source }
    }
}

//! PKI Handshake - certificate trust chain plus hybrid RSA/AES session setup
//!
//! Models how two parties establish a confidential, authenticated channel: a
//! certificate authority issues identities, a peer verifies them against an
//! explicit trust store, a fresh session key travels under the verified RSA
//! public key, and payloads flow as AES-256-CBC records.
//!
//! # Overview
//!
//! ```text
//! CertificateAuthority ──issues──▶ Certificate ──verified by──▶ CertificateVerifier
//!                                                                   │ public key
//!                                                                   ▼
//!            Session ◀──SessionKey── KeyTransport (RSA seal/unseal)
//!               │
//!               ▼
//!        SymmetricChannel (AES-256-CBC records)
//! ```
//!
//! The handshake is a single pass with no retries. A party is either
//! `Established` with a [`handshake::Session`], or `Aborted` with a
//! [`error::HandshakeError`] naming the step that failed.
//!
//! # Example
//!
//! ```no_run
//! use pki_handshake::certificate_authority::{CertificateAuthority, LeafUsage};
//! use pki_handshake::handshake::{run_handshake, HandshakeConfig, Identity, Initiator, Responder};
//!
//! fn main() -> anyhow::Result<()> {
//!     let ca = CertificateAuthority::new("RootCA")?;
//!     let (server_keys, server_cert) = ca.issue_key_pair("server.example", LeafUsage::Server)?;
//!
//!     let config = HandshakeConfig::default();
//!     let mut client = Initiator::new(ca.trust_store(), config);
//!     let mut server = Responder::new(
//!         Identity::new(server_keys, server_cert)?,
//!         ca.trust_store(),
//!         config,
//!     );
//!
//!     let (client_session, mut server_session) = run_handshake(&mut client, &mut server)?;
//!     let record = client_session.encrypt(b"hello")?;
//!     assert_eq!(server_session.decrypt(&record)?, b"hello");
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`key_pair`]: RSA key pair generation (2048-bit minimum)
//! - [`certificate`]: certificates, trust roots and the trust store
//! - [`certificate_authority`]: root and leaf issuance
//! - [`certificate_verifier`]: ordered chain-of-trust checks
//! - [`key_transport`]: RSA sealing of session keys
//! - [`symmetric_channel`]: AES-256-CBC records with explicit padding
//! - [`handshake`]: initiator/responder state machines and sessions
//! - [`configs`]: TOML configuration for the binary
//!
//! # Error Handling
//!
//! Component operations return [`error::Result`]. Handshake steps return
//! [`error::HandshakeError`], which wraps the component error with the stage it
//! terminated. Messages never contain key material or plaintext.

pub mod certificate;
pub mod certificate_authority;
pub mod certificate_verifier;
pub mod configs;
pub mod error;
pub mod handshake;
pub mod key_pair;
pub mod key_transport;
pub mod session_key;
pub mod symmetric_channel;

//! Handshake orchestration between an initiator (client) and a responder (server).
//!
//! # Protocol
//! ```text
//! Responder                                Initiator
//!   hello()            -- ServerHello -->    authenticate()
//!   authenticate_client() <-- ClientCertificate -- client_certificate()   (mutual only)
//!   accept_key_exchange() <-- KeyExchange -- key_exchange()
//!        Session  <====== AES-256-CBC records ======>  Session
//! ```
//!
//! Each party walks `Init -> Authenticated -> Established`. Any failure moves it
//! to `Aborted`, and an aborted party refuses every further step. No session is
//! handed out until the key exchange has completed.

use std::fmt;

use tracing::{info, warn};

use crate::certificate::{Certificate, TrustStore};
use crate::certificate_verifier::CertificateVerifier;
use crate::error::{Error, HandshakeError, HandshakeStage};
use crate::key_pair::{KeyPair, PublicKey};
use crate::key_transport::{KeyTransport, SealedKey, TransportPadding};
use crate::session_key::SessionKey;
use crate::symmetric_channel::{PaddingMode, SymmetricChannel};

pub type HandshakeResult<T> = std::result::Result<T, HandshakeError>;

/// Whether the responder demands a certificate from the initiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    #[default]
    None,
    Required,
}

impl From<bool> for ClientAuth {
    fn from(required: bool) -> Self {
        if required {
            ClientAuth::Required
        } else {
            ClientAuth::None
        }
    }
}

/// Options shared by both sides of a handshake.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandshakeConfig {
    pub client_auth: ClientAuth,
    pub transport_padding: TransportPadding,
    pub record_padding: PaddingMode,
}

/// Progress of one party through the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Init,
    Authenticated,
    Established,
    Aborted,
}

impl HandshakeState {
    fn name(self) -> &'static str {
        match self {
            HandshakeState::Init => "Init",
            HandshakeState::Authenticated => "Authenticated",
            HandshakeState::Established => "Established",
            HandshakeState::Aborted => "Aborted",
        }
    }
}

/// A participant's key pair and the certificate issued for it.
#[derive(Debug)]
pub struct Identity {
    key_pair: KeyPair,
    certificate: Certificate,
}

impl Identity {
    /// Pair a key with its certificate
    ///
    /// # Errors
    /// Returns [`Error::Signing`] if the certificate does not carry the key pair's public key.
    pub fn new(key_pair: KeyPair, certificate: Certificate) -> crate::error::Result<Self> {
        if !key_pair.matches(&certificate.public_key()?) {
            return Err(Error::Signing(format!(
                "certificate for '{}' does not carry this key pair's public key",
                certificate.subject_name()
            )));
        }
        Ok(Self {
            key_pair,
            certificate,
        })
    }

    pub fn name(&self) -> String {
        self.certificate.subject_name()
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

/// Responder's certificate, sent first.
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub certificate_der: Vec<u8>,
}

/// Initiator's certificate in the mutual-authentication variant.
#[derive(Debug, Clone)]
pub struct ClientCertificate {
    pub certificate_der: Vec<u8>,
}

/// Session key sealed under the responder's verified public key.
#[derive(Debug, Clone)]
pub struct KeyExchange {
    pub sealed_key: SealedKey,
}

// ================= Initiator =================

/// The party that verifies the responder and generates the session key.
pub struct Initiator {
    config: HandshakeConfig,
    trust_store: TrustStore,
    identity: Option<Identity>,
    state: HandshakeState,
    peer: Option<(String, PublicKey)>,
    certificate_sent: bool,
}

impl Initiator {
    pub fn new(trust_store: TrustStore, config: HandshakeConfig) -> Self {
        Self {
            config,
            trust_store,
            identity: None,
            state: HandshakeState::Init,
            peer: None,
            certificate_sent: false,
        }
    }

    /// Certificate to present when the responder requires client authentication
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Verified responder name, once authenticated
    pub fn peer_name(&self) -> Option<&str> {
        self.peer.as_ref().map(|(name, _)| name.as_str())
    }

    /// Verify the responder's certificate against the trust store
    pub fn authenticate(&mut self, hello: &ServerHello) -> HandshakeResult<()> {
        let stage = HandshakeStage::Authentication;
        self.expect_state(HandshakeState::Init, stage)?;

        let verified = Certificate::from_der(&hello.certificate_der).and_then(|cert| {
            let key = CertificateVerifier::new().verify_certificate(&cert, &self.trust_store)?;
            Ok((cert.subject_name(), key))
        });
        match verified {
            Ok(peer) => {
                self.peer = Some(peer);
                self.state = HandshakeState::Authenticated;
                Ok(())
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    /// Present this party's certificate to the responder
    pub fn client_certificate(&mut self) -> HandshakeResult<ClientCertificate> {
        let stage = HandshakeStage::Authentication;
        self.expect_state(HandshakeState::Authenticated, stage)?;

        let der = match &self.identity {
            Some(identity) => identity.certificate.to_der(),
            None => Err(Error::MissingIdentity),
        };
        match der {
            Ok(certificate_der) => {
                self.certificate_sent = true;
                Ok(ClientCertificate { certificate_der })
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    /// Generate a session key and seal it for the verified responder
    ///
    /// The initiator counts as `Established` once the sealed key is handed
    /// out, before the responder has unsealed it. A caller driving the steps
    /// itself must drop the returned [`Session`] and call [`Initiator::abort`]
    /// if the responder then rejects the key exchange. [`run_handshake`] does
    /// this and never returns a session unless both sides succeeded.
    pub fn key_exchange(&mut self) -> HandshakeResult<(KeyExchange, Session)> {
        let stage = HandshakeStage::KeyExchange;
        self.expect_state(HandshakeState::Authenticated, stage)?;
        if self.config.client_auth == ClientAuth::Required && !self.certificate_sent {
            return Err(self.fail(
                stage,
                Error::OutOfOrder {
                    expected: "client certificate sent",
                    actual: self.state.name(),
                },
            ));
        }

        let (peer_name, peer_key) = match self.peer.take() {
            Some(peer) => peer,
            None => {
                let actual = self.state.name();
                return Err(self.fail(
                    stage,
                    Error::OutOfOrder {
                        expected: "Authenticated",
                        actual,
                    },
                ));
            }
        };

        let transport = KeyTransport::new(self.config.transport_padding);
        let sealed = SessionKey::generate()
            .and_then(|key| Ok((transport.seal(&peer_key, &key)?, key)));
        match sealed {
            Ok((sealed_key, key)) => {
                self.state = HandshakeState::Established;
                info!(peer = %peer_name, role = "initiator", "handshake established");
                let session = Session::new(peer_name.clone(), key, self.config.record_padding);
                self.peer = Some((peer_name, peer_key));
                Ok((KeyExchange { sealed_key }, session))
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    /// Discard all progress, e.g. because the other side failed
    pub fn abort(&mut self) {
        self.state = HandshakeState::Aborted;
        self.peer = None;
    }

    fn expect_state(
        &mut self,
        expected: HandshakeState,
        stage: HandshakeStage,
    ) -> HandshakeResult<()> {
        if self.state == expected {
            return Ok(());
        }
        let actual = self.state.name();
        Err(self.fail(
            stage,
            Error::OutOfOrder {
                expected: expected.name(),
                actual,
            },
        ))
    }

    fn fail(&mut self, stage: HandshakeStage, source: Error) -> HandshakeError {
        self.abort();
        warn!(role = "initiator", %stage, error = %source, "handshake aborted");
        HandshakeError::new(stage, source)
    }
}

impl fmt::Debug for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Initiator")
            .field("state", &self.state)
            .field("peer", &self.peer_name())
            .field("client_auth", &self.config.client_auth)
            .finish()
    }
}

// ================= Responder =================

/// The party that presents its certificate and receives the session key.
pub struct Responder {
    config: HandshakeConfig,
    trust_store: TrustStore,
    identity: Identity,
    state: HandshakeState,
    hello_sent: bool,
    client_name: Option<String>,
}

impl Responder {
    pub fn new(identity: Identity, trust_store: TrustStore, config: HandshakeConfig) -> Self {
        Self {
            config,
            trust_store,
            identity,
            state: HandshakeState::Init,
            hello_sent: false,
            client_name: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Verified initiator name in the mutual-authentication variant
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Send this party's certificate
    ///
    /// Without client authentication there is nothing left to verify on this
    /// side, so the responder moves straight to `Authenticated`.
    pub fn hello(&mut self) -> HandshakeResult<ServerHello> {
        let stage = HandshakeStage::Authentication;
        self.expect_state(HandshakeState::Init, stage)?;
        if self.hello_sent {
            return Err(self.fail(
                stage,
                Error::OutOfOrder {
                    expected: "Init",
                    actual: "hello already sent",
                },
            ));
        }

        match self.identity.certificate.to_der() {
            Ok(certificate_der) => {
                self.hello_sent = true;
                if self.config.client_auth == ClientAuth::None {
                    self.state = HandshakeState::Authenticated;
                }
                Ok(ServerHello { certificate_der })
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    /// Verify the initiator's certificate (mutual authentication)
    pub fn authenticate_client(&mut self, message: &ClientCertificate) -> HandshakeResult<()> {
        let stage = HandshakeStage::Authentication;
        self.expect_state(HandshakeState::Init, stage)?;
        if !self.hello_sent || self.config.client_auth != ClientAuth::Required {
            return Err(self.fail(
                stage,
                Error::OutOfOrder {
                    expected: "hello sent with client authentication",
                    actual: self.state.name(),
                },
            ));
        }

        let verified = Certificate::from_der(&message.certificate_der).and_then(|cert| {
            CertificateVerifier::new().verify_certificate(&cert, &self.trust_store)?;
            Ok(cert.subject_name())
        });
        match verified {
            Ok(name) => {
                self.client_name = Some(name);
                self.state = HandshakeState::Authenticated;
                Ok(())
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    /// Unseal the session key with this party's private key
    pub fn accept_key_exchange(&mut self, message: &KeyExchange) -> HandshakeResult<Session> {
        let stage = HandshakeStage::KeyExchange;
        self.expect_state(HandshakeState::Authenticated, stage)?;

        let transport = KeyTransport::new(self.config.transport_padding);
        match transport.unseal(&self.identity.key_pair, &message.sealed_key) {
            Ok(key) => {
                self.state = HandshakeState::Established;
                let peer = self
                    .client_name
                    .clone()
                    .unwrap_or_else(|| "anonymous".to_string());
                info!(peer = %peer, role = "responder", "handshake established");
                Ok(Session::new(peer, key, self.config.record_padding))
            }
            Err(e) => Err(self.fail(stage, e)),
        }
    }

    pub fn abort(&mut self) {
        self.state = HandshakeState::Aborted;
        self.client_name = None;
    }

    fn expect_state(
        &mut self,
        expected: HandshakeState,
        stage: HandshakeStage,
    ) -> HandshakeResult<()> {
        if self.state == expected {
            return Ok(());
        }
        let actual = self.state.name();
        Err(self.fail(
            stage,
            Error::OutOfOrder {
                expected: expected.name(),
                actual,
            },
        ))
    }

    fn fail(&mut self, stage: HandshakeStage, source: Error) -> HandshakeError {
        self.abort();
        warn!(role = "responder", %stage, error = %source, "handshake aborted");
        HandshakeError::new(stage, source)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("state", &self.state)
            .field("identity", &self.identity.name())
            .field("client", &self.client_name)
            .finish()
    }
}

// ================= Session =================

/// An established channel. Owns the session key until closed or dropped.
pub struct Session {
    peer_name: String,
    key: Option<SessionKey>,
    channel: SymmetricChannel,
}

impl Session {
    fn new(peer_name: String, key: SessionKey, padding: PaddingMode) -> Self {
        Self {
            peer_name,
            key: Some(key),
            channel: SymmetricChannel::new(padding),
        }
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn is_open(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt a payload into wire record bytes
    pub fn encrypt(&self, plaintext: &[u8]) -> HandshakeResult<Vec<u8>> {
        let key = self.key.as_ref().ok_or_else(closed)?;
        self.channel
            .encrypt(key, plaintext)
            .map(|record| record.to_bytes())
            .map_err(|e| HandshakeError::new(HandshakeStage::SecureExchange, e))
    }

    /// Decrypt wire record bytes. A failure closes the session.
    pub fn decrypt(&mut self, record: &[u8]) -> HandshakeResult<Vec<u8>> {
        let key = self.key.as_ref().ok_or_else(closed)?;
        match self.channel.decrypt_bytes(key, record) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                warn!(peer = %self.peer_name, error = %e, "closing session after record failure");
                self.close();
                Err(HandshakeError::new(HandshakeStage::SecureExchange, e))
            }
        }
    }

    /// Drop (and zeroize) the session key
    pub fn close(&mut self) {
        self.key = None;
    }
}

fn closed() -> HandshakeError {
    HandshakeError::new(HandshakeStage::SecureExchange, Error::SessionClosed)
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("peer", &self.peer_name)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Drive both parties through the full handshake in memory
///
/// Returns `(initiator_session, responder_session)`. If either side fails, both
/// are left `Aborted`.
pub fn run_handshake(
    initiator: &mut Initiator,
    responder: &mut Responder,
) -> HandshakeResult<(Session, Session)> {
    let result = drive(initiator, responder);
    if result.is_err() {
        initiator.abort();
        responder.abort();
    }
    result
}

fn drive(
    initiator: &mut Initiator,
    responder: &mut Responder,
) -> HandshakeResult<(Session, Session)> {
    let hello = responder.hello()?;
    initiator.authenticate(&hello)?;
    if responder.config.client_auth == ClientAuth::Required {
        let client_cert = initiator.client_certificate()?;
        responder.authenticate_client(&client_cert)?;
    }
    let (exchange, initiator_session) = initiator.key_exchange()?;
    let responder_session = responder.accept_key_exchange(&exchange)?;
    Ok((initiator_session, responder_session))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate_authority::{CertificateAuthority, LeafUsage};

    struct Fixture {
        ca: CertificateAuthority,
        server: Identity,
        client: Identity,
    }

    fn fixture() -> Fixture {
        let ca = CertificateAuthority::new("RootCA").unwrap();
        let (server_keys, server_cert) = ca
            .issue_key_pair("server.example", LeafUsage::Server)
            .unwrap();
        let (client_keys, client_cert) = ca
            .issue_key_pair("client.example", LeafUsage::Client)
            .unwrap();
        Fixture {
            server: Identity::new(server_keys, server_cert).unwrap(),
            client: Identity::new(client_keys, client_cert).unwrap(),
            ca,
        }
    }

    fn mutual() -> HandshakeConfig {
        HandshakeConfig {
            client_auth: ClientAuth::Required,
            ..HandshakeConfig::default()
        }
    }

    #[test]
    fn test_step_by_step_transitions() {
        let f = fixture();
        let mut initiator = Initiator::new(f.ca.trust_store(), HandshakeConfig::default());
        let mut responder =
            Responder::new(f.server, f.ca.trust_store(), HandshakeConfig::default());
        assert_eq!(initiator.state(), HandshakeState::Init);
        assert_eq!(responder.state(), HandshakeState::Init);

        let hello = responder.hello().unwrap();
        assert_eq!(responder.state(), HandshakeState::Authenticated);

        initiator.authenticate(&hello).unwrap();
        assert_eq!(initiator.state(), HandshakeState::Authenticated);
        assert_eq!(initiator.peer_name(), Some("server.example"));

        let (exchange, client_session) = initiator.key_exchange().unwrap();
        assert_eq!(initiator.state(), HandshakeState::Established);

        let mut server_session = responder.accept_key_exchange(&exchange).unwrap();
        assert_eq!(responder.state(), HandshakeState::Established);

        let record = client_session.encrypt(b"hello").unwrap();
        assert_eq!(server_session.decrypt(&record).unwrap(), b"hello");
    }

    #[test]
    fn test_key_exchange_before_authentication_aborts() {
        let f = fixture();
        let mut initiator = Initiator::new(f.ca.trust_store(), HandshakeConfig::default());
        let err = initiator.key_exchange().unwrap_err();
        assert_eq!(err.stage, HandshakeStage::KeyExchange);
        assert!(matches!(err.source, Error::OutOfOrder { .. }));
        assert_eq!(initiator.state(), HandshakeState::Aborted);

        // Aborted is terminal
        let hello = ServerHello {
            certificate_der: f.server.certificate().to_der().unwrap(),
        };
        let err = initiator.authenticate(&hello).unwrap_err();
        assert!(matches!(
            err.source,
            Error::OutOfOrder {
                actual: "Aborted",
                ..
            }
        ));
    }

    #[test]
    fn test_untrusted_server_aborts_in_authentication() {
        let f = fixture();
        let other = CertificateAuthority::new("OtherRootCA").unwrap();
        let mut initiator = Initiator::new(other.trust_store(), HandshakeConfig::default());
        let mut responder =
            Responder::new(f.server, f.ca.trust_store(), HandshakeConfig::default());

        let err = run_handshake(&mut initiator, &mut responder).unwrap_err();
        assert_eq!(err.stage, HandshakeStage::Authentication);
        assert!(matches!(err.source, Error::UntrustedIssuer { .. }));
        assert!(err.to_string().starts_with("handshake aborted during authentication"));
        assert_eq!(initiator.state(), HandshakeState::Aborted);
        assert_eq!(responder.state(), HandshakeState::Aborted);
    }

    #[test]
    fn test_mutual_handshake() {
        let f = fixture();
        let mut initiator =
            Initiator::new(f.ca.trust_store(), mutual()).with_identity(f.client);
        let mut responder = Responder::new(f.server, f.ca.trust_store(), mutual());

        let (client_session, mut server_session) =
            run_handshake(&mut initiator, &mut responder).unwrap();
        assert_eq!(responder.client_name(), Some("client.example"));
        assert_eq!(client_session.peer_name(), "server.example");
        assert_eq!(server_session.peer_name(), "client.example");

        let record = client_session.encrypt(b"PING").unwrap();
        assert_eq!(server_session.decrypt(&record).unwrap(), b"PING");
    }

    #[test]
    fn test_mutual_requires_client_identity() {
        let f = fixture();
        let mut initiator = Initiator::new(f.ca.trust_store(), mutual());
        let mut responder = Responder::new(f.server, f.ca.trust_store(), mutual());

        let err = run_handshake(&mut initiator, &mut responder).unwrap_err();
        assert_eq!(err.stage, HandshakeStage::Authentication);
        assert!(matches!(err.source, Error::MissingIdentity));
    }

    #[test]
    fn test_mutual_rejects_foreign_client() {
        let f = fixture();
        let rogue_ca = CertificateAuthority::new("RogueCA").unwrap();
        let (keys, cert) = rogue_ca
            .issue_key_pair("client.example", LeafUsage::Client)
            .unwrap();
        let rogue = Identity::new(keys, cert).unwrap();

        let mut initiator =
            Initiator::new(f.ca.trust_store(), mutual()).with_identity(rogue);
        let mut responder = Responder::new(f.server, f.ca.trust_store(), mutual());

        let err = run_handshake(&mut initiator, &mut responder).unwrap_err();
        assert_eq!(err.stage, HandshakeStage::Authentication);
        assert!(matches!(err.source, Error::UntrustedIssuer { .. }));
        assert_eq!(responder.state(), HandshakeState::Aborted);
        assert_eq!(initiator.state(), HandshakeState::Aborted);
    }

    #[test]
    fn test_mutual_initiator_cannot_skip_certificate() {
        let f = fixture();
        let mut initiator =
            Initiator::new(f.ca.trust_store(), mutual()).with_identity(f.client);
        let mut responder = Responder::new(f.server, f.ca.trust_store(), mutual());

        let hello = responder.hello().unwrap();
        assert_eq!(responder.state(), HandshakeState::Init);
        initiator.authenticate(&hello).unwrap();
        let err = initiator.key_exchange().unwrap_err();
        assert_eq!(err.stage, HandshakeStage::KeyExchange);
        assert_eq!(initiator.state(), HandshakeState::Aborted);
    }

    #[test]
    fn test_corrupted_key_exchange_aborts_responder() {
        let f = fixture();
        let mut initiator = Initiator::new(f.ca.trust_store(), HandshakeConfig::default());
        let mut responder =
            Responder::new(f.server, f.ca.trust_store(), HandshakeConfig::default());

        let hello = responder.hello().unwrap();
        initiator.authenticate(&hello).unwrap();
        let (exchange, _) = initiator.key_exchange().unwrap();

        let mut bytes = exchange.sealed_key.into_bytes();
        bytes[10] ^= 0xFF;
        let forged = KeyExchange {
            sealed_key: SealedKey::from_bytes(bytes),
        };
        let err = responder.accept_key_exchange(&forged).unwrap_err();
        assert_eq!(err.stage, HandshakeStage::KeyExchange);
        assert!(matches!(err.source, Error::Decryption));
        assert_eq!(responder.state(), HandshakeState::Aborted);
    }

    #[test]
    fn test_responder_rejection_aborts_established_initiator() {
        let f = fixture();
        let initiator_config = HandshakeConfig {
            transport_padding: TransportPadding::Pkcs1,
            ..HandshakeConfig::default()
        };
        let responder_config = HandshakeConfig::default();
        let mut initiator = Initiator::new(f.ca.trust_store(), initiator_config);
        let mut responder = Responder::new(f.server, f.ca.trust_store(), responder_config);

        let err = run_handshake(&mut initiator, &mut responder).unwrap_err();
        assert_eq!(err.stage, HandshakeStage::KeyExchange);
        assert!(matches!(err.source, Error::Decryption));
        assert_eq!(initiator.state(), HandshakeState::Aborted);
        assert_eq!(initiator.peer_name(), None);
        assert_eq!(responder.state(), HandshakeState::Aborted);
    }

    #[test]
    fn test_session_closes_after_bad_record() {
        let f = fixture();
        let mut initiator = Initiator::new(f.ca.trust_store(), HandshakeConfig::default());
        let mut responder =
            Responder::new(f.server, f.ca.trust_store(), HandshakeConfig::default());
        let (client, mut server) = run_handshake(&mut initiator, &mut responder).unwrap();

        let err = server.decrypt(&[0u8; 8]).unwrap_err();
        assert_eq!(err.stage, HandshakeStage::SecureExchange);
        assert!(matches!(err.source, Error::InvalidRecord { len: 8 }));
        assert!(!server.is_open());

        let record = client.encrypt(b"late").unwrap();
        let err = server.decrypt(&record).unwrap_err();
        assert!(matches!(err.source, Error::SessionClosed));
    }

    #[test]
    fn test_identity_rejects_mismatched_key() {
        let f = fixture();
        let stray = KeyPair::generate().unwrap();
        let err = Identity::new(stray, f.server.certificate().clone()).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[test]
    fn test_pkcs1_transport_and_lenient_records() {
        let f = fixture();
        let config = HandshakeConfig {
            client_auth: ClientAuth::None,
            transport_padding: TransportPadding::Pkcs1,
            record_padding: PaddingMode::Lenient,
        };
        let mut initiator = Initiator::new(f.ca.trust_store(), config);
        let mut responder = Responder::new(f.server, f.ca.trust_store(), config);
        let (client, mut server) = run_handshake(&mut initiator, &mut responder).unwrap();
        let record = client.encrypt(b"compat").unwrap();
        assert_eq!(server.decrypt(&record).unwrap(), b"compat");
    }
}

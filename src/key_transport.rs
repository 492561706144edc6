//! Asymmetric transport of a session key under a verified peer public key.
//!
//! The sealed key is the raw RSA output, exactly one modulus long. OAEP is the
//! default padding; PKCS#1 v1.5 is kept for interoperating with peers that
//! still seal keys that way.

use openssl::rsa::Padding;
use secrecy::{ExposeSecret, SecretVec, Zeroize};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::key_pair::{KeyPair, PublicKey};
use crate::session_key::SessionKey;

/// PKCS#1 v1.5 encryption overhead in bytes
const PKCS1_OVERHEAD: usize = 11;
/// OAEP overhead with SHA-1: 2 * hash_len + 2
const OAEP_SHA1_OVERHEAD: usize = 42;

/// RSA encryption padding used for key transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPadding {
    /// Randomized OAEP padding
    #[default]
    Oaep,
    /// PKCS#1 v1.5 padding
    Pkcs1,
}

impl TransportPadding {
    fn openssl_padding(self) -> Padding {
        match self {
            TransportPadding::Oaep => Padding::PKCS1_OAEP,
            TransportPadding::Pkcs1 => Padding::PKCS1,
        }
    }

    fn overhead(self) -> usize {
        match self {
            TransportPadding::Oaep => OAEP_SHA1_OVERHEAD,
            TransportPadding::Pkcs1 => PKCS1_OVERHEAD,
        }
    }
}

/// A session key encrypted for one recipient. Single use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedKey {
    bytes: Vec<u8>,
}

impl SealedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Seals and unseals key material with RSA.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyTransport {
    padding: TransportPadding,
}

impl KeyTransport {
    pub fn new(padding: TransportPadding) -> Self {
        Self { padding }
    }

    pub fn padding(&self) -> TransportPadding {
        self.padding
    }

    /// Largest payload that fits under `peer_public_key` with this padding
    pub fn capacity(&self, peer_public_key: &PublicKey) -> Result<usize> {
        let rsa = peer_public_key.pkey().rsa()?;
        Ok((rsa.size() as usize).saturating_sub(self.padding.overhead()))
    }

    /// Encrypt a session key for the holder of `peer_public_key`
    pub fn seal(&self, peer_public_key: &PublicKey, session_key: &SessionKey) -> Result<SealedKey> {
        self.seal_bytes(peer_public_key, session_key.expose())
    }

    /// Decrypt a sealed session key with the recipient's own key pair
    ///
    /// # Errors
    /// Returns [`Error::Decryption`] if the sealed key was not produced for this
    /// key pair, is malformed, or does not decrypt to exactly 32 bytes.
    pub fn unseal(&self, own_key_pair: &KeyPair, sealed_key: &SealedKey) -> Result<SessionKey> {
        let plain = self.unseal_bytes(own_key_pair, sealed_key)?;
        SessionKey::from_slice(plain.expose_secret())
    }

    /// Encrypt arbitrary short key material
    ///
    /// # Errors
    /// Returns [`Error::KeyTooLarge`] if `key_material` exceeds [`Self::capacity`].
    pub fn seal_bytes(&self, peer_public_key: &PublicKey, key_material: &[u8]) -> Result<SealedKey> {
        let rsa = peer_public_key.pkey().rsa()?;
        let max = (rsa.size() as usize).saturating_sub(self.padding.overhead());
        if key_material.len() > max {
            return Err(Error::KeyTooLarge {
                len: key_material.len(),
                max,
            });
        }

        let mut ciphertext = vec![0u8; rsa.size() as usize];
        let len = rsa.public_encrypt(key_material, &mut ciphertext, self.padding.openssl_padding())?;
        ciphertext.truncate(len);
        debug!(
            padding = ?self.padding,
            modulus_bits = rsa.size() * 8,
            "sealed key material"
        );
        Ok(SealedKey::from_bytes(ciphertext))
    }

    /// Decrypt key material sealed by [`Self::seal_bytes`]
    pub fn unseal_bytes(
        &self,
        own_key_pair: &KeyPair,
        sealed_key: &SealedKey,
    ) -> Result<SecretVec<u8>> {
        let rsa = own_key_pair.private_key().rsa()?;
        if sealed_key.len() != rsa.size() as usize {
            return Err(Error::Decryption);
        }

        let mut plain = vec![0u8; rsa.size() as usize];
        let len = match rsa.private_decrypt(
            sealed_key.as_bytes(),
            &mut plain,
            self.padding.openssl_padding(),
        ) {
            Ok(len) => len,
            Err(_) => {
                plain.zeroize();
                return Err(Error::Decryption);
            }
        };
        plain.truncate(len);
        Ok(SecretVec::new(plain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_roundtrip() {
        let server = KeyPair::generate().unwrap();
        let transport = KeyTransport::default();
        let key = SessionKey::generate().unwrap();

        let sealed = transport.seal(&server.public_key().unwrap(), &key).unwrap();
        assert_eq!(sealed.len(), 256);

        let recovered = transport.unseal(&server, &sealed).unwrap();
        assert_eq!(recovered, key);
    }

    #[test]
    fn test_pkcs1_roundtrip() {
        let server = KeyPair::generate().unwrap();
        let transport = KeyTransport::new(TransportPadding::Pkcs1);
        let key = SessionKey::generate().unwrap();

        let sealed = transport.seal(&server.public_key().unwrap(), &key).unwrap();
        assert_eq!(sealed.len(), 256);
        assert_eq!(transport.unseal(&server, &sealed).unwrap(), key);
    }

    #[test]
    fn test_oaep_is_randomized() {
        let server = KeyPair::generate().unwrap();
        let public = server.public_key().unwrap();
        let transport = KeyTransport::default();
        let key = SessionKey::generate().unwrap();
        let a = transport.seal(&public, &key).unwrap();
        let b = transport.seal(&public, &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_capacity_limits() {
        let server = KeyPair::generate().unwrap();
        let public = server.public_key().unwrap();

        let oaep = KeyTransport::new(TransportPadding::Oaep);
        assert_eq!(oaep.capacity(&public).unwrap(), 256 - 42);
        let fits = vec![0x5Au8; 214];
        let sealed = oaep.seal_bytes(&public, &fits).unwrap();
        assert_eq!(oaep.unseal_bytes(&server, &sealed).unwrap().expose_secret(), &fits);

        let err = oaep.seal_bytes(&public, &[0u8; 215]).unwrap_err();
        assert!(matches!(err, Error::KeyTooLarge { len: 215, max: 214 }));

        let pkcs1 = KeyTransport::new(TransportPadding::Pkcs1);
        assert_eq!(pkcs1.capacity(&public).unwrap(), 245);
        let err = pkcs1.seal_bytes(&public, &[0u8; 246]).unwrap_err();
        assert!(matches!(err, Error::KeyTooLarge { len: 246, max: 245 }));
    }

    #[test]
    fn test_unseal_with_wrong_key_fails() {
        let server = KeyPair::generate().unwrap();
        let intruder = KeyPair::generate().unwrap();
        let transport = KeyTransport::default();
        let sealed = transport
            .seal(&server.public_key().unwrap(), &SessionKey::generate().unwrap())
            .unwrap();
        assert!(matches!(
            transport.unseal(&intruder, &sealed),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_unseal_rejects_truncated() {
        let server = KeyPair::generate().unwrap();
        let transport = KeyTransport::default();
        let sealed = transport
            .seal(&server.public_key().unwrap(), &SessionKey::generate().unwrap())
            .unwrap();
        let mut bytes = sealed.into_bytes();
        bytes.pop();
        assert!(matches!(
            transport.unseal(&server, &SealedKey::from_bytes(bytes)),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_unseal_rejects_wrong_length_plaintext() {
        let server = KeyPair::generate().unwrap();
        let transport = KeyTransport::default();
        let sealed = transport
            .seal_bytes(&server.public_key().unwrap(), &[1u8; 16])
            .unwrap();
        assert!(matches!(
            transport.unseal(&server, &sealed),
            Err(Error::Decryption)
        ));
    }
}

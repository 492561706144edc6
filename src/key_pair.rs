//! RSA key pairs for roots, servers and clients.
//!
//! A [`KeyPair`] owns its private key exclusively: it is not `Clone`, its
//! `Debug` output is redacted, and the only way to serialize the private half is
//! [`KeyPair::private_key_to_pem`], which hands the bytes back inside a
//! zeroizing [`SecretVec`]. The public half travels as a [`PublicKey`] in
//! SubjectPublicKeyInfo DER.

use std::fmt;

use openssl::pkey::{PKey, Private, Public};
use openssl::rsa::Rsa;
use secrecy::SecretVec;

use crate::error::{Error, Result};

/// Smallest modulus the generator will produce.
pub const MIN_RSA_KEY_BITS: u32 = 2048;
/// Modulus size used when none is configured.
pub const RSA_KEY_SIZE_DEFAULT: u32 = 2048;

/// Produces RSA key pairs of a fixed modulus size.
#[derive(Debug, Clone, Copy)]
pub struct KeyPairGenerator {
    bits: u32,
}

impl Default for KeyPairGenerator {
    fn default() -> Self {
        Self {
            bits: RSA_KEY_SIZE_DEFAULT,
        }
    }
}

impl KeyPairGenerator {
    /// Create a generator for `bits`-sized moduli
    ///
    /// # Errors
    /// Returns [`Error::KeyGeneration`] if `bits` is below [`MIN_RSA_KEY_BITS`].
    pub fn new(bits: u32) -> Result<Self> {
        if bits < MIN_RSA_KEY_BITS {
            return Err(Error::KeyGeneration(format!(
                "modulus of {} bits is below the {} bit minimum",
                bits, MIN_RSA_KEY_BITS
            )));
        }
        Ok(Self { bits })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Generate a fresh key pair from the OpenSSL CSPRNG
    pub fn generate(&self) -> Result<KeyPair> {
        let rsa = Rsa::generate(self.bits)
            .map_err(|e| Error::KeyGeneration(format!("failed to generate RSA keypair: {}", e)))?;
        let private_key = PKey::from_rsa(rsa)
            .map_err(|e| Error::KeyGeneration(format!("failed to create private key: {}", e)))?;
        Ok(KeyPair { private_key })
    }
}

/// An RSA key pair owned by exactly one party.
pub struct KeyPair {
    private_key: PKey<Private>,
}

impl KeyPair {
    /// Generate a key pair with the default modulus size
    pub fn generate() -> Result<Self> {
        KeyPairGenerator::default().generate()
    }

    /// Load a key pair from PEM (PKCS#8 or PKCS#1)
    pub fn from_private_key_pem(pem: &[u8]) -> Result<Self> {
        let private_key = PKey::private_key_from_pem(pem)
            .map_err(|e| Error::KeyGeneration(format!("failed to parse private key PEM: {}", e)))?;
        Self::from_pkey(private_key)
    }

    fn from_pkey(private_key: PKey<Private>) -> Result<Self> {
        let rsa = private_key
            .rsa()
            .map_err(|e| Error::KeyGeneration(format!("not an RSA private key: {}", e)))?;
        if rsa.size() * 8 < MIN_RSA_KEY_BITS {
            return Err(Error::KeyGeneration(format!(
                "modulus of {} bits is below the {} bit minimum",
                rsa.size() * 8,
                MIN_RSA_KEY_BITS
            )));
        }
        Ok(Self { private_key })
    }

    /// The shareable public half
    pub fn public_key(&self) -> Result<PublicKey> {
        let der = self.private_key.public_key_to_der()?;
        PublicKey::from_der(&der)
    }

    /// Modulus size in bits
    pub fn bits(&self) -> u32 {
        self.private_key.bits()
    }

    /// True when `public_key` is the public half of this pair
    pub fn matches(&self, public_key: &PublicKey) -> bool {
        self.private_key.public_eq(&public_key.key)
    }

    /// Export the private key as PKCS#8 PEM for the owner's own storage
    pub fn private_key_to_pem(&self) -> Result<SecretVec<u8>> {
        let pem = self.private_key.private_key_to_pem_pkcs8()?;
        Ok(SecretVec::new(pem))
    }

    pub(crate) fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// An RSA public key, shareable with any peer.
#[derive(Clone)]
pub struct PublicKey {
    key: PKey<Public>,
}

impl PublicKey {
    /// Parse SubjectPublicKeyInfo DER
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let key = PKey::public_key_from_der(der)?;
        Ok(Self { key })
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(self.key.public_key_to_der()?)
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.key.public_key_to_pem()?)
    }

    /// Modulus size in bits
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }

    pub(crate) fn from_pkey(key: PKey<Public>) -> Self {
        Self { key }
    }

    pub(crate) fn pkey(&self) -> &PKey<Public> {
        &self.key
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.public_eq(&other.key)
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("bits", &self.bits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_generator_rejects_small_modulus() {
        let err = KeyPairGenerator::new(1024).unwrap_err();
        assert!(matches!(err, Error::KeyGeneration(_)));
    }

    #[test]
    fn test_generated_pair_matches_public_half() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();
        assert_eq!(pair.bits(), 2048);
        assert_eq!(public.bits(), 2048);
        assert!(pair.matches(&public));

        let other = KeyPair::generate().unwrap();
        assert!(!other.matches(&public));
    }

    #[test]
    fn test_public_key_der_roundtrip() {
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key().unwrap();
        let parsed = PublicKey::from_der(&public.to_der().unwrap()).unwrap();
        assert_eq!(parsed, public);
    }

    #[test]
    fn test_private_key_pem_reload() {
        let pair = KeyPair::generate().unwrap();
        let pem = pair.private_key_to_pem().unwrap();
        let reloaded = KeyPair::from_private_key_pem(pem.expose_secret()).unwrap();
        assert!(reloaded.matches(&pair.public_key().unwrap()));
    }

    #[test]
    fn test_debug_no_leak() {
        let pair = KeyPair::generate().unwrap();
        let debug_str = format!("{:?}", pair);
        assert!(debug_str.contains("<redacted>"));
        assert!(!debug_str.contains("BEGIN"));
    }
}

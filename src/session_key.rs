//! Per-handshake symmetric key.

use std::fmt;

use secrecy::{ExposeSecret, Secret};

use crate::error::{Error, Result};

/// Length of a session key in bytes (AES-256)
pub const SESSION_KEY_LEN: usize = 32;

/// A fresh 32-byte key shared by exactly two handshake participants.
///
/// Not `Clone`. The bytes are zeroized when the key is dropped.
pub struct SessionKey {
    bytes: Secret<[u8; SESSION_KEY_LEN]>,
}

impl SessionKey {
    /// Draw a new key from the OpenSSL CSPRNG
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; SESSION_KEY_LEN];
        openssl::rand::rand_bytes(&mut bytes)?;
        Ok(Self {
            bytes: Secret::new(bytes),
        })
    }

    /// Wrap key bytes received from key transport
    ///
    /// # Errors
    /// Returns [`Error::Decryption`] if `bytes` is not exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SESSION_KEY_LEN] = bytes.try_into().map_err(|_| Error::Decryption)?;
        Ok(Self {
            bytes: Secret::new(bytes),
        })
    }

    pub(crate) fn expose(&self) -> &[u8; SESSION_KEY_LEN] {
        self.bytes.expose_secret()
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        openssl::memcmp::eq(self.expose(), other.expose())
    }
}

impl Eq for SessionKey {}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let a = SessionKey::generate().unwrap();
        let b = SessionKey::generate().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.expose().len(), SESSION_KEY_LEN);
    }

    #[test]
    fn test_from_slice_length() {
        assert!(SessionKey::from_slice(&[7u8; 32]).is_ok());
        assert!(matches!(
            SessionKey::from_slice(&[7u8; 31]),
            Err(Error::Decryption)
        ));
    }

    #[test]
    fn test_debug_no_leak() {
        let key = SessionKey::from_slice(&[0xAB; 32]).unwrap();
        let debug_str = format!("{:?}", key);
        assert!(debug_str.contains("redacted"));
        assert!(!debug_str.to_lowercase().contains("ab, "));
        assert!(!debug_str.contains("171"));
    }
}

//! AES-256-CBC record encryption under a session key.
//!
//! Wire format of a [`CipherRecord`]:
//! ```text
//! [IV: 16 bytes][ciphertext: N * 16 bytes]
//! ```
//! No length prefix; the block size is fixed. Plaintext is padded with the
//! pad-length byte repeated pad-length times, and a full block of padding is
//! appended when the plaintext is already block aligned.

use openssl::symm::{Cipher, Crypter, Mode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::session_key::SessionKey;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// How strictly padding is checked on decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Pad length must be in `[1, 16]` and every pad byte must equal it
    #[default]
    Strict,
    /// Read the last byte as a count and truncate, without further checks
    Lenient,
}

/// IV plus block-aligned ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherRecord {
    iv: [u8; BLOCK_SIZE],
    ciphertext: Vec<u8>,
}

impl CipherRecord {
    /// Split wire bytes into IV and ciphertext
    ///
    /// # Errors
    /// Returns [`Error::InvalidRecord`] if the record is shorter than an IV plus
    /// one block, or the ciphertext is not block aligned.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 * BLOCK_SIZE || bytes.len() % BLOCK_SIZE != 0 {
            return Err(Error::InvalidRecord { len: bytes.len() });
        }
        let (iv, ciphertext) = bytes.split_at(BLOCK_SIZE);
        let mut iv_buf = [0u8; BLOCK_SIZE];
        iv_buf.copy_from_slice(iv);
        Ok(Self {
            iv: iv_buf,
            ciphertext: ciphertext.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOCK_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn iv(&self) -> &[u8; BLOCK_SIZE] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Encrypts and decrypts payloads with a shared session key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymmetricChannel {
    padding: PaddingMode,
}

impl SymmetricChannel {
    pub fn new(padding: PaddingMode) -> Self {
        Self { padding }
    }

    pub fn padding_mode(&self) -> PaddingMode {
        self.padding
    }

    /// Pad, draw a fresh random IV and encrypt in CBC mode
    pub fn encrypt(&self, key: &SessionKey, plaintext: &[u8]) -> Result<CipherRecord> {
        let mut iv = [0u8; BLOCK_SIZE];
        openssl::rand::rand_bytes(&mut iv)?;

        let padded = pad(plaintext);
        let ciphertext = run_cbc(Mode::Encrypt, key, &iv, &padded)?;
        debug!(
            plaintext_len = plaintext.len(),
            record_len = BLOCK_SIZE + ciphertext.len(),
            "encrypted record"
        );
        Ok(CipherRecord { iv, ciphertext })
    }

    /// Decrypt a record and strip its padding
    pub fn decrypt(&self, key: &SessionKey, record: &CipherRecord) -> Result<Vec<u8>> {
        if record.ciphertext.is_empty() || record.ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::InvalidRecord {
                len: BLOCK_SIZE + record.ciphertext.len(),
            });
        }
        let padded = run_cbc(Mode::Decrypt, key, &record.iv, &record.ciphertext)?;
        match self.padding {
            PaddingMode::Strict => unpad_strict(padded),
            PaddingMode::Lenient => Ok(unpad_lenient(padded)),
        }
    }

    /// Decrypt wire bytes, see [`CipherRecord::from_bytes`]
    pub fn decrypt_bytes(&self, key: &SessionKey, record: &[u8]) -> Result<Vec<u8>> {
        self.decrypt(key, &CipherRecord::from_bytes(record)?)
    }
}

fn run_cbc(mode: Mode, key: &SessionKey, iv: &[u8], input: &[u8]) -> Result<Vec<u8>> {
    let cipher = Cipher::aes_256_cbc();
    let mut crypter = Crypter::new(cipher, mode, key.expose(), Some(iv))?;
    // Padding is handled here, not by OpenSSL
    crypter.pad(false);

    let mut out = vec![0u8; input.len() + cipher.block_size()];
    let mut count = crypter.update(input, &mut out)?;
    count += crypter.finalize(&mut out[count..])?;
    out.truncate(count);
    Ok(out)
}

fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_len as u8);
    padded
}

fn unpad_strict(mut data: Vec<u8>) -> Result<Vec<u8>> {
    let pad_len = match data.last() {
        Some(&last) => last as usize,
        None => return Err(Error::Padding),
    };
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > data.len() {
        return Err(Error::Padding);
    }
    let body_len = data.len() - pad_len;
    if data[body_len..].iter().any(|&b| b as usize != pad_len) {
        return Err(Error::Padding);
    }
    data.truncate(body_len);
    Ok(data)
}

fn unpad_lenient(mut data: Vec<u8>) -> Vec<u8> {
    let pad_len = data.last().copied().unwrap_or(0) as usize;
    let body_len = data.len().saturating_sub(pad_len);
    data.truncate(body_len);
    data
}

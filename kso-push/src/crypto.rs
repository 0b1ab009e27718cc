//! AES-256-CBC payload cipher.
//!
//! The push service encrypts event payloads with AES-256-CBC. The key is
//! the 32-byte ASCII representation of the lowercase-hex MD5 of the app
//! secret (the hex string itself, not its raw bytes), and the IV is the
//! first 16 bytes of the per-event nonce. Both must be preserved
//! bit-for-bit for wire compatibility.
//!
//! Padding is stripped manually: the server may send unpadded data on some
//! legacy paths, so implausible PKCS7 padding leaves the buffer unchanged
//! instead of failing.

use aes::Aes256;
use base64::Engine;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};
use md5::{Digest, Md5};

use kso_core::error::{KsoError, KsoResult};

type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;
const IV_LEN: usize = 16;

/// AES-256-CBC event payload encryption/decryption.
pub struct EventCipher;

impl EventCipher {
    /// Decrypt a standard-base64 ciphertext using the app secret and the
    /// event nonce.
    pub fn decrypt(secret_key: &str, encrypted_data: &str, nonce: &str) -> KsoResult<String> {
        let mut buf = base64::engine::general_purpose::STANDARD
            .decode(encrypted_data)
            .map_err(|e| KsoError::Decrypt(format!("base64 decode failed: {e}")))?;

        if buf.len() % BLOCK_SIZE != 0 {
            return Err(KsoError::Decrypt(format!(
                "ciphertext length {} is not a multiple of the block size",
                buf.len()
            )));
        }

        let key = Self::derive_key(secret_key);
        let iv = Self::derive_iv(nonce)?;

        let decryptor = Aes256CbcDec::new_from_slices(&key, iv)
            .map_err(|e| KsoError::Decrypt(format!("cipher init failed: {e}")))?;
        let decrypted = decryptor
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|e| KsoError::Decrypt(format!("decryption failed: {e}")))?;

        let unpadded = Self::strip_pkcs7(decrypted);
        String::from_utf8(unpadded.to_vec())
            .map_err(|e| KsoError::Decrypt(format!("utf8 decode failed: {e}")))
    }

    /// Encrypt a plaintext the way the server does; the counterpart of
    /// [`decrypt`](Self::decrypt), exercised by tests.
    pub fn encrypt(secret_key: &str, plaintext: &str, nonce: &str) -> KsoResult<String> {
        let key = Self::derive_key(secret_key);
        let iv = Self::derive_iv(nonce)?;

        let plaintext_bytes = plaintext.as_bytes();
        // Headroom for PKCS7 padding (up to one extra block).
        let mut buf = vec![0u8; plaintext_bytes.len() + BLOCK_SIZE];
        buf[..plaintext_bytes.len()].copy_from_slice(plaintext_bytes);

        let encryptor = Aes256CbcEnc::new_from_slices(&key, iv)
            .map_err(|e| KsoError::Decrypt(format!("cipher init failed: {e}")))?;
        let encrypted = encryptor
            .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext_bytes.len())
            .map_err(|e| KsoError::Decrypt(format!("encryption failed: {e}")))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(encrypted))
    }

    /// AES key: the lowercase-hex MD5 of the secret as 32 ASCII bytes.
    fn derive_key(secret_key: &str) -> [u8; 32] {
        let digest = Md5::digest(secret_key.as_bytes());
        let hex_str = hex::encode(digest);

        let mut key = [0u8; 32];
        key.copy_from_slice(hex_str.as_bytes());
        key
    }

    /// IV: the first 16 bytes of the nonce.
    fn derive_iv(nonce: &str) -> KsoResult<&[u8]> {
        let bytes = nonce.as_bytes();
        if bytes.len() < IV_LEN {
            return Err(KsoError::Decrypt(format!(
                "nonce too short for IV: {} bytes",
                bytes.len()
            )));
        }
        Ok(&bytes[..IV_LEN])
    }

    /// Strip PKCS7 padding when plausible; otherwise return the buffer
    /// unchanged (the server may send unpadded data on legacy paths).
    fn strip_pkcs7(data: &[u8]) -> &[u8] {
        let Some(&pad) = data.last() else {
            return data;
        };
        let pad = pad as usize;
        if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
            return data;
        }
        if data[data.len() - pad..].iter().all(|&b| b as usize == pad) {
            &data[..data.len() - pad]
        } else {
            data
        }
    }
}

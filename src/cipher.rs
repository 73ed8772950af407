/*! AES-128-ECB block cipher and PKCS#7-style padding.

The AniDB UDP API encrypts whole datagrams under AES-128 in ECB mode:
every 16-byte block is encrypted independently under the same key, no
chaining. This is a narrow enough need that this module drives the
block primitive directly rather than reaching for a full ECB-mode
wrapper.
*/
use aes::Aes128;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};

use crate::Error;

const BLOCK_SIZE: usize = 16;

/// An installed AES-128 cipher, shared between the encode and decode
/// paths of the frame codec.
#[derive(Clone)]
pub struct Cipher {
    key: [u8; BLOCK_SIZE],
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

impl Cipher {
    /// Install a cipher from a raw 16-byte AES-128 key.
    pub fn new(key: [u8; BLOCK_SIZE]) -> Self {
        Self { key }
    }

    fn block_cipher(&self) -> Aes128 {
        Aes128::new(GenericArray::from_slice(&self.key))
    }

    /// Pad `data` to a multiple of the block size (PKCS#7) and
    /// ECB-encrypt every block in place.
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        let cipher = self.block_cipher();
        let mut buf = pkcs7_pad(data, BLOCK_SIZE);
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        buf
    }

    /// ECB-decrypt every block and strip PKCS#7 padding.
    ///
    /// Returns [`Error::Framing`] if `data` isn't a multiple of the
    /// block size, or if the trailing padding byte is out of range.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
            return Err(Error::Framing(format!(
                "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
                data.len()
            )));
        }
        let cipher = self.block_cipher();
        let mut buf = data.to_vec();
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }
        pkcs7_unpad(buf, BLOCK_SIZE)
    }
}

fn pkcs7_pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad = block_size - (data.len() % block_size);
    let mut buf = Vec::with_capacity(data.len() + pad);
    buf.extend_from_slice(data);
    buf.resize(data.len() + pad, pad as u8);
    buf
}

fn pkcs7_unpad(mut data: Vec<u8>, block_size: usize) -> Result<Vec<u8>, Error> {
    let n = *data.last().expect("checked non-empty above") as usize;
    if n == 0 || n > block_size || n > data.len() {
        return Err(Error::Framing(format!(
            "invalid PKCS#7 padding length {n}"
        )));
    }
    data.truncate(data.len() - n);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 16] {
        *b"0123456789abcdef"
    }

    #[test]
    fn round_trip_various_lengths() {
        let cipher = Cipher::new(test_key());
        for size in [3usize, 16, 17, 31, 32, 33, 64] {
            let orig: Vec<u8> = (0..size as u8).collect();
            let ct = cipher.encrypt(&orig);
            assert_ne!(ct, orig, "size {size}: ciphertext must not equal plaintext");
            assert_eq!(ct.len() % 16, 0);
            let pt = cipher.decrypt(&ct).unwrap();
            assert_eq!(pt, orig, "size {size}");
        }
    }

    #[test]
    fn bad_padding_rejected() {
        let cipher = Cipher::new(test_key());
        let mut ct = cipher.encrypt(b"hello world");
        // Corrupt the encrypted padding byte by re-encrypting garbage
        // over the last block.
        let last = ct.len() - 16;
        let mut bad_block = [0xAAu8; 16];
        cipher.block_cipher().encrypt_block(GenericArray::from_mut_slice(&mut bad_block));
        ct[last..].copy_from_slice(&bad_block);
        assert!(cipher.decrypt(&ct).is_err());
    }

    #[test]
    fn rejects_non_block_multiple() {
        let cipher = Cipher::new(test_key());
        assert!(cipher.decrypt(&[0u8; 5]).is_err());
    }
}

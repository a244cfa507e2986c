//! Credential decryption.
//!
//! The host stores the SMTP password XOR-encrypted with a fixed pre-shared
//! key. The transform is its own inverse, so encryption and decryption are
//! the same operation. Decryption runs exactly once at startup; the
//! dispatcher only ever sees the decrypted snapshot.

use thiserror::Error;

/// Pre-shared key the host encrypts `auth.pass` with.
pub const PRESHARED_KEY: &str = "Zgfr56gFe87jJOM";

#[derive(Error, Debug, PartialEq)]
pub enum CryptoError {
    #[error("value decodes to an invalid character at position {0}")]
    InvalidCharacter(usize),
}

/// Decrypt a value with the given key.
pub fn decrypt(key: &str, value: &str) -> Result<String, CryptoError> {
    xor(key, value)
}

/// Encrypt a value with the given key. Same transform as [`decrypt`].
pub fn encrypt(key: &str, value: &str) -> Result<String, CryptoError> {
    xor(key, value)
}

fn xor(key: &str, value: &str) -> Result<String, CryptoError> {
    let key: Vec<u32> = key.chars().map(|c| c as u32).collect();
    if key.is_empty() {
        return Ok(value.to_string());
    }

    value
        .chars()
        .enumerate()
        .map(|(i, c)| {
            char::from_u32((c as u32) ^ key[i % key.len()])
                .ok_or(CryptoError::InvalidCharacter(i))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_identity() {
        let plain = "s3cr3t-p4ssw0rd";
        let encrypted = encrypt(PRESHARED_KEY, plain).unwrap();
        assert_ne!(encrypted, plain);
        assert_eq!(decrypt(PRESHARED_KEY, &encrypted).unwrap(), plain);
    }

    #[test]
    fn empty_value() {
        assert_eq!(decrypt(PRESHARED_KEY, "").unwrap(), "");
    }

    #[test]
    fn key_repeats_over_long_values() {
        let plain = "a".repeat(100);
        let encrypted = encrypt(PRESHARED_KEY, &plain).unwrap();
        assert_eq!(decrypt(PRESHARED_KEY, &encrypted).unwrap(), plain);
    }

    #[test]
    fn wrong_key_does_not_recover_plaintext() {
        let plain = "hunter2";
        let encrypted = encrypt(PRESHARED_KEY, plain).unwrap();
        let decrypted = decrypt("not-the-key-00", &encrypted);
        assert!(decrypted.is_err() || decrypted.unwrap() != plain);
    }
}

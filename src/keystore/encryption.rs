use josekit::jwe::{JweHeader, PBES2_HS256_A128KW};

use crate::errors::{Error, Result};

/// Compact JWE: PBES2-HS256+A128KW key wrapping, A256GCM content encryption
pub type EncryptedValue = String;

/// Encrypt an arbitrary secret under a passphrase
pub fn encrypt_value(plaintext: &[u8], passphrase: &[u8]) -> Result<EncryptedValue> {
    let mut header = JweHeader::new();
    header.set_algorithm("PBES2-HS256+A128KW");
    header.set_content_encryption("A256GCM");

    let encrypter = PBES2_HS256_A128KW
        .encrypter_from_bytes(passphrase)
        .map_err(|e| Error::Crypto(format!("Failed to create encrypter: {e}")))?;

    josekit::jwe::serialize_compact(plaintext, &header, &encrypter)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {e}")))
}

/// Decrypt a value produced by [`encrypt_value`]; a wrong passphrase is a `Crypto` error
pub fn decrypt_value(token: &str, passphrase: &[u8]) -> Result<Vec<u8>> {
    let decrypter = PBES2_HS256_A128KW
        .decrypter_from_bytes(passphrase)
        .map_err(|e| Error::Crypto(format!("Failed to create decrypter: {e}")))?;

    let (plaintext, _header) = josekit::jwe::deserialize_compact(token.trim(), &decrypter)
        .map_err(|e| Error::Crypto(format!("Decryption failed: {e}")))?;
    Ok(plaintext)
}

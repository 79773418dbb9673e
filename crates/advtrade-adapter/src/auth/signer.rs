/*
[INPUT]:  Message bytes and an account secret
[OUTPUT]: Lowercase hex HMAC-SHA256 authentication codes
[POS]:    Auth layer - signing for stream control messages
[UPDATE]: When changing signing algorithm or digest encoding
*/

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, StreamError};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for control messages.
///
/// Holds no mutable state; one instance can be shared across tasks.
#[derive(Clone)]
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    /// Create a signer from the account secret
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(StreamError::argument("signing secret must not be empty"));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    /// Sign a message and return the lowercase hex digest
    pub fn sign(&self, message: &[u8]) -> Result<String> {
        sign_hex(&self.secret, message)
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Compute `hex(HMAC-SHA256(secret, message))`
pub fn sign_hex(secret: &[u8], message: &[u8]) -> Result<String> {
    if message.is_empty() {
        return Err(StreamError::argument("message to sign must not be empty"));
    }
    if secret.is_empty() {
        return Err(StreamError::argument("signing secret must not be empty"));
    }

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|err| StreamError::argument(format!("invalid signing secret: {err}")))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

//! Access token minting.
//!
//! Token layout: `<payload>.<signature>` where `payload` is the URL-safe
//! base64 of `resourceId:requesterId:issuedAtMillis` and `signature` is the
//! hex HMAC-SHA256 of the payload text under the server secret.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix given to requesters who did not identify themselves.
pub const ANONYMOUS_PREFIX: &str = "anonymous";

/// An opaque, signed access credential.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Short prefix safe to put in logs.
    pub fn log_prefix(&self) -> &str {
        log_prefix(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({}…)", self.log_prefix())
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// First few characters of a raw token string, for logging.
pub fn log_prefix(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    &token[..end]
}

/// Holds the server secret and signs token payloads.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signer with a fresh random 32-byte secret.
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::thread_rng().gen();
        Self::new(hex::encode(bytes))
    }

    /// Mint a token for the given identity at `issued_at_ms`.
    pub fn mint(&self, resource_id: &str, requester_id: &str, issued_at_ms: u64) -> AccessToken {
        let payload = format!("{}:{}:{}", resource_id, requester_id, issued_at_ms);
        let signature = self.sign(payload.as_bytes());
        AccessToken(format!("{}.{}", URL_SAFE_NO_PAD.encode(payload), signature))
    }

    /// Hex HMAC-SHA256 of `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSigner([REDACTED])")
    }
}

/// Generate a label for a requester who did not supply one.
pub fn anonymous_requester() -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    format!("{}-{}", ANONYMOUS_PREFIX, hex::encode(bytes))
}

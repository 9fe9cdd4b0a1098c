use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Prefix marking a page token sealed with AES-256-GCM.
const SEALED_PREFIX: &str = "v1:";

/// Helper to create an HMAC instance, resolving trait ambiguity.
fn new_hmac(key: &[u8]) -> Result<HmacSha256, ApiError> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| ApiError::Crypto(format!("HMAC init failed: {e}")))
}

/// HMAC signing for OAuth state parameters and optional AES-256-GCM sealing
/// of page access tokens at rest.
pub struct CryptoEngine {
    cipher: Option<Aes256Gcm>,
    hmac_key: Vec<u8>,
}

impl CryptoEngine {
    /// `token_key_b64` must decode to 32 bytes when given. Without it, tokens
    /// are stored as plaintext.
    pub fn new(state_key: &[u8], token_key_b64: Option<&str>) -> Result<Self, ApiError> {
        if state_key.is_empty() {
            return Err(ApiError::Crypto("state signing key is empty".into()));
        }

        let cipher = match token_key_b64 {
            Some(b64) => {
                let key = base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(|e| {
                        ApiError::Crypto(format!("Invalid TOKEN_ENCRYPTION_KEY base64: {e}"))
                    })?;

                if key.len() != 32 {
                    return Err(ApiError::Crypto(format!(
                        "TOKEN_ENCRYPTION_KEY must be 32 bytes, got {}",
                        key.len()
                    )));
                }

                Some(
                    Aes256Gcm::new_from_slice(&key)
                        .map_err(|e| ApiError::Crypto(format!("Failed to init AES cipher: {e}")))?,
                )
            }
            None => None,
        };

        Ok(Self {
            cipher,
            hmac_key: state_key.to_vec(),
        })
    }

    /// Resolve the state signing key: an explicit base64 secret, else the
    /// app secret bytes, else a random per-process key.
    pub fn state_key(state_secret_b64: Option<&str>, app_secret: Option<&str>) -> Result<Vec<u8>, ApiError> {
        if let Some(b64) = state_secret_b64 {
            return base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| ApiError::Crypto(format!("Invalid STATE_SECRET base64: {e}")));
        }
        if let Some(secret) = app_secret {
            return Ok(secret.as_bytes().to_vec());
        }

        tracing::warn!("No STATE_SECRET or FB_APP_SECRET; OAuth state will not survive a restart");
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Ok(key)
    }

    pub fn encrypts_tokens(&self) -> bool {
        self.cipher.is_some()
    }

    /// Seal a token for storage. Returns the input unchanged when no
    /// encryption key is configured.
    pub fn seal_token(&self, token: &str) -> Result<String, ApiError> {
        let Some(cipher) = &self.cipher else {
            return Ok(token.to_string());
        };

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, token.as_bytes())
            .map_err(|e| ApiError::Crypto(format!("Encryption failed: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(format!(
            "{SEALED_PREFIX}{}",
            base64::engine::general_purpose::STANDARD.encode(&combined)
        ))
    }

    /// Open a stored token. Values without the sealed prefix are plaintext
    /// rows and pass through.
    pub fn open_token(&self, stored: &str) -> Result<String, ApiError> {
        let Some(sealed) = stored.strip_prefix(SEALED_PREFIX) else {
            return Ok(stored.to_string());
        };
        let cipher = self
            .cipher
            .as_ref()
            .ok_or_else(|| ApiError::Crypto("token is sealed but TOKEN_ENCRYPTION_KEY is not set".into()))?;

        let combined = base64::engine::general_purpose::STANDARD
            .decode(sealed)
            .map_err(|e| ApiError::Crypto(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(ApiError::Crypto("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| ApiError::Crypto(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| ApiError::Crypto(format!("Invalid UTF-8 after decrypt: {e}")))
    }

    /// Sign a state parameter with HMAC-SHA256. Returns base64url(hmac || payload).
    pub fn sign_state(&self, payload: &str) -> Result<String, ApiError> {
        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut combined = signature.to_vec();
        combined.extend_from_slice(payload.as_bytes());

        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&combined))
    }

    /// Verify and extract a signed state parameter.
    pub fn verify_state(&self, signed: &str) -> Result<String, ApiError> {
        let combined = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signed)
            .map_err(|_| ApiError::InvalidState)?;

        if combined.len() < 32 {
            return Err(ApiError::InvalidState);
        }

        let (signature, payload_bytes) = combined.split_at(32);

        let mut mac = new_hmac(&self.hmac_key)?;
        mac.update(payload_bytes);
        mac.verify_slice(signature)
            .map_err(|_| ApiError::InvalidState)?;

        String::from_utf8(payload_bytes.to_vec()).map_err(|_| ApiError::InvalidState)
    }
}

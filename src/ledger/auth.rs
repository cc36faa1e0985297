use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid base64 secret: {0}")]
    InvalidSecret(#[from] base64::DecodeError),

    #[error("HMAC computation failed: {0}")]
    HmacError(String),
}

/// Oracle credentials for the settlement ledger's write endpoints.
#[derive(Debug, Clone)]
pub struct LedgerAuth {
    pub api_key: String,
    pub api_secret: String,
}

impl LedgerAuth {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self { api_key, api_secret }
    }

    /// Build the HMAC-SHA256 request signature.
    ///
    /// message = `{timestamp}{method}{path}{body}`
    /// secret is base64-decoded before use.
    pub fn sign(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<String, AuthError> {
        let secret_bytes = BASE64.decode(&self.api_secret)?;

        let message = format!("{timestamp}{method}{path}{body}");

        let mut mac = HmacSha256::new_from_slice(&secret_bytes)
            .map_err(|e| AuthError::HmacError(e.to_string()))?;

        mac.update(message.as_bytes());
        let result = mac.finalize();

        Ok(BASE64.encode(result.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_produces_base64_output() {
        let secret = BASE64.encode(b"test-secret-key-1234");
        let auth = LedgerAuth::new("key".into(), secret);

        let sig = auth.sign("1700000000", "POST", "/oracle/trend", "{}").unwrap();

        assert!(BASE64.decode(&sig).is_ok());
        // 32 bytes of HMAC-SHA256, base64-encoded
        assert_eq!(sig.len(), 44);
    }

    #[test]
    fn signature_depends_on_every_component() {
        let secret = BASE64.encode(b"test-secret-key-1234");
        let auth = LedgerAuth::new("key".into(), secret);

        let base = auth.sign("1700000000", "POST", "/oracle/trend", "{}").unwrap();
        let other_ts = auth.sign("1700000001", "POST", "/oracle/trend", "{}").unwrap();
        let other_body = auth.sign("1700000000", "POST", "/oracle/trend", "{1}").unwrap();

        assert_ne!(base, other_ts);
        assert_ne!(base, other_body);
    }
}

use base64::engine::{general_purpose, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use tracing::debug;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a session token: the subject (profile id assigned by
/// the identity provider) and the expiry as a unix timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            AuthError::Malformed => "malformed session token",
            AuthError::BadSignature => "session token signature mismatch",
            AuthError::Expired => "session token expired",
        };
        f.write_str(reason)
    }
}

/// Session token utilities. The external identity provider validates
/// credentials; the service then signs its own short-lived tokens with
/// HMAC-SHA256 over a base64url payload and verifies them on every request.
pub struct SessionAuth;

impl SessionAuth {
    pub fn issue_token(user_id: &str, ttl_seconds: i64, secret: &str) -> String {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + ttl_seconds,
        };
        let payload = general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&claims).expect("session claims serialize to JSON"));
        let signature = Self::sign(&payload, secret);
        format!("{}.{}", payload, signature)
    }

    pub fn verify_token(token: &str, secret: &str) -> Result<SessionClaims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::Malformed)?;

        if Self::sign(payload, secret) != signature {
            return Err(AuthError::BadSignature);
        }

        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            debug!("Rejected expired session for {}", claims.sub);
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn sign(payload: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

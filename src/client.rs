use dotenv::dotenv;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::fmt;
use tracing::{debug, info};

use crate::auth::{AuthError, SessionAuth, SessionClaims};

// Sessions issued after a successful provider sign-in are valid for a day
const SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: ProviderUser,
}

// Result of a successful password grant against the identity provider
#[derive(Debug)]
pub struct ProviderSession {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug)]
pub enum IdentityError {
    InvalidCredentials,
    Provider(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::InvalidCredentials => f.write_str("invalid login credentials"),
            IdentityError::Provider(detail) => write!(f, "identity provider error: {}", detail),
        }
    }
}

/// Client for the external identity provider. Credential checking is fully
/// delegated: the provider validates email/password pairs and owns the user
/// ids; this service only issues and verifies its own session tokens.
pub struct IdentityClient {
    client: Client,
    endpoint: String,
    api_key: String,
    signing_secret: String,
}

impl IdentityClient {
    /// Create a new identity client from environment variables
    pub fn new() -> Self {
        dotenv().ok();

        Self {
            client: Client::new(),
            endpoint: env::var("AUTH_API_ENDPOINT")
                .expect("AUTH_API_ENDPOINT must be set in environment"),
            api_key: env::var("AUTH_API_KEY")
                .expect("AUTH_API_KEY must be set in environment"),
            signing_secret: env::var("SESSION_SIGNING_SECRET")
                .expect("SESSION_SIGNING_SECRET must be set in environment"),
        }
    }

    pub fn with_config(endpoint: &str, api_key: &str, signing_secret: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            signing_secret: signing_secret.to_string(),
        }
    }

    /// Exchange email/password for a provider session via the password grant
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let url = format!("{}/token?grant_type=password", self.endpoint);
        info!("Authenticating {} against identity provider", email);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        let status = response.status();
        debug!("Identity provider responded with status {}", status);

        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Err(IdentityError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(IdentityError::Provider(format!(
                "unexpected status {}",
                status
            )));
        }

        let body = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| IdentityError::Provider(e.to_string()))?;

        Ok(ProviderSession {
            access_token: body.access_token,
            user_id: body.user.id,
            email: body.user.email,
        })
    }

    /// Issue a signed session token for an authenticated profile id
    pub fn issue_session(&self, user_id: &str) -> String {
        SessionAuth::issue_token(user_id, SESSION_TTL_SECONDS, &self.signing_secret)
    }

    /// Verify a bearer token presented by a caller
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        SessionAuth::verify_token(token, &self.signing_secret)
    }
}

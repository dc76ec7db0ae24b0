//! Service-account authentication.
//!
//! Exchanges a signed JWT assertion for an OAuth access token (the
//! `jwt-bearer` grant) and wraps the result in a [`DriveSession`] that every
//! remote call borrows.

use crate::utils::{BackupError, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The JSON key file downloaded for a service account
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,

    pub client_email: String,

    /// PEM encoded RSA private key
    pub private_key: String,

    #[serde(default)]
    pub private_key_id: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Load a key from its JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Authentication(format!(
                "failed to read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(content)
            .map_err(|e| BackupError::Authentication(format!("invalid service account key: {}", e)))?;

        match key.key_type.as_deref() {
            None | Some("service_account") => Ok(key),
            Some(other) => Err(BackupError::Authentication(format!(
                "expected a service_account key, got {:?}",
                other
            ))),
        }
    }
}

/// Claims of the assertion sent to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(key: &ServiceAccountKey, scope: &str, issued_at: DateTime<Utc>) -> Self {
        let iat = issued_at.timestamp();
        Self {
            iss: key.client_email.clone(),
            scope: scope.to_string(),
            aud: key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

/// Sign `claims` with the service account's private key (RS256)
pub fn sign_assertion(key: &ServiceAccountKey, claims: &AssertionClaims) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    Ok(encode(&header, claims, &encoding_key)?)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// An authorized handle to the storage API.
///
/// Built once per run and passed by reference to every remote call.
pub struct DriveSession {
    http: reqwest::Client,
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl fmt::Debug for DriveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveSession")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl DriveSession {
    pub fn new(http: reqwest::Client, access_token: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            http,
            access_token,
            expires_at,
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// HTTP client shared by all remote calls.
///
/// Redirects are disabled: the resumable upload protocol answers 308 without
/// a `Location` header and that response must reach the uploader.
pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("world-backup/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// Exchange the service account at `key_path` for a session with `scope`
pub async fn authenticate(key_path: &Path, scope: &str) -> Result<DriveSession> {
    let key = ServiceAccountKey::from_file(key_path)?;
    info!("Authenticating as {}", key.client_email);

    let claims = AssertionClaims::new(&key, scope, Utc::now());
    let assertion = sign_assertion(&key, &claims)?;
    let http = http_client()?;

    let response = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| BackupError::Authentication(format!("token request failed: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| BackupError::Authentication(format!("token response unreadable: {}", e)))?;

    if !status.is_success() {
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => body,
        };
        return Err(BackupError::Authentication(format!(
            "token endpoint returned {}: {}",
            status, reason
        )));
    }

    let token: TokenResponse = serde_json::from_str(&body)
        .map_err(|e| BackupError::Authentication(format!("malformed token response: {}", e)))?;
    let expires_at = Utc::now() + Duration::seconds(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));

    debug!("Access token valid until {}", expires_at);
    Ok(DriveSession::new(http, token.access_token, expires_at))
}

//! Service-account credentials and OAuth2 token exchange.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::SheetsError;

/// OAuth2 scope for reading and writing sheet values.
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Validity requested for each signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens within this margin of expiry are refreshed before use.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// A Google service-account key, as downloaded from the cloud console.
///
/// Only the fields needed for the JWT-bearer grant are kept; the rest of
/// the key file is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Load a key from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SheetsError::Key(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| SheetsError::Key(format!("{}: {}", path.display(), e)))
    }
}

/// Resolve the key file path the way gspread tooling does: explicit setting
/// first, then `GSPREAD_SERVICE_ACCOUNT_FILE`, then
/// `GOOGLE_APPLICATION_CREDENTIALS`, then the gspread default location.
pub fn resolve_key_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    for var in ["GSPREAD_SERVICE_ACCOUNT_FILE", "GOOGLE_APPLICATION_CREDENTIALS"] {
        if let Ok(path) = std::env::var(var)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config/gspread/service_account.json")
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// A bearer token with its expiry instant.
#[derive(Debug, Clone)]
pub(crate) struct AccessToken {
    pub value: String,
    pub expires_at: Instant,
}

impl AccessToken {
    /// True while the token has comfortably more than the margin left.
    pub fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// Sign a JWT-bearer assertion and exchange it for an access token.
pub(crate) async fn fetch_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    token_url: &str,
) -> Result<AccessToken, SheetsError> {
    let iat = chrono::Utc::now().timestamp();
    let claims = Claims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: token_url,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| SheetsError::Key(format!("bad private key: {}", e)))?;
    let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| SheetsError::Auth(format!("signing assertion: {}", e)))?;

    let response = http
        .post(token_url)
        .form(&[
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(SheetsError::Auth(format!(
            "token exchange failed (HTTP {}): {}",
            status, body
        )));
    }

    let token: TokenResponse = response.json().await?;
    debug!(expires_in = token.expires_in, "obtained sheets access token");
    Ok(AccessToken {
        value: token.access_token,
        expires_at: Instant::now() + Duration::from_secs(token.expires_in),
    })
}

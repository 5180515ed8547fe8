//! Credential gateway: encrypted token storage and on-demand refresh.
//!
//! Tokens live in the database encrypted with an age passphrase and armored
//! as base64. `resolve` hands a publish or sync attempt its decrypted
//! credentials, refreshing them first when they are about to expire. Refresh
//! is at most once per attempt: a concurrent refresh is resolved by a
//! compare-and-swap on the account's token version, and the loser adopts the
//! winner's tokens instead of refreshing again.

use std::io::{Read, Write};

use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::EndpointsConfig;
use crate::db::Database;
use crate::error::{PlatformError, Result};
use crate::http::{normalize_base_url, ApiClient};
use crate::types::{PlatformKind, SocialAccount};

/// Seconds before expiry at which a token is refreshed proactively.
const REFRESH_MARGIN_SECS: i64 = 300;

/// Decrypted credentials for one platform call.
pub struct PlatformCredentials {
    pub access_token: SecretString,
    pub platform_username: String,
    pub page_id: Option<String>,
    pub instagram_account_id: Option<String>,
}

impl PlatformCredentials {
    pub fn token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Symmetric token encryption with an age passphrase.
#[derive(Clone)]
pub struct TokenCipher {
    passphrase: String,
}

impl TokenCipher {
    pub fn new(passphrase: String) -> Self {
        Self { passphrase }
    }

    /// Read the passphrase from the configured file, trimming the trailing
    /// newline most editors leave behind.
    pub fn from_passphrase_file(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let passphrase = std::fs::read_to_string(&expanded)
            .map_err(|e| {
                PlatformError::Authentication(format!(
                    "failed to read passphrase file {}: {}",
                    expanded, e
                ))
            })?
            .trim_end()
            .to_string();
        if passphrase.is_empty() {
            return Err(PlatformError::Authentication(
                "passphrase file is empty".to_string(),
            )
            .into());
        }
        Ok(Self::new(passphrase))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let encryptor = age::Encryptor::with_user_passphrase(age::secrecy::Secret::new(
            self.passphrase.clone(),
        ));

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| PlatformError::Authentication(format!("token encryption failed: {}", e)))?;
        writer
            .write_all(plaintext.as_bytes())
            .map_err(|e| PlatformError::Authentication(format!("token encryption failed: {}", e)))?;
        writer
            .finish()
            .map_err(|e| PlatformError::Authentication(format!("token encryption failed: {}", e)))?;

        Ok(base64::engine::general_purpose::STANDARD.encode(encrypted))
    }

    pub fn decrypt(&self, armored: &str) -> Result<SecretString> {
        let encrypted = base64::engine::general_purpose::STANDARD
            .decode(armored)
            .map_err(|e| {
                PlatformError::Authentication(format!("stored token is not valid base64: {}", e))
            })?;

        let decryptor = match age::Decryptor::new(&encrypted[..]) {
            Ok(age::Decryptor::Passphrase(d)) => d,
            Ok(_) => {
                return Err(PlatformError::Authentication(
                    "stored token has an unexpected encryption format".to_string(),
                )
                .into())
            }
            Err(e) => {
                return Err(PlatformError::Authentication(format!(
                    "stored token could not be parsed: {}",
                    e
                ))
                .into())
            }
        };

        let mut decrypted = vec![];
        let mut reader = decryptor
            .decrypt(&age::secrecy::Secret::new(self.passphrase.clone()), None)
            .map_err(|e| {
                PlatformError::Authentication(format!("token decryption failed: {}", e))
            })?;
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| PlatformError::Authentication(format!("token decryption failed: {}", e)))?;

        let plaintext = String::from_utf8(decrypted).map_err(|e| {
            PlatformError::Authentication(format!("decrypted token is not UTF-8: {}", e))
        })?;
        Ok(SecretString::from(plaintext))
    }
}

pub struct CredentialGateway {
    db: Database,
    cipher: TokenCipher,
    http: ApiClient,
    endpoints: EndpointsConfig,
}

impl CredentialGateway {
    pub fn new(
        db: Database,
        cipher: TokenCipher,
        http: ApiClient,
        endpoints: EndpointsConfig,
    ) -> Self {
        Self {
            db,
            cipher,
            http,
            endpoints,
        }
    }

    /// Encrypt and store tokens for a new account (onboarding path).
    pub fn encrypt_token(&self, plaintext: &str) -> Result<String> {
        self.cipher.encrypt(plaintext)
    }

    /// Load and decrypt credentials for one attempt, refreshing first when
    /// the access token is within the expiry margin.
    pub async fn resolve(&self, account_id: &str) -> Result<(SocialAccount, PlatformCredentials)> {
        let account = self
            .db
            .get_account(account_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("social account {}", account_id)))?;

        if !account.is_active {
            return Err(PlatformError::Authentication(format!(
                "social account {} is disconnected",
                account_id
            ))
            .into());
        }

        let account = if self.needs_refresh(&account) {
            self.refresh_once(account).await?
        } else {
            account
        };

        let access_token = self.cipher.decrypt(&account.access_token_enc)?;
        let credentials = PlatformCredentials {
            access_token,
            platform_username: account.platform_username.clone(),
            page_id: account.page_id.clone(),
            instagram_account_id: account.instagram_account_id.clone(),
        };
        Ok((account, credentials))
    }

    fn needs_refresh(&self, account: &SocialAccount) -> bool {
        // LinkedIn issues no refresh tokens; expired tokens surface as 401s.
        if account.refresh_token_enc.is_none() {
            return false;
        }
        match account.token_expiry {
            Some(expiry) => expiry - chrono::Utc::now().timestamp() <= REFRESH_MARGIN_SECS,
            None => false,
        }
    }

    /// One refresh attempt guarded by the token version. A lost CAS means a
    /// concurrent attempt already refreshed; adopt its tokens.
    async fn refresh_once(&self, account: SocialAccount) -> Result<SocialAccount> {
        let refresh_token_enc = match &account.refresh_token_enc {
            Some(enc) => enc,
            None => return Ok(account),
        };
        let refresh_token = self.cipher.decrypt(refresh_token_enc)?;

        let url = self.refresh_url(account.platform);
        let response = self
            .http
            .post_form_once(
                &url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.expose_secret()),
                ],
            )
            .await?;

        if !response.is_success() {
            return Err(PlatformError::Authentication(format!(
                "token refresh for {} failed with status {}",
                account.platform, response.status
            ))
            .into());
        }

        let new_access = response
            .body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PlatformError::Authentication(
                    "token refresh response did not contain access_token".to_string(),
                )
            })?
            .to_string();
        let new_refresh = response
            .body
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string);
        let expires_in = response.body.get("expires_in").and_then(Value::as_i64);

        let access_enc = self.cipher.encrypt(&new_access)?;
        let refresh_enc = match &new_refresh {
            Some(r) => Some(self.cipher.encrypt(r)?),
            // Platforms that rotate nothing keep the old refresh token.
            None => account.refresh_token_enc.clone(),
        };
        let expiry = expires_in.map(|secs| chrono::Utc::now().timestamp() + secs);

        let won = self
            .db
            .update_account_tokens(
                &account.id,
                &access_enc,
                refresh_enc.as_deref(),
                expiry,
                account.token_version,
            )
            .await?;

        if won {
            tracing::info!(account_id = %account.id, platform = %account.platform, "refreshed access token");
        } else {
            tracing::debug!(account_id = %account.id, "lost token refresh race, re-reading account");
        }

        // Either way the row now holds the current tokens.
        self.db
            .get_account(&account.id)
            .await?
            .ok_or_else(|| PlatformError::NotFound(format!("social account {}", account.id)).into())
    }

    fn refresh_url(&self, platform: PlatformKind) -> String {
        match platform {
            PlatformKind::Twitter => format!(
                "{}/2/oauth2/token",
                normalize_base_url(&self.endpoints.twitter_base_url)
            ),
            PlatformKind::Linkedin => format!(
                "{}/oauth/v2/accessToken",
                normalize_base_url(&self.endpoints.linkedin_base_url)
            ),
            PlatformKind::Meta => format!(
                "{}/oauth/access_token",
                normalize_base_url(&self.endpoints.meta_base_url)
            ),
        }
    }
}

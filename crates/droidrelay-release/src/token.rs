//! Access-token acquisition by signed key exchange.
//!
//! The payload `key_id ++ timestamp` is signed with RSA PKCS#1 v1.5 over
//! SHA-512 and posted to the auth endpoint. Tokens are never cached.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, Local};
use droidrelay_core::SecretProvider;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use tracing::{debug, info, instrument, warn};

use crate::config::ReleaseConfig;
use crate::error::TokenError;

/// Timestamp layout: ISO-8601, milliseconds, explicit offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Status code the auth endpoint returns on success.
pub const SUCCESS_CODE: &str = "OK";

/// Opaque bearer token and its lifetime.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub value: String,
    pub ttl_seconds: u64,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

/// Source of fresh access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn acquire_access_token(&self) -> Result<AccessToken, TokenError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    key_id: &'a str,
    timestamp: &'a str,
    signature: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthEnvelope {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    body: Option<AuthBody>,
}

#[derive(Debug, Deserialize)]
struct AuthBody {
    jwe: String,
    ttl: u64,
}

/// Format `at` the way the auth endpoint expects.
pub fn format_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current local time, formatted.
pub fn timestamp_now() -> String {
    let now: DateTime<FixedOffset> = Local::now().into();
    format_timestamp(&now)
}

/// The exact bytes that get signed.
pub fn signing_payload(key_id: &str, timestamp: &str) -> String {
    format!("{key_id}{timestamp}")
}

/// Decode a PKCS#8 private key given as PEM or as base64 DER.
pub fn load_private_key(raw: &str) -> Result<RsaPrivateKey, TokenError> {
    let raw = raw.trim();
    if raw.starts_with("-----BEGIN") {
        return RsaPrivateKey::from_pkcs8_pem(raw)
            .map_err(|e| TokenError::Credential(format!("invalid PKCS#8 PEM key: {e}")));
    }
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD
        .decode(compact)
        .map_err(|e| TokenError::Credential(format!("private key is not valid base64: {e}")))?;
    RsaPrivateKey::from_pkcs8_der(&der)
        .map_err(|e| TokenError::Credential(format!("invalid PKCS#8 DER key: {e}")))
}

/// SHA512withRSA signature over `payload`, base64-encoded.
pub fn sign_payload(key: &RsaPrivateKey, payload: &str) -> Result<String, TokenError> {
    let signing_key = SigningKey::<Sha512>::new(key.clone());
    let signature = signing_key
        .try_sign(payload.as_bytes())
        .map_err(|e| TokenError::Signing(e.to_string()))?;
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Token provider backed by the signed key exchange.
pub struct RsaTokenService {
    key_id: String,
    auth_url: String,
    private_key_secret: String,
    secrets: Arc<dyn SecretProvider>,
    http: reqwest::Client,
}

impl RsaTokenService {
    pub fn new(config: &ReleaseConfig, secrets: Arc<dyn SecretProvider>, http: reqwest::Client) -> Self {
        Self {
            key_id: config.key_id.clone(),
            auth_url: config.auth_url.clone(),
            private_key_secret: config.private_key_secret.clone(),
            secrets,
            http,
        }
    }

    fn private_key(&self) -> Result<RsaPrivateKey, TokenError> {
        let raw = self.secrets.get_secret(&self.private_key_secret).ok_or_else(|| {
            TokenError::Credential(format!("secret {} is not set", self.private_key_secret))
        })?;
        load_private_key(&raw)
    }
}

#[async_trait]
impl TokenProvider for RsaTokenService {
    #[instrument(skip_all, fields(key_id = %self.key_id))]
    async fn acquire_access_token(&self) -> Result<AccessToken, TokenError> {
        let key = self.private_key()?;
        let timestamp = timestamp_now();
        let signature = sign_payload(&key, &signing_payload(&self.key_id, &timestamp))?;

        debug!(url = %self.auth_url, "requesting access token");
        let response = self
            .http
            .post(&self.auth_url)
            .json(&AuthRequest {
                key_id: &self.key_id,
                timestamp: &timestamp,
                signature: &signature,
            })
            .send()
            .await
            .map_err(|e| TokenError::AuthExchange(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TokenError::AuthExchange(format!("cannot read response: {e}")))?;

        let envelope: AuthEnvelope = serde_json::from_str(&text).map_err(|_| {
            warn!(status = status.as_u16(), "auth endpoint returned non-JSON body");
            TokenError::AuthExchange(format!("HTTP {}: unexpected response body", status.as_u16()))
        })?;

        if envelope.code != SUCCESS_CODE {
            let message = envelope.message.unwrap_or_default();
            warn!(status = status.as_u16(), code = %envelope.code, "auth exchange rejected");
            return Err(TokenError::AuthExchange(format!(
                "code {}: {message}",
                envelope.code
            )));
        }

        let body = envelope
            .body
            .ok_or_else(|| TokenError::AuthExchange("response has no token body".to_string()))?;
        info!(ttl_seconds = body.ttl, "access token acquired");
        Ok(AccessToken {
            value: body.jwe,
            ttl_seconds: body.ttl,
        })
    }
}

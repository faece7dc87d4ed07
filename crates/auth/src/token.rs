//! HS256 token issuance and verification.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;

use warden_core::ServiceError;

use crate::claims::{validate_claims, ClaimsError, TokenClaims};
use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The signing key is unusable. Fatal at startup, never per request.
    #[error("token service misconfigured: {0}")]
    Misconfigured(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid token")]
    Invalid,

    #[error("token has expired")]
    Expired,
}

impl From<TokenError> for ServiceError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Invalid => ServiceError::InvalidToken,
            TokenError::Expired => ServiceError::ExpiredToken,
            other => ServiceError::internal(other.to_string()),
        }
    }
}

/// Freshly signed token with its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Verification seam used by the transport layer.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, TokenError>;
}

/// Symmetric (HMAC-SHA256) token service.
#[derive(Clone)]
pub struct Hs256TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl core::fmt::Debug for Hs256TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256TokenService").finish_non_exhaustive()
    }
}

impl Hs256TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Misconfigured("signing secret is empty".to_string()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal, Utc::now())
    }

    /// Sign a token for `principal` as if issued at `issued_at`.
    pub fn issue_at(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = TokenClaims::for_principal(principal, issued_at);
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }

    /// Verify signature first, then the time window against `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked below against the injected clock, with zero leeway
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            TokenError::Invalid
        })?;

        validate_claims(&data.claims, now).map_err(|e| match e {
            ClaimsError::Expired => TokenError::Expired,
            ClaimsError::InvalidTimeWindow => TokenError::Invalid,
        })?;

        Ok(data.claims.into_principal())
    }
}

impl TokenVerifier for Hs256TokenService {
    fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        self.verify_at(token, Utc::now())
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| TokenError::Signing(format!("timestamp out of range: {secs}")))
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use warden_core::UserId;

use crate::{Principal, RoleSummary};

/// Token lifetime in seconds (2 days), measured from issuance.
pub const TOKEN_TTL_SECS: i64 = 2 * 24 * 60 * 60;

/// Signed token payload.
///
/// `iat`/`exp` are unix seconds so that standard JWT tooling can read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: UserId,
    pub roles: Vec<RoleSummary>,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn for_principal(principal: &Principal, issued_at: DateTime<Utc>) -> Self {
        Self {
            user_id: principal.user_id,
            roles: principal.roles.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
        }
    }

    pub fn into_principal(self) -> Principal {
        Principal::new(self.user_id, self.roles)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimsError {
    Expired,
    InvalidTimeWindow,
}

/// Deterministically validate the time window of already-verified claims.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.exp <= claims.iat {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now.timestamp() >= claims.exp {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}

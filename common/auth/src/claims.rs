use chrono::{DateTime, Duration, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Verified identity assertion carried by a token.
///
/// Timestamps are held at whole-second precision, matching the `iat`/`exp`
/// wire encoding, so a claims set survives a sign/verify round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub subject: Uuid,
    pub roles: Vec<Role>,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Builds a claims set; duplicate roles are dropped keeping first-seen order.
    pub fn new(
        subject: Uuid,
        roles: impl IntoIterator<Item = Role>,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let mut ordered = Vec::new();
        for role in roles {
            if !ordered.contains(&role) {
                ordered.push(role);
            }
        }

        Self {
            subject,
            roles: ordered,
            issuer: issuer.into(),
            issued_at: issued_at.trunc_subsecs(0),
            expires_at: expires_at.trunc_subsecs(0),
        }
    }

    /// Claims issued now and valid for `ttl`.
    ///
    /// Fails with [`AuthError::TokenLifetime`] when `now + ttl` leaves the representable range.
    pub fn issue(
        subject: Uuid,
        roles: impl IntoIterator<Item = Role>,
        issuer: impl Into<String>,
        ttl: Duration,
    ) -> AuthResult<Self> {
        let now = Utc::now();
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            AuthError::TokenLifetime(format!("{}s overflows expiry", ttl.num_seconds()))
        })?;
        Ok(Self::new(subject, roles, issuer, now, expires_at))
    }

    /// Convenience helper for role checks.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.timestamp() <= now.timestamp()
    }

    pub(crate) fn to_repr(&self) -> ClaimsRepr {
        ClaimsRepr {
            sub: self.subject.to_string(),
            iss: self.issuer.clone(),
            iat: self.issued_at.timestamp(),
            exp: self.expires_at.timestamp(),
            roles: self.roles.iter().map(|role| role.as_str().to_string()).collect(),
        }
    }
}

/// Wire form of the token payload.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let subject =
            Uuid::parse_str(&value.sub).map_err(|_| AuthError::InvalidSubject(value.sub.clone()))?;

        let roles = Role::parse_many(&value.roles)?;

        let issued_at = Utc
            .timestamp_opt(value.iat, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaims(format!("iat out of range: {}", value.iat)))?;
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaims(format!("exp out of range: {}", value.exp)))?;

        Ok(Claims::new(subject, roles, value.iss, issued_at, expires_at))
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr =
            serde_json::from_value(value).map_err(|err| AuthError::InvalidClaims(err.to_string()))?;
        Claims::try_from(repr)
    }
}

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::config::JwtConfig;

/// Single rejection for every way a token can be bad. Callers never learn which
/// check failed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid or expired token")]
pub struct AuthError;

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm: config.algorithm,
            ttl: Duration::minutes(config.ttl_minutes),
        }
    }

    pub fn issue(&self, subject: &str) -> anyhow::Result<String> {
        self.issue_at(subject, OffsetDateTime::now_utc(), self.ttl)
    }

    pub fn issue_at(
        &self,
        subject: &str,
        now: OffsetDateTime,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + ttl).unix_timestamp(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(subject, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Returns the token subject.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Expiry is strict: the token is dead once `now >= exp`, with no leeway.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<String, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthError
        })?;

        if data.claims.exp <= now.unix_timestamp() {
            debug!(subject = %data.claims.sub, "jwt expired");
            return Err(AuthError);
        }
        if data.claims.sub.is_empty() {
            return Err(AuthError);
        }
        Ok(data.claims.sub)
    }
}

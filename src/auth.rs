use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::{Claims, Role};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    TokenInvalid(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hash(_) => {
                tracing::error!(error = %err, "password hashing failed");
                ApiError::Internal("internal authentication error".to_string())
            }
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(hash(password, DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    Ok(verify(password, hash)?)
}

/// Issues and validates HS256 session tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, uid: &str, role: Role) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let claims = Claims {
            sub: uid.to_owned(),
            role,
            exp: (now + self.ttl_secs) as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &self.decoding,
            &Validation::new(Algorithm::HS256),
        )?;
        Ok(token_data.claims)
    }
}

/// Rejects the request unless the caller holds one of `allowed`.
pub fn require_role(claims: &Claims, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "role {} may not perform this action",
            claims.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_keeps_subject_and_role() {
        let issuer = TokenIssuer::new(b"test-secret", 60);
        let token = issuer.issue("uid-1", Role::Landlord).unwrap();
        let claims = issuer.validate(&token).unwrap();
        assert_eq!(claims.sub, "uid-1");
        assert_eq!(claims.role, Role::Landlord);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = TokenIssuer::new(b"secret-a", 60);
        let other = TokenIssuer::new(b"secret-b", 60);
        let token = issuer.issue("uid-1", Role::Tenant).unwrap();
        assert!(matches!(
            other.validate(&token),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hashed = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("wrong horse", &hashed).unwrap());
    }

    #[test]
    fn role_gate() {
        let claims = Claims {
            sub: "u".into(),
            role: Role::Tenant,
            exp: 0,
        };
        assert!(require_role(&claims, &[Role::Tenant, Role::Admin]).is_ok());
        assert!(matches!(
            require_role(&claims, &[Role::Agent]),
            Err(ApiError::Forbidden(_))
        ));
    }
}

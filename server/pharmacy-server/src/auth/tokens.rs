//! JWT bearer token service
//!
//! Issues and verifies HS256 tokens whose subject is the numeric user id.

use crate::config::AuthSettings;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Account kind carried in the `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Pharmacy,
    Doctor,
    Patient,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pharmacy => "pharmacy",
            Role::Doctor => "doctor",
            Role::Patient => "patient",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pharmacy" => Ok(Role::Pharmacy),
            "doctor" => Ok(Role::Doctor),
            "patient" => Ok(Role::Patient),
            "admin" => Ok(Role::Admin),
            other => Err(TokenError::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid or expired token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id: {0}")]
    BadSubject(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// JWT token claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub role: Role,
    /// Issued at timestamp (seconds since epoch)
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch)
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| TokenError::BadSubject(self.sub.clone()))
    }
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    default_ttl_secs: u64,
}

impl JwtService {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer: settings.issuer.clone(),
            default_ttl_secs: settings.token_ttl_secs,
        }
    }

    /// Sign a token for `user_id`. `ttl_secs` falls back to the configured lifetime.
    pub fn issue(&self, user_id: i64, role: Role, ttl_secs: Option<u64>) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl_secs.unwrap_or(self.default_ttl_secs)).unwrap_or(i64::MAX / 2);
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(ttl),
            iss: self.issuer.clone(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        data.claims.user_id()?;
        Ok(data.claims)
    }
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("issuer", &self.issuer)
            .field("default_ttl_secs", &self.default_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(secret: &str) -> AuthSettings {
        AuthSettings {
            jwt_secret: secret.to_string(),
            issuer: "pharmacy-server".to_string(),
            token_ttl_secs: 600,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let service = JwtService::new(&settings("0123456789abcdef0123456789abcdef"));
        let token = service.issue(42, Role::Pharmacy, None).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, Role::Pharmacy);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = JwtService::new(&settings("0123456789abcdef0123456789abcdef"));
        let verifier = JwtService::new(&settings("ffffffffffffffffffffffffffffffff"));
        let token = issuer.issue(1, Role::Doctor, None).unwrap();
        assert!(matches!(verifier.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = JwtService::new(&settings("0123456789abcdef0123456789abcdef"));
        let claims = Claims {
            sub: "7".into(),
            role: Role::Pharmacy,
            iat: 1_000,
            exp: 2_000,
            iss: "pharmacy-server".into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &service.encoding_key).unwrap();
        assert!(service.verify(&token).is_err());
    }

    #[test]
    fn non_numeric_subject_is_rejected() {
        let service = JwtService::new(&settings("0123456789abcdef0123456789abcdef"));
        let claims = Claims {
            sub: "not-a-number".into(),
            role: Role::Admin,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
            iss: "pharmacy-server".into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &service.encoding_key).unwrap();
        assert!(matches!(service.verify(&token), Err(TokenError::BadSubject(_))));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Pharmacy".parse::<Role>().unwrap(), Role::Pharmacy);
        assert_eq!(" doctor ".parse::<Role>().unwrap(), Role::Doctor);
        assert!("nurse".parse::<Role>().is_err());
    }
}

//! Session token issuance and verification.
//!
//! Tokens are HS256-signed JWTs carrying a [`Claims`] payload. They are
//! stateless: nothing is stored server-side, and the auth gate re-resolves
//! the user row on every request.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use proposta_core::access_tag::normalize_access_tag;
use proposta_core::types::UserId;
use proposta_db::models::user::User;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EnvLookup};

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: &str = "7d";

/// JWT claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject -- the user's id.
    pub sub: UserId,
    pub email: String,
    pub role: String,
    /// Digits-only access tag.
    pub cnpj_access: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// The user attributes a token is issued for.
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub id: UserId,
    pub email: &'a str,
    pub role: &'a str,
    pub cnpj_access: &'a str,
}

impl<'a> From<&'a User> for TokenSubject<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: user.id,
            email: &user.email,
            role: &user.role,
            cnpj_access: &user.cnpj_access,
        }
    }
}

/// Configuration for token issuance and verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Token lifetime.
    pub ttl: Duration,
}

impl JwtConfig {
    /// Load token configuration.
    ///
    /// | Env Var          | Required | Default |
    /// |------------------|----------|---------|
    /// | `JWT_SECRET`     | **yes**  | --      |
    /// | `JWT_EXPIRES_IN` | no       | `7d`    |
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let raw_ttl = lookup("JWT_EXPIRES_IN").unwrap_or_else(|| DEFAULT_TOKEN_TTL.into());
        let ttl = parse_ttl(&raw_ttl).ok_or(ConfigError::Invalid {
            key: "JWT_EXPIRES_IN",
            value: raw_ttl,
        })?;

        Ok(Self { secret, ttl })
    }
}

/// Parse a lifetime such as `7d`, `12h`, `30m`, `45s` or a bare number of
/// seconds. Zero and negative values are rejected.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit_secs) = match raw.char_indices().last()? {
        (idx, 'd') => (&raw[..idx], 86_400),
        (idx, 'h') => (&raw[..idx], 3_600),
        (idx, 'm') => (&raw[..idx], 60),
        (idx, 's') => (&raw[..idx], 1),
        _ => (raw, 1),
    };
    let amount: i64 = digits.trim().parse().ok()?;
    if amount <= 0 {
        return None;
    }
    amount.checked_mul(unit_secs).map(Duration::seconds)
}

/// Token failures. `Expired` and `Invalid` look identical to clients.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error("token has expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

/// Issue a signed token for `subject`, expiring `config.ttl` from now.
///
/// The access tag is normalized to digits before it is embedded.
pub fn issue_token(subject: &TokenSubject<'_>, config: &JwtConfig) -> Result<String, TokenError> {
    if config.secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: subject.id,
        email: subject.email.to_string(),
        role: subject.role.to_string(),
        cnpj_access: normalize_access_tag(subject.cnpj_access),
        iat: now,
        exp: now + config.ttl.num_seconds(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(TokenError::Encoding)
}

/// Validate signature and expiry and return the embedded [`Claims`].
pub fn verify_token(token: &str, config: &JwtConfig) -> Result<Claims, TokenError> {
    if config.secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )
    .map(|data| data.claims)
    .map_err(|err| {
        if matches!(err.kind(), ErrorKind::ExpiredSignature) {
            TokenError::Expired
        } else {
            TokenError::Invalid(err)
        }
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use uuid::Uuid;

    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            ttl: Duration::days(7),
        }
    }

    fn subject(id: UserId) -> TokenSubject<'static> {
        TokenSubject {
            id,
            email: "ana@empresa.com",
            role: "employee",
            cnpj_access: "12.345.678/0001-90",
        }
    }

    #[test]
    fn issued_token_verifies_to_the_same_subject() {
        let config = test_config();
        let id = Uuid::new_v4();
        let token = issue_token(&subject(id), &config).expect("token issuance should succeed");

        let claims = verify_token(&token, &config).expect("token should verify");
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "ana@empresa.com");
        assert_eq!(claims.role, "employee");
        assert_eq!(claims.cnpj_access, "12345678000190");
        assert_eq!(claims.exp - claims.iat, 7 * 86_400);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let config = test_config();

        // Well past the default 60-second leeway.
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "ana@empresa.com".to_string(),
            role: "employee".to_string(),
            cnpj_access: "1".to_string(),
            iat: now - 600,
            exp: now - 300,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .expect("encoding should succeed");

        assert_matches!(verify_token(&token, &config), Err(TokenError::Expired));
    }

    #[test]
    fn token_signed_with_another_secret_is_invalid() {
        let token = issue_token(&subject(Uuid::new_v4()), &test_config()).unwrap();
        let other = JwtConfig {
            secret: "secret-bravo".to_string(),
            ttl: Duration::days(7),
        };

        assert_matches!(verify_token(&token, &other), Err(TokenError::Invalid(_)));
        assert_matches!(
            verify_token("not-a-jwt", &test_config()),
            Err(TokenError::Invalid(_))
        );
    }

    #[test]
    fn empty_secret_is_a_configuration_failure() {
        let config = JwtConfig {
            secret: String::new(),
            ttl: Duration::days(7),
        };
        assert_matches!(
            issue_token(&subject(Uuid::new_v4()), &config),
            Err(TokenError::MissingSecret)
        );
        assert_matches!(verify_token("x.y.z", &config), Err(TokenError::MissingSecret));
    }

    #[test]
    fn ttl_parsing() {
        assert_eq!(parse_ttl("7d"), Some(Duration::days(7)));
        assert_eq!(parse_ttl("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_ttl("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_ttl("45s"), Some(Duration::seconds(45)));
        assert_eq!(parse_ttl("3600"), Some(Duration::hours(1)));
        assert_eq!(parse_ttl("0"), None);
        assert_eq!(parse_ttl("-1d"), None);
        assert_eq!(parse_ttl("soon"), None);
        assert_eq!(parse_ttl(""), None);
    }

    #[test]
    fn config_requires_a_secret() {
        let lookup = |_: &str| -> Option<String> { None };
        assert_matches!(
            JwtConfig::from_lookup(&lookup),
            Err(ConfigError::Missing("JWT_SECRET"))
        );

        let lookup = |key: &str| match key {
            "JWT_SECRET" => Some("s3cret".to_string()),
            "JWT_EXPIRES_IN" => Some("12h".to_string()),
            _ => None,
        };
        let config = JwtConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.ttl, Duration::hours(12));
    }
}

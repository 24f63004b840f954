use crate::error::{AppError, ErrorKind};
use argon2::Argon2;
use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{
    errors::Result as JwtResult, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use password_hash::{
    self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref, time::Duration};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: impl AsRef<[u8]>) -> password_hash::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_ref(), &salt)
        .map(|h| h.to_string())
}

pub fn verify_password(
    password: impl AsRef<[u8]>,
    password_hash: impl AsRef<str>,
) -> password_hash::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash.as_ref())?;
    Ok(Argon2::default()
        .verify_password(password.as_ref(), &parsed_hash)
        .is_ok())
}

/// Minimal well-formedness check: something before the `@`, a dot somewhere
/// in the domain, no whitespace. Deliverability is not our problem.
pub fn valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.len() >= 3
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

lazy_static::lazy_static! {
    static ref KEYS: Keys = {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Keys {
            encoding: EncodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
            decoding: DecodingKey::from_base64_secret(&secret).expect("JWT_SECRET is not valid base64"),
        }
    };
}

#[allow(unused_must_use)]
pub fn ensure_jwt_secret_is_valid() {
    KEYS.deref();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ngo,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ngo => "ngo",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "ngo" => Some(Role::Ngo),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub account_id: i32,
    pub role: Role,
    pub exp: u64,
}

impl Claims {
    /// Role gate. The stored role claim is re-validated on every request;
    /// client-side role state is never trusted.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::new(
                ErrorKind::Forbidden,
                match role {
                    Role::User => "user access required",
                    Role::Ngo => "NGO access required",
                    Role::Admin => "admin access required",
                },
            ))
        }
    }
}

pub fn generate_jwt(account_id: i32, role: Role, exp: Duration) -> JwtResult<String> {
    jsonwebtoken::encode(
        &Header::default(),
        &Claims {
            account_id,
            role,
            exp: jsonwebtoken::get_current_timestamp() + exp.as_secs(),
        },
        &KEYS.encoding,
    )
}

pub fn validate_jwt(token: &str) -> JwtResult<TokenData<Claims>> {
    jsonwebtoken::decode::<Claims>(token, &KEYS.decoding, &Validation::default())
}

/// Extracts and validates the bearer token; handlers get the decoded claims.
pub struct Auth(pub Claims);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::new(ErrorKind::Unauthenticated, "missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::new(ErrorKind::Unauthenticated, "missing bearer token"))?;

        let data = validate_jwt(token)
            .map_err(|_| AppError::new(ErrorKind::Unauthenticated, "invalid or expired token"))?;

        Ok(Auth(data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_test_secret() {
        // "test-secret-test-secret" base64 encoded
        std::env::set_var("JWT_SECRET", "dGVzdC1zZWNyZXQtdGVzdC1zZWNyZXQ=");
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("Passw0rd").unwrap();
        assert_ne!(hash, "Passw0rd");
        assert!(verify_password("Passw0rd", &hash).unwrap());
        assert!(!verify_password("passw0rd", &hash).unwrap());
    }

    #[test]
    fn jwt_round_trip() {
        set_test_secret();
        let token = generate_jwt(42, Role::Ngo, Duration::from_secs(60)).unwrap();
        let data = validate_jwt(&token).unwrap();
        assert_eq!(data.claims.account_id, 42);
        assert_eq!(data.claims.role, Role::Ngo);
    }

    #[test]
    fn expired_jwt_is_rejected() {
        set_test_secret();
        let token = jsonwebtoken::encode(
            &Header::default(),
            &Claims {
                account_id: 1,
                role: Role::User,
                // well past the default validation leeway
                exp: jsonwebtoken::get_current_timestamp() - 600,
            },
            &KEYS.encoding,
        )
        .unwrap();
        assert!(validate_jwt(&token).is_err());
    }

    #[test]
    fn garbage_jwt_is_rejected() {
        set_test_secret();
        assert!(validate_jwt("not-a-token").is_err());
    }

    #[test]
    fn role_gate() {
        let claims = Claims {
            account_id: 7,
            role: Role::Ngo,
            exp: 0,
        };
        assert!(claims.require(Role::Ngo).is_ok());
        assert!(claims.require(Role::Admin).is_err());
    }

    #[test]
    fn role_parse_round_trips() {
        for role in [Role::User, Role::Ngo, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn email_validation() {
        assert!(valid_email("hh@example.org"));
        assert!(valid_email("a.b+c@sub.example.co"));
        assert!(!valid_email("hh@example"));
        assert!(!valid_email("@example.org"));
        assert!(!valid_email("hh example@example.org"));
        assert!(!valid_email("plainaddress"));
        assert!(!valid_email("hh@.org"));
    }
}

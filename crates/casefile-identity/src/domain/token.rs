//! Signed access tokens.
//!
//! HS256 JWTs whose claims carry the user id plus issue and expiry times in
//! Unix seconds. Expiry is checked against the injected clock rather than
//! the system time, so verification follows the same time source as the
//! rest of the request.

use casefile_core::error::DomainError;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The authenticated user.
    pub user_id: Uuid,
    /// Issued at, Unix seconds.
    pub iat: i64,
    /// Expires at, Unix seconds.
    pub exp: i64,
}

/// Issues and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[redacted]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

fn unauthorized(reason: &str) -> DomainError {
    DomainError::Unauthorized(reason.to_owned())
}

impl TokenSigner {
    /// Creates a signer whose tokens live for `ttl_secs` seconds.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: i64) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        }
    }

    /// Issues a token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the token cannot be encoded.
    pub fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String, DomainError> {
        let iat = now.timestamp();
        let claims = TokenClaims {
            user_id,
            iat,
            exp: iat + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| DomainError::Infrastructure(format!("token encoding failed: {e}")))
    }

    /// Verifies a token's signature and expiry and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unauthorized` if the token is malformed, is not
    /// HS256, its signature does not match, or it has expired.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, DomainError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| unauthorized("invalid token"))?;
        if now.timestamp() >= data.claims.exp {
            return Err(unauthorized("token expired"));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_issued_token_verifies_with_claims() {
        let signer = TokenSigner::new("secret", 3_600);
        let user_id = Uuid::new_v4();

        let token = signer.issue(user_id, now()).unwrap();
        let claims = signer.verify(&token, now()).unwrap();

        assert_eq!(token.matches('.').count(), 2);
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.exp - claims.iat, 3_600);
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.issue(Uuid::new_v4(), now()).unwrap();

        let just_before = signer.verify(&token, now() + Duration::seconds(59));
        let at_expiry = signer.verify(&token, now() + Duration::seconds(60));

        assert!(just_before.is_ok());
        assert!(matches!(at_expiry, Err(DomainError::Unauthorized(_))));
    }

    #[test]
    fn test_verify_rejects_token_signed_with_other_secret() {
        let token = TokenSigner::new("one", 60).issue(Uuid::new_v4(), now()).unwrap();

        let result = TokenSigner::new("two", 60).verify(&token, now());

        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }

    #[test]
    fn test_verify_rejects_other_algorithms() {
        // Arrange
        let claims = TokenClaims {
            user_id: Uuid::new_v4(),
            iat: now().timestamp(),
            exp: now().timestamp() + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        // Act
        let result = TokenSigner::new("secret", 60).verify(&token, now());

        // Assert
        assert!(matches!(result, Err(DomainError::Unauthorized(_))));
    }

    #[test]
    fn test_verify_rejects_tampered_claims() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.issue(Uuid::new_v4(), now()).unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"user_id":"{}","iat":0,"exp":9999999999}}"#,
            Uuid::new_v4()
        ));
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{forged_claims}.{}", parts[0], parts[2]);

        assert!(signer.verify(&forged, now()).is_err());
    }

    #[test]
    fn test_verify_rejects_malformed_tokens() {
        let signer = TokenSigner::new("secret", 60);
        for token in ["", "a.b", "a.b.c.d", "not a token"] {
            assert!(matches!(
                signer.verify(token, now()),
                Err(DomainError::Unauthorized(_))
            ));
        }
    }
}

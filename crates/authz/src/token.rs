use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use shelf_db::DocumentId;
use shelf_kernel::settings::AuthSettings;
use time::OffsetDateTime;

use crate::AuthError;

/// JWT claims carried by identity tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and verifies HS256 identity tokens bound to a user id
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(&settings.jwt_secret, settings.token_ttl_secs)
    }

    pub fn issue(&self, user_id: DocumentId) -> Result<String, AuthError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Issue(e.to_string()))
    }

    /// Validate a token and return the user id it is bound to
    pub fn verify(&self, token: &str) -> Result<DocumentId, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })?;

        claims.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_to_the_same_user() {
        let issuer = TokenIssuer::new("test_secret", 3600);
        let user_id = DocumentId::generate();

        let token = issuer.issue(user_id).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = TokenIssuer::new("one", 3600)
            .issue(DocumentId::generate())
            .unwrap();
        let err = TokenIssuer::new("two", 3600).verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[test]
    fn expired_tokens_are_reported_as_expired() {
        let issuer = TokenIssuer::new("test_secret", 3600);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: DocumentId::generate().to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(&Header::default(), &claims, &issuer.encoding_key).unwrap();

        assert!(matches!(issuer.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn subjects_must_be_document_ids() {
        let issuer = TokenIssuer::new("test_secret", 3600);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: "admin".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(&Header::default(), &claims, &issuer.encoding_key).unwrap();

        assert!(matches!(issuer.verify(&token), Err(AuthError::InvalidToken)));
    }
}

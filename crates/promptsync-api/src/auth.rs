use std::time::Duration;

use axum::http::{header, HeaderMap};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AppError;

/// Caller resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    /// `session_id` claim, falling back to `jti`
    pub session_id: Option<String>,
}

/// Verifies HS256 access tokens signed with the shared secret.
///
/// Signature, `exp`, `nbf`, audience and the optional issuer are checked by
/// `jsonwebtoken`; `iat` and a non-blank subject are checked here.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    clock_skew: Duration,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    iat: i64,
    #[serde(default)]
    jti: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

impl JwtVerifier {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            &config.jwt_audience,
            config.jwt_issuer.as_deref(),
            config.auth_clock_skew,
        )
    }

    fn new(secret: &str, audience: &str, issuer: Option<&str>, clock_skew: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = clock_skew.as_secs();
        validation.validate_nbf = true;
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock_skew,
        }
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let claims = decode::<AccessClaims>(token, &self.key, &self.validation)
            .map_err(|error| AppError::unauthorized(rejection_reason(&error)))?
            .claims;

        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);
        if claims.iat > chrono::Utc::now().timestamp().saturating_add(skew) {
            return Err(AppError::unauthorized("Token `iat` is in the future"));
        }

        let user_id = claims.sub.trim();
        if user_id.is_empty() {
            return Err(AppError::unauthorized("Token subject is empty"));
        }

        Ok(AuthenticatedUser {
            user_id: user_id.to_string(),
            session_id: claims.session_id.or(claims.jti),
        })
    }
}

fn rejection_reason(error: &JwtError) -> String {
    match error.kind() {
        ErrorKind::ExpiredSignature => "Token is expired".to_string(),
        ErrorKind::ImmatureSignature => "Token is not yet valid".to_string(),
        ErrorKind::InvalidAudience => "Token audience is not allowed".to_string(),
        ErrorKind::InvalidIssuer => "Token issuer is not allowed".to_string(),
        ErrorKind::InvalidSignature => "Token signature is invalid".to_string(),
        ErrorKind::InvalidAlgorithm => "Token algorithm is not accepted".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("Token missing `{claim}` claim"),
        _ => format!(
            "Token is malformed: {}",
            error.to_string().replace('\n', " ").trim()
        ),
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(AppError::unauthorized("Missing Authorization header"));
    };
    let value = value
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?
        .trim();

    let mut parts = value.splitn(2, char::is_whitespace);
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().map(str::trim).unwrap_or_default();

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("Authorization scheme must be Bearer"));
    }
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }
    Ok(token)
}

/// Signs tokens for router and verifier tests
#[cfg(test)]
pub(crate) mod test_tokens {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    pub const SECRET: &str = "test-secret-test-secret-test-secret";

    pub fn sign(claims: &serde_json::Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    pub fn valid_for(user_id: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        sign(&json!({
            "sub": user_id,
            "aud": "authenticated",
            "iat": now,
            "exp": now + 600,
        }))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::test_tokens::{sign, valid_for, SECRET};
    use super::*;

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET, "authenticated", None, Duration::from_secs(60))
    }

    fn rejection(verifier: &JwtVerifier, token: &str) -> String {
        verifier.verify_access_token(token).unwrap_err().to_string()
    }

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(
            extract_bearer_token(&headers_with("bearer  abc.def.ghi ")).unwrap(),
            "abc.def.ghi"
        );
    }

    #[test]
    fn bearer_extraction_rejects_bad_headers() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
        assert!(extract_bearer_token(&headers_with("Basic abc")).is_err());
        assert!(extract_bearer_token(&headers_with("Bearer")).is_err());
    }

    #[test]
    fn signed_token_resolves_user_and_session() {
        let now = chrono::Utc::now().timestamp();
        let token = sign(&json!({
            "sub": " user-1 ",
            "aud": ["anon", "authenticated"],
            "iat": now,
            "exp": now + 600,
            "jti": "jti-1",
        }));
        let user = verifier().verify_access_token(&token).unwrap();
        assert_eq!(
            user,
            AuthenticatedUser {
                user_id: "user-1".to_string(),
                session_id: Some("jti-1".to_string()),
            }
        );
        assert!(verifier().verify_access_token(&valid_for("u")).is_ok());
    }

    #[test]
    fn forged_or_foreign_tokens_are_rejected() {
        let now = chrono::Utc::now().timestamp();
        let forged = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &json!({"sub": "u", "aud": "authenticated", "iat": now, "exp": now + 600}),
            &jsonwebtoken::EncodingKey::from_secret(b"another-secret-another-secret-xx"),
        )
        .unwrap();
        assert!(rejection(&verifier(), &forged).contains("signature"));

        let anon = sign(&json!({"sub": "u", "aud": "anon", "iat": now, "exp": now + 600}));
        assert!(rejection(&verifier(), &anon).contains("audience"));
    }

    #[test]
    fn temporal_claims_are_enforced() {
        let now = chrono::Utc::now().timestamp();
        let claims = |iat: i64, exp: i64| {
            json!({"sub": "u", "aud": "authenticated", "iat": iat, "exp": exp})
        };

        let expired = sign(&claims(now - 900, now - 600));
        assert!(rejection(&verifier(), &expired).contains("expired"));

        let future = sign(&claims(now + 600, now + 900));
        assert!(rejection(&verifier(), &future).contains("future"));

        let no_exp = sign(&json!({"sub": "u", "aud": "authenticated", "iat": now}));
        assert!(rejection(&verifier(), &no_exp).contains("`exp`"));
    }

    #[test]
    fn issuer_is_checked_only_when_configured() {
        let now = chrono::Utc::now().timestamp();
        let token = sign(&json!({
            "sub": "u",
            "aud": "authenticated",
            "iss": "https://other.example.com",
            "iat": now,
            "exp": now + 600,
        }));
        let strict = JwtVerifier::new(
            SECRET,
            "authenticated",
            Some("https://auth.example.com"),
            Duration::from_secs(60),
        );
        assert!(rejection(&strict, &token).contains("issuer"));
        assert!(verifier().verify_access_token(&token).is_ok());
    }
}

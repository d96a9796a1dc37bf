use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::errors::ErrorKind;
use tracing::warn;

use crate::auth::tokens::{Claims, JwtKeys};
use crate::error::ApiError;

/// Extracts and validates the bearer session token, yielding its claims.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("No token, authorization denied".to_string())
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthorized("Invalid token format. Use Bearer <token>".to_string())
        })?;

        match keys.verify(token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                warn!("expired session token");
                Err(ApiError::TokenExpired)
            }
            Err(e) => {
                warn!(error = %e, "invalid session token");
                Err(ApiError::Unauthorized("Token is not valid".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use axum::http::Request;
    use jsonwebtoken::{encode, DecodingKey, EncodingKey, Header};
    use std::time::Duration;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[derive(Clone)]
    struct TestState(JwtKeys);

    impl FromRef<TestState> for JwtKeys {
        fn from_ref(state: &TestState) -> Self {
            state.0.clone()
        }
    }

    fn keys() -> JwtKeys {
        JwtKeys {
            encoding: EncodingKey::from_secret(b"test-secret"),
            decoding: DecodingKey::from_secret(b"test-secret"),
            ttl: Duration::from_secs(3600),
        }
    }

    fn token_with_exp(offset_secs: i64) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Customer,
            is_admin: false,
            iat: now as usize,
            exp: (now + offset_secs) as usize,
        };
        encode(&Header::default(), &claims, &keys().encoding).unwrap()
    }

    async fn extract(header: Option<String>) -> Result<AuthUser, ApiError> {
        let mut builder = Request::builder().uri("/me");
        if let Some(h) = header {
            builder = builder.header(axum::http::header::AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, &TestState(keys())).await
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let err = extract(None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_rejected() {
        let err = extract(Some("Basic abc".into())).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn valid_token_yields_claims() {
        let token = token_with_exp(3600);
        let AuthUser(claims) = extract(Some(format!("Bearer {token}"))).await.unwrap();
        assert_eq!(claims.role, Role::Customer);
    }

    #[tokio::test]
    async fn expired_token_is_distinguished_from_garbage() {
        let token = token_with_exp(-3600);
        let err = extract(Some(format!("Bearer {token}"))).await.unwrap_err();
        assert!(matches!(err, ApiError::TokenExpired));

        let err = extract(Some("Bearer not-a-jwt".into())).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tripify_core::User;

use crate::error::ApiError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Identity on optionally-authenticated routes: always present as an
/// extension, `None` for anonymous callers.
#[derive(Debug, Clone, Copy)]
pub struct MaybeAuth(pub Option<AuthUser>);

pub fn issue_token(user: &User, auth: &AuthConfig) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Token encoding failed: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Option<(AuthUser, Claims)> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    let id = Uuid::parse_str(&data.claims.sub).ok()?;
    Some((AuthUser { id }, data.claims))
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

// ============================================================================
// Authentication middleware
// ============================================================================

/// Rejects the request unless it carries a valid bearer token; attaches the
/// identity to request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let (user, claims) = decode_token(token, &state.auth.secret)
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Attaches the identity when a valid token is present but lets anonymous
/// requests through, for endpoints whose visibility rules handle both
/// (public trip reads, public search).
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let identity = bearer_token(&req).and_then(|t| decode_token(t, &state.auth.secret));
    if let Some((user, claims)) = &identity {
        req.extensions_mut().insert(*user);
        req.extensions_mut().insert(claims.clone());
    }
    req.extensions_mut()
        .insert(MaybeAuth(identity.map(|(user, _)| user)));
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripify_core::Preferences;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 3600,
        }
    }

    #[test]
    fn issued_tokens_round_trip() {
        let user = User::new(
            "ana@example.com".to_string(),
            String::new(),
            "Ana".to_string(),
            "Silva".to_string(),
            Preferences::default(),
        );
        let auth = auth_config();
        let token = issue_token(&user, &auth).unwrap();

        let (decoded, claims) = decode_token(&token, &auth.secret).unwrap();
        assert_eq!(decoded.id, user.id);
        assert_eq!(claims.email, "ana@example.com");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let user = User::new(
            "ana@example.com".to_string(),
            String::new(),
            "Ana".to_string(),
            "Silva".to_string(),
            Preferences::default(),
        );
        let token = issue_token(&user, &auth_config()).unwrap();
        assert!(decode_token(&token, "other-secret").is_none());
    }
}

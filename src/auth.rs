use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, JwtConfig},
    error::{AppError, Result},
    models::User,
    password::verify_password,
    repository::RepositoryState,
};

/// Claims
///
/// Bearer token payload. Stateless: there is no server-side revocation, a token is
/// valid until `exp` as long as its subject still resolves to a user.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id, as a string.
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds): issue time + configured TTL.
    pub exp: i64,
}

/// Signs a token for `user_id` that expires `ttl_minutes` from now.
pub fn issue_token(jwt: &JwtConfig, user_id: i64) -> Result<String> {
    let now = Utc::now();
    let expires_at = jwt.expiry_from(now).ok_or_else(|| {
        AppError::Internal(format!("token ttl of {} minutes is out of range", jwt.ttl_minutes))
    })?;
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    encode(
        &Header::new(jwt.algorithm),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

/// Verifies signature and expiry. Any failure, malformed input included, is `InvalidToken`.
pub fn decode_token(jwt: &JwtConfig, token: &str) -> Result<Claims> {
    let validation = Validation::new(jwt.algorithm);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AppError::InvalidToken
    })
}

/// authenticate
///
/// Looks the user up by username OR email in one query and checks the password.
/// Unknown login and wrong password are indistinguishable to the caller.
pub async fn authenticate(
    repo: &RepositoryState,
    jwt: &JwtConfig,
    login: &str,
    password: &str,
) -> Result<(User, String)> {
    let Some(user) = repo.find_user_by_login(login).await? else {
        tracing::warn!(login = %login, "login for unknown user");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.hashed_password)? {
        tracing::warn!(user_id = user.id, "login with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    let token = issue_token(jwt, user.id)?;
    tracing::info!(user_id = user.id, "user logged in");
    Ok((user, token))
}

/// resolve_current_user
///
/// Token to user. Fails with `InvalidToken` on a bad token and `UserNotFound` when the
/// subject no longer exists.
pub async fn resolve_current_user(
    repo: &RepositoryState,
    jwt: &JwtConfig,
    token: &str,
) -> Result<User> {
    let claims = decode_token(jwt, token)?;
    let user_id: i64 = claims.sub.parse().map_err(|_| AppError::InvalidToken)?;
    repo.get_user(user_id).await?.ok_or(AppError::UserNotFound)
}

pub fn require_admin(user: User) -> Result<User> {
    if user.is_admin {
        Ok(user)
    } else {
        tracing::warn!(user_id = user.id, "admin capability required");
        Err(AppError::Forbidden)
    }
}

/// Owner-or-admin rule shared by update and soft delete.
pub fn ensure_owner_or_admin(requester: &AuthUser, creator_id: i64) -> Result<()> {
    if requester.id() == creator_id || requester.is_admin() {
        Ok(())
    } else {
        tracing::warn!(
            user_id = requester.id(),
            creator_id,
            "news mutation by non-owner"
        );
        Err(AppError::Forbidden)
    }
}

/// AuthUser
///
/// The resolved current (active) user of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn is_admin(&self) -> bool {
        self.0.is_admin
    }
}

/// AdminUser
///
/// An `AuthUser` that also passed `require_admin`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

impl From<AdminUser> for AuthUser {
    fn from(admin: AdminUser) -> Self {
        AuthUser(admin.0)
    }
}

fn bearer_token(parts: &Parts) -> Result<&str> {
    let value = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::InvalidToken)
}

/// Rejects with the `AppError` of whichever step failed: a missing or bad token is a
/// 401, a token for a deleted user a 404.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = bearer_token(parts)?;
        let user = resolve_current_user(&repo, &config.jwt, token).await?;
        Ok(AuthUser(user))
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        require_admin(user).map(AdminUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_decode_roundtrip() {
        let jwt = JwtConfig::default();
        let token = issue_token(&jwt, 42).unwrap();
        let claims = decode_token(&jwt, &token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.exp - claims.iat, jwt.ttl_minutes * 60);
    }

    #[test]
    fn decode_rejects_foreign_signature() {
        let jwt = JwtConfig::default();
        let other = JwtConfig {
            secret: "some-other-secret".into(),
            ..JwtConfig::default()
        };
        let token = issue_token(&other, 1).unwrap();
        assert!(matches!(decode_token(&jwt, &token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn decode_rejects_garbage() {
        let jwt = JwtConfig::default();
        assert!(matches!(decode_token(&jwt, "not.a.token"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn out_of_range_ttl_is_an_error_not_a_panic() {
        for ttl_minutes in [i64::MAX / 2, i64::MAX, i64::MIN] {
            let jwt = JwtConfig {
                ttl_minutes,
                ..JwtConfig::default()
            };
            assert!(
                matches!(issue_token(&jwt, 1), Err(AppError::Internal(_))),
                "ttl {ttl_minutes}"
            );
        }
    }

    #[test]
    fn decode_rejects_expired_token() {
        let jwt = JwtConfig {
            ttl_minutes: -10,
            ..JwtConfig::default()
        };
        let token = issue_token(&jwt, 7).unwrap();
        assert!(matches!(decode_token(&jwt, &token), Err(AppError::InvalidToken)));
    }
}

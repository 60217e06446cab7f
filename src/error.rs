use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// AppError
///
/// Every failure a request can end in. Lookups and authorization failures are
/// client-facing; `Internal` and `Database` are logged and reported generically.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Not enough permissions")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Username already registered")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Only image uploads are accepted")]
    UnsupportedType,

    #[error("File exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::InvalidToken => "invalid_token",
            AppError::UserNotFound => "user_not_found",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::UsernameTaken => "username_taken",
            AppError::EmailTaken => "email_taken",
            AppError::Validation(_) => "validation_error",
            AppError::UnsupportedType => "unsupported_type",
            AppError::TooLarge { .. } => "too_large",
            AppError::Internal(_) | AppError::Database(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::UserNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UsernameTaken
            | AppError::EmailTaken
            | AppError::Validation(_)
            | AppError::UnsupportedType
            | AppError::TooLarge { .. } => StatusCode::BAD_REQUEST,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Internal(_) | AppError::Database(_) => {
                tracing::error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response =
            (status, Json(json!({ "error": self.code(), "detail": detail }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_responses_carry_bearer_challenge() {
        let response = AppError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn conflicts_map_to_bad_request() {
        assert_eq!(AppError::UsernameTaken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::EmailTaken.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_detail_is_not_exposed() {
        let err = AppError::Internal("write /srv/uploads/x.png failed".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = err.into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}

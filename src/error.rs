use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Object ID could not be mapped to a known object type
    Classification(String),
    /// (object type, action) pair has no registered activity type
    Lookup(String),
    /// Object type is known but cannot be followed
    NotFollowable(String),
    /// Underlying query failed; the anyhow chain carries table/column/key context
    Database(anyhow::Error),
    NotFound(String),
    Validation(String),
    ConfigurationError(String),
    Internal(String),
}

impl AppError {
    /// Wrap a storage failure with the context of the query that produced it.
    pub fn storage(context: impl Into<String>, err: sqlx::Error) -> Self {
        AppError::Database(anyhow::Error::new(err).context(context.into()))
    }

    /// Stable, categorized reason code. Callers match on this, never on the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Classification(_) => "error.object.classification_failed",
            AppError::Lookup(_) => "error.activity_type.not_registered",
            AppError::NotFollowable(_) => "error.object.disallow_follow",
            AppError::Database(_) => "error.database.unknown",
            AppError::NotFound(_) => "error.object.not_found",
            AppError::Validation(_) => "error.request.invalid",
            AppError::ConfigurationError(_) => "error.config.invalid",
            AppError::Internal(_) => "error.internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFollowable(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Classification(_)
            | AppError::Lookup(_)
            | AppError::Database(_)
            | AppError::ConfigurationError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Request errors are the caller's fault; everything else is an internal fault.
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Classification(msg) => write!(f, "Classification error: {}", msg),
            AppError::Lookup(msg) => write!(f, "Activity type lookup error: {}", msg),
            AppError::NotFollowable(msg) => write!(f, "Not followable: {}", msg),
            AppError::Database(err) => write!(f, "Database error: {:#}", err),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Database(err) => Some(&**err),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = if status.is_server_error() {
            tracing::error!(code = self.code(), "{}", self);
            "Internal server error".to_string()
        } else {
            match &self {
                AppError::NotFollowable(msg) | AppError::NotFound(msg) | AppError::Validation(msg) => {
                    msg.clone()
                }
                other => other.to_string(),
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": self.code(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

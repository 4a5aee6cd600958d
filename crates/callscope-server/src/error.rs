//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use callscope_auth::AuthError;
use callscope_core::error::CallscopeError;
use serde_json::json;
use tracing::error;

/// Error returned by every handler. Rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(pub CallscopeError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(CallscopeError::validation(message))
    }

    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self(CallscopeError::AuthenticationFailed {
            reason: reason.into(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CallscopeError::Validation { .. } | CallscopeError::AlreadyExists { .. } => {
                StatusCode::BAD_REQUEST
            }
            CallscopeError::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            CallscopeError::AuthorizationDenied { .. } | CallscopeError::LimitExceeded { .. } => {
                StatusCode::FORBIDDEN
            }
            CallscopeError::NotFound { .. } => StatusCode::NOT_FOUND,
            CallscopeError::Database(_)
            | CallscopeError::Crypto(_)
            | CallscopeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CallscopeError> for ApiError {
    fn from(err: CallscopeError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            _ if status.is_server_error() => {
                error!(error = %self.0, "Request failed");
                "Internal server error".to_string()
            }
            CallscopeError::NotFound { entity, .. } => format!("{entity} not found"),
            CallscopeError::AlreadyExists { entity } => format!("{entity} already exists"),
            CallscopeError::AuthenticationFailed { reason }
            | CallscopeError::AuthorizationDenied { reason } => reason.clone(),
            CallscopeError::Validation { message } => message.clone(),
            CallscopeError::LimitExceeded { limit } => {
                format!("Subscription limit reached: {limit}")
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (CallscopeError::validation("x"), StatusCode::BAD_REQUEST),
            (
                CallscopeError::AlreadyExists {
                    entity: "agent".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                CallscopeError::AuthenticationFailed { reason: "x".into() },
                StatusCode::UNAUTHORIZED,
            ),
            (CallscopeError::denied("x"), StatusCode::FORBIDDEN),
            (
                CallscopeError::LimitExceeded {
                    limit: "max_calls".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (CallscopeError::not_found("agent", "1"), StatusCode::NOT_FOUND),
            (
                CallscopeError::Database("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let response = ApiError(CallscopeError::Database("secret table".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Internal server error");
    }
}

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_auth::AuthError;
use stockledger_core::DomainError;
use stockledger_infra::ServiceError;
use stockledger_infra::repository::RepositoryError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(e) => domain_error_to_response(e),
        ServiceError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("item {id} not found"))
        }
        ServiceError::Store(e) => repository_error_to_response(e),
    }
}

pub fn repository_error_to_response(err: RepositoryError) -> axum::response::Response {
    tracing::error!(error = %err, "store operation failed");
    match err {
        RepositoryError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("item {id} not found"))
        }
        RepositoryError::Unavailable { .. } => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "store_unavailable",
            "storage is temporarily unavailable",
        ),
        RepositoryError::Constraint { message, .. } => {
            json_error(StatusCode::CONFLICT, "constraint_violation", message)
        }
        RepositoryError::Database { .. } | RepositoryError::Corrupt { .. } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            "internal storage error",
        ),
    }
}

/// Login failures: unknown user and wrong password look identical to the caller.
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    match err {
        AuthError::UserNotFound { .. } | AuthError::InvalidCredentials { .. } => {
            tracing::warn!(error = %err, "login rejected");
            json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "invalid username or password",
            )
        }
        AuthError::Store(e) => {
            tracing::error!(error = %e, "credential lookup failed");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "storage is temporarily unavailable",
            )
        }
        AuthError::Password(_) | AuthError::Token(_) => {
            tracing::error!(error = %err, "login failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal error",
            )
        }
    }
}

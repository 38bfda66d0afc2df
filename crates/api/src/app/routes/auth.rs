use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::app::dto::{LoginRequest, LoginResponse};
use crate::app::errors::{auth_error_to_response, domain_error_to_response, json_error};

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text());
        }
    };

    if let Err(e) = req.validate() {
        return domain_error_to_response(e);
    }

    match state.tokens.login(&req.username, &req.password).await {
        Ok((claims, token)) => {
            tracing::info!(
                user_id = %claims.user_id,
                username = %claims.username,
                role = %claims.role,
                "login succeeded"
            );
            Json(LoginResponse {
                username: claims.username,
                token,
            })
            .into_response()
        }
        Err(e) => auth_error_to_response(e),
    }
}

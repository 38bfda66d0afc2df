//! Access gate: bearer authentication and per-route role allow-lists.
//!
//! Both checks short-circuit with a JSON error and never reach the handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tower::{Layer, Service};

use stockledger_auth::{Claims, Role, TokenError, TokenService, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Authentication failures. All of them surface as 401.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("missing or malformed authorization header")]
    MissingBearer,

    #[error(transparent)]
    InvalidToken(#[from] TokenError),
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GateError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(GateError::MissingBearer)?
        .to_str()
        .map_err(|_| GateError::MissingBearer)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(GateError::MissingBearer)?
        .trim();
    if token.is_empty() {
        return Err(GateError::MissingBearer);
    }

    Ok(token)
}

pub fn authenticate_headers(headers: &HeaderMap, tokens: &TokenService) -> Result<Claims, GateError> {
    let token = bearer_token(headers)?;
    Ok(tokens.verify(token)?)
}

/// Verify the bearer token and attach a [`PrincipalContext`] to the request.
pub async fn require_auth(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    match authenticate_headers(req.headers(), &state.tokens) {
        Ok(claims) => {
            req.extensions_mut().insert(PrincipalContext::new(claims));
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %req.uri().path(), "unauthenticated request rejected");
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required")
        }
    }
}

/// Layer admitting only callers whose role is in `allowed`.
///
/// Must sit inside [`require_auth`]; a request without a principal is 401.
pub fn require_roles(allowed: &'static [Role]) -> RequireRoles {
    RequireRoles { allowed }
}

#[derive(Debug, Clone, Copy)]
pub struct RequireRoles {
    allowed: &'static [Role],
}

impl<S> Layer<S> for RequireRoles {
    type Service = RoleGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RoleGate {
            inner,
            allowed: self.allowed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoleGate<S> {
    inner: S,
    allowed: &'static [Role],
}

impl<S> Service<Request> for RoleGate<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let denied = match req.extensions().get::<PrincipalContext>() {
            None => Some(json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "authentication required",
            )),
            Some(principal) => match authorize(principal.claims(), self.allowed) {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(
                        user_id = %principal.user_id(),
                        role = %principal.role(),
                        path = %req.uri().path(),
                        "forbidden request rejected"
                    );
                    Some(json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
                }
            },
        };

        match denied {
            Some(response) => Box::pin(async move { Ok(response) }),
            None => Box::pin(self.inner.call(req)),
        }
    }
}

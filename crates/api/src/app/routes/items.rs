use axum::{
    Json, Router,
    extract::{Extension, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};

use stockledger_auth::Role;
use stockledger_core::ItemId;
use stockledger_inventory::ItemDraft;

use crate::app::AppState;
use crate::app::dto::{
    CreatedResponse, HistoryEntry, HistoryResponse, ItemRequest, ItemResponse, MutationResponse,
};
use crate::app::errors::{domain_error_to_response, json_error, service_error_to_response};
use crate::context::PrincipalContext;
use crate::middleware::require_roles;

pub const LIST_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Viewer];
pub const HISTORY_ROLES: &[Role] = &[Role::Admin, Role::Manager];
pub const WRITE_ROLES: &[Role] = &[Role::Admin, Role::Manager];
pub const DELETE_ROLES: &[Role] = &[Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).route_layer(require_roles(LIST_ROLES)))
        .route("/", post(create).route_layer(require_roles(WRITE_ROLES)))
        .route("/:id", put(update).route_layer(require_roles(WRITE_ROLES)))
        .route("/:id", delete(remove).route_layer(require_roles(DELETE_ROLES)))
        .route(
            "/:id/history",
            get(history).route_layer(require_roles(HISTORY_ROLES)),
        )
}

fn parse_id(raw: &str) -> Result<ItemId, Response> {
    raw.parse::<ItemId>().map_err(domain_error_to_response)
}

fn parse_body(payload: Result<Json<ItemRequest>, JsonRejection>) -> Result<ItemDraft, Response> {
    payload
        .map(|Json(req)| req.into())
        .map_err(|rejection| json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text()))
}

async fn list(State(state): State<AppState>) -> Response {
    match state.inventory.inventory().await {
        Ok(items) => {
            let body: Vec<ItemResponse> = items.into_iter().map(ItemResponse::from).collect();
            Json(body).into_response()
        }
        Err(e) => service_error_to_response(e),
    }
}

async fn create(
    State(state): State<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<ItemRequest>, JsonRejection>,
) -> Response {
    let draft = match parse_body(payload) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match state.inventory.add_item(principal.user_id(), &draft).await {
        Ok(id) => (StatusCode::CREATED, Json(CreatedResponse { id })).into_response(),
        Err(e) => service_error_to_response(e),
    }
}

async fn update(
    State(state): State<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path(raw_id): Path<String>,
    payload: Result<Json<ItemRequest>, JsonRejection>,
) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let draft = match parse_body(payload) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match state.inventory.update_item(principal.user_id(), id, &draft).await {
        Ok(()) => Json(MutationResponse {
            id,
            message: "item updated",
        })
        .into_response(),
        Err(e) => service_error_to_response(e),
    }
}

async fn remove(
    State(state): State<AppState>,
    Extension(principal): Extension<PrincipalContext>,
    Path(raw_id): Path<String>,
) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.inventory.delete_item(principal.user_id(), id).await {
        Ok(()) => Json(MutationResponse {
            id,
            message: "item deleted",
        })
        .into_response(),
        Err(e) => service_error_to_response(e),
    }
}

async fn history(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    let id = match parse_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.inventory.item_history(id).await {
        Ok(rows) => Json(HistoryResponse {
            item_id: id,
            items: rows.into_iter().map(HistoryEntry::from).collect(),
        })
        .into_response(),
        Err(e) => service_error_to_response(e),
    }
}

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use stockledger_auth::{Claims, Role};
use stockledger_core::UserId;
use stockledger_infra::config::SeedUser;
use stockledger_infra::repository::InMemoryStore;
use stockledger_infra::seed::seed_users;

const JWT_SECRET: &str = "test-secret";
const HASH_COST: u32 = 4;

struct TestServer {
    base_url: String,
    store: Arc<InMemoryStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = InMemoryStore::arc();
        let users = [
            ("admin1", Role::Admin),
            ("manager1", Role::Manager),
            ("viewer1", Role::Viewer),
        ]
        .into_iter()
        .map(|(username, role)| SeedUser {
            username: username.to_string(),
            password: "secret123".to_string(),
            role,
        })
        .collect::<Vec<_>>();
        seed_users(store.as_ref(), &users, HASH_COST).await.expect("seed users");

        // Same router as prod, bound to an ephemeral port.
        let state = stockledger_api::app::AppState::in_memory(JWT_SECRET, HASH_COST, store.clone());
        let app = stockledger_api::app::build_app(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, client: &reqwest::Client, username: &str) -> String {
        let res = client
            .post(self.url("/login"))
            .json(&json!({ "username": username, "password": "secret123" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["username"], username);
        body["token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(secret: &str, role: Role, issued_at: chrono::DateTime<Utc>) -> String {
    let claims = Claims {
        user_id: UserId::new(1),
        username: "admin1".to_string(),
        role,
        iat: issued_at.timestamp(),
        exp: (issued_at + ChronoDuration::hours(12)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn create_widget(srv: &TestServer, client: &reqwest::Client, token: &str, quantity: i64) -> i64 {
    let res = client
        .post(srv.url("/items"))
        .bearer_auth(token)
        .json(&json!({ "name": "Widget", "description": "", "quantity": quantity }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn history(srv: &TestServer, client: &reqwest::Client, token: &str, id: i64) -> reqwest::Response {
    client
        .get(srv.url(&format!("/items/{id}/history")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/whoami", "/items", "/items/1/history"] {
        let res = client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "path {path}");
    }
}

#[tokio::test]
async fn login_issues_token_carrying_identity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "admin1").await;

    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["username"], "admin1");
    assert_eq!(body["role"], "admin");
    let issued = chrono::DateTime::parse_from_rfc3339(body["issued_at"].as_str().unwrap()).unwrap();
    let expires = chrono::DateTime::parse_from_rfc3339(body["expires_at"].as_str().unwrap()).unwrap();
    assert_eq!(expires - issued, ChronoDuration::hours(12));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let wrong_password = client
        .post(srv.url("/login"))
        .json(&json!({ "username": "admin1", "password": "secret124" }))
        .send()
        .await
        .unwrap();
    let unknown_user = client
        .post(srv.url("/login"))
        .json(&json!({ "username": "ghost1", "password": "secret123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn login_rejects_malformed_bodies() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let short = client
        .post(srv.url("/login"))
        .json(&json!({ "username": "admin1", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(short.status(), StatusCode::BAD_REQUEST);

    let missing = client
        .post(srv.url("/login"))
        .json(&json!({ "username": "admin1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_then_update_builds_the_ledger() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "admin1").await;

    let id = create_widget(&srv, &client, &token, 10).await;
    assert_eq!(id, 1);

    let res = history(&srv, &client, &token, id).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let rows = body["items"].as_array().unwrap();
    assert_eq!(body["item_id"], 1);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["operation"], "INSERT");
    assert_eq!(rows[0]["user_id"], 1);
    assert!(rows[0].get("old_value").is_none());

    let res = client
        .put(srv.url(&format!("/items/{id}")))
        .bearer_auth(&token)
        .json(&json!({ "name": "Widget", "description": "", "quantity": 15 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], 1);

    let body: Value = history(&srv, &client, &token, id).await.json().await.unwrap();
    let rows = body["items"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["operation"], "UPDATE");
    let old: Value = serde_json::from_str(rows[1]["old_value"].as_str().unwrap()).unwrap();
    let new: Value = serde_json::from_str(rows[1]["new_value"].as_str().unwrap()).unwrap();
    assert_eq!(old["quantity"], 10);
    assert_eq!(new["quantity"], 15);
}

#[tokio::test]
async fn viewer_create_is_forbidden_without_side_effects() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "viewer1").await;

    let res = client
        .post(srv.url("/items"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Widget", "description": "", "quantity": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(srv.store.history_len(), 0);

    let res = client
        .get(srv.url("/items"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let items: Value = res.json().await.unwrap();
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn allow_lists_per_route() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = srv.login(&client, "admin1").await;
    let manager = srv.login(&client, "manager1").await;
    let viewer = srv.login(&client, "viewer1").await;

    let id = create_widget(&srv, &client, &manager, 5).await;

    assert_eq!(history(&srv, &client, &viewer, id).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(history(&srv, &client, &manager, id).await.status(), StatusCode::OK);

    let res = client
        .delete(srv.url(&format!("/items/{id}")))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .delete(srv.url(&format!("/items/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = history(&srv, &client, &admin, id).await.json().await.unwrap();
    let rows = body["items"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["operation"], "DELETE");
    assert!(rows[1].get("new_value").is_none());
}

#[tokio::test]
async fn deleting_missing_item_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "admin1").await;

    let res = client
        .delete(srv.url("/items/999"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(history(&srv, &client, &token, 999).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(srv.store.history_len(), 0);
}

#[tokio::test]
async fn second_delete_is_not_found() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "admin1").await;
    let id = create_widget(&srv, &client, &token, 1).await;

    for expected in [StatusCode::OK, StatusCode::NOT_FOUND] {
        let res = client
            .delete(srv.url(&format!("/items/{id}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected);
    }
    assert_eq!(srv.store.history_len(), 2);
}

#[tokio::test]
async fn invalid_input_is_bad_request() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = srv.login(&client, "admin1").await;

    let zero = client
        .post(srv.url("/items"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Widget", "quantity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let bad_id = client
        .put(srv.url("/items/abc"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Widget", "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_id.status(), StatusCode::BAD_REQUEST);

    assert_eq!(history(&srv, &client, &token, 0).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.store.history_len(), 0);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, Role::Admin, Utc::now() - ChronoDuration::hours(13));

    let res = client
        .get(srv.url("/items"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_other_secret_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt("some-other-secret", Role::Admin, Utc::now());

    let res = client
        .get(srv.url("/items"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn freshly_minted_token_is_accepted() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = mint_jwt(JWT_SECRET, Role::Viewer, Utc::now());

    let res = client
        .get(srv.url("/items"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

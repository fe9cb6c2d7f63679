//! Integration tests for the SecondHand client.
//!
//! Tests run the real [`HttpBackend`](secondhand_client::HttpBackend) against
//! an in-process `axum` server that mimics the SecondHand REST API and
//! records every request it receives.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p secondhand-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let mock = MockBackend::spawn().await;
//! mock.set(|data| data.ewallet = None);
//! let backend = HttpBackend::new(&mock.config())?;
//! assert!(backend.get_ewallet().await?.is_none());
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use secondhand_client::ClientConfig;
use secondhand_client::api::IDEMPOTENCY_KEY_HEADER;
use serde_json::{Value, json};
use url::Url;

/// Token the mock expects in `Authorization`.
pub const TEST_TOKEN: &str = "test-token-5f2c9a7e1b3d";

/// A request seen by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub idempotency_key: Option<String>,
    pub body: Value,
}

/// Canned responses and request log.
#[derive(Debug)]
pub struct MockData {
    /// Body of `GET /api/cart`.
    pub cart: Value,
    pub credit_cards: Value,
    pub bank_accounts: Value,
    /// `None` answers 404.
    pub ewallet: Option<Value>,
    pub emails: Value,
    /// Status and body of `POST /api/orders/checkout`.
    pub checkout: (StatusCode, Value),
    /// Status and body of `POST /api/orders/payment-verification`.
    pub verification: (StatusCode, Value),
    /// Status and body of cart mutations.
    pub cart_mutation: (StatusCode, Value),
    pub requests: Vec<RecordedRequest>,
}

impl Default for MockData {
    fn default() -> Self {
        Self {
            cart: json!([]),
            credit_cards: json!([]),
            bank_accounts: json!([]),
            ewallet: None,
            emails: json!([]),
            checkout: (
                StatusCode::OK,
                json!({"id": 9001, "orderNumber": "SH-9001", "status": "PENDING"}),
            ),
            verification: (StatusCode::OK, json!({"sent": true})),
            cart_mutation: (StatusCode::NO_CONTENT, Value::Null),
            requests: Vec::new(),
        }
    }
}

type SharedData = Arc<Mutex<MockData>>;

/// In-process SecondHand backend.
pub struct MockBackend {
    addr: SocketAddr,
    data: SharedData,
}

impl MockBackend {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Self {
        let data = SharedData::default();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Mock backend has no address");

        let app = router(Arc::clone(&data));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock backend stopped");
        });

        Self { addr, data }
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Panics if the address does not form a URL.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let url = Url::parse(&format!("http://{}/", self.addr)).expect("Invalid mock URL");
        ClientConfig::new(url).with_auth_token(TEST_TOKEN)
    }

    /// Change canned responses.
    pub fn set(&self, f: impl FnOnce(&mut MockData)) {
        f(&mut lock(&self.data));
    }

    /// All requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.data).requests.clone()
    }

    /// Requests matching a method and path.
    #[must_use]
    pub fn requests_to(&self, method: &Method, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == *method && r.path == path)
            .collect()
    }
}

fn lock(data: &SharedData) -> MutexGuard<'_, MockData> {
    data.lock().unwrap_or_else(PoisonError::into_inner)
}

fn router(data: SharedData) -> Router {
    Router::new()
        .route("/api/cart", get(get_cart).delete(clear_cart))
        .route("/api/cart/items/{id}", put(update_item).delete(remove_item))
        .route("/api/orders/checkout", post(checkout))
        .route("/api/orders/payment-verification", post(verification))
        .route("/api/payments/credit-cards", get(credit_cards))
        .route("/api/payments/bank-accounts", get(bank_accounts))
        .route("/api/ewallet", get(ewallet))
        .route("/api/emails", get(emails))
        .with_state(data)
}

fn record(data: &SharedData, method: Method, uri: &Uri, headers: &HeaderMap, body: Value) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    lock(data).requests.push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        authorization: header("authorization"),
        idempotency_key: header(IDEMPOTENCY_KEY_HEADER),
        body,
    });
}

fn respond((status, body): (StatusCode, Value)) -> Response {
    if body.is_null() {
        status.into_response()
    } else if let Value::String(text) = body {
        (status, text).into_response()
    } else {
        (status, Json(body)).into_response()
    }
}

async fn get_cart(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    let cart = lock(&data).cart.clone();
    respond((StatusCode::OK, cart))
}

async fn clear_cart(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    lock(&data).cart = json!([]);
    StatusCode::NO_CONTENT.into_response()
}

async fn update_item(
    State(data): State<SharedData>,
    Path(id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&data, method, &uri, &headers, body.clone());
    let mut guard = lock(&data);
    let response = guard.cart_mutation.clone();
    if response.0.is_success()
        && let Some(items) = guard.cart.as_array_mut()
    {
        for item in items.iter_mut().filter(|item| item["id"] == id) {
            item["quantity"] = body["quantity"].clone();
        }
    }
    respond(response)
}

async fn remove_item(
    State(data): State<SharedData>,
    Path(id): Path<i64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    let mut guard = lock(&data);
    let response = guard.cart_mutation.clone();
    if response.0.is_success()
        && let Some(items) = guard.cart.as_array_mut()
    {
        items.retain(|item| item["id"] != id);
    }
    respond(response)
}

async fn checkout(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&data, method, &uri, &headers, body);
    let response = lock(&data).checkout.clone();
    respond(response)
}

async fn verification(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&data, method, &uri, &headers, body);
    let response = lock(&data).verification.clone();
    respond(response)
}

async fn credit_cards(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    let cards = lock(&data).credit_cards.clone();
    respond((StatusCode::OK, cards))
}

async fn bank_accounts(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    let accounts = lock(&data).bank_accounts.clone();
    respond((StatusCode::OK, accounts))
}

async fn ewallet(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    let wallet = lock(&data).ewallet.clone();
    match wallet {
        Some(wallet) => respond((StatusCode::OK, wallet)),
        None => respond((StatusCode::NOT_FOUND, json!({"message": "eWallet not found"}))),
    }
}

async fn emails(
    State(data): State<SharedData>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    record(&data, method, &uri, &headers, Value::Null);
    let emails = lock(&data).emails.clone();
    respond((StatusCode::OK, emails))
}

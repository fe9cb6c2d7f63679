//! `reqwest` implementation of the backend traits.

use std::sync::Arc;

use moka::future::Cache;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use secondhand_core::{CartItem, CartItemId};

use super::cache::{CacheKey, CacheValue};
use super::{
    BankAccount, CartApi, CheckoutRequest, CreditCard, EWallet, EmailApi, EmailMessage,
    ListEnvelope, OrderApi, OrderConfirmation, PaymentApi, PaymentVerificationRequest,
};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};

/// Header carrying the per-checkout idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Client for the SecondHand REST backend.
///
/// Cheap to clone; clones share the connection pool and the payment
/// instrument cache.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the auth token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(bearer) = config.bearer() {
            let mut value = HeaderValue::from_str(&bearer)
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid auth token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(config.payment_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.api_url.clone(),
                cache,
            }),
        })
    }

    /// Drop cached cards and bank accounts so the next read hits the backend.
    pub async fn invalidate_payment_methods(&self) {
        self.inner.cache.invalidate(&CacheKey::CreditCards).await;
        self.inner.cache.invalidate(&CacheKey::BankAccounts).await;
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid path {path}: {e}")))
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<String> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Read the body as text first for better error diagnostics
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "SecondHand API returned non-success status"
            );
            return Err(ApiError::from_response(status.as_u16(), &text));
        }

        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let url = self.url(path)?;
        debug!(%url, "GET");
        let text = self.send(self.inner.client.get(url)).await?;
        decode(&text)
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> ApiResult<Vec<T>> {
        let envelope: ListEnvelope<T> = self.get_json(path).await?;
        Ok(envelope.into_vec())
    }
}

/// Decode a JSON body, treating an empty body as `null`.
fn decode<T: DeserializeOwned>(text: &str) -> ApiResult<T> {
    let text = if text.trim().is_empty() { "null" } else { text };
    Ok(serde_json::from_str(text)?)
}

impl CartApi for HttpBackend {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> ApiResult<Vec<CartItem>> {
        self.get_list("api/cart").await
    }

    #[instrument(skip(self))]
    async fn update_quantity(&self, item_id: CartItemId, quantity: u32) -> ApiResult<()> {
        let url = self.url(&format!("api/cart/items/{item_id}"))?;
        let body = serde_json::json!({ "quantity": quantity });
        self.send(self.inner.client.put(url).json(&body)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, item_id: CartItemId) -> ApiResult<()> {
        let url = self.url(&format!("api/cart/items/{item_id}"))?;
        self.send(self.inner.client.delete(url)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> ApiResult<()> {
        let url = self.url("api/cart")?;
        self.send(self.inner.client.delete(url)).await?;
        Ok(())
    }
}

impl OrderApi for HttpBackend {
    #[instrument(skip(self, request), fields(payment_type = %request.payment_type))]
    async fn checkout(
        &self,
        request: &CheckoutRequest,
        idempotency_key: &str,
    ) -> ApiResult<OrderConfirmation> {
        let url = self.url("api/orders/checkout")?;
        let text = self
            .send(
                self.inner
                    .client
                    .post(url)
                    .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
                    .json(request),
            )
            .await?;

        // A success status means the order exists even if the body is unusable
        if text.trim().is_empty() {
            warn!("Checkout accepted without a confirmation body");
            return Ok(OrderConfirmation::default());
        }
        Ok(decode(&text).unwrap_or_else(|e| {
            warn!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Checkout accepted but the confirmation could not be read"
            );
            OrderConfirmation::default()
        }))
    }

    #[instrument(skip(self, request), fields(transaction_type = %request.transaction_type))]
    async fn initiate_payment_verification(
        &self,
        request: &PaymentVerificationRequest,
    ) -> ApiResult<()> {
        let url = self.url("api/orders/payment-verification")?;
        self.send(self.inner.client.post(url).json(request)).await?;
        Ok(())
    }
}

impl PaymentApi for HttpBackend {
    #[instrument(skip(self))]
    async fn get_credit_cards(&self) -> ApiResult<Vec<CreditCard>> {
        if let Some(CacheValue::CreditCards(cards)) =
            self.inner.cache.get(&CacheKey::CreditCards).await
        {
            debug!("Cache hit for credit cards");
            return Ok(cards);
        }

        let cards: Vec<CreditCard> = self.get_list("api/payments/credit-cards").await?;
        self.inner
            .cache
            .insert(CacheKey::CreditCards, CacheValue::CreditCards(cards.clone()))
            .await;
        Ok(cards)
    }

    #[instrument(skip(self))]
    async fn get_bank_accounts(&self) -> ApiResult<Vec<BankAccount>> {
        if let Some(CacheValue::BankAccounts(accounts)) =
            self.inner.cache.get(&CacheKey::BankAccounts).await
        {
            debug!("Cache hit for bank accounts");
            return Ok(accounts);
        }

        let accounts: Vec<BankAccount> = self.get_list("api/payments/bank-accounts").await?;
        self.inner
            .cache
            .insert(
                CacheKey::BankAccounts,
                CacheValue::BankAccounts(accounts.clone()),
            )
            .await;
        Ok(accounts)
    }

    #[instrument(skip(self))]
    async fn get_ewallet(&self) -> ApiResult<Option<EWallet>> {
        match self.get_json::<Option<EWallet>>("api/ewallet").await {
            Err(ApiError::Api { status: 404, .. }) => Ok(None),
            other => other,
        }
    }
}

impl EmailApi for HttpBackend {
    #[instrument(skip(self))]
    async fn get_emails(&self) -> ApiResult<Vec<EmailMessage>> {
        self.get_list("api/emails").await
    }
}

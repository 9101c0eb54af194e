//! HTTP API for the marketplace transactional core.
//!
//! Exposes checkout, order lifecycle, cancellation and payment endpoints
//! with structured logging (tracing) and Prometheus metrics. All handlers
//! are generic over the store and gateway, so the same router runs
//! against PostgreSQL + Paystack in production and the in-memory pair in
//! tests.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{CheckoutService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use payment::{InMemoryGateway, PaymentGateway, PaymentService};
use storage::{MarketStore, MemoryStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore, G: PaymentGateway> {
    pub store: S,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub payments: PaymentService<S, G>,
    /// HMAC key for webhook signature verification (the gateway secret).
    pub webhook_secret: String,
}

/// Builds the application state from a store and gateway.
pub fn create_state<S: MarketStore, G: PaymentGateway>(
    store: S,
    gateway: G,
    config: &config::Config,
) -> Arc<AppState<S, G>> {
    Arc::new(AppState {
        checkout: CheckoutService::with_delivery_fee(store.clone(), config.delivery_fee),
        orders: OrderService::new(store.clone()),
        payments: PaymentService::new(
            store.clone(),
            gateway,
            config.payment_callback_url.clone(),
        ),
        webhook_secret: config.paystack_secret_key.clone(),
        store,
    })
}

/// In-memory state for tests and local experiments.
pub fn create_memory_state(
    config: &config::Config,
) -> (
    Arc<AppState<MemoryStore, InMemoryGateway>>,
    MemoryStore,
    InMemoryGateway,
) {
    let store = MemoryStore::new();
    let gateway = InMemoryGateway::new();
    let state = create_state(store.clone(), gateway.clone(), config);
    (state, store, gateway)
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore, G: PaymentGateway>(
    state: Arc<AppState<S, G>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart/validate", get(routes::checkout::validate_cart::<S, G>))
        .route("/checkout", post(routes::checkout::checkout::<S, G>))
        .route("/orders/{id}/transition", post(routes::orders::transition::<S, G>))
        .route("/order-groups/{id}", get(routes::groups::get::<S, G>))
        .route("/order-groups/{id}/cancel", post(routes::groups::cancel::<S, G>))
        .route(
            "/customers/me/cancel-pending",
            post(routes::orders::cancel_customer_pending::<S, G>),
        )
        .route(
            "/shops/{id}/cancel-pending",
            post(routes::orders::cancel_shop_pending::<S, G>),
        )
        .route("/payments/initialize", post(routes::payments::initialize::<S, G>))
        .route("/payments/verify", post(routes::payments::request_verification::<S, G>))
        .route("/payments/webhook", post(routes::payments::webhook::<S, G>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

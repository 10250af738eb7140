pub mod balance;
pub mod borrow;
pub mod health;
pub mod links;
pub mod price;
pub mod quote;
pub mod username;

use crate::chain::ChainClient;
use crate::config::{BorrowingConfig, Config};
use crate::db::Repository;
use crate::flow::FlowRegistry;
use crate::monitor::BalanceRegistry;
use crate::pricefeed::PriceHandle;
use crate::ratelimit::RateLimiter;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub borrowing: BorrowingConfig,
    pub repo: Arc<Repository>,
    pub chain: Arc<dyn ChainClient>,
    pub price: PriceHandle,
    pub flows: Arc<FlowRegistry>,
    pub balances: Arc<BalanceRegistry>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: Config,
        borrowing: BorrowingConfig,
        repo: Arc<Repository>,
        chain: Arc<dyn ChainClient>,
        price: PriceHandle,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            repo.clone(),
            config.rate_limit_max,
            config.rate_limit_window_ms,
        ));
        let balances = Arc::new(BalanceRegistry::new(
            chain.clone(),
            borrowing.balance_poll_interval,
            borrowing.optimistic_refetch_delay,
        ));
        Self {
            config,
            borrowing,
            repo,
            chain,
            price,
            flows: Arc::new(FlowRegistry::new()),
            balances,
            limiter,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/price", get(price::get_price))
        .route("/v1/price/refetch", post(price::refetch_price))
        .route("/v1/borrow/quote", get(quote::get_quote))
        .route("/v1/borrow", post(borrow::start_borrow))
        .route("/v1/borrow/:id", get(borrow::get_borrow))
        .route("/v1/borrow/:id/retry", post(borrow::retry_borrow))
        .route("/v1/borrow/:id/cancel", post(borrow::cancel_borrow))
        .route("/v1/balance", get(balance::get_balance))
        .route("/v1/balance/optimistic", post(balance::optimistic_update))
        .route("/v1/balance/refetch", post(balance::refetch_balance))
        .route(
            "/v1/username",
            get(username::lookup_username).post(username::claim_username),
        )
        .route("/v1/pay-link", get(links::get_pay_link))
        .layer(cors)
        .with_state(state)
}

pub mod api;
pub mod auth;
pub mod chain;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod flow;
pub mod monitor;
pub mod pricefeed;
pub mod ratelimit;
pub mod retry;

pub use chain::{ChainClient, ChainError, HttpChainClient, MockChainClient, TxReceipt};
pub use config::{BorrowingConfig, Config};
pub use db::{init_db, Repository};
pub use domain::{
    Address, Claim, PositionId, TimeMs, TxHash, Username, Wad,
};
pub use error::AppError;
pub use flow::{BorrowFlow, BorrowRequest, FlowOutcome, FlowRegistry, FlowSnapshot, FlowState};
pub use monitor::{BalanceHandle, BalanceRegistry, BalanceSnapshot};
pub use pricefeed::{
    spawn_price_poller, BtcPriceSample, HttpPriceFeed, MockPriceFeed, PriceFeed, PriceFeedError,
    PriceHandle, PriceSource,
};
pub use retry::RetryPolicy;

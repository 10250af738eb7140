use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tipvault::chain::HttpChainClient;
use tipvault::pricefeed::{spawn_price_poller, HttpPriceFeed};
use tipvault::{api, config::BorrowingConfig, config::Config, db::init_db, Repository};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("configuration error")?;
    let borrowing = BorrowingConfig::default();
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let chain: Arc<dyn tipvault::ChainClient> =
        Arc::new(HttpChainClient::new(config.chain_rpc_url.clone()));

    let feed = Arc::new(HttpPriceFeed::new(
        config.price_feed_url.clone(),
        borrowing.price_band,
        borrowing.price_retry,
    ));
    let price = spawn_price_poller(
        feed,
        borrowing.price_poll_interval,
        borrowing.price_staleness,
    );

    let state = api::AppState::new(config, borrowing, repo, chain, price);
    let app = api::create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

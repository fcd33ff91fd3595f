use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use order_book_engine::api::{self, AppState};
use order_book_engine::book::BookSnapshot;
use order_book_engine::matching::MatchEngine;
use order_book_engine::message::Queue;
use order_book_engine::persistence::ParityDbRecorder;
use order_book_engine::recorder::StdoutRecorder;
use order_book_engine::store::OrderStore;
use order_book_engine::trade::RecentTrades;
use order_book_engine::utils::shutdown_token;
use order_book_engine::workers::{CancelWorker, TradeWorker};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// A continuous-time, single-instrument limit order book matching engine.
///
/// Mirrors the original service's `order-q-size` / `trade-q-size` /
/// `cancel-q-size` flags.
#[derive(Parser)]
#[command(name = "engine-cli")]
#[command(
    author = "Andrew Odiit",
    version = "0.1",
    about = "A single-instrument continuous matching engine"
)]
struct Cli {
    /// Capacity of the order intake queue.
    #[arg(long = "order-q-size", default_value_t = 1_000_000)]
    order_queue_capacity: usize,

    /// Capacity of the trade queue.
    #[arg(long = "trade-q-size", default_value_t = 100_000)]
    trade_queue_capacity: usize,

    /// Capacity of the cancel-confirmation queue.
    #[arg(long = "cancel-q-size", default_value_t = 100_000)]
    cancel_queue_capacity: usize,

    /// HTTP port for the submission surface.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// If set, trades and cancel confirmations are durably recorded to a
    /// ParityDB at this path instead of only being logged.
    #[arg(long)]
    persist: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let token = shutdown_token();

    let order_store = OrderStore::new();
    let order_q = Queue::new(cli.order_queue_capacity, token.clone());
    let trade_q = Queue::new(cli.trade_queue_capacity, token.clone());
    let cancel_q = Queue::new(cli.cancel_queue_capacity, token.clone());
    let (book_tx, book_rx) = tokio::sync::watch::channel(BookSnapshot::default());
    let recent_trades = RecentTrades::new();

    let engine = MatchEngine::new(
        order_store.clone(),
        order_q.clone(),
        trade_q.clone(),
        cancel_q.clone(),
        book_tx,
        recent_trades.clone(),
    );

    let mut handlers = tokio::task::JoinSet::new();
    handlers.spawn(engine.run());

    if let Some(path) = cli.persist.clone() {
        let recorder = Arc::new(ParityDbRecorder::open(path)?);
        handlers.spawn(TradeWorker::new(trade_q.clone(), recorder.clone()).run());
        handlers.spawn(CancelWorker::new(cancel_q.clone(), recorder).run());
    } else {
        handlers.spawn(TradeWorker::new(trade_q.clone(), StdoutRecorder).run());
        handlers.spawn(CancelWorker::new(cancel_q.clone(), StdoutRecorder).run());
    }

    let state = AppState {
        order_store,
        order_q,
        book_feed: book_rx,
        recent_trades,
    };
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", cli.port)).await?;
    tracing::info!(port = cli.port, "HTTP submission surface listening");
    let server_token = token.clone();
    handlers.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(server_token.cancelled_owned())
            .await
            .map_err(anyhow::Error::from)
    });

    while let Some(result) = handlers.join_next().await {
        result??;
    }
    Ok(())
}

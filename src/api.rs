//! The HTTP submission surface: `POST /orders`, `DELETE /orders/{id}`, plus
//! two read-only introspection endpoints (`GET /book`, `GET /trades`) the
//! ancestor crate already exposed for its single book.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::warn;
use uuid::Uuid;

use crate::book::BookSnapshot;
use crate::errors::ApiError;
use crate::message::{Message, MessageKind, Queue};
use crate::order::{Cancel, Order, OrderKind, PriceType};
use crate::store::OrderStore;
use crate::trade::{RecentTrades, Trade};
use crate::utils::now_nanos;

#[derive(Clone)]
pub struct AppState {
    pub order_store: OrderStore,
    pub order_q: Queue,
    pub book_feed: tokio::sync::watch::Receiver<BookSnapshot>,
    pub recent_trades: RecentTrades,
}

/// Request body for `POST /orders`.
///
/// - `order_kind`: `1` = Buy, `2` = Sell
/// - `price_type`: `1` = Market, `2` = Limit
/// - `price`: ignored when `price_type` is Market; must be `> 0` for Limit
/// - `quantity`: must be `> 0`
#[derive(Deserialize)]
pub struct NewOrderRequest {
    pub order_kind: u8,
    pub price_type: u8,
    #[serde(default)]
    pub price: f64,
    pub quantity: u64,
}

#[derive(Serialize, Deserialize)]
pub struct NewOrderResponse {
    pub order_id: String,
}

fn parse_order_kind(code: u8) -> Result<OrderKind, ApiError> {
    match code {
        1 => Ok(OrderKind::Buy),
        2 => Ok(OrderKind::Sell),
        _ => Err(ApiError::Validation("order_kind must be 1 or 2".into())),
    }
}

fn parse_price_type(code: u8) -> Result<PriceType, ApiError> {
    match code {
        1 => Ok(PriceType::Market),
        2 => Ok(PriceType::Limit),
        _ => Err(ApiError::Validation("price_type must be 1 or 2".into())),
    }
}

/// `POST /orders`
///
/// Validates `order_kind`, `price_type`, `quantity`, and — for Limit orders —
/// `price`, then writes the order to the store and pushes an `OrderCreate`
/// message onto `order_q`. Returns `{order_id}` on success.
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<NewOrderRequest>,
) -> Result<Json<NewOrderResponse>, ApiError> {
    let kind = parse_order_kind(payload.order_kind)?;
    let price_type = parse_price_type(payload.price_type)?;

    if payload.quantity == 0 {
        return Err(ApiError::Validation("quantity must be > 0".into()));
    }
    if price_type == PriceType::Limit && !(payload.price > 0.0) {
        return Err(ApiError::Validation("price must be > 0 for Limit".into()));
    }

    let order = Order {
        id: Uuid::new_v4().to_string(),
        kind,
        price_type,
        price: if price_type == PriceType::Limit {
            payload.price
        } else {
            0.0
        },
        quantity: payload.quantity,
        created_at: now_nanos(),
        confirmed_at: 0,
    };
    let order_id = state.order_store.create(order.clone()).await;

    state
        .order_q
        .push(Message::new(MessageKind::OrderCreate, &order))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(NewOrderResponse { order_id }))
}

/// `DELETE /orders/{id}`
///
/// 400 if `id` is empty or unknown; otherwise looks up the order's side from
/// the store, pushes an `OrderCancel` message, and returns
/// `{"message": "success"}`.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if order_id.is_empty() {
        return Err(ApiError::Validation("id must not be empty".into()));
    }

    let order = state.order_store.get(&order_id).await.map_err(|_| {
        warn!(order_id, "cancel rejected: unknown order id");
        ApiError::Validation("unknown order id".into())
    })?;

    let cancel = Cancel {
        order_id: order.id,
        order_kind: order.kind,
        created_at: now_nanos(),
        confirmed_at: 0,
    };
    state
        .order_q
        .push(Message::new(MessageKind::OrderCancel, &cancel))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(json!({"message": "success"})))
}

/// `GET /book`
///
/// Returns the most recent two-sided snapshot published by the match engine.
pub async fn get_book(State(state): State<AppState>) -> Json<BookSnapshot> {
    Json(state.book_feed.borrow().clone())
}

/// `GET /trades`
///
/// Returns the most recent trades, oldest first, bounded by an in-memory
/// ring buffer (not the durable `Recorder` sink).
pub async fn get_trades(State(state): State<AppState>) -> Json<Vec<Trade>> {
    Json(state.recent_trades.snapshot())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", delete(cancel_order))
        .route("/book", get(get_book))
        .route("/trades", get(get_trades))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(false)
                        .level(tracing::Level::TRACE),
                )
                .on_response(DefaultOnResponse::new().level(tracing::Level::TRACE)),
        )
        .with_state(state)
}

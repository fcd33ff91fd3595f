//! The pluggable sink trade and cancel confirmations are forwarded to.
//!
//! A `Recorder` may fail transiently — its caller (the trade/cancel worker)
//! Nacks the message on failure so it is redelivered later. The reference
//! implementation just logs a structured line; see `persistence.rs` for a
//! durable alternative.

use tracing::info;

use crate::order::CancelConfirmation;
use crate::trade::Trade;

pub trait TradeRecorder: Send + Sync {
    fn create_trade_record(
        &self,
        trade: &Trade,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

pub trait CancelRecorder: Send + Sync {
    fn create_cancel_record(
        &self,
        cancel: &CancelConfirmation,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Logs every record to stdout via `tracing`, mirroring the reference
/// implementation's `log.Printf("trade: %+v", ...)`.
pub struct StdoutRecorder;

impl TradeRecorder for StdoutRecorder {
    async fn create_trade_record(&self, trade: &Trade) -> anyhow::Result<()> {
        info!(?trade, "trade recorded");
        Ok(())
    }
}

impl CancelRecorder for StdoutRecorder {
    async fn create_cancel_record(&self, cancel: &CancelConfirmation) -> anyhow::Result<()> {
        info!(?cancel, "cancel recorded");
        Ok(())
    }
}

/// Lets a shared recorder (e.g. one `ParityDbRecorder` behind one `Db`) back
/// both the trade and cancel worker without requiring `Clone` on the
/// underlying type.
impl<T: TradeRecorder + ?Sized> TradeRecorder for std::sync::Arc<T> {
    fn create_trade_record(
        &self,
        trade: &Trade,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).create_trade_record(trade)
    }
}

impl<T: CancelRecorder + ?Sized> CancelRecorder for std::sync::Arc<T> {
    fn create_cancel_record(
        &self,
        cancel: &CancelConfirmation,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).create_cancel_record(cancel)
    }
}

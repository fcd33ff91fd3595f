//! The trade and cancel recorder workers: pure sinks that drain one queue
//! each and forward to a `Recorder`, Nacking on transient sink failure.

use tracing::warn;

use crate::message::{MessageKind, Queue};
use crate::order::CancelConfirmation;
use crate::recorder::{CancelRecorder, TradeRecorder};
use crate::trade::Trade;

pub struct TradeWorker<R: TradeRecorder> {
    trade_q: Queue,
    recorder: R,
}

impl<R: TradeRecorder> TradeWorker<R> {
    pub fn new(trade_q: Queue, recorder: R) -> Self {
        TradeWorker { trade_q, recorder }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let envelope = match self.trade_q.pop().await {
                Ok(envelope) => envelope,
                Err(_) => return Ok(()),
            };

            if envelope.kind() != MessageKind::Trade {
                envelope.ack();
                continue;
            }

            let Ok(trade) = envelope.decode::<Trade>() else {
                envelope.ack();
                continue;
            };

            match self.recorder.create_trade_record(&trade).await {
                Ok(()) => envelope.ack(),
                Err(err) => {
                    warn!(%err, "trade recorder failed, nacking");
                    envelope.nack();
                }
            }
        }
    }
}

pub struct CancelWorker<R: CancelRecorder> {
    cancel_q: Queue,
    recorder: R,
}

impl<R: CancelRecorder> CancelWorker<R> {
    pub fn new(cancel_q: Queue, recorder: R) -> Self {
        CancelWorker { cancel_q, recorder }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let envelope = match self.cancel_q.pop().await {
                Ok(envelope) => envelope,
                Err(_) => return Ok(()),
            };

            if envelope.kind() != MessageKind::Cancel {
                envelope.ack();
                continue;
            }

            let Ok(cancel) = envelope.decode::<CancelConfirmation>() else {
                envelope.ack();
                continue;
            };

            match self.recorder.create_cancel_record(&cancel).await {
                Ok(()) => envelope.ack(),
                Err(err) => {
                    warn!(%err, "cancel recorder failed, nacking");
                    envelope.nack();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct CountingRecorder {
        calls: Arc<AtomicUsize>,
        fail_first: Arc<AtomicUsize>,
    }

    impl TradeRecorder for CountingRecorder {
        async fn create_trade_record(&self, _trade: &Trade) -> anyhow::Result<()> {
            if self.fail_first.fetch_sub(1, Ordering::SeqCst) > 0 {
                anyhow::bail!("transient sink failure");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_trade() -> Trade {
        Trade {
            buy_order_id: "b".into(),
            sell_order_id: "s".into(),
            price: 10.0,
            quantity: 5,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn sink_failure_is_retried_via_nack() {
        let token = CancellationToken::new();
        let trade_q = Queue::new(8, token.clone());
        trade_q
            .push(Message::new(MessageKind::Trade, &sample_trade()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let recorder = CountingRecorder {
            calls: calls.clone(),
            fail_first: Arc::new(AtomicUsize::new(1)),
        };
        let worker = TradeWorker::new(trade_q, recorder);
        let handle = tokio::spawn(worker.run());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        token.cancel();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn mismatched_kind_is_dropped_without_invoking_recorder() {
        let token = CancellationToken::new();
        let cancel_q = Queue::new(8, token.clone());
        cancel_q
            .push(Message::new(MessageKind::Trade, &sample_trade()))
            .await
            .unwrap();

        struct NeverCalled;
        impl CancelRecorder for NeverCalled {
            async fn create_cancel_record(&self, _cancel: &CancelConfirmation) -> anyhow::Result<()> {
                panic!("should never be invoked for a mismatched-kind message");
            }
        }

        let worker = CancelWorker::new(cancel_q, NeverCalled);
        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        token.cancel();
        let _ = handle.await;
    }
}

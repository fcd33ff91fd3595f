//! Bounded message queue with acknowledge/negative-acknowledge redelivery.
//!
//! A [`Queue`] is a bounded FIFO of [`Envelope`]s. `pop` hands the consumer
//! an [`Envelope`]; the consumer must call [`Envelope::ack`] (drop the
//! message) or [`Envelope::nack`] (redeliver it) exactly once. Redelivery is
//! just re-pushing the same envelope onto the tail of the same queue, so no
//! broker and no unbounded retry bookkeeping is required.

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::QueueError;

/// The closed set of payload kinds a queue element may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    OrderCreate,
    OrderCancel,
    Trade,
    Cancel,
}

/// An opaque payload plus its kind tag, as produced by intake or by the
/// match engine.
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageKind,
    data: Vec<u8>,
}

impl Message {
    pub fn new<T: Serialize>(kind: MessageKind, value: &T) -> Self {
        // Encoding failures here would mean a bug in our own types, not bad
        // input; `serde_json` over our own Serialize impls does not fail.
        let data = serde_json::to_vec(value).expect("message payload must serialize");
        Message { kind, data }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

/// A popped message, wrapping the bookkeeping needed to ack or nack it.
pub struct Envelope {
    message: Message,
    sender: mpsc::Sender<Envelope>,
}

impl Envelope {
    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.message.decode()
    }

    /// The message was handled successfully; it is dropped from the system.
    pub fn ack(self) {
        trace!(kind = ?self.message.kind(), "ack");
    }

    /// The message could not be handled; redeliver it onto the tail of the
    /// same queue. Strict FIFO across a Nack is not guaranteed (§5).
    pub fn nack(self) {
        trace!(kind = ?self.message.kind(), "nack, redelivering");
        let Envelope { message, sender } = self;
        let resend_via = sender.clone();
        // Redelivery onto a bounded channel must not block the consumer
        // that is nacking; spawn the resend so a momentarily-full queue
        // just delays redelivery instead of deadlocking the worker.
        tokio::spawn(async move {
            let envelope = Envelope { message, sender };
            let _ = resend_via.send(envelope).await;
        });
    }
}

/// A bounded, cancellable FIFO of [`Message`]s.
#[derive(Clone)]
pub struct Queue {
    sender: mpsc::Sender<Envelope>,
    receiver: std::sync::Arc<tokio::sync::Mutex<mpsc::Receiver<Envelope>>>,
    cancel: CancellationToken,
}

impl Queue {
    /// Creates a queue with a fixed capacity, sharing `cancel` with every
    /// other queue and worker in the process.
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Queue {
            sender,
            receiver: std::sync::Arc::new(tokio::sync::Mutex::new(receiver)),
            cancel,
        }
    }

    /// Blocks until there is room in the queue or the cancellation signal
    /// fires.
    pub async fn push(&self, message: Message) -> Result<(), QueueError> {
        let envelope = Envelope {
            message,
            sender: self.sender.clone(),
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueueError::Cancelled),
            result = self.sender.send(envelope) => result.map_err(|_| QueueError::Cancelled),
        }
    }

    /// Blocks until a message is available or the cancellation signal
    /// fires. Single-consumer per queue: the reference topology has exactly
    /// one worker draining each queue.
    pub async fn pop(&self) -> Result<Envelope, QueueError> {
        let mut receiver = self.receiver.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueueError::Cancelled),
            msg = receiver.recv() => msg.ok_or(QueueError::Cancelled),
        }
    }
}

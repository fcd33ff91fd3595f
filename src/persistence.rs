//! A durable `Recorder` backed by ParityDB, for deployments that want trade
//! and cancel confirmations to survive a restart rather than just be logged.
//!
//! Key layout (big-endian for lexicographic/chronological ordering):
//! `ts_nanos(u128) + seq(u64)`, where `seq` is a per-process counter that
//! breaks ties between records written in the same nanosecond. Column 0
//! holds trades, column 1 holds cancel confirmations.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::UNIX_EPOCH;

use bincode::config::{self, standard};
use parity_db::{ColId, Db, Options};
use thiserror::Error;

use crate::order::CancelConfirmation;
use crate::recorder::{CancelRecorder, TradeRecorder};
use crate::trade::Trade;

const TRADE_COL: ColId = 0;
const CANCEL_COL: ColId = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ParityDB error: {0}")]
    Parity(#[from] parity_db::Error),
    #[error("Bincode encode error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),
    #[error("Bincode decode error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),
}

pub type StoreResult<T> = Result<T, StoreError>;

fn to_nanos(ts_seconds: i64) -> u128 {
    let base = UNIX_EPOCH;
    let adjusted = if ts_seconds >= 0 {
        base + std::time::Duration::from_secs(ts_seconds as u64)
    } else {
        base - std::time::Duration::from_secs((-ts_seconds) as u64)
    };
    adjusted
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

/// A ParityDB-backed recorder for both trades and cancel confirmations.
///
/// Opens a single database with two B-tree-indexed columns. Safe to share
/// across the trade and cancel workers: both only ever append.
pub struct ParityDbRecorder {
    db: Db,
    seq: AtomicU64,
}

impl ParityDbRecorder {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::with_columns(path.as_ref(), 2);
        opts.columns[TRADE_COL as usize].btree_index = true;
        opts.columns[CANCEL_COL as usize].btree_index = true;
        let db = Db::open_or_create(&opts)?;
        Ok(ParityDbRecorder {
            db,
            seq: AtomicU64::new(0),
        })
    }

    fn next_key(&self, ts_seconds: i64) -> Vec<u8> {
        let seq = self.seq.fetch_add(1, AtomicOrdering::SeqCst);
        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(&to_nanos(ts_seconds).to_be_bytes());
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    /// All trades written so far, oldest first. For tests and offline
    /// inspection, not the matching hot path.
    pub fn iter_trades(&self) -> StoreResult<impl Iterator<Item = Trade>> {
        let config = config::standard();
        let mut iter = self.db.iter(TRADE_COL)?;
        iter.seek_to_first()?;
        Ok(std::iter::from_fn(move || match iter.next() {
            Ok(Some((_key, raw))) => {
                let (decoded, _): (Trade, usize) =
                    bincode::decode_from_slice(&raw[..], config).ok()?;
                Some(decoded)
            }
            _ => None,
        }))
    }

    /// All cancel confirmations written so far, oldest first.
    pub fn iter_cancels(&self) -> StoreResult<impl Iterator<Item = CancelConfirmation>> {
        let config = config::standard();
        let mut iter = self.db.iter(CANCEL_COL)?;
        iter.seek_to_first()?;
        Ok(std::iter::from_fn(move || match iter.next() {
            Ok(Some((_key, raw))) => {
                let (decoded, _): (CancelConfirmation, usize) =
                    bincode::decode_from_slice(&raw[..], config).ok()?;
                Some(decoded)
            }
            _ => None,
        }))
    }
}

impl TradeRecorder for ParityDbRecorder {
    async fn create_trade_record(&self, trade: &Trade) -> anyhow::Result<()> {
        let key = self.next_key(trade.timestamp);
        let value = bincode::encode_to_vec(trade, standard())?;
        self.db.commit(vec![(TRADE_COL, key, Some(value))])?;
        Ok(())
    }
}

impl CancelRecorder for ParityDbRecorder {
    async fn create_cancel_record(&self, cancel: &CancelConfirmation) -> anyhow::Result<()> {
        let key = self.next_key(cancel.confirmed_at);
        let value = bincode::encode_to_vec(cancel, standard())?;
        self.db.commit(vec![(CANCEL_COL, key, Some(value))])?;
        Ok(())
    }
}

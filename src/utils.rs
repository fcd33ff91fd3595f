//utils for graceful shutdown that can be used on the
//any module in the project
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::signal;
use tokio_util::sync::CancellationToken;

pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    //spawn once to listen for ctrl-c
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+C handler");
        tc.cancel();
    });
    token
}

/// Wall-clock seconds since the epoch, the resolution `confirmed_at` is
/// stamped at by the match engine when an order or cancel is dequeued.
pub fn now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs() as i64
}

/// Wall-clock nanoseconds since the epoch, the resolution `created_at` is
/// stamped at by the submission surface on intake.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_nanos() as i64
}

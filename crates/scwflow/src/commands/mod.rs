pub mod schema;
pub mod serve;
pub mod sweep;

use tokio_util::sync::CancellationToken;

/// Token cancelled on the first Ctrl-C.
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight operations");
            trigger.cancel();
        }
    });
    token
}

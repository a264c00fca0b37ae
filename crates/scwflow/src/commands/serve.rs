//! JSON-lines RPC loop
//!
//! Requests are handled one at a time, in arrival order. A line that does
//! not parse still gets a response carrying an error diagnostic.

use scwflow_cloud::{Diagnostic, Provider, Request, RpcResponse};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

pub async fn handle() -> anyhow::Result<()> {
    let mut provider = Provider::new(scwflow_cloud_scaleway::builder())?;
    let cancel = super::interrupt_token();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!("scwflow {} serving on stdio", env!("CARGO_PKG_VERSION"));

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => provider.handle(&cancel, request).await,
            Err(e) => {
                tracing::warn!("Rejected request: {}", e);
                RpcResponse {
                    diagnostics: vec![Diagnostic::error("malformed-request", e.to_string())].into(),
                    ..Default::default()
                }
            }
        };

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::info!("Input closed, shutting down");
    Ok(())
}

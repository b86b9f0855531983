/// Shard Transfer (retryable) — `_startTransfer` (§4.7)
///
/// Opens a data channel to the pointer's farmer and pipes the shard's temp file into a
/// writable stream. Retries reuse the same pointer up to `transfer_retries` times; on
/// exhaustion the caller (the orchestrator, §4.6 step 6) blacklists the farmer and re-acquires
/// a contract that excludes it.
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::datachannel::{DataChannelClient, TcpDataChannelClient};
use crate::error::{DfsError, DfsResult};
use crate::model::Pointer;
use crate::performance;
use crate::resilience::{retry_async, RetryConfig};
use crate::upload::state::{DataChannelHandle, UploadState};

/// Outcome of a transfer attempt sequence for one shard.
pub enum TransferOutcome {
    /// The shard was delivered to the farmer.
    Transferred,
    /// The retry budget was exhausted; the caller must blacklist `pointer.farmer.node_id`,
    /// reset the shard's retry counter, and re-enter contract acquisition (§4.7).
    ExhaustedRetryBudget,
    /// The upload was killed mid-transfer.
    Killed,
}

async fn pipe_shard_once(pointer: &Pointer, shard_path: &std::path::Path) -> DfsResult<()> {
    let mut client = TcpDataChannelClient::new(pointer.farmer.clone());
    client.open().await?;

    let mut writer = client.write_stream(&pointer.token, &pointer.hash, pointer.size).await?;

    let mut source = File::open(shard_path).await?;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
    }
    writer.flush().await?;

    Ok(())
}

/// Transfer a shard, retrying through [`retry_async`] with
/// [`RetryConfig::exponential_backoff`] (§4.7). `state.is_killed()` is checked before every
/// attempt, including the first, so a kill mid-retry aborts promptly (§5 cancellation) instead
/// of waiting out the remaining backoff.
pub async fn transfer_shard(
    state: &UploadState,
    channel_handle: &DataChannelHandle,
    pointer: &Pointer,
    shard_path: &std::path::Path,
    transfer_retries: usize,
) -> DfsResult<TransferOutcome> {
    let farmer_id = pointer.farmer.node_id.as_str();

    let result = retry_async(
        || async {
            if state.is_killed() {
                return Err(DfsError::Cancelled);
            }

            let timer = performance::start_operation("shard_transfer");
            match pipe_shard_once(pointer, shard_path).await {
                Ok(()) => {
                    timer.complete_success(Some(pointer.size as usize));
                    Ok(())
                }
                Err(e) => {
                    timer.complete_failure(e.to_string());
                    tracing::warn!("shard transfer to farmer {} failed: {}", farmer_id, e);
                    Err(e)
                }
            }
        },
        RetryConfig::exponential_backoff(transfer_retries.max(1)),
        "shard_transfer",
    )
    .await;

    channel_handle.close();

    match result {
        Ok(()) => Ok(TransferOutcome::Transferred),
        Err(DfsError::Cancelled) => Ok(TransferOutcome::Killed),
        Err(e) => {
            tracing::warn!(
                "shard transfer to farmer {} exhausted retry budget: {}",
                farmer_id,
                e
            );
            Ok(TransferOutcome::ExhaustedRetryBudget)
        }
    }
}

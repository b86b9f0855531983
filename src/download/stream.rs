/// Stream Assembly & Sliding-Window Fetch (§4.8.2, §4.8.3)
///
/// `resolveFileFromPointers` opens one data channel per pointer, in pointer order, against a
/// work queue of concurrency 1, and attaches each reader to a `FileMuxer`. `createFileStream`
/// attaches the first pointer window and hands the stream back to the caller immediately — a
/// background task keeps fetching and attaching the remaining windows (size 6) into that same
/// muxer, copying bytes through to the caller as they arrive, until a window comes back empty.
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{duplex, AsyncRead, DuplexStream, ReadBuf};

use crate::bridge::BridgeClient;
use crate::datachannel::{DataChannelClient, TcpDataChannelClient};
use crate::error::{DfsError, DfsResult};
use crate::model::Pointer;
use crate::mux::FileMuxer;

use super::pointers::acquire_pointer_window;

const WINDOW_SIZE: usize = 6;
const STREAM_BUFFER_BYTES: usize = 64 * 1024;

/// Construct a muxer sized to `pointers` and attach one data-channel reader per pointer, in
/// order (§4.8.2). Any connect/open failure aborts after attaching the sources before it —
/// every Muxer-surfaced error is treated as fatal for the stream (§9).
pub async fn resolve_file_from_pointers(pointers: &[Pointer]) -> DfsResult<FileMuxer> {
    let total_len: u64 = pointers.iter().map(|p| p.size).sum();
    let mut muxer = FileMuxer::new(pointers.len(), total_len);
    attach_pointers(&mut muxer, pointers).await?;
    Ok(muxer)
}

/// Grow `muxer`'s expected totals and attach one reader per pointer in `pointers`, in order
/// (the §4.8.2 "dynamic extension" rule: counters only increase).
async fn attach_pointers(muxer: &mut FileMuxer, pointers: &[Pointer]) -> DfsResult<()> {
    for pointer in pointers {
        let mut client = TcpDataChannelClient::new(pointer.farmer.clone());
        client.open().await?;
        let reader = client.read_stream(&pointer.token, &pointer.hash).await?;
        muxer.add_input_source(reader);
    }
    Ok(())
}

async fn extend_with_pointers(muxer: &mut FileMuxer, pointers: &[Pointer]) -> DfsResult<()> {
    if pointers.is_empty() {
        return Ok(());
    }
    let added_len: u64 = pointers.iter().map(|p| p.size).sum();
    muxer.extend(added_len, pointers.len());
    attach_pointers(muxer, pointers).await
}

fn take_failure(failure: &Mutex<Option<DfsError>>) -> Option<DfsError> {
    failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
}

fn set_failure(failure: &Mutex<Option<DfsError>>, err: DfsError) {
    *failure.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(err);
}

/// A download stream whose later pointer windows are still being fetched and attached by a
/// background task (§4.8.3). Wraps one end of a `tokio::io::duplex` pipe that the background
/// task copies bytes into as each window's `FileMuxer` drains. If that task fails before the
/// file is exhausted, the next read past the point the pipe runs dry surfaces the failure
/// instead of a silent premature EOF — every Muxer-surfaced error is fatal for the stream (§9).
pub struct DownloadStream {
    inner: DuplexStream,
    failure: Arc<Mutex<Option<DfsError>>>,
}

impl AsyncRead for DownloadStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before => {
                if let Some(e) = take_failure(&this.failure) {
                    return Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Fetch and attach the first pointer window (`skip = 0`), then hand a readable stream back to
/// the caller and keep fetching successive windows of size `WINDOW_SIZE` in the background until
/// one returns zero pointers (§4.8.3). The caller can start consuming immediately; later windows
/// resolve concurrently with that reading instead of blocking it.
pub async fn create_file_stream(
    client: &BridgeClient,
    bucket_id: &str,
    file_id: &str,
) -> DfsResult<DownloadStream> {
    let first = acquire_pointer_window(client, bucket_id, file_id, 0, WINDOW_SIZE, &[]).await?;
    let mut muxer = resolve_file_from_pointers(&first).await?;

    let (mut writer, reader) = duplex(STREAM_BUFFER_BYTES);
    let failure = Arc::new(Mutex::new(None));
    let task_failure = Arc::clone(&failure);

    let client = client.clone();
    let bucket_id = bucket_id.to_string();
    let file_id = file_id.to_string();

    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut muxer, &mut writer).await {
            set_failure(&task_failure, e.into());
            return;
        }

        let mut skip = WINDOW_SIZE;
        loop {
            let window = match acquire_pointer_window(&client, &bucket_id, &file_id, skip, WINDOW_SIZE, &[]).await {
                Ok(window) => window,
                Err(e) => {
                    set_failure(&task_failure, e);
                    return;
                }
            };
            if window.is_empty() {
                break;
            }
            let fetched = window.len();

            if let Err(e) = extend_with_pointers(&mut muxer, &window).await {
                set_failure(&task_failure, e);
                return;
            }
            if let Err(e) = tokio::io::copy(&mut muxer, &mut writer).await {
                set_failure(&task_failure, e.into());
                return;
            }
            skip += fetched;
        }
    });

    Ok(DownloadStream { inner: reader, failure })
}

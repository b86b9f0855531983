/// Byte-Range Slice (§4.8.4)
///
/// Walks a file's Frame shard sizes to find the minimal pointer window covering `[start, end)`,
/// fetches exactly that window, assembles it (§4.8.2), and trims the front/back of the
/// assembled stream down to the exact requested range.
use serde_json::Value;
use tokio::io::{AsyncReadExt, Take};

use crate::bridge::BridgeClient;
use crate::error::{DfsError, DfsResult};
use crate::model::FrameShard;
use crate::mux::FileMuxer;

use super::pointers::acquire_pointer_window;
use super::stream::resolve_file_from_pointers;

/// `skip` (shards to skip), `limit` (shards to fetch), bytes to trim off the front and back of
/// the assembled window so it covers exactly `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceWindow {
    pub skip: usize,
    pub limit: usize,
    pub trim_front: u64,
    pub trim_back: u64,
}

/// Compute the shard window and trim amounts covering byte range `[start, end)` over an
/// ordered list of shard sizes.
pub fn compute_slice_window(shards: &[FrameShard], start: u64, end: u64) -> DfsResult<SliceWindow> {
    if start >= end {
        return Err(DfsError::BadRequest(format!("empty or inverted range [{}, {})", start, end)));
    }

    let mut cumulative = 0u64;
    let mut skip = None;
    let mut trim_front = 0u64;

    for (index, shard) in shards.iter().enumerate() {
        let next = cumulative + shard.size;
        if next > start {
            skip = Some(index);
            trim_front = start - cumulative;
            break;
        }
        cumulative = next;
    }

    let skip = skip.ok_or_else(|| DfsError::BadRequest(format!("range start {} is past end of file", start)))?;

    let mut fetched_bytes = 0u64;
    let mut limit = 0usize;
    let mut covered = false;

    cumulative = shards[..skip].iter().map(|s| s.size).sum();
    for shard in &shards[skip..] {
        fetched_bytes += shard.size;
        limit += 1;
        cumulative += shard.size;
        if cumulative >= end {
            covered = true;
            break;
        }
    }

    if !covered {
        return Err(DfsError::BadRequest(format!("range end {} is past end of file", end)));
    }

    let trim_back = fetched_bytes - trim_front - (end - start);

    Ok(SliceWindow {
        skip,
        limit,
        trim_front,
        trim_back,
    })
}

/// Parse a bucket's file-listing entry for `file_id` into its ordered shard sizes (§4.8.4's
/// "fetch the file's Frame via the bucket's file listing").
async fn get_file_shards(client: &BridgeClient, bucket_id: &str, file_id: &str) -> DfsResult<Vec<FrameShard>> {
    let files = client.list_files(bucket_id).await?;
    let file: &Value = files
        .iter()
        .find(|f| f.get("id").and_then(|v| v.as_str()) == Some(file_id))
        .ok_or_else(|| DfsError::NotFound(format!("file {} not found in bucket {}", file_id, bucket_id)))?;

    let shards = file
        .get("shards")
        .ok_or_else(|| DfsError::Deserialization("file listing entry missing shards".into()))?;

    serde_json::from_value(shards.clone()).map_err(DfsError::from)
}

/// Fetch and assemble exactly the bytes in `[start, end)` of `file_id`.
pub async fn create_file_slice_stream(
    client: &BridgeClient,
    bucket_id: &str,
    file_id: &str,
    start: u64,
    end: u64,
) -> DfsResult<Take<FileMuxer>> {
    let shards = get_file_shards(client, bucket_id, file_id).await?;
    let window = compute_slice_window(&shards, start, end)?;

    let pointers = acquire_pointer_window(client, bucket_id, file_id, window.skip, window.limit, &[]).await?;
    let muxer = resolve_file_from_pointers(&pointers).await?;

    let mut trimmed = muxer.take(window.trim_front);
    let mut discard = vec![0u8; window.trim_front as usize];
    trimmed.read_exact(&mut discard).await?;

    let remainder = trimmed.into_inner();
    Ok(remainder.take(end - start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(sizes: &[u64]) -> Vec<FrameShard> {
        sizes
            .iter()
            .enumerate()
            .map(|(index, &size)| FrameShard {
                hash: format!("h{}", index),
                size,
                index,
            })
            .collect()
    }

    #[test]
    fn range_within_a_single_shard() {
        let shards = shards(&[10, 10, 10]);
        let window = compute_slice_window(&shards, 12, 18).unwrap();
        assert_eq!(window.skip, 1);
        assert_eq!(window.limit, 1);
        assert_eq!(window.trim_front, 2);
        assert_eq!(window.trim_back, 2);
    }

    #[test]
    fn range_spanning_multiple_shards() {
        let shards = shards(&[10, 10, 10]);
        let window = compute_slice_window(&shards, 5, 25).unwrap();
        assert_eq!(window.skip, 0);
        assert_eq!(window.limit, 3);
        assert_eq!(window.trim_front, 5);
        assert_eq!(window.trim_back, 5);
    }

    #[test]
    fn range_exactly_covering_one_shard() {
        let shards = shards(&[10, 10]);
        let window = compute_slice_window(&shards, 0, 10).unwrap();
        assert_eq!(window.skip, 0);
        assert_eq!(window.limit, 1);
        assert_eq!(window.trim_front, 0);
        assert_eq!(window.trim_back, 0);
    }

    #[test]
    fn range_past_end_of_file_is_rejected() {
        let shards = shards(&[10]);
        assert!(compute_slice_window(&shards, 5, 50).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let shards = shards(&[10]);
        assert!(compute_slice_window(&shards, 5, 5).is_err());
    }
}

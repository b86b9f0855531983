/// File Demuxer
///
/// Splits a file into an ordered, finite sequence of shard byte-streams (§4.4). Given
/// `file_size` and a chosen `shard_size`, emits `ceil(file_size / shard_size)` shards; the last
/// may be shorter.
use futures::stream::{self, Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::{DfsError, DfsResult};

/// Default shard worker concurrency (§5), used by `get_optimal_shard_size` as a sizing input.
pub const DEFAULT_SHARD_CONCURRENCY: usize = 6;

/// Largest shard size this demuxer will choose, regardless of file size.
const MAX_SHARD_SIZE: u64 = 8 * 1024 * 1024;
/// Smallest shard size this demuxer will choose, regardless of file size.
const MIN_SHARD_SIZE: u64 = 1024 * 1024;

/// A single demuxed shard: its index and the exact byte range within the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSource {
    pub index: usize,
    pub offset: u64,
    pub len: u64,
}

/// Deterministic shard-size policy: larger files get larger shards, up to `MAX_SHARD_SIZE`,
/// scaled down by the configured worker concurrency so that a full worker pool's temp files
/// stay within a bounded working set.
pub fn get_optimal_shard_size(file_size: u64, shard_concurrency: usize) -> u64 {
    if file_size == 0 {
        return MIN_SHARD_SIZE;
    }

    let concurrency = shard_concurrency.max(1) as u64;
    let target = file_size / concurrency;
    target.clamp(MIN_SHARD_SIZE, MAX_SHARD_SIZE)
}

pub struct FileDemuxer {
    path: std::path::PathBuf,
    shard_size: u64,
    file_size: u64,
}

impl FileDemuxer {
    pub async fn open(path: impl Into<std::path::PathBuf>, shard_size: u64) -> DfsResult<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        let file_size = metadata.len();

        if file_size == 0 {
            return Err(DfsError::Io("0 bytes is not a supported file size.".into()));
        }

        Ok(Self {
            path,
            shard_size,
            file_size,
        })
    }

    pub fn num_shards(&self) -> usize {
        (self.file_size.div_ceil(self.shard_size)) as usize
    }

    /// The ordered, finite sequence of shard descriptors for this file.
    pub fn shard_sources(&self) -> Vec<ShardSource> {
        let mut shards = Vec::with_capacity(self.num_shards());
        let mut offset = 0u64;
        let mut index = 0usize;

        while offset < self.file_size {
            let len = self.shard_size.min(self.file_size - offset);
            shards.push(ShardSource { index, offset, len });
            offset += len;
            index += 1;
        }

        shards
    }

    /// Stream each shard's bytes as a sequence of chunks, in order, terminating with an error
    /// item if any read fails.
    pub fn stream(&self) -> impl Stream<Item = DfsResult<(usize, Vec<u8>)>> {
        let path = self.path.clone();
        let shards = self.shard_sources();

        stream::iter(shards).then(move |shard| {
            let path = path.clone();
            async move {
                let mut file = File::open(&path).await?;
                file.seek(SeekFrom::Start(shard.offset)).await?;
                let mut buf = vec![0u8; shard.len as usize];
                file.read_exact(&mut buf).await?;
                Ok((shard.index, buf))
            }
        })
    }
}

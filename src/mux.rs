/// File Muxer
///
/// Concatenates N ordered byte-streams into one (§4.9). A source attached at position `k` is
/// not consumed until sources `0..k-1` have fully drained. Supports late addition of input
/// sources: callers must go through `extend`/`add_input_source` rather than reach into private
/// state, per the §9 design note.
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

type BoxedSource = Pin<Box<dyn AsyncRead + Send>>;

pub struct FileMuxer {
    pending: VecDeque<BoxedSource>,
    /// Running total of bytes declared across all sources ever added, including ones not yet
    /// attached. Strictly increasing via `extend`.
    expected_length: u64,
    /// Running total of shard sources declared. Strictly increasing via `extend`.
    expected_shards: usize,
    attached_shards: usize,
}

impl FileMuxer {
    /// Construct a muxer sized to the current window: `shards = pointers.len()`,
    /// `length = sum(pointer sizes)` (§4.8.2).
    pub fn new(shards: usize, length: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            expected_length: length,
            expected_shards: shards,
            attached_shards: 0,
        }
    }

    /// Grow the muxer's expected totals before a late-arriving source is attached (§4.8.2,
    /// §9). The caller must call this before `add_input_source` for any source beyond what the
    /// constructor declared.
    pub fn extend(&mut self, by_bytes: u64, by_shards: usize) {
        self.expected_length += by_bytes;
        self.expected_shards += by_shards;
    }

    /// Attach the next input source, in strict index order.
    pub fn add_input_source<R>(&mut self, source: R)
    where
        R: AsyncRead + Send + 'static,
    {
        self.pending.push_back(Box::pin(source));
        self.attached_shards += 1;
    }

    pub fn expected_length(&self) -> u64 {
        self.expected_length
    }

    pub fn expected_shards(&self) -> usize {
        self.expected_shards
    }

    pub fn attached_shards(&self) -> usize {
        self.attached_shards
    }

    /// Whether every declared source has been attached and drained.
    pub fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.attached_shards == self.expected_shards
    }
}

impl AsyncRead for FileMuxer {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();

        loop {
            let Some(front) = this.pending.front_mut() else {
                return Poll::Ready(Ok(()));
            };

            let before = buf.filled().len();
            match front.as_mut().poll_read(cx, buf) {
                Poll::Ready(Ok(())) => {
                    if buf.filled().len() > before {
                        return Poll::Ready(Ok(()));
                    }
                    // Front source drained; move to the next and keep trying so a caller
                    // doesn't observe a spurious zero-byte read mid-stream.
                    this.pending.pop_front();
                    continue;
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn concatenates_sources_in_attach_order() {
        let mut muxer = FileMuxer::new(3, 9);
        muxer.add_input_source(Cursor::new(b"aaa".to_vec()));
        muxer.add_input_source(Cursor::new(b"bbb".to_vec()));
        muxer.add_input_source(Cursor::new(b"ccc".to_vec()));

        let mut out = Vec::new();
        muxer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"aaabbbccc");
    }

    #[tokio::test]
    async fn output_length_equals_sum_of_input_sizes() {
        let mut muxer = FileMuxer::new(2, 7);
        muxer.add_input_source(Cursor::new(b"hello".to_vec()));
        muxer.add_input_source(Cursor::new(b"ab".to_vec()));

        let mut out = Vec::new();
        muxer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 7);
    }

    #[tokio::test]
    async fn late_input_extends_expected_totals() {
        let mut muxer = FileMuxer::new(1, 3);
        muxer.add_input_source(Cursor::new(b"abc".to_vec()));

        muxer.extend(3, 1);
        muxer.add_input_source(Cursor::new(b"def".to_vec()));

        assert_eq!(muxer.expected_length(), 6);
        assert_eq!(muxer.expected_shards(), 2);

        let mut out = Vec::new();
        muxer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abcdef");
        assert!(muxer.is_drained());
    }

    #[tokio::test]
    async fn empty_source_does_not_break_ordering() {
        let mut muxer = FileMuxer::new(3, 2);
        muxer.add_input_source(Cursor::new(b"a".to_vec()));
        muxer.add_input_source(Cursor::new(Vec::<u8>::new()));
        muxer.add_input_source(Cursor::new(b"b".to_vec()));

        let mut out = Vec::new();
        muxer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"ab");
    }
}

/// Data Channel Client
///
/// Opens a bidirectional byte channel to a single farmer (§4.1 item 5, §6). The wire protocol
/// a real farmer speaks is an external collaborator (§1); this module defines this crate's own
/// concrete framing for the TCP implementation, exercised end-to-end against an in-process
/// listener in tests.
///
/// Wire format per stream open: `[u16 token_len][token][u8 hash_len][hash][u64 payload_len]`
/// followed by `payload_len` bytes of shard data (read direction) or the caller's bytes to
/// write (write direction).
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{DfsError, DfsResult};
use crate::model::Contact;

#[async_trait]
pub trait DataChannelClient: Send + Sync {
    /// Open the channel to the farmer. Must be called before any stream operation.
    async fn open(&mut self) -> DfsResult<()>;

    /// A readable stream of shard bytes for `(token, hash)`.
    async fn read_stream(
        &mut self,
        token: &str,
        hash: &str,
    ) -> DfsResult<Box<dyn AsyncRead + Send + Unpin>>;

    /// A writable stream into which shard bytes for `(token, hash)` are piped.
    async fn write_stream(
        &mut self,
        token: &str,
        hash: &str,
        len: u64,
    ) -> DfsResult<Box<dyn AsyncWrite + Send + Unpin>>;
}

pub struct TcpDataChannelClient {
    contact: Contact,
    stream: Option<TcpStream>,
}

impl TcpDataChannelClient {
    pub fn new(contact: Contact) -> Self {
        Self {
            contact,
            stream: None,
        }
    }

    async fn connect(&self) -> DfsResult<TcpStream> {
        let addr = format!("{}:{}", self.contact.address, self.contact.port);
        TcpStream::connect(&addr)
            .await
            .map_err(|e| DfsError::Transport(format!("connecting to farmer {}: {}", addr, e)))
    }

    async fn write_header(stream: &mut TcpStream, token: &str, hash: &str, payload_len: u64) -> DfsResult<()> {
        let token_bytes = token.as_bytes();
        let hash_bytes = hash.as_bytes();

        stream.write_u16(token_bytes.len() as u16).await?;
        stream.write_all(token_bytes).await?;
        stream.write_u8(hash_bytes.len() as u8).await?;
        stream.write_all(hash_bytes).await?;
        stream.write_u64(payload_len).await?;
        Ok(())
    }

    async fn read_header(stream: &mut TcpStream) -> DfsResult<(String, String, u64)> {
        let token_len = stream.read_u16().await?;
        let mut token_buf = vec![0u8; token_len as usize];
        stream.read_exact(&mut token_buf).await?;

        let hash_len = stream.read_u8().await?;
        let mut hash_buf = vec![0u8; hash_len as usize];
        stream.read_exact(&mut hash_buf).await?;

        let payload_len = stream.read_u64().await?;

        Ok((
            String::from_utf8_lossy(&token_buf).to_string(),
            String::from_utf8_lossy(&hash_buf).to_string(),
            payload_len,
        ))
    }
}

#[async_trait]
impl DataChannelClient for TcpDataChannelClient {
    async fn open(&mut self) -> DfsResult<()> {
        self.stream = Some(self.connect().await?);
        Ok(())
    }

    async fn read_stream(
        &mut self,
        token: &str,
        hash: &str,
    ) -> DfsResult<Box<dyn AsyncRead + Send + Unpin>> {
        let mut stream = match self.stream.take() {
            Some(s) => s,
            None => self.connect().await?,
        };

        Self::write_header(&mut stream, token, hash, 0).await?;
        let (_, _, payload_len) = Self::read_header(&mut stream).await?;

        Ok(Box::new(stream.take(payload_len)))
    }

    async fn write_stream(
        &mut self,
        token: &str,
        hash: &str,
        len: u64,
    ) -> DfsResult<Box<dyn AsyncWrite + Send + Unpin>> {
        let mut stream = match self.stream.take() {
            Some(s) => s,
            None => self.connect().await?,
        };

        Self::write_header(&mut stream, token, hash, len).await?;
        Ok(Box::new(stream))
    }
}

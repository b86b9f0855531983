/// Data Model
///
/// Value types shared across the upload/download orchestration core (§3). These carry no
/// behavior beyond small constructors and are passed by value or behind a shared lock, never
/// mutated through interior aliasing outside their owner.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// A farmer's directory contact record (§3, §6 `/contacts`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub node_id: String,
    pub address: String,
    pub port: u16,
    pub public_key: Option<String>,
}

/// Direction of a data-channel transfer (§6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelType {
    Push,
    Pull,
}

/// A single shard descriptor as recorded on a bridge Frame (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameShard {
    pub hash: String,
    pub size: u64,
    pub index: usize,
}

/// Bridge-side staging object accumulating a file's shard descriptors (§3, §6 `/frames`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: String,
    pub shards: Vec<FrameShard>,
}

impl Frame {
    pub fn new(id: String) -> Self {
        Self {
            id,
            shards: Vec::new(),
        }
    }

    /// Total bytes described by this frame's shards so far.
    pub fn total_size(&self) -> u64 {
        self.shards.iter().map(|s| s.size).sum()
    }
}

/// Bridge-issued directive connecting a shard to a farmer, a token, and a hash (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pointer {
    pub farmer: Contact,
    pub token: String,
    pub hash: String,
    pub size: u64,
    pub channel_type: ChannelType,
}

/// Merkle public record: the tree of leaf hashes handed to the bridge with a shard-add (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRecord {
    pub tree: Vec<String>,
}

/// Private challenge pre-images; kept only long enough to submit, then discarded client-side —
/// the bridge is the system of record for audit challenges (§3).
#[derive(Debug, Clone)]
pub struct PrivateRecord {
    pub challenges: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub public: PublicRecord,
    pub private: PrivateRecord,
}

/// Per-shard bookkeeping owned exclusively by `UploadState` (§3).
#[derive(Debug, Clone)]
pub struct ShardMeta {
    pub index: usize,
    pub tmp_path: PathBuf,
    pub size: u64,
    hasher: Sha256,
    pub hash: Option<String>,
    pub frame_id: String,
    pub exclude_farmers: Vec<String>,
    pub transfer_retries: usize,
}

impl ShardMeta {
    pub fn new(index: usize, tmp_path: PathBuf, frame_id: String, exclude_farmers: Vec<String>) -> Self {
        Self {
            index,
            tmp_path,
            size: 0,
            hasher: Sha256::new(),
            hash: None,
            frame_id,
            exclude_farmers,
            transfer_retries: 0,
        }
    }

    /// Feed bytes into the running hash as they are written to the temp file.
    pub fn update_hash(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.size += chunk.len() as u64;
    }

    /// Finalize the streaming SHA-256 and derive the bridge-visible RIPEMD-160(SHA-256) hash.
    /// Consumes the running hasher; call exactly once, after the temp file is fully written.
    pub fn finalize_hash(&mut self) -> String {
        let sha256_digest = std::mem::replace(&mut self.hasher, Sha256::new()).finalize();
        let hash = hex::encode(ripemd::Ripemd160::digest(sha256_digest));
        self.hash = Some(hash.clone());
        hash
    }
}

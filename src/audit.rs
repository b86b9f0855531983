/// Audit Generator
///
/// Builds the Merkle public record and challenge private record for a shard (§4.5). The
/// generator is a plain value-producing async function rather than an event emitter with
/// detachable listeners: "detaching without data loss" during a kill is simply not polling a
/// not-yet-started future (§4.5, §9).
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::DfsResult;
use crate::model::{AuditRecord, PrivateRecord, PublicRecord};

/// Default number of audit challenges per shard (§4.5).
pub const DEFAULT_CHALLENGE_COUNT: usize = 3;

pub struct AuditGenerator {
    challenge_count: usize,
}

impl Default for AuditGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE_COUNT)
    }
}

impl AuditGenerator {
    pub fn new(challenge_count: usize) -> Self {
        Self { challenge_count }
    }

    /// Read `shard` to completion, generating `challenge_count` random pre-images and a Merkle
    /// tree of leaves `H(preimage || shard_bytes)` for each challenge.
    pub async fn generate<R: AsyncRead + Unpin>(&self, shard: &mut R) -> DfsResult<AuditRecord> {
        let mut bytes = Vec::new();
        shard.read_to_end(&mut bytes).await?;

        let mut rng = rand::thread_rng();
        let challenges: Vec<String> = (0..self.challenge_count)
            .map(|_| {
                let mut preimage = [0u8; 32];
                rng.fill_bytes(&mut preimage);
                hex::encode(preimage)
            })
            .collect();

        let leaves: Vec<String> = challenges
            .iter()
            .map(|challenge| leaf_hash(challenge, &bytes))
            .collect();

        let tree = build_merkle_tree(&leaves);

        Ok(AuditRecord {
            public: PublicRecord { tree },
            private: PrivateRecord { challenges },
        })
    }
}

fn leaf_hash(preimage_hex: &str, shard_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(preimage_hex.as_bytes());
    hasher.update(shard_bytes);
    hex::encode(hasher.finalize())
}

fn pair_hash(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build a binary Merkle tree bottom-up, returning every node level-by-level (leaves first).
/// An odd level duplicates its last node, matching common Merkle-tree padding conventions.
fn build_merkle_tree(leaves: &[String]) -> Vec<String> {
    if leaves.is_empty() {
        return Vec::new();
    }

    let mut tree = leaves.to_vec();
    let mut level = leaves.to_vec();

    while level.len() > 1 {
        let mut next_level = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let hash = if pair.len() == 2 {
                pair_hash(&pair[0], &pair[1])
            } else {
                pair_hash(&pair[0], &pair[0])
            };
            next_level.push(hash);
        }
        tree.extend(next_level.iter().cloned());
        level = next_level;
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn generates_configured_challenge_count() {
        let generator = AuditGenerator::new(3);
        let mut shard = Cursor::new(b"shard bytes".to_vec());
        let record = generator.generate(&mut shard).await.unwrap();

        assert_eq!(record.private.challenges.len(), 3);
        assert!(!record.public.tree.is_empty());
    }

    #[tokio::test]
    async fn different_shards_produce_different_trees() {
        let generator = AuditGenerator::new(1);
        let mut shard_a = Cursor::new(b"shard a".to_vec());
        let mut shard_b = Cursor::new(b"shard b".to_vec());

        let record_a = generator.generate(&mut shard_a).await.unwrap();
        let record_b = generator.generate(&mut shard_b).await.unwrap();

        assert_ne!(record_a.public.tree, record_b.public.tree);
    }

    #[test]
    fn merkle_tree_of_single_leaf_is_itself() {
        let tree = build_merkle_tree(&["leaf".to_string()]);
        assert_eq!(tree, vec!["leaf".to_string()]);
    }

    #[test]
    fn merkle_tree_combines_pairs_deterministically() {
        let leaves = vec!["a".to_string(), "b".to_string()];
        let tree1 = build_merkle_tree(&leaves);
        let tree2 = build_merkle_tree(&leaves);
        assert_eq!(tree1, tree2);
        assert_eq!(tree1.len(), 3); // 2 leaves + 1 root
    }
}

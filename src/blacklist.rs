/// Blacklist Module
///
/// Persistent set of farmer node ids to avoid when acquiring contracts (§4.2). Backed by a
/// newline-delimited file; every `add` is fsynced before returning so a crash never loses a
/// blacklist entry that was already acted on.
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::error::DfsResult;

pub struct Blacklist {
    nodes: RwLock<HashSet<String>>,
    path: PathBuf,
}

impl Blacklist {
    /// Load the blacklist from `folder/blacklist.txt`, creating the folder and an empty file
    /// if neither exists yet.
    pub async fn load(folder: &Path) -> DfsResult<Self> {
        tokio::fs::create_dir_all(folder).await?;
        let path = folder.join("blacklist.txt");

        let nodes = if path.exists() {
            let contents = tokio::fs::read_to_string(&path).await?;
            contents
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        } else {
            HashSet::new()
        };

        Ok(Self {
            nodes: RwLock::new(nodes),
            path,
        })
    }

    pub async fn contains(&self, node_id: &str) -> bool {
        self.nodes.read().await.contains(node_id)
    }

    /// Add a node id and persist the updated set durably before returning.
    pub async fn add(&self, node_id: String) -> DfsResult<()> {
        let mut nodes = self.nodes.write().await;
        if !nodes.insert(node_id) {
            return Ok(());
        }

        let contents = nodes.iter().cloned().collect::<Vec<_>>().join("\n");
        let path = self.path.clone();
        let write_result =
            tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                let mut file = std::fs::File::create(&path)?;
                file.write_all(contents.as_bytes())?;
                file.sync_all()?;
                Ok(())
            })
            .await;

        match write_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(crate::error::DfsError::Io(format!("blacklist write task failed: {}", e))),
        }
    }

    /// A point-in-time immutable copy of the blacklist's contents.
    pub async fn snapshot(&self) -> Vec<String> {
        self.nodes.read().await.iter().cloned().collect()
    }
}

/// Upload Orchestrator — `storeFileInBucket(bucketId, token, filePath, cb)` (§4.6)
///
/// Composes the Demuxer, Audit Generator, Blacklist, Data Channel, Bridge, and UploadState
/// into the end-to-end store pipeline.
use rand::Rng;
use sha2::{Digest, Sha256};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::audit::AuditGenerator;
use crate::bridge::BridgeClient;
use crate::blacklist::Blacklist;
use crate::config::Config;
use crate::demux::FileDemuxer;
use crate::error::{DfsError, DfsResult};
use crate::model::{FrameShard, Pointer, ShardMeta};
use crate::performance;
use crate::resilience::{retry_async, RetryConfig};
use crate::upload::state::UploadState;
use crate::upload::transfer::{self, TransferOutcome};

/// If `id` is 24 hex characters, use it verbatim; otherwise derive a deterministic 24-hex-char
/// id from `(email, name)` (§6 bucket-id normalization).
pub fn normalize_bucket_id(id: &str, email: &str, name: &str) -> String {
    if id.len() == 24 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        return id.to_string();
    }

    let digest = Sha256::digest(format!("{}:{}", email, name).as_bytes());
    hex::encode(digest)[..24].to_string()
}

/// Strip a trailing `.crypt` suffix, if present, matching the original filename used to
/// finalize the file (§4.6 step 7).
fn strip_crypt_suffix(filename: &str) -> &str {
    filename.strip_suffix(".crypt").unwrap_or(filename)
}

fn fresh_temp_path() -> PathBuf {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| {
            let c: u32 = rng.gen_range(0..16);
            std::char::from_digit(c, 16).unwrap()
        })
        .collect();
    std::env::temp_dir().join(format!("bridgefs-shard-{}", suffix))
}

/// Acquire a contract for one shard, retrying up to `contract_retries` times with no backoff,
/// then transfer it, escalating to farmer-blacklisting and re-acquisition on transfer exhaustion
/// (§4.6 step 6, §4.7). Returns once the shard is durably stored or the process gives up.
#[allow(clippy::too_many_arguments)]
async fn process_shard(
    client: &BridgeClient,
    blacklist: &Blacklist,
    state: &Arc<UploadState>,
    audit: &AuditGenerator,
    frame_id: &str,
    index: usize,
    bytes: Vec<u8>,
    transfer_retries: usize,
    contract_retries: usize,
) -> DfsResult<()> {
    let temp_path = fresh_temp_path();
    tokio::fs::write(&temp_path, &bytes).await?;
    state.register_temp_file(temp_path.clone()).await;

    let exclude_snapshot = blacklist.snapshot().await;
    let mut shard_meta = ShardMeta::new(index, temp_path.clone(), frame_id.to_string(), exclude_snapshot);
    shard_meta.update_hash(&bytes);
    let hash = shard_meta.finalize_hash();

    let record = {
        let mut cursor = std::io::Cursor::new(bytes);
        audit.generate(&mut cursor).await?
    };

    let shard = FrameShard {
        hash,
        size: shard_meta.size,
        index,
    };

    let mut exclude = shard_meta.exclude_farmers;

    loop {
        if state.is_killed() {
            return Ok(());
        }

        let tree = record.public.tree.clone();
        let challenges = record.private.challenges.len();
        let exclude_snapshot = exclude.clone();

        let contract_timer = performance::start_operation("contract_acquisition");
        let pointer: Pointer = match retry_async(
            || {
                let shard = shard.clone();
                let tree = tree.clone();
                let exclude_snapshot = exclude_snapshot.clone();
                async move {
                    client
                        .add_shard_to_frame(frame_id, &shard, &tree, challenges, &exclude_snapshot)
                        .await
                }
            },
            RetryConfig::no_backoff(contract_retries),
            "contract_acquisition",
        )
        .await
        {
            Ok(pointer) => {
                contract_timer.complete_success(None);
                pointer
            }
            Err(e) => {
                contract_timer.complete_failure(e.to_string());
                return Err(e);
            }
        };

        let channel_handle = state.register_data_channel().await;
        let outcome = transfer::transfer_shard(state, &channel_handle, &pointer, &temp_path, transfer_retries).await?;

        match outcome {
            TransferOutcome::Transferred => return Ok(()),
            TransferOutcome::Killed => return Ok(()),
            TransferOutcome::ExhaustedRetryBudget => {
                blacklist.add(pointer.farmer.node_id.clone()).await?;
                exclude.push(pointer.farmer.node_id);
                // loop again: re-enter contract acquisition excluding the blacklisted farmer
            }
        }
    }
}

/// Derive a MIME type from a filename, defaulting to `application/octet-stream`.
fn guess_mimetype(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Begin storing `file_path` into `bucket_id`. The demux/contract/transfer/finalize pipeline
/// (§4.6) runs on a spawned task so this function can hand back an `Arc<UploadState>` while the
/// upload is still in flight — otherwise `UploadState::kill` (§4.3's external `kill()`
/// transition, §8's mid-upload cancellation scenario) would have no caller-reachable target,
/// since the state would stay private to a future nobody can touch until it resolves.
///
/// Returns the state handle immediately and a `JoinHandle` that resolves to the bridge's
/// finalize response once the pipeline completes.
pub async fn store_file_in_bucket(
    client: BridgeClient,
    blacklist: Arc<Blacklist>,
    config: Config,
    bucket_id: &str,
    file_path: impl Into<PathBuf>,
    original_filename: &str,
) -> DfsResult<(Arc<UploadState>, tokio::task::JoinHandle<DfsResult<Value>>)> {
    let file_path = file_path.into();
    let metadata = tokio::fs::metadata(&file_path).await?;
    if metadata.len() == 0 {
        return Err(DfsError::Io("0 bytes is not a supported file size.".into()));
    }

    let shard_size = crate::demux::get_optimal_shard_size(metadata.len(), config.upload.concurrency);
    let demuxer = FileDemuxer::open(&file_path, shard_size).await?;
    let num_shards = demuxer.num_shards();

    let state = Arc::new(UploadState::new(
        bucket_id.to_string(),
        file_path.clone(),
        num_shards,
        config.upload.concurrency,
    ));

    let bucket_id = bucket_id.to_string();
    let original_filename = original_filename.to_string();
    let task_state = Arc::clone(&state);

    let handle = tokio::spawn(async move {
        run_upload(client, blacklist, config, demuxer, task_state, bucket_id, original_filename).await
    });

    Ok((state, handle))
}

/// Runs the demux → contract → transfer → finalize pipeline against an already-constructed
/// `state`, split out of `store_file_in_bucket` so that function's `Arc<UploadState>` handle is
/// available to the caller before this completes.
async fn run_upload(
    client: BridgeClient,
    blacklist: Arc<Blacklist>,
    config: Config,
    demuxer: FileDemuxer,
    state: Arc<UploadState>,
    bucket_id: String,
    original_filename: String,
) -> DfsResult<Value> {
    let frame = client.create_frame().await?;
    let audit = AuditGenerator::default();

    let mut shard_stream = demuxer.stream();

    use futures::StreamExt;
    while let Some(item) = shard_stream.next().await {
        let (index, bytes) = item?;

        // Bound concurrency: acquire before spawning so the demuxer side effectively stalls
        // once `C` workers are in flight (§4.3 backpressure).
        let permit = state.acquire_permit().await;

        let client_ref: &BridgeClient = &client;
        let blacklist_ref: &Blacklist = &blacklist;
        let state_ref = Arc::clone(&state);
        let audit_ref = &audit;
        let frame_id = frame.id.clone();
        let transfer_retries = config.upload.transfer_retries;
        let contract_retries = config.upload.contract_retries;

        let result = process_shard(
            client_ref,
            blacklist_ref,
            &state_ref,
            audit_ref,
            &frame_id,
            index,
            bytes,
            transfer_retries,
            contract_retries,
        )
        .await;
        drop(permit);

        match result {
            Ok(()) => {
                state.mark_shard_complete().await;
            }
            Err(e) => {
                state.fail(e.to_string()).await?;
                return Err(DfsError::UploadFailed(e.to_string()));
            }
        }
    }

    if state.is_killed() {
        return Err(DfsError::Cancelled);
    }

    let stripped_name = strip_crypt_suffix(&original_filename);
    let mimetype = guess_mimetype(stripped_name);

    let response = client
        .finalize_file(&bucket_id, &frame.id, &mimetype, stripped_name)
        .await;

    match response {
        Ok(value) => {
            state.set_phase(crate::upload::state::UploadPhase::Done).await;
            Ok(value)
        }
        Err(e) => {
            state.fail(e.to_string()).await?;
            Err(DfsError::UploadFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeTransport;
    use crate::config::{BridgeAuth, BridgeConfig};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn uses_24_hex_id_verbatim() {
        let id = "abcdef0123456789abcdef01";
        assert_eq!(normalize_bucket_id(id, "a@b.com", "name"), id);
    }

    #[test]
    fn derives_deterministic_id_from_email_and_name() {
        let a = normalize_bucket_id("my-bucket", "a@b.com", "name");
        let b = normalize_bucket_id("my-bucket", "a@b.com", "name");
        assert_eq!(a, b);
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn strips_crypt_suffix() {
        assert_eq!(strip_crypt_suffix("report.pdf.crypt"), "report.pdf");
        assert_eq!(strip_crypt_suffix("report.pdf"), "report.pdf");
    }

    /// Accepts one data-channel connection, reads the write-stream header and the shard
    /// payload that follows it, then exits. Stands in for the farmer in a single-shard
    /// happy path.
    async fn spawn_fake_farmer() -> (std::net::SocketAddr, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let token_len = socket.read_u16().await.unwrap();
            let mut token_buf = vec![0u8; token_len as usize];
            socket.read_exact(&mut token_buf).await.unwrap();
            let hash_len = socket.read_u8().await.unwrap();
            let mut hash_buf = vec![0u8; hash_len as usize];
            socket.read_exact(&mut hash_buf).await.unwrap();
            let payload_len = socket.read_u64().await.unwrap();

            let mut payload = vec![0u8; payload_len as usize];
            socket.read_exact(&mut payload).await.unwrap();
            payload
        });

        (addr, handle)
    }

    /// A single-shard file stores in one `PUT /frames/{id}` and one
    /// `POST /buckets/{id}/files`, and the farmer receives the exact shard bytes.
    #[tokio::test]
    async fn single_shard_file_stores_in_one_contract_and_one_finalize() {
        let (farmer_addr, farmer) = spawn_fake_farmer().await;

        let bridge = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex("^/frames$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "frame-1" })))
            .expect(1)
            .mount(&bridge)
            .await;

        Mock::given(method("PUT"))
            .and(path_regex("^/frames/frame-1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "farmer": {
                    "node_id": "farmer-1",
                    "address": farmer_addr.ip().to_string(),
                    "port": farmer_addr.port(),
                    "public_key": null,
                },
                "token": "push-token",
                "hash": "shardhash",
                "size": 5,
                "channel_type": "PUSH",
            })))
            .expect(1)
            .mount(&bridge)
            .await;

        Mock::given(method("POST"))
            .and(path_regex("^/buckets/bucket-1/files$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-1" })))
            .expect(1)
            .mount(&bridge)
            .await;

        let bridge_config = BridgeConfig {
            base_uri: bridge.uri(),
            auth: BridgeAuth::Basic {
                email: "user@example.com".into(),
                password: "secret".into(),
            },
        };
        let transport = BridgeTransport::new(&bridge_config, std::time::Duration::from_secs(5)).unwrap();
        let client = BridgeClient::new(transport);

        let temp_dir = TempDir::new().unwrap();
        let blacklist = Arc::new(Blacklist::load(&temp_dir.path().join("blacklist")).await.unwrap());

        let mut config = Config::default();
        config.upload.concurrency = 1;

        let file_path = temp_dir.path().join("input.bin");
        tokio::fs::write(&file_path, b"hello").await.unwrap();

        let (_state, handle) = store_file_in_bucket(client, blacklist, config, "bucket-1", file_path, "input.bin")
            .await
            .unwrap();
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response["id"], "file-1");

        let received = farmer.await.unwrap();
        assert_eq!(received, b"hello");
    }

    /// Killing the `Arc<UploadState>` handle returned by `store_file_in_bucket` while the
    /// spawned pipeline is still in flight aborts it: the `JoinHandle` resolves to
    /// `DfsError::Cancelled` and the state lands in `Killed` rather than `Done`.
    #[tokio::test]
    async fn kill_handle_aborts_an_in_flight_upload() {
        let bridge = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex("^/frames$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "frame-1" })))
            .mount(&bridge)
            .await;

        let bridge_config = BridgeConfig {
            base_uri: bridge.uri(),
            auth: BridgeAuth::Basic {
                email: "user@example.com".into(),
                password: "secret".into(),
            },
        };
        let transport = BridgeTransport::new(&bridge_config, std::time::Duration::from_secs(5)).unwrap();
        let client = BridgeClient::new(transport);

        let temp_dir = TempDir::new().unwrap();
        let blacklist = Arc::new(Blacklist::load(&temp_dir.path().join("blacklist")).await.unwrap());

        let mut config = Config::default();
        config.upload.concurrency = 1;

        let file_path = temp_dir.path().join("input.bin");
        tokio::fs::write(&file_path, b"hello").await.unwrap();

        let (state, handle) = store_file_in_bucket(client, blacklist, config, "bucket-1", file_path, "input.bin")
            .await
            .unwrap();

        state.kill().await.unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(DfsError::Cancelled)));
        assert_eq!(state.phase().await, crate::upload::state::UploadPhase::Killed);
    }

    /// A custom wiremock matcher selecting a shard-add request by whether its `exclude` list
    /// mentions a given farmer, used to hand out a different pointer before and after that
    /// farmer is blacklisted.
    struct ExcludesFarmer(&'static str);

    impl wiremock::Match for ExcludesFarmer {
        fn matches(&self, request: &wiremock::Request) -> bool {
            String::from_utf8_lossy(&request.body).contains(self.0)
        }
    }

    /// A farmer that exhausts its transfer retry budget gets blacklisted, and the next
    /// contract acquisition excludes it and succeeds against a different farmer.
    #[tokio::test]
    async fn flaky_farmer_is_blacklisted_and_excluded_from_retry() {
        let (good_farmer_addr, good_farmer) = spawn_fake_farmer().await;

        // Nothing listens here: connecting to it fails every attempt, exhausting the
        // transfer retry budget against this farmer.
        let dead_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let bad_farmer_addr = dead_listener.local_addr().unwrap();
        drop(dead_listener);

        let bridge = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex("^/frames$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "frame-1" })))
            .expect(1)
            .mount(&bridge)
            .await;

        Mock::given(method("PUT"))
            .and(path_regex("^/frames/frame-1$"))
            .and(ExcludesFarmer("bad-farmer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "farmer": {
                    "node_id": "good-farmer",
                    "address": good_farmer_addr.ip().to_string(),
                    "port": good_farmer_addr.port(),
                    "public_key": null,
                },
                "token": "push-token",
                "hash": "shardhash",
                "size": 5,
                "channel_type": "PUSH",
            })))
            .expect(1)
            .with_priority(1)
            .mount(&bridge)
            .await;

        Mock::given(method("PUT"))
            .and(path_regex("^/frames/frame-1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "farmer": {
                    "node_id": "bad-farmer",
                    "address": bad_farmer_addr.ip().to_string(),
                    "port": bad_farmer_addr.port(),
                    "public_key": null,
                },
                "token": "push-token",
                "hash": "shardhash",
                "size": 5,
                "channel_type": "PUSH",
            })))
            .expect(1)
            .with_priority(5)
            .mount(&bridge)
            .await;

        Mock::given(method("POST"))
            .and(path_regex("^/buckets/bucket-1/files$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "file-1" })))
            .expect(1)
            .mount(&bridge)
            .await;

        let bridge_config = BridgeConfig {
            base_uri: bridge.uri(),
            auth: BridgeAuth::Basic {
                email: "user@example.com".into(),
                password: "secret".into(),
            },
        };
        let transport = BridgeTransport::new(&bridge_config, std::time::Duration::from_secs(5)).unwrap();
        let client = BridgeClient::new(transport);

        let temp_dir = TempDir::new().unwrap();
        let blacklist = Arc::new(Blacklist::load(&temp_dir.path().join("blacklist")).await.unwrap());

        let mut config = Config::default();
        config.upload.concurrency = 1;
        config.upload.transfer_retries = 2;

        let file_path = temp_dir.path().join("input.bin");
        tokio::fs::write(&file_path, b"hello").await.unwrap();

        let (_state, handle) = store_file_in_bucket(
            client,
            Arc::clone(&blacklist),
            config,
            "bucket-1",
            file_path,
            "input.bin",
        )
        .await
        .unwrap();
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response["id"], "file-1");
        assert!(blacklist.contains("bad-farmer").await);

        let received = good_farmer.await.unwrap();
        assert_eq!(received, b"hello");
    }
}

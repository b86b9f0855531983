/// Upload orchestration: state machine, per-shard transfer, and the end-to-end pipeline.
pub mod orchestrator;
pub mod state;
pub mod transfer;

pub use orchestrator::{normalize_bucket_id, store_file_in_bucket};
pub use state::{UploadPhase, UploadState};
pub use transfer::{transfer_shard, TransferOutcome};

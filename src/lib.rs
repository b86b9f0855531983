// ===================================================================================================
// bridgefs-client - client-side storage engine for a decentralized object-storage network
// ===================================================================================================
//
// Demultiplexes files into shards, negotiates storage contracts with a bridge (directory
// service), streams shards to farmers over a data channel, and reverses the process for
// retrieval. The bridge's own server side, the data-channel wire protocol, and the file's
// cryptographic pre-processing pipeline are external collaborators; this crate models their
// client-facing interfaces only.
// ===================================================================================================

// Core error and resilience primitives
pub mod error;
pub mod resilience;

// System configuration and logging
pub mod config;
pub mod logging;

// Cryptographic key management
pub mod key_manager;

// Performance instrumentation
pub mod performance;

// Command line interface
pub mod cli;
pub mod ui;

// Data model shared across upload/download orchestration
pub mod model;

// Core engine components
pub mod audit;
pub mod blacklist;
pub mod datachannel;
pub mod demux;
pub mod mux;

pub mod bridge;
pub mod download;
pub mod upload;

pub use error::{DfsError, DfsResult};

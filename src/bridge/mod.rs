/// Bridge Transport + Client
///
/// `transport` issues signed/authenticated JSON requests to the bridge (§4.1); `client` exposes
/// the REST surface actually exercised by the orchestration core, plus thin passthroughs for
/// the rest of the table in §6.
pub mod client;
pub mod transport;

pub use client::BridgeClient;
pub use transport::{BridgeTransport, RequestHandle};

/// Bridge Client
///
/// One method per REST surface row in §6 that the upload/download orchestrators exercise
/// (frames, shard-add, file finalize, tokens, file listing, pointer resolution), plus thin
/// passthroughs for the remaining rows (user/key/bucket CRUD, mirrors, contacts) that cost
/// nothing extra over `BridgeTransport::request` and may be useful to an embedding caller, but
/// carry no orchestration logic of their own.
use reqwest::Method;
use serde_json::{json, Value};

use crate::error::{DfsError, DfsResult};
use crate::model::{Contact, Frame, FrameShard, Pointer};

use super::transport::BridgeTransport;

#[derive(Clone)]
pub struct BridgeClient {
    transport: BridgeTransport,
}

impl BridgeClient {
    pub fn new(transport: BridgeTransport) -> Self {
        Self { transport }
    }

    /// `POST /frames` — create a staging frame.
    pub async fn create_frame(&self) -> DfsResult<Frame> {
        let body = self.transport.request(Method::POST, "/frames", json!({})).await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DfsError::Deserialization("frame response missing id".into()))?
            .to_string();
        Ok(Frame::new(id))
    }

    /// `PUT /frames/{id}` — add a shard to a staging frame; returns the bridge-issued pointer.
    /// Retries are the caller's responsibility (§4.6 step 6 retries up to 24 times, no
    /// backoff, via `resilience::retry_async`).
    pub async fn add_shard_to_frame(
        &self,
        frame_id: &str,
        shard: &FrameShard,
        tree: &[String],
        challenges_count: usize,
        exclude: &[String],
    ) -> DfsResult<Pointer> {
        let path = format!("/frames/{}", frame_id);
        let body = self
            .transport
            .request(
                Method::PUT,
                &path,
                json!({
                    "hash": shard.hash,
                    "size": shard.size,
                    "index": shard.index,
                    "challenges": challenges_count,
                    "tree": tree,
                    "exclude": exclude,
                }),
            )
            .await?;

        parse_pointer(&body)
    }

    /// `POST /buckets/{id}/files` — finalize a file from its frame (§4.6 step 7).
    pub async fn finalize_file(
        &self,
        bucket_id: &str,
        frame_id: &str,
        mimetype: &str,
        filename: &str,
    ) -> DfsResult<Value> {
        let path = format!("/buckets/{}/files", bucket_id);
        self.transport
            .request(
                Method::POST,
                &path,
                json!({
                    "frame": frame_id,
                    "mimetype": mimetype,
                    "filename": filename,
                }),
            )
            .await
    }

    /// `POST /buckets/{id}/tokens` — short-lived PUSH or PULL token.
    pub async fn create_token(&self, bucket_id: &str, operation: &str) -> DfsResult<String> {
        let path = format!("/buckets/{}/tokens", bucket_id);
        let body = self
            .transport
            .request(Method::POST, &path, json!({ "operation": operation }))
            .await?;

        body.get("token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| DfsError::Deserialization("token response missing token".into()))
    }

    /// `GET /buckets/{id}/files/{file}?token&skip&limit&exclude` — resolve a pointer window
    /// (§4.8.1). `token` is the short-lived PULL token from `create_token`.
    pub async fn get_file_pointers(
        &self,
        bucket_id: &str,
        file_id: &str,
        token: &str,
        skip: usize,
        limit: usize,
        exclude: &[String],
    ) -> DfsResult<Vec<Pointer>> {
        let path = format!("/buckets/{}/files/{}", bucket_id, file_id);
        let body = self
            .transport
            .request(
                Method::GET,
                &path,
                json!({
                    "token": token,
                    "skip": skip,
                    "limit": limit,
                    "exclude": exclude.join(","),
                }),
            )
            .await?;

        let items = body
            .as_array()
            .ok_or_else(|| DfsError::Deserialization("pointer window response is not an array".into()))?;

        items.iter().map(parse_pointer).collect()
    }

    /// `GET /buckets/{id}/files` — list a bucket's files, used to walk a file's Frame for
    /// byte-range slicing (§4.8.4).
    pub async fn list_files(&self, bucket_id: &str) -> DfsResult<Vec<Value>> {
        let path = format!("/buckets/{}/files", bucket_id);
        let body = self.transport.request(Method::GET, &path, json!({})).await?;
        Ok(body.as_array().cloned().unwrap_or_default())
    }

    /// `DELETE /buckets/{id}/files/{file}` — remove a file.
    pub async fn remove_file(&self, bucket_id: &str, file_id: &str) -> DfsResult<()> {
        let path = format!("/buckets/{}/files/{}", bucket_id, file_id);
        self.transport.request(Method::DELETE, &path, json!({})).await?;
        Ok(())
    }

    /// `POST /buckets/{id}/mirrors` — request mirroring. Thin passthrough only; mirroring is
    /// not an orchestrated operation in this crate's scope.
    pub async fn request_mirror(&self, bucket_id: &str, file_id: &str, redundancy: u32) -> DfsResult<Value> {
        let path = format!("/buckets/{}/mirrors", bucket_id);
        self.transport
            .request(
                Method::POST,
                &path,
                json!({ "file": file_id, "redundancy": redundancy }),
            )
            .await
    }

    /// `GET /contacts/{nodeId}` — directory lookup.
    pub async fn get_contact(&self, node_id: &str) -> DfsResult<Contact> {
        let path = format!("/contacts/{}", node_id);
        let body = self.transport.request(Method::GET, &path, json!({})).await?;
        serde_json::from_value(body).map_err(DfsError::from)
    }

    /// `GET/POST/DELETE /buckets` — bucket CRUD passthrough.
    pub async fn buckets_request(&self, method: Method, path: &str, params: Value) -> DfsResult<Value> {
        self.transport.request(method, path, params).await
    }

    /// `GET/POST/DELETE /keys` — public-key management passthrough.
    pub async fn keys_request(&self, method: Method, params: Value) -> DfsResult<Value> {
        self.transport.request(method, "/keys", params).await
    }

    /// `POST/DELETE/PATCH /users`, `/users/{email}` — account lifecycle passthrough.
    /// Password fields must already be SHA-256-hashed by the caller (§6).
    pub async fn users_request(&self, method: Method, path: &str, params: Value) -> DfsResult<Value> {
        self.transport.request(method, path, params).await
    }
}

fn parse_pointer(body: &Value) -> DfsResult<Pointer> {
    serde_json::from_value(body.clone()).map_err(DfsError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeAuth, BridgeConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer) -> BridgeClient {
        let config = BridgeConfig {
            base_uri: server.uri(),
            auth: BridgeAuth::Basic {
                email: "user@example.com".into(),
                password: "secret".into(),
            },
        };
        let transport = BridgeTransport::new(&config, std::time::Duration::from_secs(5)).unwrap();
        BridgeClient::new(transport)
    }

    #[tokio::test]
    async fn create_frame_parses_id_from_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/frames"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "frame-123" })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let frame = client.create_frame().await.unwrap();
        assert_eq!(frame.id, "frame-123");
    }

    #[tokio::test]
    async fn bridge_error_status_surfaces_as_bridge_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/frames"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not found" })))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let result = client.create_frame().await;
        match result {
            Err(DfsError::Bridge { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "not found");
            }
            other => panic!("expected Bridge error, got {:?}", other.map(|_| ())),
        }
    }
}

/// Pointer Acquisition (§4.8.1)
///
/// `createToken(bucketId, "PULL")` followed by `getFilePointers` for one window.
use crate::bridge::BridgeClient;
use crate::error::DfsResult;
use crate::model::Pointer;

pub const PULL: &str = "PULL";

/// Acquire a fresh PULL token and fetch the pointer window `[skip, skip + limit)`, excluding
/// any blacklisted farmers.
pub async fn acquire_pointer_window(
    client: &BridgeClient,
    bucket_id: &str,
    file_id: &str,
    skip: usize,
    limit: usize,
    exclude: &[String],
) -> DfsResult<Vec<Pointer>> {
    let token = client.create_token(bucket_id, PULL).await?;
    client
        .get_file_pointers(bucket_id, file_id, &token, skip, limit, exclude)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeTransport;
    use crate::config::{BridgeAuth, BridgeConfig};
    use crate::model::{ChannelType, Contact};
    use serde_json::json;
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
    async fn acquires_token_then_fetches_window() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/buckets/bucket-1/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "pull-tok" })))
            .mount(&server)
            .await;

        let pointer = json!({
            "farmer": Contact { node_id: "f1".into(), address: "127.0.0.1".into(), port: 1, public_key: None },
            "token": "pull-tok",
            "hash": "h1",
            "size": 10,
            "channel_type": ChannelType::Pull,
        });
        Mock::given(method("GET"))
            .and(path("/buckets/bucket-1/files/file-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([pointer])))
            .mount(&server)
            .await;

        let client = client_against(&server).await;
        let pointers = acquire_pointer_window(&client, "bucket-1", "file-1", 0, 6, &[])
            .await
            .unwrap();

        assert_eq!(pointers.len(), 1);
        assert_eq!(pointers[0].hash, "h1");
    }
}

use reqwest::Method;
use secp256k1::{ecdsa::Signature, Message, Secp256k1, SecretKey};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{BridgeAuth, BridgeConfig};
use crate::error::{DfsError, DfsResult};

/// A cancellable in-flight request. `cancel()` is idempotent (§4.1 cancellation, §9).
#[derive(Clone)]
pub struct RequestHandle {
    cancelled: Arc<AtomicBool>,
}

impl RequestHandle {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the request cancelled. Idempotent: a second call is a no-op.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Issues signed, authenticated JSON requests to the bridge (§4.1).
pub struct BridgeTransport {
    base_uri: String,
    auth: BridgeAuth,
    http: reqwest::Client,
}

impl BridgeTransport {
    pub fn new(config: &BridgeConfig, timeout: Duration) -> DfsResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DfsError::Transport(format!("building http client: {}", e)))?;

        Ok(Self {
            base_uri: config.base_uri.trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
            http,
        })
    }

    /// Issue a request, returning a handle the caller may use to cancel it concurrently.
    pub fn request_cancellable(
        &self,
        method: Method,
        path: &str,
        params: Value,
    ) -> (RequestHandle, impl std::future::Future<Output = DfsResult<Value>> + '_) {
        let handle = RequestHandle::new();
        let handle_for_future = handle.clone();
        let path = path.to_string();

        let fut = async move {
            let cancel_check = handle_for_future.clone();
            tokio::select! {
                result = self.request(method, &path, params) => result,
                _ = wait_for_cancel(cancel_check) => Err(DfsError::Cancelled),
            }
        };

        (handle, fut)
    }

    /// `request(method, path, params) → body | Error` (§4.1).
    pub async fn request(&self, method: Method, path: &str, mut params: Value) -> DfsResult<Value> {
        if !params.is_object() {
            params = serde_json::json!({});
        }
        params["__nonce"] = Value::String(Uuid::new_v4().to_string());

        let is_query_method = matches!(method, Method::GET | Method::DELETE);
        let payload = if is_query_method {
            serde_urlencoded::to_string(&params)
                .map_err(|e| DfsError::Serialization(format!("encoding query params: {}", e)))?
        } else {
            serde_json::to_string(&params)?
        };

        let sig_payload = format!("{}\n{}\n{}", method.as_str(), path, payload);
        let url = format!("{}{}", self.base_uri, path);

        let mut request = self.http.request(method.clone(), &url);
        request = match &self.auth {
            BridgeAuth::KeyPair { secret, public } => {
                let signature = sign_payload(secret, &sig_payload)?;
                request.header("x-pubkey", public).header("x-signature", signature)
            }
            BridgeAuth::Basic { email, password } => {
                let hashed = hex::encode(Sha256::digest(password.as_bytes()));
                request.basic_auth(email, Some(hashed))
            }
        };

        request = if is_query_method {
            request.query(&params_as_pairs(&params))
        } else {
            request.header("content-type", "application/json").body(payload)
        };

        debug!("bridge request {} {}", method.as_str(), path);

        let response = request.send().await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.as_u16() >= 400 {
            let message = body
                .get("error")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| body.to_string());
            warn!("bridge error {} on {} {}: {}", status.as_u16(), method.as_str(), path, message);
            return Err(DfsError::Bridge {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

async fn wait_for_cancel(handle: RequestHandle) {
    loop {
        if handle.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn params_as_pairs(params: &Value) -> Vec<(String, String)> {
    match params.as_object() {
        Some(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        None => Vec::new(),
    }
}

fn sign_payload(secret_hex: &str, sig_payload: &str) -> DfsResult<String> {
    let secret_bytes = hex::decode(secret_hex)?;
    let secret = SecretKey::from_slice(&secret_bytes)
        .map_err(|e| DfsError::Crypto(format!("invalid signing key: {}", e)))?;

    let digest = Sha256::digest(sig_payload.as_bytes());
    let message = Message::from_digest_slice(&digest)
        .map_err(|e| DfsError::Crypto(format!("invalid digest: {}", e)))?;

    let secp = Secp256k1::signing_only();
    let signature: Signature = secp.sign_ecdsa(&message, &secret);
    Ok(hex::encode(signature.serialize_compact()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_payload_is_deterministic_for_same_key_and_message() {
        let secp = Secp256k1::new();
        let (secret, _) = secp.generate_keypair(&mut rand::thread_rng());
        let secret_hex = hex::encode(secret.secret_bytes());

        let sig1 = sign_payload(&secret_hex, "GET\n/\n").unwrap();
        let sig2 = sign_payload(&secret_hex, "GET\n/\n").unwrap();
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn sign_payload_differs_across_messages() {
        let secp = Secp256k1::new();
        let (secret, _) = secp.generate_keypair(&mut rand::thread_rng());
        let secret_hex = hex::encode(secret.secret_bytes());

        let sig1 = sign_payload(&secret_hex, "GET\n/a\n").unwrap();
        let sig2 = sign_payload(&secret_hex, "GET\n/b\n").unwrap();
        assert_ne!(sig1, sig2);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let handle = RequestHandle::new();
        handle.cancel();
        handle.cancel();
        assert!(handle.is_cancelled());
    }
}

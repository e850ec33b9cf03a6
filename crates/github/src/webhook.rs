use std::{fmt::Display, sync::Arc};

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use pushgate_core::config::Config;
use serde_json::{Map, Value};
use sha2::Sha256;

/// Verify and extract one GitHub webhook delivery.
///
/// The extractor checks the `X-Hub-Signature-256` HMAC of the raw body
/// against the configured secret before touching the payload, so a handler
/// taking `GitHubEvent` never sees an unauthenticated request. Event-kind
/// filtering is the handler's job: an unexpected kind is not a rejection.
#[derive(Debug, Clone)]
#[must_use]
pub struct GitHubEvent {
    /// Event kind from `X-GitHub-Event`, e.g. `push` or `ping`.
    pub kind: String,
    /// Delivery GUID from `X-GitHub-Delivery`. Stable across redeliveries
    /// of the same event.
    pub delivery: String,
    /// Decoded JSON body.
    pub payload: Map<String, Value>,
}

impl<S> FromRequest<S> for GitHubEvent
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync + Clone,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(m: impl Display) -> Response {
            tracing::error!("{m}");
            (StatusCode::BAD_REQUEST, m.to_string()).into_response()
        }
        let kind = req
            .headers()
            .get("X-GitHub-Event")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-GitHub-Event header missing"))?
            .to_string();
        let delivery = req
            .headers()
            .get("X-GitHub-Delivery")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-GitHub-Delivery header missing"))?
            .to_string();
        let signature_sha256 = req
            .headers()
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err("X-Hub-Signature-256 missing"))?
            .strip_prefix("sha256=")
            .ok_or_else(|| err("X-Hub-Signature-256 sha256= prefix missing"))?;
        let signature =
            hex::decode(signature_sha256).map_err(|_| err("X-Hub-Signature-256 malformed"))?;
        let config = <Arc<Config>>::from_ref(state);
        let body = Bytes::from_request(req, state).await.map_err(|_| err("error reading body"))?;
        let mut mac = Hmac::<Sha256>::new_from_slice(config.github.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(&body);
        if mac.verify_slice(&signature).is_err() {
            return Err(err("signature mismatch"));
        }
        let payload = serde_json::from_slice::<Map<String, Value>>(&body)
            .map_err(|_| err("error parsing body"))?;
        Ok(GitHubEvent { kind, delivery, payload })
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    const SECRET: &str = "test-secret";

    #[derive(Clone)]
    struct TestState {
        config: Arc<Config>,
    }

    impl FromRef<TestState> for Arc<Config> {
        fn from_ref(state: &TestState) -> Self { state.config.clone() }
    }

    fn test_state() -> TestState {
        let mut config: Config = serde_yaml::from_str("{}").unwrap();
        config.github.secret = SECRET.to_string();
        TestState { config: Arc::new(config) }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn request(kind: &str, delivery: &str, signature: &str, body: &[u8]) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("X-GitHub-Event", kind)
            .header("X-GitHub-Delivery", delivery)
            .header("X-Hub-Signature-256", signature)
            .body(Body::from(body.to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_signature() {
        let body = br#"{"ref":"refs/heads/main","repository":{"full_name":"octo/cat"}}"#;
        let req = request("push", "guid-1", &sign(SECRET, body), body);
        let event = GitHubEvent::from_request(req, &test_state()).await.unwrap();
        assert_eq!(event.kind, "push");
        assert_eq!(event.delivery, "guid-1");
        assert_eq!(event.payload["ref"], "refs/heads/main");
    }

    #[tokio::test]
    async fn rejects_tampered_body() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let signature = sign(SECRET, body);
        let tampered = br#"{"ref":"refs/heads/evil"}"#;
        let req = request("push", "guid-1", &signature, tampered);
        let rejection = GitHubEvent::from_request(req, &test_state()).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let req = request("push", "guid-1", &sign("other-secret", body), body);
        let rejection = GitHubEvent::from_request(req, &test_state()).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_missing_signature_header() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header("X-GitHub-Event", "push")
            .header("X-GitHub-Delivery", "guid-1")
            .body(Body::from(body.to_vec()))
            .unwrap();
        let rejection = GitHubEvent::from_request(req, &test_state()).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_unprefixed_signature() {
        let body = br#"{"ref":"refs/heads/main"}"#;
        let bare = sign(SECRET, body).trim_start_matches("sha256=").to_string();
        let req = request("push", "guid-1", &bare, body);
        assert!(GitHubEvent::from_request(req, &test_state()).await.is_err());
    }

    #[tokio::test]
    async fn rejects_malformed_json_body() {
        let body = b"not json";
        let req = request("push", "guid-1", &sign(SECRET, body), body);
        let rejection = GitHubEvent::from_request(req, &test_state()).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn passes_through_non_push_kinds() {
        let body = br#"{"zen":"Design for failure."}"#;
        let req = request("ping", "guid-2", &sign(SECRET, body), body);
        let event = GitHubEvent::from_request(req, &test_state()).await.unwrap();
        assert_eq!(event.kind, "ping");
    }
}

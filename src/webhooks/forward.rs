use async_trait::async_trait;
use axum::body::Bytes;

use crate::error::ApiError;

/// Delivers a webhook payload to the downstream automation.
#[async_trait]
pub trait LeadForwarder: Send + Sync {
    /// Forward `body` unchanged. No retry.
    async fn forward(&self, body: Bytes) -> Result<(), ApiError>;
}

/// Forwards payloads to an n8n (or any HTTP) webhook URL.
pub struct HttpForwarder {
    url: String,
    http: reqwest::Client,
}

impl HttpForwarder {
    pub fn new(url: String) -> Self {
        Self {
            url,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LeadForwarder for HttpForwarder {
    async fn forward(&self, body: Bytes) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ApiError::Forward(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Forward(format!("downstream returned {status}: {text}")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    async fn n8n(reply: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route(
                "/webhook/leads",
                post(move |State(seen): State<Seen>, headers: HeaderMap, body: Bytes| async move {
                    let content_type = headers
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    seen.lock().unwrap().push((content_type, body.to_vec()));
                    reply
                }),
            )
            .with_state(seen.clone());
        (testing::serve(app).await, seen)
    }

    #[tokio::test]
    async fn test_forwards_body_byte_for_byte() {
        let (base, seen) = n8n(StatusCode::OK).await;
        let forwarder = HttpForwarder::new(format!("{base}/webhook/leads"));

        let raw = br#"{ "object":"page",  "entry":[{"id":"111","changes":[]}] }"#;
        forwarder.forward(Bytes::from_static(raw)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "application/json");
        assert_eq!(seen[0].1, raw.to_vec());
    }

    #[tokio::test]
    async fn test_downstream_failure_is_forward_error() {
        let (base, seen) = n8n(StatusCode::INTERNAL_SERVER_ERROR).await;
        let forwarder = HttpForwarder::new(format!("{base}/webhook/leads"));

        let err = forwarder.forward(Bytes::from_static(b"{}")).await.unwrap_err();
        assert!(matches!(err, ApiError::Forward(_)), "{err}");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_downstream_is_forward_error() {
        let forwarder = HttpForwarder::new("http://127.0.0.1:1/webhook/leads".into());
        let err = forwarder.forward(Bytes::from_static(b"{}")).await.unwrap_err();
        assert!(matches!(err, ApiError::Forward(_)), "{err}");
    }
}

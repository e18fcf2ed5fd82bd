//! Removal of photo binaries from the remote asset store.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure reported by the remote store. The message is shown to moderators as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AssetDeleteError {
    pub message: String,
}

impl AssetDeleteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait AssetDeleter: Send + Sync + 'static {
    /// Delete the asset behind `public_id`. An asset that is already gone counts as deleted.
    async fn delete(&self, public_id: &str) -> Result<(), AssetDeleteError>;
}

/// Deletes assets with `DELETE {base_url}/{public_id}`.
///
/// Slashes in the handle become path segments, so folder-style handles such
/// as `users/42/avatar` map onto nested keys.
#[derive(Clone)]
pub struct HttpAssetDeleter {
    client: Client,
    base_url: Url,
}

impl HttpAssetDeleter {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("asset store url `{}` cannot be used as a base", base_url);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn asset_url(&self, public_id: &str) -> Result<Url, AssetDeleteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AssetDeleteError::new("invalid asset store url"))?
            .pop_if_empty()
            .extend(public_id.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

#[async_trait]
impl AssetDeleter for HttpAssetDeleter {
    async fn delete(&self, public_id: &str) -> Result<(), AssetDeleteError> {
        let url = self.asset_url(public_id)?;
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|err| AssetDeleteError::new(err.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AssetDeleteError::new(error_message(status, &body)))
    }
}

/// Pull a readable message out of an error response.
///
/// Understands `{"error": "..."}` and `{"error": {"message": "..."}}` bodies,
/// falls back to the raw text, then to the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let error = &value["error"];
        if let Some(message) = error.as_str().or_else(|| error["message"].as_str()) {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Path, http, routing::delete};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn delete_handler(Path(key): Path<String>) -> axum::response::Response {
        use axum::response::IntoResponse;
        match key.as_str() {
            "users/7/ok" => http::StatusCode::NO_CONTENT.into_response(),
            "gone" => http::StatusCode::NOT_FOUND.into_response(),
            _ => (
                http::StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": "quota exceeded", "status": 402 })),
            )
                .into_response(),
        }
    }

    async fn spawn_store() -> String {
        let app = Router::new().route("/photos/{*key}", delete(delete_handler));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/photos/", addr)
    }

    #[tokio::test]
    async fn success_and_missing_assets_both_count_as_deleted() {
        let base = spawn_store().await;
        let deleter = HttpAssetDeleter::new(&base, Duration::from_secs(5)).unwrap();

        assert_eq!(deleter.delete("users/7/ok").await, Ok(()));
        assert_eq!(deleter.delete("gone").await, Ok(()));
    }

    #[tokio::test]
    async fn remote_error_message_is_passed_through() {
        let base = spawn_store().await;
        let deleter = HttpAssetDeleter::new(&base, Duration::from_secs(5)).unwrap();

        let err = deleter.delete("a1").await.unwrap_err();
        assert_eq!(err.message, "quota exceeded");
    }

    #[test]
    fn error_message_falls_back_to_body_then_status() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, r#"{"error":{"message":"upstream down"}}"#),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, " busy \n"), "busy");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "502 Bad Gateway");
    }
}

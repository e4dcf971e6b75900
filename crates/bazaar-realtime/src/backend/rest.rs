//! REST backend speaking the PostgREST dialect.
//!
//! Row filters go in the query string (`user_id=eq.<id>`). Every request
//! carries the project `apikey` header and a bearer token; row-level
//! security on the server scopes results to the token's user.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use bazaar_core::config::backend::BackendConfig;
use bazaar_core::error::{AppError, ErrorKind};
use bazaar_core::result::AppResult;
use bazaar_core::types::id::{NotificationId, UserId};
use bazaar_entity::notification::Notification;

use super::{ChangeStream, NotificationBackend};
use crate::feed;

const TABLE: &str = "notifications";

/// Error body returned by the REST layer.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    details: Option<String>,
}

/// Notification backend over HTTP with a WebSocket change feed.
#[derive(Debug, Clone)]
pub struct RestNotificationBackend {
    client: reqwest::Client,
    rest_url: String,
    realtime_url: String,
    api_key: String,
    bearer: String,
}

impl RestNotificationBackend {
    /// Build the backend from configuration.
    pub fn new(config: &BackendConfig) -> AppResult<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::configuration("backend.api_key is not set"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            client,
            rest_url: config.rest_url.trim_end_matches('/').to_string(),
            realtime_url: config.realtime_url.clone(),
            api_key: config.api_key.clone(),
            bearer: config.bearer_token().to_string(),
        })
    }

    fn table_url(&self, filters: &str) -> String {
        format!("{}/{TABLE}?{filters}", self.rest_url)
    }

    fn request(&self, method: Method, filters: &str) -> RequestBuilder {
        self.client
            .request(method, self.table_url(filters))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
    }

    async fn execute(&self, request: RequestBuilder, action: &str) -> AppResult<Response> {
        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Failed to {action}: {e}"),
                e,
            )
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.details))
            .unwrap_or_else(|| format!("Failed to {action}: server returned {status}"));

        Err(AppError::from_status(status.as_u16(), message))
    }

    async fn patch_read(&self, filters: &str, action: &str) -> AppResult<()> {
        let request = self
            .request(Method::PATCH, filters)
            .header("Prefer", "return=minimal")
            .json(&json!({ "is_read": true }));
        self.execute(request, action).await?;
        Ok(())
    }

    async fn delete_rows(&self, filters: &str, action: &str) -> AppResult<()> {
        let request = self
            .request(Method::DELETE, filters)
            .header("Prefer", "return=minimal");
        self.execute(request, action).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationBackend for RestNotificationBackend {
    async fn list_for_user(&self, user: UserId) -> AppResult<Vec<Notification>> {
        let filters = format!("select=*&user_id=eq.{user}&order=created_at.desc");
        let response = self
            .execute(self.request(Method::GET, &filters), "load notifications")
            .await?;

        let items: Vec<Notification> = response.json().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Unreadable notification list: {e}"),
                e,
            )
        })?;
        debug!(user_id = %user, count = items.len(), "Loaded notifications");
        Ok(items)
    }

    async fn mark_read(&self, user: UserId, id: NotificationId) -> AppResult<()> {
        self.patch_read(
            &format!("id=eq.{id}&user_id=eq.{user}"),
            "mark notification as read",
        )
        .await
    }

    async fn mark_all_read(&self, user: UserId) -> AppResult<()> {
        self.patch_read(
            &format!("user_id=eq.{user}&is_read=eq.false"),
            "mark all notifications as read",
        )
        .await
    }

    async fn delete(&self, user: UserId, id: NotificationId) -> AppResult<()> {
        self.delete_rows(
            &format!("id=eq.{id}&user_id=eq.{user}"),
            "delete notification",
        )
        .await
    }

    async fn delete_all(&self, user: UserId) -> AppResult<()> {
        self.delete_rows(&format!("user_id=eq.{user}"), "delete all notifications")
            .await
    }

    async fn subscribe(&self, user: UserId) -> AppResult<ChangeStream> {
        feed::connect(&self.realtime_url, &self.api_key, &self.bearer, user).await
    }
}

//! Threads Graph API client: the create/publish container protocol.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use spool_sheets::Row;

use crate::ThreadsError;
use crate::retry::RetryPolicy;
use crate::types::{CreateContainer, MediaType, PostOutcome};

/// Production Threads Graph API endpoint.
pub const API_BASE: &str = "https://graph.threads.net/v1.0";

/// Per-attempt request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one Threads account, authenticated by bearer token.
pub struct ThreadsClient {
    http: Client,
    base_url: String,
    user_id: String,
    access_token: String,
    retry: RetryPolicy,
}

impl ThreadsClient {
    /// Create a client against the production API.
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: API_BASE.to_string(),
            user_id: user_id.into(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the client at a custom endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Submit one row. Image rows create a container and then publish it;
    /// text rows create an auto-published container. A post counts as
    /// published only once its final call has succeeded.
    pub async fn post_row(&self, row: &Row) -> Result<PostOutcome, ThreadsError> {
        if row.text.trim().is_empty() && row.image_url.trim().is_empty() {
            return Err(ThreadsError::EmptyRow);
        }

        if !row.image_url.trim().is_empty() {
            let payload = CreateContainer::image(row);
            let container_id = self.create_container(&payload).await?;
            let publish = self.publish_container(&container_id).await?;
            info!(container_id = %container_id, "published image post");
            Ok(PostOutcome {
                status: "published",
                container_id,
                media_type: MediaType::Image,
                publish: Some(publish),
            })
        } else {
            let payload = CreateContainer::text(row);
            let container_id = self.create_container(&payload).await?;
            info!(container_id = %container_id, "published text post");
            Ok(PostOutcome {
                status: "published",
                container_id,
                media_type: MediaType::Text,
                publish: None,
            })
        }
    }

    /// Create a media container and return its id.
    pub async fn create_container(
        &self,
        payload: &CreateContainer,
    ) -> Result<String, ThreadsError> {
        let url = format!("{}/{}/threads", self.base_url, self.user_id);

        let response: ContainerResponse = self
            .retry
            .run("create-container", || {
                let request = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .json(payload);
                async move { Self::handle_response(request.send().await?).await }
            })
            .await?;

        response.id.ok_or(ThreadsError::MissingContainerId)
    }

    /// Publish a previously created container.
    pub async fn publish_container(&self, container_id: &str) -> Result<Value, ThreadsError> {
        let url = format!("{}/{}/threads_publish", self.base_url, self.user_id);

        self.retry
            .run("publish-container", || {
                let request = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .query(&[("creation_id", container_id)]);
                async move { Self::handle_response(request.send().await?).await }
            })
            .await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ThreadsError> {
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(ThreadsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct ContainerResponse {
    id: Option<String>,
}

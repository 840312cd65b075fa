//! Conversation metadata CRUD against the workspace backend.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ApiConfig;
use crate::errors::{ChatError, DirectoryError};
use crate::transcript::Role;

/// Conversation row from the directory listing.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Stored message row returned when loading a conversation.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, serde::Deserialize)]
struct ListEnvelope {
    items: Vec<ConversationSummary>,
}

#[derive(Debug, serde::Deserialize)]
struct MessagesEnvelope {
    items: Vec<MessageRecord>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// Seam the streaming client notifies after the server assigns a
/// conversation id. Notification is best-effort; failures never reach the
/// transcript.
#[async_trait::async_trait]
pub trait ConversationListener: Send + Sync {
    async fn conversation_changed(&self, id: i64) -> Result<(), DirectoryError>;
}

/// CRUD client for conversation metadata, with a cached copy of the last
/// fetched listing for sidebar-style consumers.
pub struct ConversationDirectory {
    client: reqwest::Client,
    config: ApiConfig,
    cached: Mutex<Vec<ConversationSummary>>,
}

impl ConversationDirectory {
    pub fn new(config: ApiConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            cached: Mutex::new(Vec::new()),
        })
    }

    /// Fetches the conversation listing, most recently updated first.
    pub async fn list(&self) -> Result<Vec<ConversationSummary>, DirectoryError> {
        let envelope: ListEnvelope = self.get_json(self.config.conversations_url()).await?;
        Ok(envelope.items)
    }

    /// Refetches the listing and updates the cached copy.
    pub async fn refresh(&self) -> Result<Vec<ConversationSummary>, DirectoryError> {
        let items = self.list().await?;
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = items.clone();
        Ok(items)
    }

    /// Returns the listing from the last successful `refresh`.
    pub fn cached(&self) -> Vec<ConversationSummary> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loads the stored messages of one conversation, oldest first.
    pub async fn messages(&self, id: i64) -> Result<Vec<MessageRecord>, DirectoryError> {
        let envelope: MessagesEnvelope = self.get_json(self.config.conversation_url(id)).await?;
        Ok(envelope.items)
    }

    /// Renames a conversation. Empty titles are rejected client-side.
    pub async fn rename(&self, id: i64, title: &str) -> Result<(), DirectoryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DirectoryError::Validation("title must not be empty".into()));
        }
        self.post_ok(self.config.rename_url(id), &serde_json::json!({ "title": title }))
            .await
    }

    /// Deletes a conversation.
    pub async fn delete(&self, id: i64) -> Result<(), DirectoryError> {
        self.post_ok(self.config.delete_url(id), &serde_json::json!({}))
            .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, DirectoryError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;
        decode(response).await
    }

    async fn post_ok(&self, url: String, body: &serde_json::Value) -> Result<(), DirectoryError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DirectoryError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationListener for ConversationDirectory {
    async fn conversation_changed(&self, id: i64) -> Result<(), DirectoryError> {
        debug!(conversation_id = id, "refreshing conversation directory");
        self.refresh().await?;
        Ok(())
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DirectoryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(status.as_u16(), &body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| DirectoryError::Decode(e.to_string()))
}

/// Extracts the backend's `{"error": code}` envelope when present, falling
/// back to the raw body text.
fn api_error(status: u16, body: &str) -> DirectoryError {
    let code = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error)
        .unwrap_or_else(|_| body.to_string());
    DirectoryError::Api { status, code }
}

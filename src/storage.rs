//! Persistence of fetched reviews.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A raw review object with its retrieval context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReview {
    pub app_id: u64,
    pub fetched_at: DateTime<Utc>,
    pub review: serde_json::Value,
}

impl StoredReview {
    pub fn new(app_id: u64, review: serde_json::Value) -> Self {
        Self {
            app_id,
            fetched_at: Utc::now(),
            review,
        }
    }

    /// The upstream review identifier, if present.
    pub fn recommendation_id(&self) -> Option<&str> {
        self.review.get("recommendationid").and_then(|v| v.as_str())
    }

    /// Steam ID of the review's author.
    pub fn author_id(&self) -> Option<&str> {
        self.author()?.get("steamid").and_then(|v| v.as_str())
    }

    /// Author stats as of `fetched_at` (games owned, playtime, ...).
    pub fn author(&self) -> Option<&serde_json::Value> {
        self.review.get("author").filter(|v| v.is_object())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Destination for fetched reviews.
#[async_trait]
pub trait ReviewSink: Send + Sync {
    async fn save(&self, review: &StoredReview) -> Result<(), StorageError>;
}

/// Appends one JSON object per line to a file.
pub struct JsonlSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it and its parent directories.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReviewSink for JsonlSink {
    async fn save(&self, review: &StoredReview) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(review)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

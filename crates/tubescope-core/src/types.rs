use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Shorts,
    #[serde(rename = "Long-form")]
    LongForm,
}

impl ContentType {
    pub fn label(&self) -> &'static str {
        match self {
            ContentType::Shorts => "Shorts",
            ContentType::LongForm => "Long-form",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub id: String,
    pub title: String,
    pub thumbnail: Option<String>,
    pub subscribers: u64,
    pub views: u64,
    pub video_count: u64,
    pub uploads_playlist: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub duration_seconds: u64,
    /// `M:SS` or `H:MM:SS`
    pub duration: String,
    pub published: NaiveDate,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a finished analysis produced, as stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub channel: ChannelStats,
    pub videos: Vec<VideoRecord>,
    pub report: String,
}

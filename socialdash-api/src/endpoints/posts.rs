use super::{paths, Endpoint, RequestData};
use crate::macros::setter;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const MAX_CONTENT_LENGTH: usize = 1000;

// Common

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Facebook,
    Instagram,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
        Platform::Linkedin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Linkedin => "linkedin",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Twitter => write!(f, "Twitter"),
            Self::Facebook => write!(f, "Facebook"),
            Self::Instagram => write!(f, "Instagram"),
            Self::Linkedin => write!(f, "Linkedin"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "Draft"),
            Self::Scheduled => write!(f, "Scheduled"),
            Self::Published => write!(f, "Published"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub word_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub content: String,
    pub platform: Platform,
    pub status: PostStatus,
    pub scheduled_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub metadata: Option<PostMetadata>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Published posts are frozen from the client's side.
    pub fn is_editable(&self) -> bool {
        self.status != PostStatus::Published
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationType {
    Offset,
    Cursor,
}

// Requests

#[derive(Default, Debug, Clone, PartialEq, Serialize)]
pub struct ListPosts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_type: Option<PaginationType>,
}

impl ListPosts {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(opt page: u32);
    setter!(opt limit: u32);
    setter!(opt status: PostStatus);
    setter!(opt platform: Platform);
    setter!(opt pagination_type: PaginationType);
    setter!(text cursor);
    setter!(text start_date);
    setter!(text end_date);
    setter!(text search);
    setter!(text sort);
}

impl Endpoint for ListPosts {
    type Data = Self;
    type Response = PostPage;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::POSTS.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Query(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPost {
    pub id: String,
}

impl GetPost {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Endpoint for GetPost {
    type Data = ();
    type Response = Post;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::post(&self.id).into()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePost {
    pub content: String,
    pub platform: Platform,
    pub scheduled_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl CreatePost {
    pub fn new(content: impl Into<String>, platform: Platform, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            platform,
            scheduled_at,
            status: None,
            published_at: None,
        }
    }

    setter!(opt status: PostStatus);
    setter!(opt published_at: DateTime<Utc>);
}

impl Endpoint for CreatePost {
    type Data = Self;
    type Response = Post;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::POSTS.into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatePost {
    #[serde(skip)]
    id: String,
    #[serde(flatten)]
    changes: PostChanges,
}

/// Partial update; unset fields are left untouched by the server.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
}

impl UpdatePost {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            changes: PostChanges::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn change_set(&self) -> &PostChanges {
        &self.changes
    }

    pub fn changes(mut self, changes: PostChanges) -> Self {
        self.changes = changes;
        self
    }

    setter!(opt changes.content: String);
    setter!(opt changes.platform: Platform);
    setter!(opt changes.scheduled_at: DateTime<Utc>);
    setter!(opt changes.status: PostStatus);
}

impl Endpoint for UpdatePost {
    type Data = Self;
    type Response = Post;
    const METHOD: Method = Method::PUT;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::post(&self.id).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePost {
    pub id: String,
}

impl DeletePost {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Endpoint for DeletePost {
    type Data = ();
    type Response = serde_json::Value;
    const METHOD: Method = Method::DELETE;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::post(&self.id).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPostAnalytics {
    pub id: String,
}

impl GetPostAnalytics {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Endpoint for GetPostAnalytics {
    type Data = ();
    type Response = PostAnalytics;

    fn endpoint(&self) -> Cow<'_, str> {
        paths::post_analytics(&self.id).into()
    }
}

// Responses

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    #[serde(default)]
    pub posts: Vec<Post>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
    pub next_cursor: Option<String>,
}

/// Per-post metrics; the shape varies by platform so it is kept as JSON.
pub type PostAnalytics = serde_json::Value;

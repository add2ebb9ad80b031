//! The network collaborator.
//!
//! Everything above this module treats the server as an opaque source of
//! typed DTO snapshots. The [`LemmyApi`] trait is the seam: production code
//! talks to [`HttpLemmyApi`], tests substitute an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What a failed request was trying to do; alerts carry this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Posts,
    Comments,
    SiteInfo,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestKind::Posts => "posts",
            RequestKind::Comments => "comments",
            RequestKind::SiteInfo => "site info",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{kind} request failed: {source}")]
    Request {
        kind: RequestKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("{kind} response could not be decoded: {source}")]
    Decode {
        kind: RequestKind,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn kind(&self) -> RequestKind {
        match self {
            ApiError::Request { kind, .. } | ApiError::Decode { kind, .. } => *kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDto {
    pub id: i64,
    /// The post title; the server calls this `name`.
    pub name: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub thumbnail_url: Option<String>,
    pub embed_title: Option<String>,
    pub ap_id: Option<String>,
    pub published: String,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonDto {
    pub id: i64,
    pub name: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub actor_id: Option<String>,
    #[serde(default)]
    pub bot_account: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityDto {
    pub id: i64,
    pub name: String,
    pub actor_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostCounts {
    pub score: i64,
    pub comments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostView {
    pub post: PostDto,
    pub creator: PersonDto,
    pub community: CommunityDto,
    #[serde(default)]
    pub counts: PostCounts,
    pub my_vote: Option<i64>,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDto {
    pub id: i64,
    pub content: String,
    /// Materialized root-to-node chain, e.g. `"0.41.122"`.
    pub path: String,
    pub published: String,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentCounts {
    pub score: i64,
    pub child_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub comment: CommentDto,
    pub creator: PersonDto,
    #[serde(default)]
    pub counts: CommentCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    pub name: Option<String>,
    pub software: Option<String>,
    pub default_listing_type: Option<String>,
    pub default_sort_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListPostsParams {
    pub listing_type: Option<String>,
    pub sort_type: String,
    pub community_name: Option<String>,
    /// 1-based server page number.
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone)]
pub struct ListCommentsParams {
    pub post_id: i64,
    pub sort_type: String,
    pub page: u32,
    pub limit: u32,
    pub max_depth: Option<u32>,
}

#[async_trait]
pub trait LemmyApi: Send + Sync {
    async fn list_posts(&self, params: ListPostsParams) -> Result<Vec<PostView>, ApiError>;
    async fn list_comments(&self, params: ListCommentsParams)
        -> Result<Vec<CommentView>, ApiError>;
    async fn get_site(&self) -> Result<SiteInfo, ApiError>;
}

/// reqwest-backed implementation against `/api/v3`.
pub struct HttpLemmyApi {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ListPostsResponse {
    posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
struct ListCommentsResponse {
    comments: Vec<CommentView>,
}

#[derive(Debug, Deserialize)]
struct GetSiteResponse {
    site_view: SiteViewResponse,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SiteViewResponse {
    site: SiteResponse,
    #[serde(default)]
    local_site: Option<LocalSiteResponse>,
}

#[derive(Debug, Deserialize)]
struct SiteResponse {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalSiteResponse {
    default_post_listing_type: Option<String>,
    default_post_sort_type: Option<String>,
}

impl HttpLemmyApi {
    pub fn new(client: reqwest::Client, instance_url: impl Into<String>) -> Self {
        let mut base_url = instance_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v3/{path}", self.base_url)
    }
}

#[async_trait]
impl LemmyApi for HttpLemmyApi {
    async fn list_posts(&self, params: ListPostsParams) -> Result<Vec<PostView>, ApiError> {
        let kind = RequestKind::Posts;
        let mut query: Vec<(&str, String)> = vec![
            ("sort", params.sort_type.clone()),
            ("page", params.page.to_string()),
            ("limit", params.limit.to_string()),
        ];
        if let Some(listing_type) = &params.listing_type {
            query.push(("type_", listing_type.clone()));
        }
        if let Some(community_name) = &params.community_name {
            query.push(("community_name", community_name.clone()));
        }
        let response = self
            .client
            .get(self.endpoint("post/list"))
            .query(&query)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|source| ApiError::Request { kind, source })?;
        let decoded: ListPostsResponse = response
            .json()
            .await
            .map_err(|source| ApiError::Decode { kind, source })?;
        Ok(decoded.posts)
    }

    async fn list_comments(
        &self,
        params: ListCommentsParams,
    ) -> Result<Vec<CommentView>, ApiError> {
        let kind = RequestKind::Comments;
        let mut query: Vec<(&str, String)> = vec![
            ("post_id", params.post_id.to_string()),
            ("sort", params.sort_type.clone()),
            ("page", params.page.to_string()),
            ("limit", params.limit.to_string()),
        ];
        if let Some(max_depth) = params.max_depth {
            query.push(("max_depth", max_depth.to_string()));
        }
        let response = self
            .client
            .get(self.endpoint("comment/list"))
            .query(&query)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|source| ApiError::Request { kind, source })?;
        let decoded: ListCommentsResponse = response
            .json()
            .await
            .map_err(|source| ApiError::Decode { kind, source })?;
        Ok(decoded.comments)
    }

    async fn get_site(&self) -> Result<SiteInfo, ApiError> {
        let kind = RequestKind::SiteInfo;
        let response = self
            .client
            .get(self.endpoint("site"))
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|source| ApiError::Request { kind, source })?;
        let decoded: GetSiteResponse = response
            .json()
            .await
            .map_err(|source| ApiError::Decode { kind, source })?;
        let local_site = decoded.site_view.local_site;
        Ok(SiteInfo {
            name: decoded.site_view.site.name,
            software: decoded.version.map(|v| format!("lemmy {v}")),
            default_listing_type: local_site
                .as_ref()
                .and_then(|ls| ls.default_post_listing_type.clone()),
            default_sort_type: local_site
                .as_ref()
                .and_then(|ls| ls.default_post_sort_type.clone()),
        })
    }
}

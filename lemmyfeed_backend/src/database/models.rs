use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    /// Normalized origin URL (`https://host`), the canonical identity.
    pub actor_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: String,
    pub instance_id: String,
    pub name: Option<String>,
    pub software: Option<String>,
    pub default_listing_type: Option<String>,
    pub default_sort_type: Option<String>,
    pub site_info_fetched_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub site_id: String,
    pub username: Option<String>,
    /// Synthetic anonymous identity; at most one per site.
    pub signed_out: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    /// Server-assigned id, only meaningful together with `site_id`.
    pub person_id: i64,
    pub site_id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub actor_id: Option<String>,
    pub bot: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    /// Server-assigned id, only meaningful together with `account_id`.
    pub post_id: i64,
    pub account_id: String,
    pub title: String,
    pub community_name: String,
    pub url: Option<String>,
    pub body: Option<String>,
    pub thumbnail_url: Option<String>,
    pub embed_title: Option<String>,
    pub creator_person_id: Option<String>,
    pub score: i64,
    pub comment_count: i64,
    pub my_vote: Option<i64>,
    pub saved: bool,
    pub read: bool,
    pub published_at: String,
    pub edited_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRecord {
    pub id: String,
    pub account_id: String,
    /// 'frontpage' or 'community'.
    pub kind: String,
    pub listing_type: Option<String>,
    pub sort_type: String,
    pub community_name: Option<String>,
    pub community_instance: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub feed_id: String,
    pub page_index: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageElementRecord {
    pub id: String,
    pub page_id: String,
    pub element_index: i64,
    pub post_row_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    /// Server-assigned id, only meaningful together with `post_row_id`.
    pub comment_id: i64,
    pub post_row_id: String,
    /// Materialized root-to-node chain, e.g. `"0.1.4"`.
    pub path: String,
    /// Server-reported number of direct children; used for gap detection.
    pub child_count: i64,
    pub body: String,
    pub creator_person_id: Option<String>,
    pub score: i64,
    pub published_at: String,
    pub edited_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Denormalized display model handed to list UIs and the widget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostInfo {
    pub post_id: i64,
    pub title: String,
    pub community_name: String,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub score: i64,
    pub comment_count: i64,
    pub published_at: String,
}

impl PostInfo {
    pub fn from_record(record: &PostRecord) -> Self {
        Self {
            post_id: record.post_id,
            title: record.title.clone(),
            community_name: record.community_name.clone(),
            url: record.url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
            score: record.score,
            comment_count: record.comment_count,
            published_at: record.published_at.clone(),
        }
    }
}

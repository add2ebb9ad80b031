//! Widget hand-off snapshot.
//!
//! The main process writes a small JSON file of top post summaries into the
//! shared directory; the widget process reads it without opening the store.
//! One-way and best-effort: a missing or stale file renders an empty widget,
//! never an error dialog.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::database::models::{PostInfo, PostRecord};
use crate::database::repositories::{PageRepository, PostRepository};
use crate::database::Database;
use crate::utils::now_utc_iso;

/// Widgets show at most this many entries.
pub const MAX_TOP_POSTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTag {
    Image,
    Link,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPostSummary {
    pub title: String,
    pub community_name: String,
    pub score: i64,
    pub comment_count: i64,
    pub content_tag: ContentTag,
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopPosts {
    pub generated_at: String,
    pub posts: Vec<TopPostSummary>,
}

fn content_tag(record: &PostRecord) -> ContentTag {
    if record.thumbnail_url.is_some() {
        ContentTag::Image
    } else if record.url.is_some() {
        ContentTag::Link
    } else {
        ContentTag::Text
    }
}

impl TopPostSummary {
    pub fn from_record(record: &PostRecord) -> Self {
        let info = PostInfo::from_record(record);
        Self {
            title: info.title,
            community_name: info.community_name,
            score: info.score,
            comment_count: info.comment_count,
            content_tag: content_tag(record),
            permalink: info.url,
        }
    }
}

impl TopPosts {
    /// Snapshot of the first posts of a feed in page/element order, deduped
    /// by post row (append-only paging can repeat a post across pages).
    pub fn from_feed(database: &Database, feed_id: &str) -> Result<Self> {
        let posts = database.with_repositories(|repos| {
            let mut seen = std::collections::HashSet::new();
            let mut summaries = Vec::new();
            'pages: for page in repos.pages().list_for_feed(feed_id)? {
                for post in repos.posts().list_for_page(&page.id)? {
                    if !seen.insert(post.id.clone()) {
                        continue;
                    }
                    summaries.push(TopPostSummary::from_record(&post));
                    if summaries.len() == MAX_TOP_POSTS {
                        break 'pages;
                    }
                }
            }
            Ok(summaries)
        })?;
        Ok(Self {
            generated_at: now_utc_iso(),
            posts,
        })
    }

    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Best effort: a missing file is `None`, a corrupt one is an error the
    /// caller may ignore.
    pub fn read_snapshot(path: &Path) -> Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()))
            }
        };
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Some(snapshot))
    }
}

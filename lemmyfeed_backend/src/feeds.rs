//! Feed lifecycle: get-or-create feed rows and one controller per feed that
//! owns its fetch state.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use uuid::Uuid;

use crate::api::{ApiError, LemmyApi, ListPostsParams, RequestKind};
use crate::database::changes::Entity;
use crate::database::models::{FeedRecord, PageRecord, PostRecord};
use crate::database::repositories::{FeedRepository, PageRepository, PostRepository};
use crate::database::Database;
use crate::importer::ImportService;
use crate::metrics::IntegrityMetrics;
use crate::utils::now_utc_iso;

/// Parameters identifying one logical feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSpec {
    Frontpage {
        listing_type: String,
        sort_type: String,
    },
    Community {
        name: String,
        instance: String,
        sort_type: String,
    },
}

impl FeedSpec {
    fn probe(&self, account_id: &str) -> FeedRecord {
        match self {
            FeedSpec::Frontpage {
                listing_type,
                sort_type,
            } => FeedRecord {
                id: String::new(),
                account_id: account_id.to_string(),
                kind: "frontpage".into(),
                listing_type: Some(listing_type.clone()),
                sort_type: sort_type.clone(),
                community_name: None,
                community_instance: None,
                created_at: String::new(),
            },
            FeedSpec::Community {
                name,
                instance,
                sort_type,
            } => FeedRecord {
                id: String::new(),
                account_id: account_id.to_string(),
                kind: "community".into(),
                listing_type: None,
                sort_type: sort_type.clone(),
                community_name: Some(name.clone()),
                community_instance: Some(instance.clone()),
                created_at: String::new(),
            },
        }
    }
}

/// Receives fetch failures. Errors never cross the controller boundary as
/// `Err`; they land here and the controller goes back to idle.
pub trait AlertSink: Send + Sync {
    fn alert(&self, kind: RequestKind, error: &ApiError);
}

/// Default sink: structured log lines.
pub struct TracingAlerts;

impl AlertSink for TracingAlerts {
    fn alert(&self, kind: RequestKind, error: &ApiError) {
        tracing::warn!(request = %kind, error = %error, "fetch failed");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Fetching { page_index: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and appended.
    Appended { page_index: i64, element_count: usize },
    /// A fetch was already in flight; this call was coalesced away.
    AlreadyFetching,
    /// The fetch failed; the alert sink was notified and nothing was stored.
    Failed,
}

#[derive(Clone)]
pub struct FeedService {
    database: Database,
}

impl FeedService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Finds the feed matching the spec for this account, creating it on
    /// first use. Duplicate matches follow first-wins tolerance.
    pub fn get_or_create_feed(&self, account_id: &str, spec: &FeedSpec) -> Result<FeedRecord> {
        let probe = spec.probe(account_id);
        self.database.with_transaction(|repos| {
            let feeds = repos.feeds();
            let matching = feeds.find_matching(&probe)?;
            if let Some(existing) = matching.into_iter().next() {
                return Ok((existing, Vec::new()));
            }
            let record = FeedRecord {
                id: Uuid::new_v4().to_string(),
                created_at: now_utc_iso(),
                ..probe
            };
            feeds.create(&record)?;
            Ok((record, vec![Entity::Feed]))
        })
    }

    /// Pages of the feed in index order, each with its posts in element order.
    pub fn page_snapshots(&self, feed_id: &str) -> Result<Vec<(PageRecord, Vec<PostRecord>)>> {
        self.database.with_repositories(|repos| {
            let pages = repos.pages().list_for_feed(feed_id)?;
            let mut snapshots = Vec::with_capacity(pages.len());
            for page in pages {
                let posts = repos.posts().list_for_page(&page.id)?;
                snapshots.push((page, posts));
            }
            Ok(snapshots)
        })
    }

    /// Drops the feed and its pages (cascade). The next fetch starts at
    /// page 0 again.
    pub fn reset_feed(&self, feed_id: &str) -> Result<()> {
        self.database.with_transaction(|repos| {
            repos.feeds().delete(feed_id)?;
            Ok(((), vec![Entity::Feed, Entity::Page]))
        })
    }
}

/// Owns one feed's fetch lifecycle. At most one network fetch is in flight
/// per controller; overlapping `load_next_page` calls are coalesced, never
/// queued.
pub struct FeedController {
    database: Database,
    api: Arc<dyn LemmyApi>,
    importer: ImportService,
    alerts: Arc<dyn AlertSink>,
    feed: FeedRecord,
    page_limit: u32,
    state: Mutex<FetchState>,
}

impl FeedController {
    pub fn new(
        database: Database,
        api: Arc<dyn LemmyApi>,
        metrics: Arc<IntegrityMetrics>,
        alerts: Arc<dyn AlertSink>,
        feed: FeedRecord,
        page_limit: u32,
    ) -> Self {
        let importer = ImportService::new(database.clone(), metrics);
        Self {
            database,
            api,
            importer,
            alerts,
            feed,
            page_limit,
            state: Mutex::new(FetchState::Idle),
        }
    }

    pub fn fetch_state(&self) -> FetchState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(FetchState::Idle)
    }

    /// Fetches and appends the next page. Network failures are reported to
    /// the alert sink and yield `LoadOutcome::Failed`; `Err` is reserved for
    /// store failures, which the caller treats as fatal.
    pub async fn load_next_page(&self) -> Result<LoadOutcome> {
        let page_index = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow!("fetch state mutex poisoned"))?;
            if matches!(*state, FetchState::Fetching { .. }) {
                return Ok(LoadOutcome::AlreadyFetching);
            }
            let page_index = self
                .database
                .with_repositories(|repos| repos.pages().count_for_feed(&self.feed.id))?;
            *state = FetchState::Fetching { page_index };
            page_index
        };

        let outcome = self.fetch_and_append(page_index).await;
        if let Ok(mut state) = self.state.lock() {
            *state = FetchState::Idle;
        }
        outcome
    }

    async fn fetch_and_append(&self, page_index: i64) -> Result<LoadOutcome> {
        // Community feeds are requested as `name@host` so the right remote
        // community resolves no matter which site serves the request.
        let community_name = match (&self.feed.community_name, &self.feed.community_instance) {
            (Some(name), Some(instance)) => {
                Some(format!("{name}@{}", instance.trim_start_matches("https://")))
            }
            (Some(name), None) => Some(name.clone()),
            _ => None,
        };
        let params = ListPostsParams {
            listing_type: self.feed.listing_type.clone(),
            sort_type: self.feed.sort_type.clone(),
            community_name,
            // The server counts pages from 1.
            page: page_index as u32 + 1,
            limit: self.page_limit,
        };
        let views = match self.api.list_posts(params).await {
            Ok(views) => views,
            Err(err) => {
                self.alerts.alert(err.kind(), &err);
                return Ok(LoadOutcome::Failed);
            }
        };

        let appended = self
            .importer
            .append_page(&self.feed, &views)
            .with_context(|| format!("appending page {page_index} to feed {}", self.feed.id))?;
        tracing::debug!(
            feed_id = %self.feed.id,
            page_index = appended.page.page_index,
            elements = appended.element_count,
            changed = appended.posts_changed,
            "appended feed page"
        );
        Ok(LoadOutcome::Appended {
            page_index: appended.page.page_index,
            element_count: appended.element_count,
        })
    }
}

//! Periodic background refresh: site info first, then every feed the
//! configured site's accounts subscribe to.

use std::sync::Arc;

use anyhow::Result;
use tokio::time::interval;

use crate::api::LemmyApi;
use crate::config::RefreshConfig;
use crate::database::models::FeedRecord;
use crate::database::repositories::{AccountRepository, FeedRepository};
use crate::database::Database;
use crate::feeds::{AlertSink, FeedController, LoadOutcome};
use crate::metrics::IntegrityMetrics;
use crate::resolver::SiteResolver;

pub struct RefreshScheduler {
    database: Database,
    api: Arc<dyn LemmyApi>,
    resolver: SiteResolver,
    metrics: Arc<IntegrityMetrics>,
    alerts: Arc<dyn AlertSink>,
    instance_url: String,
    config: RefreshConfig,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RefreshReport {
    pub site_info_updated: bool,
    pub feeds_refreshed: usize,
    pub feeds_failed: usize,
}

impl RefreshScheduler {
    pub fn new(
        database: Database,
        api: Arc<dyn LemmyApi>,
        resolver: SiteResolver,
        metrics: Arc<IntegrityMetrics>,
        alerts: Arc<dyn AlertSink>,
        instance_url: impl Into<String>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            database,
            api,
            resolver,
            metrics,
            alerts,
            instance_url: instance_url.into(),
            config,
        }
    }

    /// One refresh cycle. Site-info and per-feed fetch failures are logged
    /// and skipped; only store failures propagate.
    pub async fn refresh_once(&self) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();
        let site = self.resolver.site_for_url(&self.instance_url)?;

        match self.api.get_site().await {
            Ok(info) => {
                self.resolver.update_site_info(&site, &info)?;
                report.site_info_updated = true;
            }
            Err(err) => {
                self.alerts.alert(err.kind(), &err);
            }
        }

        for feed in self.subscribed_feeds(&site.id)? {
            let controller = FeedController::new(
                self.database.clone(),
                Arc::clone(&self.api),
                Arc::clone(&self.metrics),
                Arc::clone(&self.alerts),
                feed,
                self.config.page_limit,
            );
            match controller.load_next_page().await? {
                LoadOutcome::Appended { .. } => report.feeds_refreshed += 1,
                LoadOutcome::Failed => report.feeds_failed += 1,
                LoadOutcome::AlreadyFetching => {}
            }
        }
        Ok(report)
    }

    /// Runs refresh cycles forever at the configured interval. Store errors
    /// terminate the loop; everything else is logged and retried next tick.
    pub async fn run(&self) -> Result<()> {
        let mut ticker = interval(self.config.interval);
        loop {
            ticker.tick().await;
            let report = self.refresh_once().await?;
            tracing::info!(
                site_info_updated = report.site_info_updated,
                feeds_refreshed = report.feeds_refreshed,
                feeds_failed = report.feeds_failed,
                "refresh cycle complete"
            );
        }
    }

    fn subscribed_feeds(&self, site_id: &str) -> Result<Vec<FeedRecord>> {
        self.database.with_repositories(|repos| {
            let mut feeds = Vec::new();
            for account in repos.accounts().list_for_site(site_id)? {
                feeds.extend(repos.feeds().list_for_account(&account.id)?);
            }
            Ok(feeds)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        ApiError, CommentView, ListCommentsParams, ListPostsParams, PostView, SiteInfo,
    };
    use crate::feeds::{FeedService, FeedSpec, TracingAlerts};
    use async_trait::async_trait;
    use rusqlite::Connection;

    struct StaticApi;

    #[async_trait]
    impl LemmyApi for StaticApi {
        async fn list_posts(&self, _params: ListPostsParams) -> Result<Vec<PostView>, ApiError> {
            Ok(Vec::new())
        }

        async fn list_comments(
            &self,
            _params: ListCommentsParams,
        ) -> Result<Vec<CommentView>, ApiError> {
            Ok(Vec::new())
        }

        async fn get_site(&self) -> Result<SiteInfo, ApiError> {
            Ok(SiteInfo {
                name: Some("Test Site".into()),
                software: Some("lemmy 0.19".into()),
                default_listing_type: Some("Local".into()),
                default_sort_type: Some("Active".into()),
            })
        }
    }

    #[tokio::test]
    async fn refresh_updates_site_info_and_feeds() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let database = Database::from_connection(conn, true);
        database.ensure_migrations().expect("migrations");

        let metrics = Arc::new(IntegrityMetrics::new());
        let resolver = SiteResolver::new(database.clone(), Arc::clone(&metrics));
        let site = resolver.site_for_url("lemmy.world").expect("site");
        let account = resolver.signed_out_account(&site).expect("account");
        FeedService::new(database.clone())
            .get_or_create_feed(
                &account.id,
                &FeedSpec::Frontpage {
                    listing_type: "All".into(),
                    sort_type: "Hot".into(),
                },
            )
            .expect("feed");

        let scheduler = RefreshScheduler::new(
            database.clone(),
            Arc::new(StaticApi),
            resolver.clone(),
            metrics,
            Arc::new(TracingAlerts),
            "lemmy.world",
            RefreshConfig::default(),
        );

        let report = scheduler.refresh_once().await.expect("refresh");
        assert!(report.site_info_updated);
        assert_eq!(report.feeds_refreshed, 1);
        assert_eq!(report.feeds_failed, 0);

        let refreshed = resolver.site_for_url("lemmy.world").expect("site again");
        assert_eq!(refreshed.name.as_deref(), Some("Test Site"));
        assert_eq!(refreshed.default_sort_type.as_deref(), Some("Active"));
        assert!(refreshed.site_info_fetched_at.is_some());
    }
}

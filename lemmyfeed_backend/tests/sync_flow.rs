use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lemmyfeed_backend::api::{
    ApiError, CommentCounts, CommentDto, CommentView, CommunityDto, LemmyApi, ListCommentsParams,
    ListPostsParams, PersonDto, PostCounts, PostDto, PostView, SiteInfo,
};
use lemmyfeed_backend::comment_tree::find_comments_with_missing_children;
use lemmyfeed_backend::config::LemmyfeedPaths;
use lemmyfeed_backend::database::Database;
use lemmyfeed_backend::feeds::{FeedController, FeedService, FeedSpec, LoadOutcome, TracingAlerts};
use lemmyfeed_backend::importer::ImportService;
use lemmyfeed_backend::metrics::IntegrityMetrics;
use lemmyfeed_backend::resolver::SiteResolver;
use lemmyfeed_backend::widget::TopPosts;
use tempfile::TempDir;

/// Serves a deterministic two-page feed: page 1 is posts 1..=3, page 2 is
/// posts 3..=5 (post 3 repeats, as real paginated feeds do when content
/// shifts underneath the client).
struct PagedApi {
    post_calls: AtomicUsize,
}

impl PagedApi {
    fn new() -> Self {
        Self {
            post_calls: AtomicUsize::new(0),
        }
    }

    fn post_view(post_id: i64) -> PostView {
        PostView {
            post: PostDto {
                id: post_id,
                name: format!("Post {post_id}"),
                url: Some(format!("https://lemmy.world/post/{post_id}")),
                body: None,
                thumbnail_url: None,
                embed_title: None,
                ap_id: Some(format!("https://lemmy.world/post/{post_id}")),
                published: "2024-05-01T12:00:00Z".into(),
                updated: None,
            },
            creator: PersonDto {
                id: 100,
                name: "author".into(),
                display_name: None,
                avatar: None,
                actor_id: Some("https://lemmy.world/u/author".into()),
                bot_account: false,
            },
            community: CommunityDto {
                id: 7,
                name: "rust".into(),
                actor_id: Some("https://lemmy.world/c/rust".into()),
            },
            counts: PostCounts {
                score: 100 - post_id,
                comments: 2,
            },
            my_vote: None,
            saved: false,
            read: false,
        }
    }

    fn comment_view(comment_id: i64, path: &str, child_count: i64) -> CommentView {
        CommentView {
            comment: CommentDto {
                id: comment_id,
                content: format!("comment {comment_id}"),
                path: path.into(),
                published: "2024-05-01T13:00:00Z".into(),
                updated: None,
            },
            creator: PersonDto {
                id: 200,
                name: "commenter".into(),
                display_name: None,
                avatar: None,
                actor_id: None,
                bot_account: false,
            },
            counts: CommentCounts {
                score: 1,
                child_count,
            },
        }
    }
}

#[async_trait]
impl LemmyApi for PagedApi {
    async fn list_posts(&self, params: ListPostsParams) -> Result<Vec<PostView>, ApiError> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        let ids: Vec<i64> = match params.page {
            1 => vec![1, 2, 3],
            2 => vec![3, 4, 5],
            _ => Vec::new(),
        };
        Ok(ids.into_iter().map(Self::post_view).collect())
    }

    async fn list_comments(
        &self,
        _params: ListCommentsParams,
    ) -> Result<Vec<CommentView>, ApiError> {
        // A depth-limited tree: comment 8 promises a child the batch lacks.
        Ok(vec![
            Self::comment_view(1, "0.1", 1),
            Self::comment_view(4, "0.1.4", 0),
            Self::comment_view(8, "0.8", 1),
        ])
    }

    async fn get_site(&self) -> Result<SiteInfo, ApiError> {
        Ok(SiteInfo {
            name: Some("Lemmy World".into()),
            software: Some("lemmy 0.19".into()),
            default_listing_type: Some("All".into()),
            default_sort_type: Some("Hot".into()),
        })
    }
}

struct TestHarness {
    _dir: TempDir,
    database: Database,
    api: Arc<PagedApi>,
    metrics: Arc<IntegrityMetrics>,
    resolver: SiteResolver,
    feed_service: FeedService,
}

fn harness() -> TestHarness {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = LemmyfeedPaths::from_base_dir(dir.path()).expect("paths");
    let database = Database::open(&paths).expect("open store");
    let metrics = Arc::new(IntegrityMetrics::new());
    let resolver = SiteResolver::new(database.clone(), Arc::clone(&metrics));
    let feed_service = FeedService::new(database.clone());
    TestHarness {
        _dir: dir,
        database,
        api: Arc::new(PagedApi::new()),
        metrics,
        resolver,
        feed_service,
    }
}

impl TestHarness {
    fn controller(&self, feed: lemmyfeed_backend::database::models::FeedRecord) -> FeedController {
        FeedController::new(
            self.database.clone(),
            self.api.clone(),
            Arc::clone(&self.metrics),
            Arc::new(TracingAlerts),
            feed,
            25,
        )
    }
}

#[tokio::test]
async fn two_page_sync_builds_a_consistent_feed() {
    let h = harness();
    let site = h.resolver.site_for_url("https://Lemmy.World/").expect("site");
    let account = h.resolver.signed_out_account(&site).expect("account");
    let feed = h
        .feed_service
        .get_or_create_feed(
            &account.id,
            &FeedSpec::Frontpage {
                listing_type: "All".into(),
                sort_type: "Hot".into(),
            },
        )
        .expect("feed");

    let controller = h.controller(feed.clone());
    for expected in 0..2 {
        let outcome = controller.load_next_page().await.expect("load");
        assert_eq!(
            outcome,
            LoadOutcome::Appended {
                page_index: expected,
                element_count: 3
            }
        );
    }
    assert_eq!(h.api.post_calls.load(Ordering::SeqCst), 2);

    let snapshots = h.feed_service.page_snapshots(&feed.id).expect("snapshots");
    let indices: Vec<i64> = snapshots.iter().map(|(page, _)| page.page_index).collect();
    assert_eq!(indices, vec![0, 1]);

    // Post 3 appears on both pages but has exactly one row.
    let first_page_post_3 = &snapshots[0].1[2];
    let second_page_post_3 = &snapshots[1].1[0];
    assert_eq!(first_page_post_3.post_id, 3);
    assert_eq!(first_page_post_3.id, second_page_post_3.id);

    // The widget snapshot dedupes the repeat and round-trips through disk.
    let snapshot = TopPosts::from_feed(&h.database, &feed.id).expect("widget snapshot");
    assert_eq!(snapshot.posts.len(), 5);
    let paths = LemmyfeedPaths::from_base_dir(h._dir.path()).expect("paths");
    snapshot
        .write_snapshot(&paths.widget_snapshot_path)
        .expect("write");
    let loaded = TopPosts::read_snapshot(&paths.widget_snapshot_path)
        .expect("read")
        .expect("present");
    assert_eq!(loaded, snapshot);

    // Nothing along the way tripped an integrity anomaly.
    let integrity = h.metrics.snapshot();
    assert_eq!(integrity.duplicate_posts, 0);
    assert_eq!(integrity.duplicate_accounts, 0);
}

#[tokio::test]
async fn re_syncing_identical_content_appends_quiet_pages() {
    let h = harness();
    let site = h.resolver.site_for_url("lemmy.world").expect("site");
    let account = h.resolver.signed_out_account(&site).expect("account");
    let feed = h
        .feed_service
        .get_or_create_feed(
            &account.id,
            &FeedSpec::Frontpage {
                listing_type: "All".into(),
                sort_type: "Hot".into(),
            },
        )
        .expect("feed");

    let controller = h.controller(feed.clone());
    controller.load_next_page().await.expect("first page");

    use lemmyfeed_backend::database::changes::Entity;
    let post_version = h.database.changes().version(Entity::Post);

    // The fake serves overlapping content for page 2; the three repeated
    // posts upsert to their existing rows without a post-entity change.
    controller.load_next_page().await.expect("second page");
    let snapshots = h.feed_service.page_snapshots(&feed.id).expect("snapshots");
    assert_eq!(snapshots.len(), 2);

    // Posts 4 and 5 are new, so the post version moves; page version always
    // moves because appending is append-only by design.
    assert!(h.database.changes().version(Entity::Post) > post_version);
    assert!(h.database.changes().version(Entity::Page) >= 2);
}

#[tokio::test]
async fn comment_import_flags_starved_subtrees_for_follow_up() {
    let h = harness();
    let site = h.resolver.site_for_url("lemmy.world").expect("site");
    let account = h.resolver.signed_out_account(&site).expect("account");

    let importer = ImportService::new(h.database.clone(), Arc::clone(&h.metrics));
    let post = importer
        .upsert_post(&PagedApi::post_view(1), &account)
        .expect("post row");

    let batch = h
        .api
        .list_comments(ListCommentsParams {
            post_id: 1,
            sort_type: "Hot".into(),
            page: 1,
            limit: 50,
            max_depth: Some(2),
        })
        .await
        .expect("comments");

    let stats = importer.import_comments(&post, &batch).expect("import");
    assert_eq!(stats.created, 3);

    // The reconciler points at exactly the subtree that needs a follow-up
    // fetch; it is a signal, not an error.
    let flagged = find_comments_with_missing_children(&batch);
    let flagged_paths: Vec<&str> = flagged.iter().map(|v| v.comment.path.as_str()).collect();
    assert_eq!(flagged_paths, vec!["0.8"]);
}

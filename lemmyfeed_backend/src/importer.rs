//! The upsert/import engine.
//!
//! Converts batches of server DTOs into store rows by identity key. Every
//! entry point runs one coherent write transaction; re-importing identical
//! content leaves rows untouched and publishes no change versions.

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::api::{CommentView, PersonDto, PostView};
use crate::database::changes::Entity;
use crate::database::models::{
    AccountRecord, CommentRecord, FeedRecord, PageElementRecord, PageRecord, PersonRecord,
    PostRecord,
};
use crate::database::repositories::{
    AccountRepository, CommentRepository, PageRepository, PersonRepository, PostRepository,
    SqliteRepositories,
};
use crate::database::Database;
use crate::identity::normalized_instance_url;
use crate::metrics::{note_duplicates, IntegrityMetrics};
use crate::utils::now_utc_iso;

#[derive(Clone)]
pub struct ImportService {
    database: Database,
    metrics: Arc<IntegrityMetrics>,
}

#[derive(Debug, Clone)]
pub struct AppendedPage {
    pub page: PageRecord,
    pub element_count: usize,
    /// How many post rows were actually created or modified. Zero means the
    /// server sent nothing we had not already stored verbatim.
    pub posts_changed: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportedComments {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ImportService {
    pub fn new(database: Database, metrics: Arc<IntegrityMetrics>) -> Self {
        Self { database, metrics }
    }

    /// Creates or updates one post row keyed by `(post_id, account)`.
    pub fn upsert_post(&self, view: &PostView, account: &AccountRecord) -> Result<PostRecord> {
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let (record, changed) = upsert_post_in(&repos, &metrics, view, account)?;
            let touched = if changed {
                vec![Entity::Post, Entity::Person]
            } else {
                Vec::new()
            };
            Ok((record, touched))
        })
    }

    /// Creates or updates one person row keyed by `(person_id, site)`.
    pub fn upsert_person(&self, dto: &PersonDto, site_id: &str) -> Result<PersonRecord> {
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let (record, changed) = upsert_person_in(&repos, &metrics, dto, site_id)?;
            let touched = if changed { vec![Entity::Person] } else { Vec::new() };
            Ok((record, touched))
        })
    }

    /// Appends one fetched page to a feed: allocates the next sequential page
    /// index, upserts every post in DTO order, and creates elements with
    /// contiguous indices. Append-only by design — refreshing adds a new page
    /// rather than replacing an old one, and consumers dedupe at display time.
    pub fn append_page(&self, feed: &FeedRecord, views: &[PostView]) -> Result<AppendedPage> {
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let account = repos
                .accounts()
                .get(&feed.account_id)?
                .with_context(|| format!("feed {} has no account", feed.id))?;

            let page_index = repos.pages().count_for_feed(&feed.id)?;
            let page = PageRecord {
                id: Uuid::new_v4().to_string(),
                feed_id: feed.id.clone(),
                page_index,
                created_at: now_utc_iso(),
            };
            repos.pages().create_page(&page)?;

            let mut posts_changed = 0;
            for (element_index, view) in views.iter().enumerate() {
                let (post, changed) = upsert_post_in(&repos, &metrics, view, &account)?;
                if changed {
                    posts_changed += 1;
                }
                repos.pages().create_element(&PageElementRecord {
                    id: Uuid::new_v4().to_string(),
                    page_id: page.id.clone(),
                    element_index: element_index as i64,
                    post_row_id: post.id,
                })?;
            }

            let mut touched = vec![Entity::Page];
            if posts_changed > 0 {
                touched.push(Entity::Post);
                touched.push(Entity::Person);
            }
            let appended = AppendedPage {
                page,
                element_count: views.len(),
                posts_changed,
            };
            Ok((appended, touched))
        })
    }

    /// Upserts a batch of comments (and their creators) for one post row,
    /// keyed by `(comment_id, post)`. Paths and child counts are stored as
    /// reported; gap detection is the reconciler's job, not this one's.
    pub fn import_comments(
        &self,
        post: &PostRecord,
        views: &[CommentView],
    ) -> Result<ImportedComments> {
        let metrics = Arc::clone(&self.metrics);
        self.database.with_transaction(|repos| {
            let account = repos
                .accounts()
                .get(&post.account_id)?
                .with_context(|| format!("post {} has no account", post.id))?;

            let mut stats = ImportedComments::default();
            let mut persons_changed = false;
            for view in views {
                let (creator, creator_changed) =
                    upsert_person_in(&repos, &metrics, &view.creator, &account.site_id)?;
                persons_changed |= creator_changed;

                let comments = repos.comments();
                let existing = comments.find_by_key(view.comment.id, &post.id)?;
                note_duplicates(
                    &metrics.duplicate_comments,
                    "comment",
                    &format!("({}, {})", view.comment.id, post.id),
                    existing.len(),
                );
                match existing.into_iter().next() {
                    Some(mut record) => {
                        if apply_comment_view(&mut record, view, Some(creator.id)) {
                            record.updated_at = now_utc_iso();
                            comments.update(&record)?;
                            stats.updated += 1;
                        } else {
                            stats.unchanged += 1;
                        }
                    }
                    None => {
                        let now = now_utc_iso();
                        let mut record = CommentRecord {
                            id: Uuid::new_v4().to_string(),
                            comment_id: view.comment.id,
                            post_row_id: post.id.clone(),
                            path: String::new(),
                            child_count: 0,
                            body: String::new(),
                            creator_person_id: None,
                            score: 0,
                            published_at: String::new(),
                            edited_at: None,
                            created_at: now.clone(),
                            updated_at: now,
                        };
                        apply_comment_view(&mut record, view, Some(creator.id));
                        comments.create(&record)?;
                        stats.created += 1;
                    }
                }
            }

            let mut touched = Vec::new();
            if stats.created > 0 || stats.updated > 0 {
                touched.push(Entity::Comment);
            }
            if persons_changed {
                touched.push(Entity::Person);
            }
            Ok((stats, touched))
        })
    }
}

/// Display label for a community: `name@host` when the community's actor id
/// names a reachable origin, bare `name` otherwise. A malformed server URL is
/// skipped and logged, never fatal.
fn community_label(
    metrics: &IntegrityMetrics,
    name: &str,
    actor_id: Option<&str>,
) -> String {
    let Some(actor_id) = actor_id else {
        return name.to_string();
    };
    match normalized_instance_url(actor_id) {
        Some(origin) => {
            let host = origin.trim_start_matches("https://");
            format!("{name}@{host}")
        }
        None => {
            tracing::warn!(actor_id, "skipping malformed community actor id from server");
            metrics
                .skipped_malformed_urls
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            name.to_string()
        }
    }
}

fn upsert_person_in(
    repos: &SqliteRepositories<'_>,
    metrics: &IntegrityMetrics,
    dto: &PersonDto,
    site_id: &str,
) -> Result<(PersonRecord, bool)> {
    let persons = repos.persons();
    let existing = persons.find_by_key(dto.id, site_id)?;
    note_duplicates(
        &metrics.duplicate_persons,
        "person",
        &format!("({}, {site_id})", dto.id),
        existing.len(),
    );
    match existing.into_iter().next() {
        Some(mut record) => {
            if apply_person_dto(&mut record, dto) {
                record.updated_at = now_utc_iso();
                persons.update(&record)?;
                Ok((record, true))
            } else {
                Ok((record, false))
            }
        }
        None => {
            let now = now_utc_iso();
            let mut record = PersonRecord {
                id: Uuid::new_v4().to_string(),
                person_id: dto.id,
                site_id: site_id.to_string(),
                name: String::new(),
                display_name: None,
                avatar_url: None,
                actor_id: None,
                bot: false,
                created_at: now.clone(),
                updated_at: now,
            };
            apply_person_dto(&mut record, dto);
            persons.create(&record)?;
            Ok((record, true))
        }
    }
}

fn upsert_post_in(
    repos: &SqliteRepositories<'_>,
    metrics: &IntegrityMetrics,
    view: &PostView,
    account: &AccountRecord,
) -> Result<(PostRecord, bool)> {
    let (creator, creator_changed) =
        upsert_person_in(repos, metrics, &view.creator, &account.site_id)?;
    let community = community_label(
        metrics,
        &view.community.name,
        view.community.actor_id.as_deref(),
    );

    let posts = repos.posts();
    let existing = posts.find_by_key(view.post.id, &account.id)?;
    note_duplicates(
        &metrics.duplicate_posts,
        "post",
        &format!("({}, {})", view.post.id, account.id),
        existing.len(),
    );
    match existing.into_iter().next() {
        Some(mut record) => {
            if apply_post_view(&mut record, view, Some(creator.id), community) {
                record.updated_at = now_utc_iso();
                posts.update(&record)?;
                Ok((record, true))
            } else {
                Ok((record, creator_changed))
            }
        }
        None => {
            let now = now_utc_iso();
            let mut record = PostRecord {
                id: Uuid::new_v4().to_string(),
                post_id: view.post.id,
                account_id: account.id.clone(),
                title: String::new(),
                community_name: String::new(),
                url: None,
                body: None,
                thumbnail_url: None,
                embed_title: None,
                creator_person_id: None,
                score: 0,
                comment_count: 0,
                my_vote: None,
                saved: false,
                read: false,
                published_at: String::new(),
                edited_at: None,
                created_at: now.clone(),
                updated_at: now,
            };
            apply_post_view(&mut record, view, Some(creator.id), community);
            posts.create(&record)?;
            Ok((record, true))
        }
    }
}

macro_rules! assign_if_changed {
    ($changed:ident, $field:expr, $value:expr) => {
        let value = $value;
        if $field != value {
            $field = value;
            $changed = true;
        }
    };
}

/// Overwrites the server-owned scalars; returns whether anything moved.
fn apply_post_view(
    record: &mut PostRecord,
    view: &PostView,
    creator_person_id: Option<String>,
    community_name: String,
) -> bool {
    let mut changed = false;
    assign_if_changed!(changed, record.title, view.post.name.clone());
    assign_if_changed!(changed, record.community_name, community_name);
    assign_if_changed!(changed, record.url, view.post.url.clone());
    assign_if_changed!(changed, record.body, view.post.body.clone());
    assign_if_changed!(changed, record.thumbnail_url, view.post.thumbnail_url.clone());
    assign_if_changed!(changed, record.embed_title, view.post.embed_title.clone());
    assign_if_changed!(changed, record.creator_person_id, creator_person_id);
    assign_if_changed!(changed, record.score, view.counts.score);
    assign_if_changed!(changed, record.comment_count, view.counts.comments);
    assign_if_changed!(changed, record.my_vote, view.my_vote);
    assign_if_changed!(changed, record.saved, view.saved);
    assign_if_changed!(changed, record.read, view.read);
    assign_if_changed!(changed, record.published_at, view.post.published.clone());
    assign_if_changed!(changed, record.edited_at, view.post.updated.clone());
    changed
}

fn apply_person_dto(record: &mut PersonRecord, dto: &PersonDto) -> bool {
    let mut changed = false;
    assign_if_changed!(changed, record.name, dto.name.clone());
    assign_if_changed!(changed, record.display_name, dto.display_name.clone());
    assign_if_changed!(changed, record.avatar_url, dto.avatar.clone());
    assign_if_changed!(changed, record.actor_id, dto.actor_id.clone());
    assign_if_changed!(changed, record.bot, dto.bot_account);
    changed
}

fn apply_comment_view(
    record: &mut CommentRecord,
    view: &CommentView,
    creator_person_id: Option<String>,
) -> bool {
    let mut changed = false;
    assign_if_changed!(changed, record.path, view.comment.path.clone());
    assign_if_changed!(changed, record.child_count, view.counts.child_count);
    assign_if_changed!(changed, record.body, view.comment.content.clone());
    assign_if_changed!(changed, record.creator_person_id, creator_person_id);
    assign_if_changed!(changed, record.score, view.counts.score);
    assign_if_changed!(changed, record.published_at, view.comment.published.clone());
    assign_if_changed!(changed, record.edited_at, view.comment.updated.clone());
    changed
}

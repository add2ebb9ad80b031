mod accounts;
mod comments;
mod feeds;
mod instances;
mod pages;
mod persons;
mod posts;
mod sites;

use super::models::{
    AccountRecord, CommentRecord, FeedRecord, InstanceRecord, PageElementRecord, PageRecord,
    PersonRecord, PostRecord, SiteRecord,
};
use anyhow::Result;
use rusqlite::Connection;

pub trait InstanceRepository {
    fn create(&self, record: &InstanceRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<InstanceRecord>>;
    /// All rows for one actor id, oldest first. Callers expecting one row
    /// take the first and report the rest as an integrity anomaly.
    fn find_by_actor_id(&self, actor_id: &str) -> Result<Vec<InstanceRecord>>;
}

pub trait SiteRepository {
    fn create(&self, record: &SiteRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<SiteRecord>>;
    fn find_by_instance(&self, instance_id: &str) -> Result<Vec<SiteRecord>>;
    fn list_all(&self) -> Result<Vec<SiteRecord>>;
    fn update_site_info(&self, record: &SiteRecord) -> Result<()>;
}

pub trait AccountRepository {
    fn create(&self, record: &AccountRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<AccountRecord>>;
    fn find_signed_out(&self, site_id: &str) -> Result<Vec<AccountRecord>>;
    fn list_for_site(&self, site_id: &str) -> Result<Vec<AccountRecord>>;
}

pub trait PersonRepository {
    fn create(&self, record: &PersonRecord) -> Result<()>;
    fn update(&self, record: &PersonRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PersonRecord>>;
    fn find_by_key(&self, person_id: i64, site_id: &str) -> Result<Vec<PersonRecord>>;
}

pub trait PostRepository {
    fn create(&self, record: &PostRecord) -> Result<()>;
    fn update(&self, record: &PostRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<PostRecord>>;
    fn find_by_key(&self, post_id: i64, account_id: &str) -> Result<Vec<PostRecord>>;
    /// Posts of one page in element order.
    fn list_for_page(&self, page_id: &str) -> Result<Vec<PostRecord>>;
}

pub trait FeedRepository {
    fn create(&self, record: &FeedRecord) -> Result<()>;
    fn get(&self, id: &str) -> Result<Option<FeedRecord>>;
    fn find_matching(&self, probe: &FeedRecord) -> Result<Vec<FeedRecord>>;
    fn list_for_account(&self, account_id: &str) -> Result<Vec<FeedRecord>>;
    fn list_all(&self) -> Result<Vec<FeedRecord>>;
    /// Deletes the feed; pages and elements cascade.
    fn delete(&self, feed_id: &str) -> Result<()>;
}

pub trait PageRepository {
    fn create_page(&self, record: &PageRecord) -> Result<()>;
    fn create_element(&self, record: &PageElementRecord) -> Result<()>;
    fn count_for_feed(&self, feed_id: &str) -> Result<i64>;
    /// Pages of one feed ordered by index.
    fn list_for_feed(&self, feed_id: &str) -> Result<Vec<PageRecord>>;
    /// Elements of one page ordered by index.
    fn elements_for_page(&self, page_id: &str) -> Result<Vec<PageElementRecord>>;
}

pub trait CommentRepository {
    fn create(&self, record: &CommentRecord) -> Result<()>;
    fn update(&self, record: &CommentRecord) -> Result<()>;
    fn find_by_key(&self, comment_id: i64, post_row_id: &str) -> Result<Vec<CommentRecord>>;
    fn list_for_post(&self, post_row_id: &str) -> Result<Vec<CommentRecord>>;
}

/// Facade handing out rusqlite-backed repository implementations.
pub struct SqliteRepositories<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRepositories<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn instances(&self) -> impl InstanceRepository + '_ {
        instances::SqliteInstanceRepository { conn: self.conn }
    }

    pub fn sites(&self) -> impl SiteRepository + '_ {
        sites::SqliteSiteRepository { conn: self.conn }
    }

    pub fn accounts(&self) -> impl AccountRepository + '_ {
        accounts::SqliteAccountRepository { conn: self.conn }
    }

    pub fn persons(&self) -> impl PersonRepository + '_ {
        persons::SqlitePersonRepository { conn: self.conn }
    }

    pub fn posts(&self) -> impl PostRepository + '_ {
        posts::SqlitePostRepository { conn: self.conn }
    }

    pub fn feeds(&self) -> impl FeedRepository + '_ {
        feeds::SqliteFeedRepository { conn: self.conn }
    }

    pub fn pages(&self) -> impl PageRepository + '_ {
        pages::SqlitePageRepository { conn: self.conn }
    }

    pub fn comments(&self) -> impl CommentRepository + '_ {
        comments::SqliteCommentRepository { conn: self.conn }
    }

    pub fn conn(&self) -> &'conn Connection {
        self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MIGRATIONS;
    use crate::utils::now_utc_iso;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory db");
        conn.execute_batch(MIGRATIONS).expect("migrations");
        conn
    }

    fn seed_account(repos: &SqliteRepositories<'_>) -> AccountRecord {
        let now = now_utc_iso();
        let instance = InstanceRecord {
            id: "instance-1".into(),
            actor_id: "https://lemmy.world".into(),
            created_at: now.clone(),
        };
        repos.instances().create(&instance).unwrap();

        let site = SiteRecord {
            id: "site-1".into(),
            instance_id: instance.id.clone(),
            name: None,
            software: None,
            default_listing_type: None,
            default_sort_type: None,
            site_info_fetched_at: None,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        repos.sites().create(&site).unwrap();

        let account = AccountRecord {
            id: "account-1".into(),
            site_id: site.id.clone(),
            username: None,
            signed_out: true,
            created_at: now.clone(),
            updated_at: now,
        };
        repos.accounts().create(&account).unwrap();
        account
    }

    fn sample_post(account: &AccountRecord, post_id: i64, row_id: &str) -> PostRecord {
        let now = now_utc_iso();
        PostRecord {
            id: row_id.into(),
            post_id,
            account_id: account.id.clone(),
            title: format!("Post {post_id}"),
            community_name: "rust".into(),
            url: None,
            body: Some("body".into()),
            thumbnail_url: None,
            embed_title: None,
            creator_person_id: None,
            score: 1,
            comment_count: 0,
            my_vote: None,
            saved: false,
            read: false,
            published_at: now.clone(),
            edited_at: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn post_lookup_is_scoped_by_account() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let account = seed_account(&repos);

        let other = AccountRecord {
            id: "account-2".into(),
            signed_out: false,
            ..account.clone()
        };
        repos.accounts().create(&other).unwrap();

        repos.posts().create(&sample_post(&account, 5, "post-a")).unwrap();
        repos.posts().create(&sample_post(&other, 5, "post-b")).unwrap();

        let for_first = repos.posts().find_by_key(5, &account.id).unwrap();
        assert_eq!(for_first.len(), 1);
        assert_eq!(for_first[0].id, "post-a");

        let for_second = repos.posts().find_by_key(5, &other.id).unwrap();
        assert_eq!(for_second.len(), 1);
        assert_eq!(for_second[0].id, "post-b");
    }

    #[test]
    fn duplicate_rows_come_back_oldest_first() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let account = seed_account(&repos);

        repos.posts().create(&sample_post(&account, 9, "post-old")).unwrap();
        let mut newer = sample_post(&account, 9, "post-new");
        newer.created_at = "2099-01-01T00:00:00+00:00".into();
        repos.posts().create(&newer).unwrap();

        let found = repos.posts().find_by_key(9, &account.id).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, "post-old");
    }

    #[test]
    fn pages_and_elements_keep_their_order() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let account = seed_account(&repos);
        let now = now_utc_iso();

        let feed = FeedRecord {
            id: "feed-1".into(),
            account_id: account.id.clone(),
            kind: "frontpage".into(),
            listing_type: Some("All".into()),
            sort_type: "Hot".into(),
            community_name: None,
            community_instance: None,
            created_at: now.clone(),
        };
        repos.feeds().create(&feed).unwrap();
        assert_eq!(repos.pages().count_for_feed(&feed.id).unwrap(), 0);

        for page_index in 0..2 {
            let page = PageRecord {
                id: format!("page-{page_index}"),
                feed_id: feed.id.clone(),
                page_index,
                created_at: now.clone(),
            };
            repos.pages().create_page(&page).unwrap();
        }
        assert_eq!(repos.pages().count_for_feed(&feed.id).unwrap(), 2);

        let post = sample_post(&account, 1, "post-1");
        repos.posts().create(&post).unwrap();
        // Insert out of order; reads must come back by index.
        for element_index in [1_i64, 0, 2] {
            let element = PageElementRecord {
                id: format!("element-{element_index}"),
                page_id: "page-0".into(),
                element_index,
                post_row_id: post.id.clone(),
            };
            repos.pages().create_element(&element).unwrap();
        }
        let elements = repos.pages().elements_for_page("page-0").unwrap();
        let indices: Vec<i64> = elements.iter().map(|e| e.element_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let pages = repos.pages().list_for_feed(&feed.id).unwrap();
        let indices: Vec<i64> = pages.iter().map(|p| p.page_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn deleting_a_feed_cascades_to_pages_and_elements() {
        let conn = setup_conn();
        let repos = SqliteRepositories::new(&conn);
        let account = seed_account(&repos);
        let now = now_utc_iso();

        let feed = FeedRecord {
            id: "feed-1".into(),
            account_id: account.id.clone(),
            kind: "frontpage".into(),
            listing_type: Some("All".into()),
            sort_type: "Hot".into(),
            community_name: None,
            community_instance: None,
            created_at: now.clone(),
        };
        repos.feeds().create(&feed).unwrap();
        let page = PageRecord {
            id: "page-0".into(),
            feed_id: feed.id.clone(),
            page_index: 0,
            created_at: now.clone(),
        };
        repos.pages().create_page(&page).unwrap();
        let post = sample_post(&account, 1, "post-1");
        repos.posts().create(&post).unwrap();
        repos
            .pages()
            .create_element(&PageElementRecord {
                id: "element-0".into(),
                page_id: page.id.clone(),
                element_index: 0,
                post_row_id: post.id.clone(),
            })
            .unwrap();

        repos.feeds().delete(&feed.id).unwrap();
        assert_eq!(repos.pages().count_for_feed(&feed.id).unwrap(), 0);
        assert!(repos.pages().elements_for_page(&page.id).unwrap().is_empty());
        // Posts survive their pages; they are pruned only with the account.
        assert!(repos.posts().get(&post.id).unwrap().is_some());
    }
}

pub mod changes;
pub mod models;
pub mod repositories;

use crate::config::LemmyfeedPaths;
use anyhow::{anyhow, Context, Result};
use self::changes::{ChangeHub, Entity};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub(crate) const MIGRATIONS: &str = r#"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS instances (
        id TEXT PRIMARY KEY,
        actor_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sites (
        id TEXT PRIMARY KEY,
        instance_id TEXT NOT NULL,
        name TEXT,
        software TEXT,
        default_listing_type TEXT,
        default_sort_type TEXT,
        site_info_fetched_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (instance_id) REFERENCES instances(id)
    );

    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        site_id TEXT NOT NULL,
        username TEXT,
        signed_out INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (site_id) REFERENCES sites(id)
    );

    CREATE TABLE IF NOT EXISTS persons (
        id TEXT PRIMARY KEY,
        person_id INTEGER NOT NULL,
        site_id TEXT NOT NULL,
        name TEXT NOT NULL,
        display_name TEXT,
        avatar_url TEXT,
        actor_id TEXT,
        bot INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (site_id) REFERENCES sites(id)
    );

    CREATE TABLE IF NOT EXISTS posts (
        id TEXT PRIMARY KEY,
        post_id INTEGER NOT NULL,
        account_id TEXT NOT NULL,
        title TEXT NOT NULL,
        community_name TEXT NOT NULL,
        url TEXT,
        body TEXT,
        thumbnail_url TEXT,
        embed_title TEXT,
        creator_person_id TEXT,
        score INTEGER NOT NULL DEFAULT 0,
        comment_count INTEGER NOT NULL DEFAULT 0,
        my_vote INTEGER,
        saved INTEGER NOT NULL DEFAULT 0,
        read INTEGER NOT NULL DEFAULT 0,
        published_at TEXT NOT NULL,
        edited_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (account_id) REFERENCES accounts(id),
        FOREIGN KEY (creator_person_id) REFERENCES persons(id)
    );

    CREATE TABLE IF NOT EXISTS feeds (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        listing_type TEXT,
        sort_type TEXT NOT NULL,
        community_name TEXT,
        community_instance TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (account_id) REFERENCES accounts(id)
    );

    CREATE TABLE IF NOT EXISTS pages (
        id TEXT PRIMARY KEY,
        feed_id TEXT NOT NULL,
        page_index INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (feed_id) REFERENCES feeds(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS page_elements (
        id TEXT PRIMARY KEY,
        page_id TEXT NOT NULL,
        element_index INTEGER NOT NULL,
        post_row_id TEXT NOT NULL,
        FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
        FOREIGN KEY (post_row_id) REFERENCES posts(id)
    );

    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        comment_id INTEGER NOT NULL,
        post_row_id TEXT NOT NULL,
        path TEXT NOT NULL,
        child_count INTEGER NOT NULL DEFAULT 0,
        body TEXT NOT NULL,
        creator_person_id TEXT,
        score INTEGER NOT NULL DEFAULT 0,
        published_at TEXT NOT NULL,
        edited_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (post_row_id) REFERENCES posts(id) ON DELETE CASCADE,
        FOREIGN KEY (creator_person_id) REFERENCES persons(id)
    );

    -- Identity lookups. Deliberately NOT unique: concurrent writers may race
    -- to create the same logical row and the first match wins at read time.
    CREATE INDEX IF NOT EXISTS idx_instances_actor ON instances(actor_id);
    CREATE INDEX IF NOT EXISTS idx_sites_instance ON sites(instance_id);
    CREATE INDEX IF NOT EXISTS idx_accounts_site ON accounts(site_id);
    CREATE INDEX IF NOT EXISTS idx_persons_key ON persons(person_id, site_id);
    CREATE INDEX IF NOT EXISTS idx_posts_key ON posts(post_id, account_id);
    CREATE INDEX IF NOT EXISTS idx_comments_key ON comments(comment_id, post_row_id);

    CREATE INDEX IF NOT EXISTS idx_feeds_account ON feeds(account_id);
    CREATE INDEX IF NOT EXISTS idx_pages_feed ON pages(feed_id, page_index);
    CREATE INDEX IF NOT EXISTS idx_page_elements_page ON page_elements(page_id, element_index);
    CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_row_id);
"#;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    changes: Arc<ChangeHub>,
    newly_created: bool,
}

impl Database {
    /// Opens the store at the configured path, running migrations. A store
    /// that fails to open or migrate is destroyed and recreated once; a
    /// second failure propagates, and the binary treats it as fatal.
    pub fn open(paths: &LemmyfeedPaths) -> Result<Self> {
        std::fs::create_dir_all(&paths.data_dir)
            .with_context(|| format!("creating data dir {}", paths.data_dir.display()))?;
        match Self::try_open(&paths.db_path) {
            Ok(db) => Ok(db),
            Err(err) => {
                tracing::error!(
                    error = ?err,
                    path = %paths.db_path.display(),
                    "store failed to open; destroying and recreating"
                );
                destroy_store_files(&paths.db_path)?;
                Self::try_open(&paths.db_path)
                    .context("store failed to open again after destroy-and-recreate")
            }
        }
    }

    fn try_open(db_path: &Path) -> Result<Self> {
        let newly_created = !db_path.exists();
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening store at {}", db_path.display()))?;
        let db = Self::from_connection(conn, newly_created);
        db.ensure_migrations()?;
        Ok(db)
    }

    pub fn from_connection(conn: Connection, newly_created: bool) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            changes: Arc::new(ChangeHub::new()),
            newly_created,
        }
    }

    pub fn ensure_migrations(&self) -> Result<bool> {
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATIONS)?;
            Ok(())
        })?;
        Ok(self.newly_created)
    }

    /// Destroys the backing file and its WAL siblings, then reopens an empty
    /// store over the same handle. Terminal recovery only; never speculative.
    pub fn reset_store(&self, paths: &LemmyfeedPaths) -> Result<()> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        destroy_store_files(&paths.db_path)?;
        *guard = Connection::open(&paths.db_path)
            .with_context(|| format!("reopening store at {}", paths.db_path.display()))?;
        guard.execute_batch(MIGRATIONS)?;
        Ok(())
    }

    /// Shared read access. UI-facing lookups and service reads go through
    /// here; nothing may hold the connection across an await point.
    pub fn with_repositories<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<T>,
    {
        self.with_conn(|conn| {
            let repos = repositories::SqliteRepositories::new(conn);
            f(repos)
        })
    }

    /// One coherent import transaction. The closure returns the entity kinds
    /// it touched; the commit publishes them to the change hub. Returning an
    /// empty slice means "saved nothing" and bumps no versions, which is what
    /// keeps idempotent re-imports quiet.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(repositories::SqliteRepositories<'_>) -> Result<(T, Vec<Entity>)>,
    {
        let (value, touched) = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let result = {
                let repos = repositories::SqliteRepositories::new(&tx);
                f(repos)
            };
            match result {
                Ok((value, touched)) => {
                    tx.commit()?;
                    Ok((value, touched))
                }
                Err(err) => {
                    // Drop rolls the transaction back.
                    Err(err)
                }
            }
        })?;
        self.changes.publish(&touched);
        Ok(value)
    }

    pub fn changes(&self) -> &ChangeHub {
        &self.changes
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))?;
        f(&guard)
    }
}

fn destroy_store_files(db_path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut candidate = db_path.as_os_str().to_owned();
        candidate.push(suffix);
        let candidate = Path::new(&candidate);
        if candidate.exists() {
            std::fs::remove_file(candidate)
                .with_context(|| format!("removing {}", candidate.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::repositories::FeedRepository;

    #[test]
    fn open_migrate_and_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = LemmyfeedPaths::from_base_dir(dir.path()).expect("paths");

        let db = Database::open(&paths).expect("open");
        assert!(db.ensure_migrations().expect("migrations"));

        drop(db);
        let db = Database::open(&paths).expect("reopen");
        assert!(!db.ensure_migrations().expect("migrations"));
    }

    #[test]
    fn corrupt_store_is_destroyed_and_recreated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = LemmyfeedPaths::from_base_dir(dir.path()).expect("paths");
        std::fs::create_dir_all(&paths.data_dir).expect("data dir");
        std::fs::write(&paths.db_path, b"this is not a sqlite file").expect("write garbage");

        let db = Database::open(&paths).expect("recovered");
        db.with_repositories(|repos| {
            assert!(repos.feeds().list_all().expect("query works").is_empty());
            Ok(())
        })
        .expect("usable after recovery");
    }

    #[test]
    fn empty_transaction_bumps_no_versions() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        let db = Database::from_connection(conn, true);
        db.ensure_migrations().expect("migrations");

        db.with_transaction(|_repos| Ok(((), Vec::new())))
            .expect("empty tx");
        assert_eq!(db.changes().global_version(), 0);

        db.with_transaction(|_repos| Ok(((), vec![Entity::Feed])))
            .expect("tx");
        assert_eq!(db.changes().global_version(), 1);
        assert_eq!(db.changes().version(Entity::Feed), 1);
    }
}

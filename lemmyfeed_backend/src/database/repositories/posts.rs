use crate::database::models::PostRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePostRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, post_id, account_id, title, community_name, url, body, \
                       thumbnail_url, embed_title, creator_person_id, score, comment_count, \
                       my_vote, saved, read, published_at, edited_at, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        account_id: row.get(2)?,
        title: row.get(3)?,
        community_name: row.get(4)?,
        url: row.get(5)?,
        body: row.get(6)?,
        thumbnail_url: row.get(7)?,
        embed_title: row.get(8)?,
        creator_person_id: row.get(9)?,
        score: row.get(10)?,
        comment_count: row.get(11)?,
        my_vote: row.get(12)?,
        saved: row.get::<_, i64>(13)? != 0,
        read: row.get::<_, i64>(14)? != 0,
        published_at: row.get(15)?,
        edited_at: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

impl<'conn> super::PostRepository for SqlitePostRepository<'conn> {
    fn create(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO posts (id, post_id, account_id, title, community_name, url, body,
                               thumbnail_url, embed_title, creator_person_id, score,
                               comment_count, my_vote, saved, read, published_at, edited_at,
                               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19)
            "#,
            params![
                record.id,
                record.post_id,
                record.account_id,
                record.title,
                record.community_name,
                record.url,
                record.body,
                record.thumbnail_url,
                record.embed_title,
                record.creator_person_id,
                record.score,
                record.comment_count,
                record.my_vote,
                if record.saved { 1 } else { 0 },
                if record.read { 1 } else { 0 },
                record.published_at,
                record.edited_at,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &PostRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE posts SET
                title = ?2,
                community_name = ?3,
                url = ?4,
                body = ?5,
                thumbnail_url = ?6,
                embed_title = ?7,
                creator_person_id = ?8,
                score = ?9,
                comment_count = ?10,
                my_vote = ?11,
                saved = ?12,
                read = ?13,
                published_at = ?14,
                edited_at = ?15,
                updated_at = ?16
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.title,
                record.community_name,
                record.url,
                record.body,
                record.thumbnail_url,
                record.embed_title,
                record.creator_person_id,
                record.score,
                record.comment_count,
                record.my_vote,
                if record.saved { 1 } else { 0 },
                if record.read { 1 } else { 0 },
                record.published_at,
                record.edited_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PostRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM posts WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn find_by_key(&self, post_id: i64, account_id: &str) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM posts
            WHERE post_id = ?1 AND account_id = ?2
            ORDER BY datetime(created_at) ASC, id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![post_id, account_id], map_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    fn list_for_page(&self, page_id: &str) -> Result<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.post_id, p.account_id, p.title, p.community_name, p.url, p.body,
                   p.thumbnail_url, p.embed_title, p.creator_person_id, p.score,
                   p.comment_count, p.my_vote, p.saved, p.read, p.published_at, p.edited_at,
                   p.created_at, p.updated_at
            FROM posts p
            INNER JOIN page_elements e ON e.post_row_id = p.id
            WHERE e.page_id = ?1
            ORDER BY e.element_index ASC
            "#,
        )?;
        let rows = stmt.query_map(params![page_id], map_row)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

use crate::database::models::CommentRecord;
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(super) struct SqliteCommentRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, comment_id, post_row_id, path, child_count, body, \
                       creator_person_id, score, published_at, edited_at, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: row.get(0)?,
        comment_id: row.get(1)?,
        post_row_id: row.get(2)?,
        path: row.get(3)?,
        child_count: row.get(4)?,
        body: row.get(5)?,
        creator_person_id: row.get(6)?,
        score: row.get(7)?,
        published_at: row.get(8)?,
        edited_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl<'conn> super::CommentRepository for SqliteCommentRepository<'conn> {
    fn create(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO comments (id, comment_id, post_row_id, path, child_count, body,
                                  creator_person_id, score, published_at, edited_at,
                                  created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.id,
                record.comment_id,
                record.post_row_id,
                record.path,
                record.child_count,
                record.body,
                record.creator_person_id,
                record.score,
                record.published_at,
                record.edited_at,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &CommentRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE comments SET
                path = ?2,
                child_count = ?3,
                body = ?4,
                creator_person_id = ?5,
                score = ?6,
                published_at = ?7,
                edited_at = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.path,
                record.child_count,
                record.body,
                record.creator_person_id,
                record.score,
                record.published_at,
                record.edited_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn find_by_key(&self, comment_id: i64, post_row_id: &str) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM comments
            WHERE comment_id = ?1 AND post_row_id = ?2
            ORDER BY datetime(created_at) ASC, id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![comment_id, post_row_id], map_row)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }

    fn list_for_post(&self, post_row_id: &str) -> Result<Vec<CommentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM comments
            WHERE post_row_id = ?1
            "#
        ))?;
        let rows = stmt.query_map(params![post_row_id], map_row)?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        // Thread order is the numeric path order, which string sorting in SQL
        // would get wrong for ids of different digit counts.
        comments.sort_by_cached_key(|record| {
            record
                .path
                .parse::<crate::comment_path::CommentPath>()
                .unwrap_or_else(|_| crate::comment_path::CommentPath::root())
        });
        Ok(comments)
    }
}

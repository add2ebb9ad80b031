use crate::database::models::FeedRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteFeedRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, account_id, kind, listing_type, sort_type, community_name, \
                       community_instance, created_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<FeedRecord> {
    Ok(FeedRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        kind: row.get(2)?,
        listing_type: row.get(3)?,
        sort_type: row.get(4)?,
        community_name: row.get(5)?,
        community_instance: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl<'conn> super::FeedRepository for SqliteFeedRepository<'conn> {
    fn create(&self, record: &FeedRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO feeds (id, account_id, kind, listing_type, sort_type,
                               community_name, community_instance, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.account_id,
                record.kind,
                record.listing_type,
                record.sort_type,
                record.community_name,
                record.community_instance,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<FeedRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM feeds WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn find_matching(&self, probe: &FeedRecord) -> Result<Vec<FeedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM feeds
            WHERE account_id = ?1
              AND kind = ?2
              AND listing_type IS ?3
              AND sort_type = ?4
              AND community_name IS ?5
              AND community_instance IS ?6
            ORDER BY datetime(created_at) ASC, id ASC
            "#
        ))?;
        let rows = stmt.query_map(
            params![
                probe.account_id,
                probe.kind,
                probe.listing_type,
                probe.sort_type,
                probe.community_name,
                probe.community_instance
            ],
            map_row,
        )?;
        let mut feeds = Vec::new();
        for row in rows {
            feeds.push(row?);
        }
        Ok(feeds)
    }

    fn list_for_account(&self, account_id: &str) -> Result<Vec<FeedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM feeds
            WHERE account_id = ?1
            ORDER BY datetime(created_at) ASC, id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![account_id], map_row)?;
        let mut feeds = Vec::new();
        for row in rows {
            feeds.push(row?);
        }
        Ok(feeds)
    }

    fn list_all(&self) -> Result<Vec<FeedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM feeds ORDER BY datetime(created_at) ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], map_row)?;
        let mut feeds = Vec::new();
        for row in rows {
            feeds.push(row?);
        }
        Ok(feeds)
    }

    fn delete(&self, feed_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM feeds WHERE id = ?1", params![feed_id])?;
        Ok(())
    }
}

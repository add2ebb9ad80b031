use crate::database::models::{PageElementRecord, PageRecord};
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(super) struct SqlitePageRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_page(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        feed_id: row.get(1)?,
        page_index: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_element(row: &Row<'_>) -> rusqlite::Result<PageElementRecord> {
    Ok(PageElementRecord {
        id: row.get(0)?,
        page_id: row.get(1)?,
        element_index: row.get(2)?,
        post_row_id: row.get(3)?,
    })
}

impl<'conn> super::PageRepository for SqlitePageRepository<'conn> {
    fn create_page(&self, record: &PageRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO pages (id, feed_id, page_index, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![record.id, record.feed_id, record.page_index, record.created_at],
        )?;
        Ok(())
    }

    fn create_element(&self, record: &PageElementRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO page_elements (id, page_id, element_index, post_row_id)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![record.id, record.page_id, record.element_index, record.post_row_id],
        )?;
        Ok(())
    }

    fn count_for_feed(&self, feed_id: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE feed_id = ?1",
            params![feed_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_for_feed(&self, feed_id: &str) -> Result<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, feed_id, page_index, created_at
            FROM pages
            WHERE feed_id = ?1
            ORDER BY page_index ASC
            "#,
        )?;
        let rows = stmt.query_map(params![feed_id], map_page)?;
        let mut pages = Vec::new();
        for row in rows {
            pages.push(row?);
        }
        Ok(pages)
    }

    fn elements_for_page(&self, page_id: &str) -> Result<Vec<PageElementRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, page_id, element_index, post_row_id
            FROM page_elements
            WHERE page_id = ?1
            ORDER BY element_index ASC
            "#,
        )?;
        let rows = stmt.query_map(params![page_id], map_element)?;
        let mut elements = Vec::new();
        for row in rows {
            elements.push(row?);
        }
        Ok(elements)
    }
}

use crate::database::models::SiteRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteSiteRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, instance_id, name, software, default_listing_type, \
                       default_sort_type, site_info_fetched_at, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<SiteRecord> {
    Ok(SiteRecord {
        id: row.get(0)?,
        instance_id: row.get(1)?,
        name: row.get(2)?,
        software: row.get(3)?,
        default_listing_type: row.get(4)?,
        default_sort_type: row.get(5)?,
        site_info_fetched_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl<'conn> super::SiteRepository for SqliteSiteRepository<'conn> {
    fn create(&self, record: &SiteRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sites (id, instance_id, name, software, default_listing_type,
                               default_sort_type, site_info_fetched_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.id,
                record.instance_id,
                record.name,
                record.software,
                record.default_listing_type,
                record.default_sort_type,
                record.site_info_fetched_at,
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<SiteRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM sites WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn find_by_instance(&self, instance_id: &str) -> Result<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM sites
            WHERE instance_id = ?1
            ORDER BY datetime(created_at) ASC, id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![instance_id], map_row)?;
        let mut sites = Vec::new();
        for row in rows {
            sites.push(row?);
        }
        Ok(sites)
    }

    fn list_all(&self) -> Result<Vec<SiteRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM sites ORDER BY datetime(created_at) ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], map_row)?;
        let mut sites = Vec::new();
        for row in rows {
            sites.push(row?);
        }
        Ok(sites)
    }

    fn update_site_info(&self, record: &SiteRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE sites SET
                name = ?2,
                software = ?3,
                default_listing_type = ?4,
                default_sort_type = ?5,
                site_info_fetched_at = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.name,
                record.software,
                record.default_listing_type,
                record.default_sort_type,
                record.site_info_fetched_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }
}

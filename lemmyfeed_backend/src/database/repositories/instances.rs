use crate::database::models::InstanceRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteInstanceRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<InstanceRecord> {
    Ok(InstanceRecord {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

impl<'conn> super::InstanceRepository for SqliteInstanceRepository<'conn> {
    fn create(&self, record: &InstanceRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO instances (id, actor_id, created_at)
            VALUES (?1, ?2, ?3)
            "#,
            params![record.id, record.actor_id, record.created_at],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<InstanceRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, actor_id, created_at FROM instances WHERE id = ?1",
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn find_by_actor_id(&self, actor_id: &str) -> Result<Vec<InstanceRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, actor_id, created_at
            FROM instances
            WHERE actor_id = ?1
            ORDER BY datetime(created_at) ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![actor_id], map_row)?;
        let mut instances = Vec::new();
        for row in rows {
            instances.push(row?);
        }
        Ok(instances)
    }
}

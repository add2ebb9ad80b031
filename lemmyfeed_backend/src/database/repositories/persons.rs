use crate::database::models::PersonRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqlitePersonRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

const COLUMNS: &str = "id, person_id, site_id, name, display_name, avatar_url, \
                       actor_id, bot, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<PersonRecord> {
    Ok(PersonRecord {
        id: row.get(0)?,
        person_id: row.get(1)?,
        site_id: row.get(2)?,
        name: row.get(3)?,
        display_name: row.get(4)?,
        avatar_url: row.get(5)?,
        actor_id: row.get(6)?,
        bot: row.get::<_, i64>(7)? != 0,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl<'conn> super::PersonRepository for SqlitePersonRepository<'conn> {
    fn create(&self, record: &PersonRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO persons (id, person_id, site_id, name, display_name, avatar_url,
                                 actor_id, bot, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.id,
                record.person_id,
                record.site_id,
                record.name,
                record.display_name,
                record.avatar_url,
                record.actor_id,
                if record.bot { 1 } else { 0 },
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn update(&self, record: &PersonRecord) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE persons SET
                name = ?2,
                display_name = ?3,
                avatar_url = ?4,
                actor_id = ?5,
                bot = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.name,
                record.display_name,
                record.avatar_url,
                record.actor_id,
                if record.bot { 1 } else { 0 },
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PersonRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM persons WHERE id = ?1"),
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn find_by_key(&self, person_id: i64, site_id: &str) -> Result<Vec<PersonRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {COLUMNS}
            FROM persons
            WHERE person_id = ?1 AND site_id = ?2
            ORDER BY datetime(created_at) ASC, id ASC
            "#
        ))?;
        let rows = stmt.query_map(params![person_id, site_id], map_row)?;
        let mut persons = Vec::new();
        for row in rows {
            persons.push(row?);
        }
        Ok(persons)
    }
}

use crate::database::models::AccountRecord;
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub(super) struct SqliteAccountRepository<'conn> {
    pub(super) conn: &'conn Connection,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        id: row.get(0)?,
        site_id: row.get(1)?,
        username: row.get(2)?,
        signed_out: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl<'conn> super::AccountRepository for SqliteAccountRepository<'conn> {
    fn create(&self, record: &AccountRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO accounts (id, site_id, username, signed_out, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.id,
                record.site_id,
                record.username,
                if record.signed_out { 1 } else { 0 },
                record.created_at,
                record.updated_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<AccountRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, site_id, username, signed_out, created_at, updated_at
                FROM accounts
                WHERE id = ?1
                "#,
                params![id],
                map_row,
            )
            .optional()?)
    }

    fn find_signed_out(&self, site_id: &str) -> Result<Vec<AccountRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, site_id, username, signed_out, created_at, updated_at
            FROM accounts
            WHERE site_id = ?1 AND signed_out = 1
            ORDER BY datetime(created_at) ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![site_id], map_row)?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }

    fn list_for_site(&self, site_id: &str) -> Result<Vec<AccountRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, site_id, username, signed_out, created_at, updated_at
            FROM accounts
            WHERE site_id = ?1
            ORDER BY datetime(created_at) ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![site_id], map_row)?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }
}

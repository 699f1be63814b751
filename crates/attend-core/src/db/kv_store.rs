//! Durable key/value store on top of the `kv_store` table

use crate::error::Result;
use crate::util::unix_millis_now;
use libsql::{params, Connection};

/// libSQL-backed string key/value store
pub struct LibSqlKvStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlKvStore<'a> {
    /// Create a new store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read a value, `None` when the key has never been written
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Write a single value
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
                params![key, value, unix_millis_now()],
            )
            .await?;
        Ok(())
    }

    /// Write several values in one transaction: either all land or none do
    pub async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let now = unix_millis_now();
        self.conn.execute("BEGIN IMMEDIATE TRANSACTION", ()).await?;

        for (key, value) in entries {
            if let Err(e) = self
                .conn
                .execute(
                    "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)",
                    params![*key, *value, now],
                )
                .await
            {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(e.into());
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(())
    }

    /// Delete a key; deleting a missing key is not an error
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, params};

/// SQLite-backed store of catalog responses, keyed by request URL.
pub struct MetadataCache {
    conn: Mutex<Connection>,
}

/// Cache metadata for conditional requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: String,
    /// Unix seconds, set by [`MetadataCache::put`].
    pub cached_at: i64,
}

impl CacheEntry {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            etag: None,
            last_modified: None,
            body: body.into(),
            cached_at: 0,
        }
    }
}

impl MetadataCache {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS api_cache (
                url TEXT PRIMARY KEY,
                etag TEXT,
                last_modified TEXT,
                body TEXT NOT NULL,
                cached_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        self.conn()
            .query_row(
                "SELECT etag, last_modified, body, cached_at FROM api_cache WHERE url = ?1",
                params![url],
                |row| {
                    Ok(CacheEntry {
                        etag: row.get(0)?,
                        last_modified: row.get(1)?,
                        body: row.get(2)?,
                        cached_at: row.get(3)?,
                    })
                },
            )
            .ok()
    }

    pub fn put(&self, url: &str, entry: &CacheEntry) -> Result<(), rusqlite::Error> {
        let now = chrono::Utc::now().timestamp();

        self.conn().execute(
            "INSERT OR REPLACE INTO api_cache (url, etag, last_modified, body, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![url, entry.etag, entry.last_modified, entry.body, now],
        )?;
        Ok(())
    }

    /// Remove all cache entries older than the specified number of days
    /// Returns the number of entries removed
    pub fn cleanup_older_than(&self, days: u32) -> Result<usize, rusqlite::Error> {
        self.conn().execute(
            "DELETE FROM api_cache WHERE cached_at < ?1",
            params![cutoff(days)],
        )
    }

    /// Remove all cache entries
    pub fn clear(&self) -> Result<usize, rusqlite::Error> {
        self.conn().execute("DELETE FROM api_cache", [])
    }

    pub fn count(&self) -> Result<usize, rusqlite::Error> {
        self.conn()
            .query_row("SELECT COUNT(*) FROM api_cache", [], |row| {
                row.get::<_, i64>(0).map(|n| n as usize)
            })
    }

    #[cfg(test)]
    fn backdate(&self, url: &str, cached_at: i64) -> Result<(), rusqlite::Error> {
        self.conn().execute(
            "UPDATE api_cache SET cached_at = ?1 WHERE url = ?2",
            params![cached_at, url],
        )?;
        Ok(())
    }
}

fn cutoff(days: u32) -> i64 {
    chrono::Utc::now().timestamp() - i64::from(days) * 24 * 60 * 60
}

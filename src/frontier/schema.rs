//! Frontier database schema

/// SQL schema for the frontier database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS frontier (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    status TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    available_at INTEGER NOT NULL DEFAULT 0,
    lease_expires_at INTEGER,
    discovered_at TEXT NOT NULL,
    crawled_at TEXT
);

DROP INDEX IF EXISTS idx_frontier_status_available;
CREATE INDEX IF NOT EXISTS idx_frontier_status_seq ON frontier(status, seq);
CREATE INDEX IF NOT EXISTS idx_frontier_domain ON frontier(domain);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

//! SQLite frontier implementation
//!
//! Every operation is a single statement or a short transaction on one connection, so
//! state transitions are atomic both within the process and across restarts.

use crate::frontier::schema::initialize_schema;
use crate::frontier::traits::{
    ClaimedUrl, FrontierError, FrontierResult, FrontierStore, RefreshOutcome, RequeueOutcome,
};
use crate::frontier::{duration_millis, frontier_key, now_millis, FrontierPolicy};
use crate::state::UrlState;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use url::Url;

/// Claims the oldest available pending record in one statement
///
/// The sub-select and the update run as a single write, so two callers can never both
/// see the same row as claimable. The sub-select walks `idx_frontier_status_seq` in
/// order and stops at the first available row.
const CLAIM_PENDING_SQL: &str = "
    UPDATE frontier
    SET status = 'processing', lease_expires_at = ?2
    WHERE url = (
        SELECT url FROM frontier
        WHERE status = 'pending' AND available_at <= ?1
        ORDER BY seq
        LIMIT 1
    )
    RETURNING url, domain, retry_count";

/// Takes over the oldest claim whose lease has run out
const CLAIM_EXPIRED_SQL: &str = "
    UPDATE frontier
    SET status = 'processing', lease_expires_at = ?2
    WHERE url = (
        SELECT url FROM frontier
        WHERE status = 'processing' AND lease_expires_at < ?1
        ORDER BY seq
        LIMIT 1
    )
    RETURNING url, domain, retry_count";

/// SQLite frontier backend
pub struct SqliteFrontier {
    conn: Mutex<Connection>,
    policy: FrontierPolicy,
}

impl SqliteFrontier {
    /// Opens or creates the frontier database at `path`
    pub fn open(path: &Path, policy: FrontierPolicy) -> FrontierResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            policy,
        })
    }

    /// Creates an in-memory frontier (for tests and throwaway runs)
    pub fn open_in_memory(policy: FrontierPolicy) -> FrontierResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            policy,
        })
    }

    pub fn policy(&self) -> &FrontierPolicy {
        &self.policy
    }

    fn conn(&self) -> FrontierResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FrontierError::LockPoisoned)
    }
}

impl FrontierStore for SqliteFrontier {
    fn insert_if_absent(&self, url: &Url) -> FrontierResult<bool> {
        let (key, domain) = frontier_key(url)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO frontier (url, domain, status, available_at, discovered_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                key,
                domain,
                UrlState::Pending.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(inserted > 0)
    }

    fn claim_one(&self) -> FrontierResult<Option<ClaimedUrl>> {
        let now = now_millis();
        let lease_expires_at = now.saturating_add(duration_millis(self.policy.lease));
        let conn = self.conn()?;
        for sql in [CLAIM_PENDING_SQL, CLAIM_EXPIRED_SQL] {
            let claimed = conn
                .query_row(sql, params![now, lease_expires_at], |row| {
                    Ok(ClaimedUrl {
                        url: row.get(0)?,
                        domain: row.get(1)?,
                        retry_count: row.get(2)?,
                    })
                })
                .optional()?;
            if claimed.is_some() {
                return Ok(claimed);
            }
        }
        Ok(None)
    }

    fn complete(&self, url: &str) -> FrontierResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE frontier
             SET status = ?1, lease_expires_at = NULL, crawled_at = COALESCE(crawled_at, ?2)
             WHERE url = ?3 AND status = ?4",
            params![
                UrlState::Crawled.to_db_string(),
                Utc::now().to_rfc3339(),
                url,
                UrlState::Processing.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn requeue(&self, url: &str) -> FrontierResult<RequeueOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let retry_count: Option<u32> = tx
            .query_row(
                "SELECT retry_count FROM frontier WHERE url = ?1 AND status = ?2",
                params![url, UrlState::Processing.to_db_string()],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match retry_count {
            None => RequeueOutcome::Missing,
            Some(count) if count >= self.policy.max_retries => {
                tx.execute("DELETE FROM frontier WHERE url = ?1", params![url])?;
                RequeueOutcome::Exhausted
            }
            Some(count) => {
                let attempt = count + 1;
                let available_at = now_millis()
                    .saturating_add(duration_millis(self.policy.backoff_for(attempt)));
                tx.execute(
                    "UPDATE frontier
                     SET status = ?1, retry_count = ?2, available_at = ?3, lease_expires_at = NULL
                     WHERE url = ?4",
                    params![
                        UrlState::Pending.to_db_string(),
                        attempt,
                        available_at,
                        url
                    ],
                )?;
                RequeueOutcome::Requeued { attempt }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn release(&self, url: &str) -> FrontierResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE frontier
             SET status = ?1, lease_expires_at = NULL
             WHERE url = ?2 AND status = ?3",
            params![
                UrlState::Pending.to_db_string(),
                url,
                UrlState::Processing.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn drop_url(&self, url: &str) -> FrontierResult<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM frontier WHERE url = ?1", params![url])?;
        Ok(deleted > 0)
    }

    fn refresh(&self, url: &Url) -> FrontierResult<RefreshOutcome> {
        let (key, domain) = frontier_key(url)?;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO frontier (url, domain, status, available_at, discovered_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![
                key,
                domain,
                UrlState::Pending.to_db_string(),
                Utc::now().to_rfc3339()
            ],
        )?;

        let outcome = if inserted > 0 {
            RefreshOutcome::Inserted
        } else {
            let revived = tx.execute(
                "UPDATE frontier
                 SET status = ?1, retry_count = 0, available_at = 0, crawled_at = NULL
                 WHERE url = ?2 AND status = ?3",
                params![
                    UrlState::Pending.to_db_string(),
                    key,
                    UrlState::Crawled.to_db_string()
                ],
            )?;
            if revived > 0 {
                RefreshOutcome::Revived
            } else {
                RefreshOutcome::Unchanged
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn recover_in_flight(&self) -> FrontierResult<u64> {
        let conn = self.conn()?;
        let recovered = conn.execute(
            "UPDATE frontier SET status = ?1, lease_expires_at = NULL WHERE status = ?2",
            params![
                UrlState::Pending.to_db_string(),
                UrlState::Processing.to_db_string()
            ],
        )?;
        Ok(recovered as u64)
    }

    fn status(&self, url: &str) -> FrontierResult<Option<UrlState>> {
        let conn = self.conn()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM frontier WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        match status {
            None => Ok(None),
            Some(s) => UrlState::from_db_string(&s)
                .map(Some)
                .ok_or(FrontierError::CorruptState(s)),
        }
    }

    fn count_by_state(&self, state: UrlState) -> FrontierResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM frontier WHERE status = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn clear(&self) -> FrontierResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM frontier", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::conformance;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(policy: FrontierPolicy) -> SqliteFrontier {
        SqliteFrontier::open_in_memory(policy).unwrap()
    }

    #[test]
    fn test_insert_is_idempotent() {
        conformance::insert_is_idempotent(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_rejects_non_http() {
        conformance::rejects_non_http(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_claims_in_insertion_order() {
        conformance::claims_in_insertion_order(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_complete_is_terminal_and_idempotent() {
        conformance::complete_is_terminal_and_idempotent(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_requeue_backs_off_then_exhausts() {
        conformance::requeue_backs_off_then_exhausts(&store(conformance::zero_backoff(2)));
    }

    #[test]
    fn test_requeue_delays_claim() {
        conformance::requeue_delays_claim(&store(conformance::hour_backoff()));
    }

    #[test]
    fn test_release_does_not_count_retry() {
        conformance::release_does_not_count_retry(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_drop_deletes_record() {
        conformance::drop_deletes_record(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_refresh_revives_crawled_only() {
        conformance::refresh_revives_crawled_only(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_recover_in_flight() {
        conformance::recover_in_flight_returns_to_pending(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_expired_lease_is_reclaimable() {
        conformance::expired_lease_is_reclaimable(&store(conformance::zero_lease()));
    }

    #[test]
    fn test_pending_preferred_over_expired_lease() {
        conformance::pending_preferred_over_expired_lease(&store(conformance::zero_lease()));
    }

    #[test]
    fn test_stale_requeue_is_ignored() {
        conformance::stale_requeue_is_ignored(&store(conformance::zero_lease()));
    }

    #[test]
    fn test_stale_complete_is_ignored() {
        conformance::stale_complete_is_ignored(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_clear() {
        conformance::clear_removes_everything(&store(FrontierPolicy::default()));
    }

    #[test]
    fn test_concurrent_claims_are_exclusive() {
        conformance::concurrent_claims_are_exclusive(Arc::new(store(FrontierPolicy::default())));
    }

    #[test]
    fn test_claims_from_large_backlog() {
        const URLS: usize = 20_000;
        let store = store(conformance::hour_backoff());
        for i in 0..URLS {
            store
                .insert_if_absent(&Url::parse(&format!("https://d{}.test/", i)).unwrap())
                .unwrap();
        }

        // A backed-off record at the head of the queue must not block the rest
        let head = store.claim_one().unwrap().unwrap();
        assert_eq!(head.url, "https://d0.test/");
        store.requeue(&head.url).unwrap();

        for i in 1..URLS {
            let claimed = store.claim_one().unwrap().unwrap();
            assert_eq!(claimed.url, format!("https://d{}.test/", i));
        }
        assert!(store.claim_one().unwrap().is_none());
        assert_eq!(store.count_by_state(UrlState::Processing).unwrap(), (URLS - 1) as u64);
    }

    #[test]
    fn test_claim_walks_status_index_without_sorting() {
        let store = store(FrontierPolicy::default());
        let conn = store.conn().unwrap();
        for sql in [CLAIM_PENDING_SQL, CLAIM_EXPIRED_SQL] {
            let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {}", sql)).unwrap();
            let plan: Vec<String> = stmt
                .query_map(params![0i64, 0i64], |row| row.get(3))
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();

            assert!(
                plan.iter().any(|step| step.contains("idx_frontier_status_seq")),
                "plan: {:?}",
                plan
            );
            assert!(
                !plan.iter().any(|step| step.contains("TEMP B-TREE")),
                "plan: {:?}",
                plan
            );
        }
    }

    #[test]
    fn test_reopen_drops_old_claim_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frontier.db");
        {
            let conn = Connection::open(&path).unwrap();
            initialize_schema(&conn).unwrap();
            conn.execute_batch(
                "CREATE INDEX idx_frontier_status_available ON frontier(status, available_at)",
            )
            .unwrap();
        }

        let store = SqliteFrontier::open(&path, FrontierPolicy::default()).unwrap();
        let conn = store.conn().unwrap();
        let old: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'idx_frontier_status_available'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(old, 0);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frontier.db");

        {
            let store = SqliteFrontier::open(&path, FrontierPolicy::default()).unwrap();
            store
                .insert_if_absent(&Url::parse("https://a.test/").unwrap())
                .unwrap();
            store
                .insert_if_absent(&Url::parse("https://b.test/").unwrap())
                .unwrap();
            let claimed = store.claim_one().unwrap().unwrap();
            store.complete(&claimed.url).unwrap();
            // Simulates a crash with b.test in flight
            store.claim_one().unwrap().unwrap();
        }

        let store = SqliteFrontier::open(&path, FrontierPolicy::default()).unwrap();
        assert_eq!(store.count_by_state(UrlState::Crawled).unwrap(), 1);
        assert_eq!(store.count_by_state(UrlState::Processing).unwrap(), 1);

        assert_eq!(store.recover_in_flight().unwrap(), 1);
        let claimed = store.claim_one().unwrap().unwrap();
        assert_eq!(claimed.url, "https://b.test/");
    }
}

//! Index commit loop
//!
//! Runs beside the workers and flushes the index buffer on a fixed cadence. Workers
//! only ever push into the buffer, so a slow commit never holds up a fetch.

use crate::index::{CommitStats, IndexSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Commits the buffered documents on the blocking pool
///
/// Failures are logged and leave the documents buffered for the next attempt.
pub async fn commit_once(index: &Arc<dyn IndexSink>) -> Option<CommitStats> {
    let sink = Arc::clone(index);
    match tokio::task::spawn_blocking(move || sink.commit()).await {
        Ok(Ok(stats)) => {
            if stats.documents > 0 {
                tracing::debug!(
                    documents = stats.documents,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    "Committed index"
                );
            }
            Some(stats)
        }
        Ok(Err(e)) => {
            tracing::error!(
                pending = index.pending_len(),
                "Index commit failed, documents kept for retry: {}",
                e
            );
            None
        }
        Err(e) => {
            tracing::error!("Index commit task failed: {}", e);
            None
        }
    }
}

/// Commits every `interval` until `stop` fires, then commits once more
///
/// The engine fires `stop` only after the workers have finished, so the final commit
/// covers every page they indexed.
pub async fn run_commit_loop(index: Arc<dyn IndexSink>, interval: Duration, stop: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                commit_once(&index).await;
            }
        }
    }

    match commit_once(&index).await {
        Some(stats) => tracing::info!(documents = stats.documents, "Final index commit done"),
        None => tracing::error!(
            pending = index.pending_len(),
            "Final index commit failed, buffered documents are lost"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Document, TantivyIndex};

    fn document(url: &str) -> Document {
        Document {
            url: url.to_string(),
            title: "title".to_string(),
            content: "committed text".to_string(),
        }
    }

    #[tokio::test]
    async fn test_commit_once() {
        let index = Arc::new(TantivyIndex::in_memory(10).unwrap());
        index.upsert(document("https://a.test/")).unwrap();

        let sink: Arc<dyn IndexSink> = index.clone();
        let stats = commit_once(&sink).await.unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(index.doc_count(), 1);
    }

    #[tokio::test]
    async fn test_loop_commits_periodically() {
        let index = Arc::new(TantivyIndex::in_memory(10).unwrap());
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_commit_loop(
            index.clone(),
            Duration::from_millis(20),
            stop.clone(),
        ));

        index.upsert(document("https://a.test/")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(index.doc_count(), 1);

        stop.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_final_commit_on_stop() {
        let index = Arc::new(TantivyIndex::in_memory(10).unwrap());
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_commit_loop(
            index.clone(),
            Duration::from_secs(3600),
            stop.clone(),
        ));

        index.upsert(document("https://late.test/")).unwrap();
        stop.cancel();
        handle.await.unwrap();
        assert_eq!(index.doc_count(), 1);
        assert_eq!(index.pending_len(), 0);
    }
}

//! tantivy-backed index sink
//!
//! Writes are buffered in memory and applied by the next commit using a writer that
//! lives for exactly one commit cycle. Dropping the writer after every commit bounds
//! the memory a single writer generation can hold, and a failed commit only loses the
//! work of that cycle, which is then retried from the buffer.

use crate::index::{CommitStats, Document, IndexError, IndexResult, IndexSink};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

/// Characters of content returned as a search snippet
const SNIPPET_CHARS: usize = 200;

/// Minimum writer budget accepted by tantivy
const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

/// A ranked search result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy)]
struct Fields {
    url: Field,
    title: Field,
    content: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let url = builder.add_text_field("url", STRING | STORED);
    let title = builder.add_text_field("title", TEXT | STORED);
    let content = builder.add_text_field("content", TEXT | STORED);
    (builder.build(), Fields { url, title, content })
}

/// Full-text index with buffered upserts and rotating writers
pub struct TantivyIndex {
    index: Index,
    reader: IndexReader,
    fields: Fields,
    writer_heap_bytes: usize,
    max_pending: usize,
    pending: Mutex<Vec<Document>>,
    /// Held for the whole write-then-commit cycle; at most one writer exists at a time
    commit_lock: Mutex<()>,
}

impl TantivyIndex {
    /// Opens the index in `path`, creating the directory and schema if needed
    pub fn open_or_create(
        path: &Path,
        writer_heap_bytes: usize,
        max_pending: usize,
    ) -> IndexResult<Self> {
        std::fs::create_dir_all(path)?;
        let (schema, fields) = build_schema();
        let directory = MmapDirectory::open(path)?;
        let index = Index::open_or_create(directory, schema)?;
        Self::from_index(index, fields, writer_heap_bytes, max_pending)
    }

    /// Creates an index held entirely in RAM (for tests and dry runs)
    pub fn in_memory(max_pending: usize) -> IndexResult<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        Self::from_index(index, fields, MIN_WRITER_HEAP_BYTES, max_pending)
    }

    fn from_index(
        index: Index,
        fields: Fields,
        writer_heap_bytes: usize,
        max_pending: usize,
    ) -> IndexResult<Self> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
            writer_heap_bytes: writer_heap_bytes.max(MIN_WRITER_HEAP_BYTES),
            max_pending,
            pending: Mutex::new(Vec::new()),
            commit_lock: Mutex::new(()),
        })
    }

    fn pending(&self) -> IndexResult<MutexGuard<'_, Vec<Document>>> {
        self.pending.lock().map_err(|_| IndexError::LockPoisoned)
    }

    /// Runs a free-text query over title and content of committed documents
    pub fn search(&self, query: &str, limit: usize) -> IndexResult<Vec<SearchHit>> {
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.fields.title, self.fields.content]);
        let query = parser.parse_query(query)?;
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            let text = |field: Field| {
                doc.get_first(field)
                    .and_then(|value| value.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let content = text(self.fields.content);
            hits.push(SearchHit {
                url: text(self.fields.url),
                title: text(self.fields.title),
                snippet: content.chars().take(SNIPPET_CHARS).collect(),
                score,
            });
        }
        Ok(hits)
    }

    /// Number of committed documents visible to searches
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    fn write_batch(&self, docs: &[Document]) -> IndexResult<()> {
        let mut writer: IndexWriter = self.index.writer(self.writer_heap_bytes)?;
        for document in docs {
            writer.delete_term(Term::from_field_text(self.fields.url, &document.url));
            writer.add_document(doc!(
                self.fields.url => document.url.as_str(),
                self.fields.title => document.title.as_str(),
                self.fields.content => document.content.as_str(),
            ))?;
        }
        writer.commit()?;
        // The writer is dropped here; the next cycle acquires a fresh one
        Ok(())
    }
}

/// Keeps only the last buffered document per URL, in first-seen order
fn dedup_last_wins(docs: Vec<Document>) -> Vec<Document> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(docs.len());
    let mut unique: Vec<Document> = Vec::with_capacity(docs.len());
    for doc in docs {
        match slots.get(&doc.url) {
            Some(&slot) => unique[slot] = doc,
            None => {
                slots.insert(doc.url.clone(), unique.len());
                unique.push(doc);
            }
        }
    }
    unique
}

impl IndexSink for TantivyIndex {
    fn upsert(&self, doc: Document) -> IndexResult<()> {
        let mut pending = self.pending()?;
        if pending.len() >= self.max_pending {
            return Err(IndexError::BufferFull {
                limit: self.max_pending,
            });
        }
        pending.push(doc);
        Ok(())
    }

    fn commit(&self) -> IndexResult<CommitStats> {
        let _cycle = self.commit_lock.lock().map_err(|_| IndexError::LockPoisoned)?;
        let started = Instant::now();

        let batch = std::mem::take(&mut *self.pending()?);
        if batch.is_empty() {
            return Ok(CommitStats::default());
        }

        let batch = dedup_last_wins(batch);
        if let Err(e) = self.write_batch(&batch) {
            // Put the batch back ahead of anything buffered meanwhile
            let mut pending = self.pending()?;
            let newer = std::mem::replace(&mut *pending, batch);
            pending.extend(newer);
            return Err(e);
        }

        self.reader.reload()?;
        let stats = CommitStats {
            documents: batch.len(),
            elapsed: started.elapsed(),
        };
        debug!(
            documents = stats.documents,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Index commit"
        );
        Ok(stats)
    }

    fn pending_len(&self) -> usize {
        self.pending().map(|p| p.len()).unwrap_or(0)
    }
}

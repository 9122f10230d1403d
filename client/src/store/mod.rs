//! The document store consumed by the access layer and subscriptions.
//!
//! Documents live in a path-addressed hierarchy
//! (`owners/{uid}/lists/{id}/todos/{id}`), carry JSON payloads and an
//! optimistic version counter, and every collection tracks a membership
//! version that changes when documents are added or removed. On top of that
//! the store offers ordered collection queries, live snapshot streams and
//! serializable optimistic transactions with a bounded retry budget.
//!
//! Every operation that crosses the store boundary suspends cooperatively,
//! so concurrent transactions interleave between round trips exactly as they
//! would against a remote store.

mod document;
mod listen;
mod transaction;

pub use document::{Document, DocumentId};
pub use listen::ChangeStream;
pub use transaction::Transaction;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{Config, DEFAULT_TRANSACTION_ATTEMPTS};
use document::new_document_id;
use listen::Listener;
use transaction::ReadSet;

/// All possible errors from the document store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("transaction read set invalidated by a concurrent commit")]
    Conflict,

    #[error("transaction aborted after {0} attempts")]
    ConflictExceeded(u32),

    #[error("document store is closed")]
    Unavailable,

    #[error("invalid document at {path}: {reason}")]
    InvalidDocument { path: String, reason: String },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Slash-separated path of a collection, e.g. `owners/u1/lists`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// A top-level collection.
    pub fn root(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Path of a document within this collection.
    pub fn doc(&self, id: impl AsRef<str>) -> DocumentPath {
        DocumentPath(format!("{}/{}", self.0, id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Slash-separated path of a single document, e.g. `owners/u1/lists/l1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Path of a subcollection under this document.
    pub fn collection(&self, segment: impl AsRef<str>) -> CollectionPath {
        CollectionPath(format!("{}/{}", self.0, segment.as_ref()))
    }

    /// The document id (last path segment).
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The collection this document belongs to.
    pub fn parent(&self) -> CollectionPath {
        match self.0.rfind('/') {
            Some(split) => CollectionPath(self.0[..split].to_string()),
            None => CollectionPath(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// An ordered, bounded read of one collection.
#[derive(Debug, Clone)]
pub struct Query {
    collection: CollectionPath,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    /// Query all documents of a collection.
    pub fn collection(collection: &CollectionPath) -> Self {
        Self {
            collection: collection.clone(),
            order_by: None,
            limit: None,
        }
    }

    /// Order results by a numeric payload field.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    /// Keep at most `limit` results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A buffered write, applied atomically at commit.
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    /// Create or replace the document at a caller-chosen path.
    Set { path: DocumentPath, data: Value },
    /// Insert a new document with a store-assigned id.
    Add {
        collection: CollectionPath,
        id: DocumentId,
        data: Value,
    },
    /// Shallow-merge fields into an existing document.
    Update { path: DocumentPath, patch: Value },
    /// Remove a document; removing an absent document is a no-op.
    Delete { path: DocumentPath },
}

#[derive(Debug, Default)]
struct CollectionState {
    /// Membership version, bumped when a document is added or removed.
    version: u64,
    docs: BTreeMap<DocumentId, Document>,
}

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, CollectionState>,
}

impl State {
    fn doc(&self, path: &DocumentPath) -> Option<&Document> {
        self.collections
            .get(path.parent().as_str())?
            .docs
            .get(path.id())
    }

    fn doc_version(&self, path: &DocumentPath) -> Option<u64> {
        self.doc(path).map(|doc| doc.version)
    }

    fn collection_version(&self, collection: &str) -> u64 {
        self.collections
            .get(collection)
            .map(|c| c.version)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub(crate) struct StoreInner {
    state: Mutex<State>,
    listeners: DashMap<String, Vec<Listener>>,
    next_listener_id: AtomicU64,
    writes: AtomicU64,
    closed: AtomicBool,
    max_attempts: u32,
}

/// Handle to the document store. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct DocStore {
    inner: Arc<StoreInner>,
}

impl Default for DocStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocStore {
    /// Create a store with the default transaction attempt budget.
    pub fn new() -> Self {
        Self::with_attempts(DEFAULT_TRANSACTION_ATTEMPTS)
    }

    /// Create a store configured from the environment.
    pub fn from_config(config: &Config) -> Self {
        Self::with_attempts(config.transaction_attempts)
    }

    /// Create a store granting each transaction `max_attempts` commit
    /// attempts before it fails with [`StoreError::ConflictExceeded`].
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(State::default()),
                listeners: DashMap::new(),
                next_listener_id: AtomicU64::new(1),
                writes: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                max_attempts,
            }),
        }
    }

    /// Read a single document.
    pub async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        self.inner.round_trip().await?;
        let state = self.inner.state.lock();
        Ok(state.doc(path).cloned())
    }

    /// Create or replace the document at `path`.
    pub async fn set(&self, path: &DocumentPath, data: Value) -> Result<()> {
        self.apply(vec![WriteOp::Set {
            path: path.clone(),
            data,
        }])
        .await
    }

    /// Insert a new document and return its store-assigned id.
    pub async fn add(&self, collection: &CollectionPath, data: Value) -> Result<DocumentId> {
        let id = new_document_id();
        self.apply(vec![WriteOp::Add {
            collection: collection.clone(),
            id: id.clone(),
            data,
        }])
        .await?;
        Ok(id)
    }

    /// Shallow-merge `patch` into the document at `path`.
    pub async fn update(&self, path: &DocumentPath, patch: Value) -> Result<()> {
        self.apply(vec![WriteOp::Update {
            path: path.clone(),
            patch,
        }])
        .await
    }

    /// Delete the document at `path`. Deleting an absent document succeeds.
    pub async fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.apply(vec![WriteOp::Delete { path: path.clone() }]).await
    }

    /// Run an ordered, bounded collection read.
    pub async fn query(&self, query: Query) -> Result<Vec<Document>> {
        self.inner.round_trip().await?;
        let state = self.inner.state.lock();
        let order_by = query
            .order_by
            .as_ref()
            .map(|(field, direction)| (field.as_str(), *direction));
        let mut docs = self
            .inner
            .collection_snapshot(&state, query.collection.as_str(), order_by);
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    /// Run `body` inside a serializable optimistic transaction.
    ///
    /// The body reads through the [`Transaction`] (building a read set) and
    /// buffers writes. At commit the read set is re-validated and the whole
    /// buffered batch is applied atomically. When a concurrent commit has
    /// invalidated the read set, the body is re-run from scratch, up to the
    /// store's attempt budget; after that the transaction fails with
    /// [`StoreError::ConflictExceeded`] and no partial state is visible.
    ///
    /// An error returned by the body aborts immediately without retry.
    pub async fn run_transaction<T, F>(&self, mut body: F) -> Result<T>
    where
        F: for<'t> FnMut(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let max_attempts = self.inner.max_attempts;
        for attempt in 1..=max_attempts {
            let mut tx = Transaction::new(Arc::clone(&self.inner));
            let value = body(&mut tx).await?;
            match tx.commit().await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "transaction committed after retry");
                    }
                    return Ok(value);
                }
                Err(StoreError::Conflict) => {
                    tracing::debug!(attempt, max_attempts, "transaction conflict, retrying");
                }
                Err(other) => return Err(other),
            }
        }
        tracing::warn!(max_attempts, "transaction retry budget exhausted");
        Err(StoreError::ConflictExceeded(max_attempts))
    }

    /// Start a live snapshot stream for one collection, optionally ordered
    /// ascending by a numeric payload field.
    ///
    /// The stream fires immediately with the current snapshot. On a closed
    /// store it ends without delivering anything.
    pub fn listen(&self, collection: &CollectionPath, order_by: Option<&str>) -> ChangeStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.is_closed() {
            return ChangeStream { rx };
        }

        let initial = {
            let state = self.inner.state.lock();
            self.inner.collection_snapshot(
                &state,
                collection.as_str(),
                order_by.map(|field| (field, Direction::Asc)),
            )
        };
        // The receiver is still in scope, so this cannot fail.
        let _ = tx.send(initial);

        let listener = Listener {
            id: self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed),
            order_by: order_by.map(str::to_string),
            tx,
        };
        tracing::debug!(collection = %collection, listener_id = listener.id, "listener registered");
        self.inner
            .listeners
            .entry(collection.as_str().to_string())
            .or_default()
            .push(listener);

        ChangeStream { rx }
    }

    /// Close the store: every subsequent operation fails with
    /// [`StoreError::Unavailable`] and all live streams end.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.listeners.clear();
        tracing::info!("document store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Number of write operations applied since the store was created.
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::SeqCst)
    }

    async fn apply(&self, writes: Vec<WriteOp>) -> Result<()> {
        self.inner.round_trip().await?;
        let affected = self.inner.commit(&ReadSet::default(), &writes)?;
        self.inner.notify(&affected);
        Ok(())
    }
}

impl StoreInner {
    /// One cooperative suspension per store boundary crossing, so concurrent
    /// transactions interleave between round trips.
    pub(crate) async fn round_trip(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        tokio::task::yield_now().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    pub(crate) fn read_doc(&self, path: &DocumentPath) -> Option<Document> {
        self.state.lock().doc(path).cloned()
    }

    pub(crate) fn read_collection(
        &self,
        collection: &CollectionPath,
        order_by: Option<&str>,
    ) -> (u64, Vec<Document>) {
        let state = self.state.lock();
        let version = state.collection_version(collection.as_str());
        let docs = self.collection_snapshot(
            &state,
            collection.as_str(),
            order_by.map(|field| (field, Direction::Asc)),
        );
        (version, docs)
    }

    fn collection_snapshot(
        &self,
        state: &State,
        collection: &str,
        order_by: Option<(&str, Direction)>,
    ) -> Vec<Document> {
        let mut docs: Vec<Document> = state
            .collections
            .get(collection)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default();

        if let Some((field, direction)) = order_by {
            docs.sort_by(|a, b| {
                let ka = a.data.get(field).and_then(Value::as_i64);
                let kb = b.data.get(field).and_then(Value::as_i64);
                let ordering = ka.cmp(&kb);
                match direction {
                    Direction::Asc => ordering.then_with(|| a.id.cmp(&b.id)),
                    Direction::Desc => ordering.reverse().then_with(|| a.id.cmp(&b.id)),
                }
            });
        }
        docs
    }

    /// Validate `reads` and apply `writes` as one atomic batch.
    ///
    /// Returns the paths of the collections the batch touched.
    pub(crate) fn commit(&self, reads: &ReadSet, writes: &[WriteOp]) -> Result<Vec<String>> {
        let mut state = self.state.lock();

        for (path, seen) in reads.docs() {
            if state.doc_version(path) != *seen {
                return Err(StoreError::Conflict);
            }
        }
        for (collection, seen) in reads.collections() {
            if state.collection_version(collection) != *seen {
                return Err(StoreError::Conflict);
            }
        }
        for write in writes {
            if let WriteOp::Update { path, .. } = write {
                if state.doc(path).is_none() {
                    return Err(StoreError::NotFound(path.as_str().to_string()));
                }
            }
        }

        let now = Utc::now();
        let mut affected = BTreeSet::new();
        for write in writes {
            match write {
                WriteOp::Set { path, data } => {
                    let collection = path.parent();
                    let entry = state
                        .collections
                        .entry(collection.as_str().to_string())
                        .or_default();
                    if let Some(doc) = entry.docs.get_mut(path.id()) {
                        doc.data = data.clone();
                        doc.version += 1;
                        doc.updated_at = now;
                    } else {
                        let id = path.id().to_string();
                        entry
                            .docs
                            .insert(id.clone(), Document::new(id, data.clone(), now));
                        entry.version += 1;
                    }
                    affected.insert(collection.as_str().to_string());
                }
                WriteOp::Add { collection, id, data } => {
                    let entry = state
                        .collections
                        .entry(collection.as_str().to_string())
                        .or_default();
                    entry
                        .docs
                        .insert(id.clone(), Document::new(id.clone(), data.clone(), now));
                    entry.version += 1;
                    affected.insert(collection.as_str().to_string());
                }
                WriteOp::Update { path, patch } => {
                    let collection = path.parent();
                    // Presence was validated above.
                    if let Some(entry) = state.collections.get_mut(collection.as_str()) {
                        if let Some(doc) = entry.docs.get_mut(path.id()) {
                            merge_fields(&mut doc.data, patch);
                            doc.version += 1;
                            doc.updated_at = now;
                        }
                    }
                    affected.insert(collection.as_str().to_string());
                }
                WriteOp::Delete { path } => {
                    let collection = path.parent();
                    let removed = state
                        .collections
                        .get_mut(collection.as_str())
                        .map(|entry| entry.docs.remove(path.id()).is_some())
                        .unwrap_or(false);
                    if !removed {
                        continue;
                    }
                    if let Some(entry) = state.collections.get_mut(collection.as_str()) {
                        entry.version += 1;
                    }
                    affected.insert(collection.as_str().to_string());
                }
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
        }

        Ok(affected.into_iter().collect())
    }

    /// Deliver fresh snapshots to every listener of the affected collections.
    pub(crate) fn notify(&self, affected: &[String]) {
        for collection in affected {
            let Some(guard) = self.listeners.get(collection) else {
                continue;
            };
            let entries: Vec<Listener> = guard.value().clone();
            // Shard guard released before taking the state lock.
            drop(guard);

            let mut dead = Vec::new();
            {
                let state = self.state.lock();
                for listener in &entries {
                    let snapshot = self.collection_snapshot(
                        &state,
                        collection,
                        listener
                            .order_by
                            .as_deref()
                            .map(|field| (field, Direction::Asc)),
                    );
                    if listener.tx.send(snapshot).is_err() {
                        dead.push(listener.id);
                    }
                }
            }

            if !dead.is_empty() {
                if let Some(mut entries) = self.listeners.get_mut(collection) {
                    entries.retain(|listener| !dead.contains(&listener.id));
                }
                tracing::debug!(collection = %collection, pruned = dead.len(), "pruned dead listeners");
            }
        }
    }
}

/// Shallow-merge `patch`'s fields into `data`; non-object inputs replace.
fn merge_fields(data: &mut Value, patch: &Value) {
    match (data.as_object_mut(), patch.as_object()) {
        (Some(fields), Some(patch_fields)) => {
            for (key, value) in patch_fields {
                fields.insert(key.clone(), value.clone());
            }
        }
        _ => *data = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owners() -> CollectionPath {
        CollectionPath::root("owners")
    }

    #[test]
    fn paths_compose() {
        let todos = owners().doc("u1").collection("lists").doc("l1").collection("todos");
        assert_eq!(todos.as_str(), "owners/u1/lists/l1/todos");

        let todo = todos.doc("t1");
        assert_eq!(todo.id(), "t1");
        assert_eq!(todo.parent(), todos);
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = DocStore::new();
        let path = owners().doc("u1");
        store.set(&path, json!({"email": "a@b.c"})).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.data["email"], "a@b.c");
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn add_assigns_unique_ids() {
        let store = DocStore::new();
        let lists = owners().doc("u1").collection("lists");

        let a = store.add(&lists, json!({"order": 0})).await.unwrap();
        let b = store.add(&lists, json!({"order": 1})).await.unwrap();
        assert_ne!(a, b);

        let docs = store.query(Query::collection(&lists)).await.unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = DocStore::new();
        let path = owners().doc("u1");
        store
            .set(&path, json!({"title": "old", "order": 3}))
            .await
            .unwrap();
        store.update(&path, json!({"title": "new"})).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.data["title"], "new");
        assert_eq!(doc.data["order"], 3);
        assert_eq!(doc.version, 2);
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = DocStore::new();
        let path = owners().doc("ghost");
        let err = store.update(&path, json!({"title": "x"})).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = DocStore::new();
        let path = owners().doc("u1");
        store.set(&path, json!({})).await.unwrap();

        store.delete(&path).await.unwrap();
        store.delete(&path).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn query_orders_and_limits() {
        let store = DocStore::new();
        let lists = owners().doc("u1").collection("lists");
        store.add(&lists, json!({"order": 2})).await.unwrap();
        store.add(&lists, json!({"order": 0})).await.unwrap();
        store.add(&lists, json!({"order": 1})).await.unwrap();

        let asc = store
            .query(Query::collection(&lists).order_by("order", Direction::Asc))
            .await
            .unwrap();
        let orders: Vec<_> = asc.iter().map(|d| d.data["order"].as_i64().unwrap()).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let last = store
            .query(
                Query::collection(&lists)
                    .order_by("order", Direction::Desc)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].data["order"], 2);
    }

    #[tokio::test]
    async fn close_makes_operations_unavailable() {
        let store = DocStore::new();
        let path = owners().doc("u1");
        store.set(&path, json!({})).await.unwrap();

        store.close();
        store.close(); // idempotent

        assert!(matches!(
            store.get(&path).await.unwrap_err(),
            StoreError::Unavailable
        ));
        assert!(matches!(
            store.set(&path, json!({})).await.unwrap_err(),
            StoreError::Unavailable
        ));
    }

    #[tokio::test]
    async fn listener_receives_initial_and_updated_snapshots() {
        let store = DocStore::new();
        let lists = owners().doc("u1").collection("lists");
        store.add(&lists, json!({"order": 0})).await.unwrap();

        let mut stream = store.listen(&lists, Some("order"));
        let initial = stream.recv().await.unwrap();
        assert_eq!(initial.len(), 1);

        store.add(&lists, json!({"order": 1})).await.unwrap();
        let next = stream.recv().await.unwrap();
        assert_eq!(next.len(), 2);
    }

    #[tokio::test]
    async fn listener_stream_ends_on_close() {
        let store = DocStore::new();
        let lists = owners().doc("u1").collection("lists");
        let mut stream = store.listen(&lists, None);
        assert!(stream.recv().await.is_some()); // initial

        store.close();
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn write_count_tracks_applied_writes() {
        let store = DocStore::new();
        let path = owners().doc("u1");
        assert_eq!(store.write_count(), 0);

        store.set(&path, json!({})).await.unwrap();
        store.update(&path, json!({"a": 1})).await.unwrap();
        store.delete(&path).await.unwrap();
        // Deleting an absent document applies nothing.
        store.delete(&path).await.unwrap();

        assert_eq!(store.write_count(), 3);
    }
}

//! Serializable optimistic transactions.
//!
//! A transaction reads through the store, recording every document version
//! and collection membership version it observed, and buffers its writes.
//! Commit re-validates the read set under the state lock and applies the
//! buffered batch as one unit. A concurrent commit that invalidated the
//! read set rejects the attempt and the store re-runs the body from scratch.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::document::{new_document_id, Document, DocumentId};
use super::{CollectionPath, DocumentPath, Result, StoreInner, WriteOp};

/// Versions observed by a transaction's reads.
#[derive(Debug, Default)]
pub(crate) struct ReadSet {
    /// Document path -> version seen (`None` records an observed absence).
    docs: HashMap<DocumentPath, Option<u64>>,
    /// Collection path -> membership version seen.
    collections: HashMap<String, u64>,
}

impl ReadSet {
    pub(crate) fn docs(&self) -> impl Iterator<Item = (&DocumentPath, &Option<u64>)> {
        self.docs.iter()
    }

    pub(crate) fn collections(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.collections.iter()
    }
}

/// An in-flight optimistic transaction.
///
/// Reads observe committed state only; writes are buffered and invisible
/// until commit, including to the transaction's own reads.
pub struct Transaction {
    store: Arc<StoreInner>,
    reads: ReadSet,
    writes: Vec<WriteOp>,
}

impl Transaction {
    pub(crate) fn new(store: Arc<StoreInner>) -> Self {
        Self {
            store,
            reads: ReadSet::default(),
            writes: Vec::new(),
        }
    }

    /// Read one document, recording the observed version.
    pub async fn get(&mut self, path: &DocumentPath) -> Result<Option<Document>> {
        self.store.round_trip().await?;
        let doc = self.store.read_doc(path);
        self.reads
            .docs
            .insert(path.clone(), doc.as_ref().map(|d| d.version));
        Ok(doc)
    }

    /// Read a whole collection, recording its membership version and every
    /// member's document version. Optionally ordered ascending by a numeric
    /// payload field.
    pub async fn snapshot(
        &mut self,
        collection: &CollectionPath,
        order_by: Option<&str>,
    ) -> Result<Vec<Document>> {
        self.store.round_trip().await?;
        let (version, docs) = self.store.read_collection(collection, order_by);
        self.reads
            .collections
            .insert(collection.as_str().to_string(), version);
        for doc in &docs {
            self.reads
                .docs
                .insert(collection.doc(&doc.id), Some(doc.version));
        }
        Ok(docs)
    }

    /// Buffer a create-or-replace write.
    pub fn set(&mut self, path: &DocumentPath, data: Value) {
        self.writes.push(WriteOp::Set {
            path: path.clone(),
            data,
        });
    }

    /// Buffer an insert and return the id the new document will carry.
    pub fn add(&mut self, collection: &CollectionPath, data: Value) -> DocumentId {
        let id = new_document_id();
        self.writes.push(WriteOp::Add {
            collection: collection.clone(),
            id: id.clone(),
            data,
        });
        id
    }

    /// Buffer a shallow field merge into an existing document.
    pub fn update(&mut self, path: &DocumentPath, patch: Value) {
        self.writes.push(WriteOp::Update {
            path: path.clone(),
            patch,
        });
    }

    /// Buffer a delete.
    pub fn delete(&mut self, path: &DocumentPath) {
        self.writes.push(WriteOp::Delete { path: path.clone() });
    }

    /// Validate the read set and apply the buffered batch atomically.
    pub(crate) async fn commit(self) -> Result<()> {
        self.store.round_trip().await?;
        let affected = self.store.commit(&self.reads, &self.writes)?;
        self.store.notify(&affected);
        Ok(())
    }
}

//! Typed repositories over the document store.
//!
//! One repository per entity kind owns path construction and typed
//! encode/decode for that kind, so call sites never touch raw JSON or path
//! strings. Methods taking a [`Transaction`] buffer their writes into that
//! transaction; the rest hit the store directly.

use boardsync_engine::{ListId, OrderIndex, TodoId};
use serde::Serialize;
use serde_json::{json, Value};

use crate::schema::{self, ListDoc, OwnerDoc, TodoDoc, ORDER_FIELD};
use crate::store::{
    CollectionPath, Direction, DocStore, Document, Query, Result, StoreError, Transaction,
};

fn encode<T: Serialize>(target: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::InvalidDocument {
        path: target.to_string(),
        reason: e.to_string(),
    })
}

/// Repository for the owner document.
pub struct OwnerRepo<'a> {
    store: &'a DocStore,
    uid: &'a str,
}

impl<'a> OwnerRepo<'a> {
    pub fn new(store: &'a DocStore, uid: &'a str) -> Self {
        Self { store, uid }
    }

    pub async fn get(&self) -> Result<Option<OwnerDoc>> {
        match self.store.get(&schema::owner_doc(self.uid)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, email: &str) -> Result<()> {
        let path = schema::owner_doc(self.uid);
        let owner = OwnerDoc {
            email: email.to_string(),
        };
        self.store.set(&path, encode(path.as_str(), &owner)?).await
    }
}

/// Repository for an owner's lists.
pub struct ListRepo<'a> {
    store: &'a DocStore,
    uid: &'a str,
}

impl<'a> ListRepo<'a> {
    pub fn new(store: &'a DocStore, uid: &'a str) -> Self {
        Self { store, uid }
    }

    pub fn collection(&self) -> CollectionPath {
        schema::lists(self.uid)
    }

    pub async fn create(&self, doc: &ListDoc) -> Result<ListId> {
        let collection = self.collection();
        self.store
            .add(&collection, encode(collection.as_str(), doc)?)
            .await
    }

    pub async fn get(&self, list_id: &str) -> Result<Option<ListDoc>> {
        match self.store.get(&schema::list_doc(self.uid, list_id)).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn rename(&self, list_id: &str, title: &str) -> Result<()> {
        self.store
            .update(&schema::list_doc(self.uid, list_id), json!({ "title": title }))
            .await
    }

    pub async fn delete(&self, list_id: &str) -> Result<()> {
        self.store.delete(&schema::list_doc(self.uid, list_id)).await
    }

    /// The list holding the smallest order index, if any list exists.
    pub async fn first_by_order(&self) -> Result<Option<(ListId, ListDoc)>> {
        let docs = self
            .store
            .query(
                Query::collection(&self.collection())
                    .order_by(ORDER_FIELD, Direction::Asc)
                    .limit(1),
            )
            .await?;
        match docs.first() {
            Some(doc) => Ok(Some((doc.id.clone(), doc.decode()?))),
            None => Ok(None),
        }
    }

    /// The largest order index currently assigned, if any list exists.
    pub async fn last_order(&self) -> Result<Option<OrderIndex>> {
        let docs = self
            .store
            .query(
                Query::collection(&self.collection())
                    .order_by(ORDER_FIELD, Direction::Desc)
                    .limit(1),
            )
            .await?;
        match docs.first() {
            Some(doc) => {
                let list: ListDoc = doc.decode()?;
                Ok(Some(list.order))
            }
            None => Ok(None),
        }
    }

    /// Buffer an order correction for one list.
    pub fn set_order(&self, tx: &mut Transaction, list_id: &str, order: OrderIndex) {
        tx.update(
            &schema::list_doc(self.uid, list_id),
            json!({ ORDER_FIELD: order }),
        );
    }

    /// Transactional read of the whole list collection, ordered by order.
    pub async fn snapshot(&self, tx: &mut Transaction) -> Result<Vec<Document>> {
        tx.snapshot(&self.collection(), Some(ORDER_FIELD)).await
    }
}

/// Repository for the todos of one list.
pub struct TodoRepo<'a> {
    store: &'a DocStore,
    uid: &'a str,
    list_id: &'a str,
}

impl<'a> TodoRepo<'a> {
    pub fn new(store: &'a DocStore, uid: &'a str, list_id: &'a str) -> Self {
        Self {
            store,
            uid,
            list_id,
        }
    }

    pub fn collection(&self) -> CollectionPath {
        schema::todos(self.uid, self.list_id)
    }

    pub async fn create(&self, doc: &TodoDoc) -> Result<TodoId> {
        let collection = self.collection();
        self.store
            .add(&collection, encode(collection.as_str(), doc)?)
            .await
    }

    pub async fn delete(&self, todo_id: &str) -> Result<()> {
        self.store
            .delete(&schema::todo_doc(self.uid, self.list_id, todo_id))
            .await
    }

    /// The largest order index currently assigned, if any todo exists.
    pub async fn last_order(&self) -> Result<Option<OrderIndex>> {
        let docs = self
            .store
            .query(
                Query::collection(&self.collection())
                    .order_by(ORDER_FIELD, Direction::Desc)
                    .limit(1),
            )
            .await?;
        match docs.first() {
            Some(doc) => {
                let todo: TodoDoc = doc.decode()?;
                Ok(Some(todo.order))
            }
            None => Ok(None),
        }
    }

    /// Buffer an insert and return the id the new todo will carry.
    pub fn insert(&self, tx: &mut Transaction, doc: &TodoDoc) -> Result<TodoId> {
        let collection = self.collection();
        Ok(tx.add(&collection, encode(collection.as_str(), doc)?))
    }

    /// Buffer an order correction for one todo.
    pub fn set_order(&self, tx: &mut Transaction, todo_id: &str, order: OrderIndex) {
        tx.update(
            &schema::todo_doc(self.uid, self.list_id, todo_id),
            json!({ ORDER_FIELD: order }),
        );
    }

    /// Buffer a delete of one todo.
    pub fn remove(&self, tx: &mut Transaction, todo_id: &str) {
        tx.delete(&schema::todo_doc(self.uid, self.list_id, todo_id));
    }

    /// Transactional read of the whole todo collection, ordered by order.
    pub async fn snapshot(&self, tx: &mut Transaction) -> Result<Vec<Document>> {
        tx.snapshot(&self.collection(), Some(ORDER_FIELD)).await
    }
}

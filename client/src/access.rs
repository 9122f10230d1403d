//! The access layer: sole gateway for mutating the hierarchy.
//!
//! [`Access`] is an explicit context object - a store handle plus the
//! identity binding - constructed once and passed wherever mutations
//! happen. Transaction boundaries live here: every reindex commits all of
//! its sibling corrections as one batch, and transaction bodies recompute
//! against the state they re-read, so a retry after a concurrent commit
//! converges instead of replaying stale orders.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use boardsync_engine::{append_order, reindex, CardStatus, ListId, OrderIndex, Sibling, TodoId, TodoSnapshot};
use futures::FutureExt;

use crate::auth::{IdentityProvider, Session};
use crate::error::{AccessError, Result};
use crate::repo::{ListRepo, OwnerRepo, TodoRepo};
use crate::schema::{self, ListDoc, TodoDoc, ORDER_FIELD};
use crate::store::{self, DocStore, Document, StoreError};

/// Titles and statuses of the seed board created for a new owner.
const SEED_LISTS: [(&str, CardStatus); 3] = [
    ("todo", CardStatus::Todo),
    ("waiting", CardStatus::Waiting),
    ("done", CardStatus::Done),
];
const SEED_TODO_TITLE: &str = "Move me around!";
const SEED_TODO_DESCRIPTION: &str = "Test description";

/// Context object for all hierarchy mutations.
pub struct Access {
    store: DocStore,
    identity: Arc<IdentityProvider>,
}

impl Access {
    pub fn new(store: DocStore, identity: Arc<IdentityProvider>) -> Self {
        Self { store, identity }
    }

    fn session(&self) -> Result<Session> {
        self.identity.current().ok_or(AccessError::NotAuthenticated)
    }

    fn require_title(title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(AccessError::Validation("title must not be empty".into()));
        }
        Ok(())
    }

    /// Idempotent first-sign-in setup.
    ///
    /// When the owner document already exists, returns without touching
    /// anything. Otherwise creates the owner plus the seed board: lists
    /// `todo`/`waiting`/`done` with orders 0/1/2 and one todo in the first
    /// list.
    pub async fn initialize_owner(&self) -> Result<()> {
        let session = self.session()?;
        let owners = OwnerRepo::new(&self.store, &session.uid);
        if owners.get().await?.is_some() {
            return Ok(());
        }

        owners.create(&session.email).await?;

        let lists = ListRepo::new(&self.store, &session.uid);
        let mut first_list_id = None;
        for (order, (title, card_status)) in SEED_LISTS.iter().enumerate() {
            let list_id = lists
                .create(&ListDoc {
                    title: (*title).into(),
                    order: order as OrderIndex,
                    card_status: *card_status,
                })
                .await?;
            if first_list_id.is_none() {
                first_list_id = Some(list_id);
            }
        }

        if let Some(list_id) = first_list_id {
            TodoRepo::new(&self.store, &session.uid, &list_id)
                .create(&TodoDoc {
                    title: SEED_TODO_TITLE.into(),
                    description: SEED_TODO_DESCRIPTION.into(),
                    order: 0,
                })
                .await?;
        }

        tracing::info!(uid = %session.uid, "seeded default board for new owner");
        Ok(())
    }

    /// Create a list with caller-chosen order and status.
    pub async fn create_list(&self, doc: ListDoc) -> Result<ListId> {
        let session = self.session()?;
        Self::require_title(&doc.title)?;
        Ok(ListRepo::new(&self.store, &session.uid).create(&doc).await?)
    }

    /// Create a todo under an existing list. Siblings are not renumbered;
    /// the caller supplies a coherent order.
    pub async fn create_todo(&self, list_id: &str, doc: TodoDoc) -> Result<TodoId> {
        let session = self.session()?;
        Self::require_title(&doc.title)?;

        let lists = ListRepo::new(&self.store, &session.uid);
        if lists.get(list_id).await?.is_none() {
            return Err(AccessError::NotFound(format!("list {list_id}")));
        }
        Ok(TodoRepo::new(&self.store, &session.uid, list_id)
            .create(&doc)
            .await?)
    }

    /// Append a todo to the list with the smallest order index.
    ///
    /// Silently does nothing when the owner has no lists. The new todo gets
    /// order `max + 1`, or 0 into an empty list.
    pub async fn add_todo_to_first_list(&self, title: &str) -> Result<()> {
        let session = self.session()?;
        Self::require_title(title)?;

        let lists = ListRepo::new(&self.store, &session.uid);
        let Some((list_id, _)) = lists.first_by_order().await? else {
            tracing::debug!(uid = %session.uid, "no list to append to");
            return Ok(());
        };

        let todos = TodoRepo::new(&self.store, &session.uid, &list_id);
        let order = append_order(todos.last_order().await?);
        todos
            .create(&TodoDoc {
                title: title.into(),
                description: String::new(),
                order,
            })
            .await?;
        Ok(())
    }

    /// Move a todo into `target_list_id`: insert it and renumber the
    /// target's todos, all inside one transaction.
    ///
    /// `siblings` is the caller's view of the target list with the moved
    /// todo at its intended position. The transaction re-reads the live
    /// collection, so a retry after a concurrent commit recomputes orders
    /// against the post-commit state. Returns the id the store assigned to
    /// the todo in its new list.
    ///
    /// Removing the todo from its source list is the caller's follow-up
    /// ([`Access::remove_todo`] + [`Access::reindex_todos`]).
    pub async fn move_todo_into_list(
        &self,
        todo: &TodoSnapshot,
        target_list_id: &str,
        siblings: &[Sibling],
    ) -> Result<TodoId> {
        let session = self.session()?;
        let store = self.store.clone();
        let uid = session.uid.clone();
        let target = target_list_id.to_string();
        let moved = todo.clone();
        let intended = siblings.to_vec();

        let new_id = self
            .store
            .run_transaction(move |tx| {
                let store = store.clone();
                let uid = uid.clone();
                let target = target.clone();
                let moved = moved.clone();
                let intended = intended.clone();
                async move {
                    let list_path = schema::list_doc(&uid, &target);
                    if tx.get(&list_path).await?.is_none() {
                        return Err(StoreError::NotFound(list_path.as_str().to_string()));
                    }

                    let todos = TodoRepo::new(&store, &uid, &target);
                    let live = siblings_from_docs(&todos.snapshot(tx).await?)?;
                    let sequence = merge_sequence(&intended, &live, Some(moved.id.as_str()));
                    let position = sequence
                        .iter()
                        .position(|s| s.id == moved.id)
                        .unwrap_or(sequence.len()) as OrderIndex;

                    let inserted = todos.insert(
                        tx,
                        &TodoDoc {
                            title: moved.title.clone(),
                            description: moved.description.clone(),
                            order: position,
                        },
                    )?;
                    for update in reindex(&sequence, Some(moved.id.as_str())) {
                        todos.set_order(tx, &update.id, update.order);
                    }
                    Ok(inserted)
                }
                .boxed()
            })
            .await?;

        tracing::info!(uid = %session.uid, target_list = %target_list_id, "todo moved");
        Ok(new_id)
    }

    /// Renumber one list's todos after a local reorder.
    ///
    /// All corrections commit as a single batch; calling this again on
    /// already-contiguous data writes nothing.
    pub async fn reindex_todos(&self, list_id: &str, siblings: &[Sibling]) -> Result<()> {
        let session = self.session()?;
        let store = self.store.clone();
        let uid = session.uid.clone();
        let list_id = list_id.to_string();
        let intended = siblings.to_vec();

        self.store
            .run_transaction(move |tx| {
                let store = store.clone();
                let uid = uid.clone();
                let list_id = list_id.clone();
                let intended = intended.clone();
                async move {
                    let todos = TodoRepo::new(&store, &uid, &list_id);
                    let live = siblings_from_docs(&todos.snapshot(tx).await?)?;
                    let sequence = merge_sequence(&intended, &live, None);
                    for update in reindex(&sequence, None) {
                        todos.set_order(tx, &update.id, update.order);
                    }
                    Ok(())
                }
                .boxed()
            })
            .await?;
        Ok(())
    }

    /// Renumber the owner's lists; the list-level twin of
    /// [`Access::reindex_todos`].
    pub async fn reindex_lists(&self, siblings: &[Sibling]) -> Result<()> {
        let session = self.session()?;
        let store = self.store.clone();
        let uid = session.uid.clone();
        let intended = siblings.to_vec();

        self.store
            .run_transaction(move |tx| {
                let store = store.clone();
                let uid = uid.clone();
                let intended = intended.clone();
                async move {
                    let lists = ListRepo::new(&store, &uid);
                    let live = siblings_from_docs(&lists.snapshot(tx).await?)?;
                    let sequence = merge_sequence(&intended, &live, None);
                    for update in reindex(&sequence, None) {
                        lists.set_order(tx, &update.id, update.order);
                    }
                    Ok(())
                }
                .boxed()
            })
            .await?;
        Ok(())
    }

    /// Delete a single todo. Renumbering the remaining siblings is the
    /// caller's follow-up via [`Access::reindex_todos`].
    pub async fn remove_todo(&self, list_id: &str, todo_id: &str) -> Result<()> {
        let session = self.session()?;
        TodoRepo::new(&self.store, &session.uid, list_id)
            .delete(todo_id)
            .await?;
        Ok(())
    }

    /// Delete every todo of a list in one transaction: either all of them
    /// vanish or none do.
    pub async fn delete_all_todos(&self, list_id: &str) -> Result<()> {
        let session = self.session()?;
        let store = self.store.clone();
        let uid = session.uid.clone();
        let list_id = list_id.to_string();

        self.store
            .run_transaction(move |tx| {
                let store = store.clone();
                let uid = uid.clone();
                let list_id = list_id.clone();
                async move {
                    let todos = TodoRepo::new(&store, &uid, &list_id);
                    let docs = todos.snapshot(tx).await?;
                    for doc in &docs {
                        todos.remove(tx, &doc.id);
                    }
                    Ok(docs.len())
                }
                .boxed()
            })
            .await?;
        Ok(())
    }

    /// Rename a list.
    pub async fn rename_list(&self, list_id: &str, title: &str) -> Result<()> {
        let session = self.session()?;
        Self::require_title(title)?;
        ListRepo::new(&self.store, &session.uid)
            .rename(list_id, title)
            .await?;
        Ok(())
    }

    /// Delete a list together with its todos.
    ///
    /// Todos go first, transactionally; if that phase fails the list itself
    /// is left intact, so no todo ever references a missing list.
    pub async fn delete_list(&self, list_id: &str) -> Result<()> {
        self.delete_all_todos(list_id).await?;

        let session = self.session()?;
        ListRepo::new(&self.store, &session.uid)
            .delete(list_id)
            .await?;
        tracing::info!(uid = %session.uid, list_id = %list_id, "list deleted");
        Ok(())
    }

    /// Create a list appended after the current last one, with the default
    /// status.
    pub async fn create_list_appended_last(&self, title: &str) -> Result<ListId> {
        let session = self.session()?;
        Self::require_title(title)?;

        let lists = ListRepo::new(&self.store, &session.uid);
        let order = append_order(lists.last_order().await?);
        Ok(lists
            .create(&ListDoc {
                title: title.into(),
                order,
                card_status: CardStatus::Waiting,
            })
            .await?)
    }
}

fn sibling_from_doc(doc: &Document) -> store::Result<Sibling> {
    let order = doc
        .data
        .get(ORDER_FIELD)
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| StoreError::InvalidDocument {
            path: doc.id.clone(),
            reason: "missing order field".into(),
        })?;
    Ok(Sibling::new(doc.id.clone(), order as OrderIndex))
}

fn siblings_from_docs(docs: &[Document]) -> store::Result<Vec<Sibling>> {
    docs.iter().map(sibling_from_doc).collect()
}

/// Reconcile the caller's intended sibling sequence with the live state
/// read inside the transaction.
///
/// Ids that vanished from the store are dropped, ids the caller has not
/// seen yet keep their stored position at the tail, and `extra` (an entity
/// being inserted, unknown to the store) survives the liveness filter.
/// `live` must be ordered by stored order.
fn merge_sequence(intended: &[Sibling], live: &[Sibling], extra: Option<&str>) -> Vec<Sibling> {
    let live_orders: HashMap<&str, OrderIndex> =
        live.iter().map(|s| (s.id.as_str(), s.order)).collect();
    let mentioned: HashSet<&str> = intended.iter().map(|s| s.id.as_str()).collect();

    let mut sequence = Vec::with_capacity(live.len() + 1);
    for sibling in intended {
        if Some(sibling.id.as_str()) == extra {
            sequence.push(sibling.clone());
        } else if let Some(order) = live_orders.get(sibling.id.as_str()) {
            sequence.push(Sibling::new(sibling.id.clone(), *order));
        }
    }
    for sibling in live {
        if !mentioned.contains(sibling.id.as_str()) {
            sequence.push(sibling.clone());
        }
    }
    sequence
}

//! Live subscription manager.
//!
//! One listener watches the owner's list collection; per list, one listener
//! watches its todo collection. Whenever the list set changes, every todo
//! listener is cancelled and awaited before the fresh list snapshot is
//! published and new todo listeners spawn, so a list snapshot always lands
//! before the todo snapshots that depend on it and a stale listener never
//! delivers after its cancellation completes.
//!
//! Cancellation is modeled as a tree of tokens: a node owns its children's
//! tokens, and cancelling a node cancels the whole subtree depth-first
//! before the node itself winds down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use boardsync_engine::{ListSnapshot, TodoSnapshot};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::board::BoardHandle;
use crate::notify::{Notification, NotificationSink};
use crate::schema::{self, ListDoc, TodoDoc, ORDER_FIELD};
use crate::store::{DocStore, Document};

/// A node in the cancellation tree.
#[derive(Debug, Clone)]
struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<CancelToken>>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                children: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a child owned by this node. A child of an already-cancelled
    /// node is born cancelled.
    fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        if self.is_cancelled() {
            child.cancel();
            return child;
        }
        self.inner.children.lock().push(child.clone());
        // The parent may have been cancelled while the child registered.
        if self.is_cancelled() {
            child.cancel();
        }
        child
    }

    /// Cancel this node and its whole subtree, depth-first. Idempotent.
    fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.cancel();
        }
        self.inner.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                break;
            }
            notified.await;
        }
    }
}

/// Handle over a running subscription tree.
///
/// Cancellation is unconditional and idempotent: calling it twice, or after
/// the subscription already ended, is a no-op and never resurrects
/// listeners. Dropping the handle cancels as well.
#[derive(Debug)]
pub struct SubscriptionHandle {
    token: CancelToken,
    root: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Cancel the list listener and every active todo listener.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel and wait until the subscription tree has fully wound down.
    pub async fn shutdown(&self) {
        self.cancel();
        let root = self.root.lock().take();
        if let Some(root) = root {
            let _ = root.await;
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Subscribe `board` to the full hierarchy of `uid`.
///
/// Decode failures are reported to `sink` and skip the offending document;
/// they never tear down sibling listeners.
pub fn subscribe(
    store: &DocStore,
    uid: &str,
    board: &BoardHandle,
    sink: Arc<dyn NotificationSink>,
) -> SubscriptionHandle {
    let token = CancelToken::new();
    let task_token = token.clone();
    let store = store.clone();
    let uid = uid.to_string();
    let board = board.clone();

    let root = tokio::spawn(async move {
        run_list_subscription(store, uid, board, sink, task_token).await;
    });

    SubscriptionHandle {
        token,
        root: Mutex::new(Some(root)),
    }
}

async fn run_list_subscription(
    store: DocStore,
    uid: String,
    board: BoardHandle,
    sink: Arc<dyn NotificationSink>,
    token: CancelToken,
) {
    let mut stream = store.listen(&schema::lists(&uid), Some(ORDER_FIELD));
    let mut children: Vec<(CancelToken, JoinHandle<()>)> = Vec::new();

    loop {
        let snapshot = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            snapshot = stream.recv() => match snapshot {
                Some(docs) => docs,
                // Store closed; the listener set is gone.
                None => break,
            },
        };

        // Stale todo listeners must be fully gone before the new list set
        // is published.
        cancel_children(&mut children).await;

        let lists = decode_lists(&snapshot, sink.as_ref());
        let list_ids: Vec<String> = lists.iter().map(|list| list.id.clone()).collect();
        board.set_lists(lists);
        tracing::debug!(uid = %uid, lists = list_ids.len(), "list snapshot published");

        for list_id in list_ids {
            let child = token.child();
            if child.is_cancelled() {
                break;
            }
            let handle = tokio::spawn(run_todo_subscription(
                store.clone(),
                uid.clone(),
                list_id,
                board.clone(),
                Arc::clone(&sink),
                child.clone(),
            ));
            children.push((child, handle));
        }
    }

    cancel_children(&mut children).await;
    tracing::debug!(uid = %uid, "list subscription ended");
}

async fn run_todo_subscription(
    store: DocStore,
    uid: String,
    list_id: String,
    board: BoardHandle,
    sink: Arc<dyn NotificationSink>,
    token: CancelToken,
) {
    let mut stream = store.listen(&schema::todos(&uid, &list_id), Some(ORDER_FIELD));

    loop {
        let snapshot = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            snapshot = stream.recv() => match snapshot {
                Some(docs) => docs,
                None => break,
            },
        };

        let todos = decode_todos(&snapshot, &list_id, sink.as_ref());
        board.set_todos(&list_id, todos);
    }
}

async fn cancel_children(children: &mut Vec<(CancelToken, JoinHandle<()>)>) {
    for (token, handle) in children.drain(..) {
        token.cancel();
        let _ = handle.await;
    }
}

fn decode_lists(docs: &[Document], sink: &dyn NotificationSink) -> Vec<ListSnapshot> {
    let mut lists = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.decode::<ListDoc>() {
            Ok(list) => lists.push(ListSnapshot {
                id: doc.id.clone(),
                title: list.title,
                order: list.order,
                card_status: list.card_status,
            }),
            Err(e) => {
                tracing::warn!(doc_id = %doc.id, error = %e, "skipping malformed list document");
                sink.notify(Notification::error(format!(
                    "could not read list {}",
                    doc.id
                )));
            }
        }
    }
    lists
}

fn decode_todos(docs: &[Document], list_id: &str, sink: &dyn NotificationSink) -> Vec<TodoSnapshot> {
    let mut todos = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.decode::<TodoDoc>() {
            Ok(todo) => todos.push(TodoSnapshot {
                id: doc.id.clone(),
                title: todo.title,
                description: todo.description,
                order: todo.order,
            }),
            Err(e) => {
                tracing::warn!(doc_id = %doc.id, list_id = %list_id, error = %e, "skipping malformed todo document");
                sink.notify(Notification::error(format!(
                    "could not read todo {}",
                    doc.id
                )));
            }
        }
    }
    todos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancelling_a_parent_cancels_the_subtree() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel();

        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_parent_is_born_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_future_resolves_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
    }
}

//! Observable handle over the consolidated board view.
//!
//! Mutation is crate-internal: only snapshot delivery from the subscription
//! manager updates the view. External callers mutate through the access
//! layer and observe the store echoing the change back.

use std::sync::Arc;

use boardsync_engine::{Board, ListSnapshot, TodoSnapshot};
use tokio::sync::watch;

/// Shared, observable board state. Cheap to clone; all clones share state.
#[derive(Debug, Clone)]
pub struct BoardHandle {
    state: Arc<watch::Sender<Board>>,
}

impl Default for BoardHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardHandle {
    /// Start with an empty board.
    pub fn new() -> Self {
        let (state, _) = watch::channel(Board::new());
        Self {
            state: Arc::new(state),
        }
    }

    /// Subscribe to board changes.
    pub fn watch(&self) -> watch::Receiver<Board> {
        self.state.subscribe()
    }

    /// The latest board state.
    pub fn current(&self) -> Board {
        self.state.borrow().clone()
    }

    pub(crate) fn set_lists(&self, lists: Vec<ListSnapshot>) {
        self.state.send_modify(|board| board.set_lists(lists));
    }

    pub(crate) fn set_todos(&self, list_id: &str, todos: Vec<TodoSnapshot>) {
        let mut applied = false;
        self.state
            .send_modify(|board| applied = board.set_todos(list_id, todos));
        if !applied {
            tracing::debug!(list_id = %list_id, "dropped todo snapshot for unknown list");
        }
    }
}

//! Consolidated board view assembled from subscription snapshots.
//!
//! The board is a projection of the persisted hierarchy: it holds the last
//! known snapshot of every collection and is entirely rebuildable from the
//! store. Merges are partial - a todo snapshot for one list must leave every
//! other list's cached todos untouched.

use crate::{CardStatus, ListId, OrderIndex, TodoId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// List attributes as delivered by a list-collection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSnapshot {
    pub id: ListId,
    pub title: String,
    pub order: OrderIndex,
    pub card_status: CardStatus,
}

/// Todo attributes as delivered by a todo-collection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoSnapshot {
    pub id: TodoId,
    pub title: String,
    pub description: String,
    pub order: OrderIndex,
}

/// A todo as presented to the view layer.
///
/// `card_status` is not stored on the todo; it is denormalized from the
/// owning list at merge time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoCard {
    pub id: TodoId,
    pub title: String,
    pub description: String,
    pub card_status: CardStatus,
    pub order: OrderIndex,
}

/// One list column of the board, with its cached todos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListColumn {
    pub id: ListId,
    pub title: String,
    pub card_status: CardStatus,
    pub order: OrderIndex,
    pub todos: Vec<TodoCard>,
}

/// The full board view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub lists: Vec<ListColumn>,
}

impl Board {
    /// Create an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a list column by id.
    pub fn list(&self, list_id: &str) -> Option<&ListColumn> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    /// Replace the list set with a fresh snapshot.
    ///
    /// Lists absent from the snapshot are dropped together with their cached
    /// todos. Lists that survive keep their cached todos (restamped with the
    /// list's current status) until the next todo snapshot arrives; lists
    /// that are new start empty.
    pub fn set_lists(&mut self, lists: Vec<ListSnapshot>) {
        let mut retained: HashMap<ListId, Vec<TodoCard>> = self
            .lists
            .drain(..)
            .map(|list| (list.id, list.todos))
            .collect();

        self.lists = lists
            .into_iter()
            .map(|snapshot| {
                let mut todos = retained.remove(&snapshot.id).unwrap_or_default();
                for todo in &mut todos {
                    todo.card_status = snapshot.card_status;
                }
                ListColumn {
                    id: snapshot.id,
                    title: snapshot.title,
                    card_status: snapshot.card_status,
                    order: snapshot.order,
                    todos,
                }
            })
            .collect();
    }

    /// Replace the todos of the list matching `list_id`.
    ///
    /// Every other list is left untouched. A snapshot for a list that is no
    /// longer present (a todo listener racing a list deletion) is dropped;
    /// the return value reports whether the snapshot was applied.
    pub fn set_todos(&mut self, list_id: &str, todos: Vec<TodoSnapshot>) -> bool {
        let Some(list) = self.lists.iter_mut().find(|list| list.id == list_id) else {
            return false;
        };

        let card_status = list.card_status;
        list.todos = todos
            .into_iter()
            .map(|snapshot| TodoCard {
                id: snapshot.id,
                title: snapshot.title,
                description: snapshot.description,
                card_status,
                order: snapshot.order,
            })
            .collect();
        true
    }
}

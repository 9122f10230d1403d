//! Persisted document schemas and path construction.
//!
//! The hierarchy is
//! `owners/{ownerId}/lists/{listId}/todos/{todoId}`; every path is built
//! here so no other module concatenates path strings.

use boardsync_engine::{CardStatus, OrderIndex};
use serde::{Deserialize, Serialize};

use crate::store::{CollectionPath, DocumentPath};

/// Top-level collection of owners.
pub const OWNERS: &str = "owners";
/// Subcollection of lists under an owner.
pub const LISTS: &str = "lists";
/// Subcollection of todos under a list.
pub const TODOS: &str = "todos";

/// Payload field carrying the sibling order index.
pub const ORDER_FIELD: &str = "order";

/// Persisted owner document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerDoc {
    pub email: String,
}

/// Persisted list document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDoc {
    pub title: String,
    pub order: OrderIndex,
    pub card_status: CardStatus,
}

/// Persisted todo document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoDoc {
    pub title: String,
    pub description: String,
    pub order: OrderIndex,
}

/// `owners/{uid}`
pub fn owner_doc(uid: &str) -> DocumentPath {
    CollectionPath::root(OWNERS).doc(uid)
}

/// `owners/{uid}/lists`
pub fn lists(uid: &str) -> CollectionPath {
    owner_doc(uid).collection(LISTS)
}

/// `owners/{uid}/lists/{listId}`
pub fn list_doc(uid: &str, list_id: &str) -> DocumentPath {
    lists(uid).doc(list_id)
}

/// `owners/{uid}/lists/{listId}/todos`
pub fn todos(uid: &str, list_id: &str) -> CollectionPath {
    list_doc(uid, list_id).collection(TODOS)
}

/// `owners/{uid}/lists/{listId}/todos/{todoId}`
pub fn todo_doc(uid: &str, list_id: &str, todo_id: &str) -> DocumentPath {
    todos(uid, list_id).doc(todo_id)
}

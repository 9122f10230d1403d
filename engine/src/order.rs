//! Sibling order assignment.
//!
//! Lists on a board and todos within a list both carry a zero-based,
//! contiguous order index. This module assigns and repairs those indices
//! for one sibling collection at a time. The functions here are total:
//! every input produces an assignment, never an error.

use crate::OrderIndex;
use serde::{Deserialize, Serialize};

/// A sibling entity as currently stored: its id and persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sibling {
    pub id: String,
    pub order: OrderIndex,
}

impl Sibling {
    pub fn new(id: impl Into<String>, order: OrderIndex) -> Self {
        Self {
            id: id.into(),
            order,
        }
    }
}

/// An order correction for a single sibling document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub id: String,
    pub order: OrderIndex,
}

/// Assign indices `0..n-1` to `siblings` in iteration order and return the
/// corrections for entities whose stored order differs.
///
/// An entity matching `exclude` still occupies its position in the sequence
/// but receives no correction - it was written with its final order when it
/// was inserted. Entities that already hold the right index are skipped as an
/// optimization; callers must not rely on that to limit write sets, only on
/// the resulting orders being contiguous.
///
/// Idempotent: applying the returned corrections and calling `reindex` again
/// on the corrected sequence yields an empty set.
pub fn reindex(siblings: &[Sibling], exclude: Option<&str>) -> Vec<OrderUpdate> {
    let mut updates = Vec::new();

    for (index, sibling) in siblings.iter().enumerate() {
        let index = index as OrderIndex;
        if exclude == Some(sibling.id.as_str()) {
            continue;
        }
        if sibling.order != index {
            updates.push(OrderUpdate {
                id: sibling.id.clone(),
                order: index,
            });
        }
    }

    updates
}

/// Order index for an entity appended after the current maximum, or the
/// first index when the collection is empty.
pub fn append_order(last: Option<OrderIndex>) -> OrderIndex {
    match last {
        Some(order) => order + 1,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siblings(orders: &[(&str, OrderIndex)]) -> Vec<Sibling> {
        orders
            .iter()
            .map(|(id, order)| Sibling::new(*id, *order))
            .collect()
    }

    #[test]
    fn empty_sequence_yields_no_updates() {
        assert!(reindex(&[], None).is_empty());
        assert!(reindex(&[], Some("ghost")).is_empty());
    }

    #[test]
    fn already_contiguous_yields_no_updates() {
        let seq = siblings(&[("a", 0), ("b", 1), ("c", 2)]);
        assert!(reindex(&seq, None).is_empty());
    }

    #[test]
    fn gap_is_closed() {
        // "b" was removed from between "a" and "c".
        let seq = siblings(&[("a", 0), ("c", 2)]);
        let updates = reindex(&seq, None);
        assert_eq!(updates, vec![OrderUpdate { id: "c".into(), order: 1 }]);
    }

    #[test]
    fn reordered_sequence_is_renumbered() {
        // "c" dragged to the front.
        let seq = siblings(&[("c", 2), ("a", 0), ("b", 1)]);
        let updates = reindex(&seq, None);
        assert_eq!(
            updates,
            vec![
                OrderUpdate { id: "c".into(), order: 0 },
                OrderUpdate { id: "a".into(), order: 1 },
                OrderUpdate { id: "b".into(), order: 2 },
            ]
        );
    }

    #[test]
    fn excluded_entity_occupies_its_position() {
        // "m" was just inserted at position 1 with order 1 already written.
        let seq = siblings(&[("a", 0), ("m", 1), ("b", 1), ("c", 2)]);
        let updates = reindex(&seq, Some("m"));
        assert_eq!(
            updates,
            vec![
                OrderUpdate { id: "b".into(), order: 2 },
                OrderUpdate { id: "c".into(), order: 3 },
            ]
        );
    }

    #[test]
    fn exclusion_of_absent_id_changes_nothing() {
        let seq = siblings(&[("a", 0), ("b", 1)]);
        assert!(reindex(&seq, Some("ghost")).is_empty());
    }

    #[test]
    fn idempotent_after_applying_corrections() {
        let mut seq = siblings(&[("x", 5), ("y", 0), ("z", 9)]);
        let updates = reindex(&seq, None);
        for update in &updates {
            let sibling = seq.iter_mut().find(|s| s.id == update.id).unwrap();
            sibling.order = update.order;
        }
        assert!(reindex(&seq, None).is_empty());
    }

    #[test]
    fn append_to_empty_collection() {
        assert_eq!(append_order(None), 0);
    }

    #[test]
    fn append_after_current_max() {
        assert_eq!(append_order(Some(0)), 1);
        assert_eq!(append_order(Some(41)), 42);
    }
}

//! Re-ranking of a column's cards.
//!
//! Normalization is a stable re-rank: after any pass the orders of a
//! column's cards form a contiguous ascending sequence starting at 1, and
//! ties are broken by the cards' relative order before the pass.

use std::collections::{HashMap, HashSet};

use crate::types::BoardSnapshot;

/// Current id order of a column's cards: ascending rank, ties keep snapshot
/// position.
pub fn current_id_order(board: &BoardSnapshot, column_id: &str) -> Vec<String> {
    let mut members: Vec<(&str, i64)> = board
        .cards_in(column_id)
        .map(|c| (c.uuid.as_str(), c.order.unwrap_or(0)))
        .collect();
    members.sort_by_key(|(_, order)| *order);
    members.into_iter().map(|(id, _)| id.to_string()).collect()
}

/// Re-number the cards of a column sequentially starting at 1.
///
/// Cards listed in `ordered_ids` come first, in list order; duplicates and
/// ids that are not members of the column are skipped. Members missing from
/// the list are appended afterward in their previous stable order, which
/// makes the operation tolerant of partial or stale id lists. Applying the
/// resulting order again is a no-op.
pub fn apply_order_to_column(board: &mut BoardSnapshot, column_id: &str, ordered_ids: &[String]) {
    let members = current_id_order(board, column_id);
    let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();

    let mut final_order: Vec<&str> = Vec::with_capacity(members.len());
    let mut seen: HashSet<&str> = HashSet::new();
    for id in ordered_ids {
        if member_set.contains(id.as_str()) && seen.insert(id.as_str()) {
            final_order.push(id.as_str());
        }
    }
    for id in &members {
        if !seen.contains(id.as_str()) {
            final_order.push(id.as_str());
        }
    }

    let ranks: HashMap<&str, i64> = final_order
        .iter()
        .enumerate()
        .map(|(idx, id)| (*id, (idx + 1) as i64))
        .collect();
    for card in board.cards.iter_mut() {
        if card.column_id != column_id {
            continue;
        }
        if let Some(rank) = ranks.get(card.uuid.as_str()) {
            card.order = Some(*rank);
        }
    }
}

/// Stable re-rank of a column to a dense 1..N sequence.
pub fn normalize_column(board: &mut BoardSnapshot, column_id: &str) {
    apply_order_to_column(board, column_id, &[]);
}

/// Rank for a card appended to the end of a column.
pub fn next_order_in(board: &BoardSnapshot, column_id: &str) -> i64 {
    board.max_order_in(column_id) + 1
}

/// Apply the full local effect of a move: reassign column membership, place
/// the card (last when no explicit order was given, verbatim otherwise) and
/// close the gap in the source column.
pub fn move_card_local(
    board: &mut BoardSnapshot,
    card_id: &str,
    target_column_id: &str,
    ordered_ids: Option<&[String]>,
) {
    let Some(source_column_id) = board.card(card_id).map(|c| c.column_id.clone()) else {
        return;
    };
    let column_changed = source_column_id != target_column_id;
    if column_changed {
        let next = next_order_in(board, target_column_id);
        if let Some(card) = board.card_mut(card_id) {
            card.column_id = target_column_id.to_string();
            card.order = Some(next);
        }
    }
    if let Some(ids) = ordered_ids {
        apply_order_to_column(board, target_column_id, ids);
    }
    if column_changed {
        normalize_column(board, &source_column_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Card;

    fn card(uuid: &str, column_id: &str, order: i64) -> Card {
        Card {
            uuid: uuid.to_string(),
            column_id: column_id.to_string(),
            order: Some(order),
            ..Default::default()
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn orders_of(board: &BoardSnapshot, column_id: &str) -> Vec<(String, i64)> {
        current_id_order(board, column_id)
            .into_iter()
            .map(|id| {
                let order = board.card(&id).and_then(|c| c.order).unwrap_or(0);
                (id, order)
            })
            .collect()
    }

    fn board_a123() -> BoardSnapshot {
        BoardSnapshot {
            columns: Vec::new(),
            cards: vec![card("1", "A", 1), card("2", "A", 2), card("3", "A", 3)],
        }
    }

    #[test]
    fn test_drag_between_renumbers() {
        // Card 3 dragged between 1 and 2.
        let mut board = board_a123();
        apply_order_to_column(&mut board, "A", &ids(&["1", "3", "2"]));
        assert_eq!(
            orders_of(&board, "A"),
            vec![
                ("1".to_string(), 1),
                ("3".to_string(), 2),
                ("2".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_apply_order_is_idempotent() {
        let mut board = board_a123();
        apply_order_to_column(&mut board, "A", &ids(&["3", "1", "2"]));
        let first = board.clone();
        let same_order = current_id_order(&board, "A");
        apply_order_to_column(&mut board, "A", &same_order);
        assert_eq!(board, first);
    }

    #[test]
    fn test_partial_list_appends_rest_in_stable_order() {
        // A stale read that only mentions card 3: the rest keep their
        // previous relative order behind it.
        let mut board = board_a123();
        apply_order_to_column(&mut board, "A", &ids(&["3"]));
        assert_eq!(current_id_order(&board, "A"), ids(&["3", "1", "2"]));
    }

    #[test]
    fn test_unknown_and_duplicate_ids_are_skipped() {
        let mut board = board_a123();
        apply_order_to_column(&mut board, "A", &ids(&["2", "ghost", "2", "1"]));
        assert_eq!(current_id_order(&board, "A"), ids(&["2", "1", "3"]));
        assert_eq!(
            orders_of(&board, "A"),
            vec![
                ("2".to_string(), 1),
                ("1".to_string(), 2),
                ("3".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_normalize_is_stable_over_gaps_and_ties() {
        let mut board = BoardSnapshot {
            columns: Vec::new(),
            cards: vec![
                card("x", "A", 7),
                card("y", "A", 7),
                card("z", "A", 2),
            ],
        };
        normalize_column(&mut board, "A");
        assert_eq!(
            orders_of(&board, "A"),
            vec![
                ("z".to_string(), 1),
                ("x".to_string(), 2),
                ("y".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_move_without_order_places_last_and_closes_gap() {
        let mut board = board_a123();
        board.cards.push(card("b1", "B", 5));
        move_card_local(&mut board, "2", "B", None);
        assert_eq!(board.card("2").unwrap().column_id, "B");
        assert_eq!(board.card("2").unwrap().order, Some(6));
        // Source renormalized to 1..N-1 preserving relative order.
        assert_eq!(
            orders_of(&board, "A"),
            vec![("1".to_string(), 1), ("3".to_string(), 2)]
        );
    }

    #[test]
    fn test_move_with_explicit_order_applies_verbatim() {
        let mut board = board_a123();
        board.cards.push(card("b1", "B", 1));
        move_card_local(&mut board, "3", "B", Some(&ids(&["3", "b1"])));
        assert_eq!(
            orders_of(&board, "B"),
            vec![("3".to_string(), 1), ("b1".to_string(), 2)]
        );
        assert_eq!(
            orders_of(&board, "A"),
            vec![("1".to_string(), 1), ("2".to_string(), 2)]
        );
    }

    #[test]
    fn test_move_within_column_with_order_only_renumbers() {
        let mut board = board_a123();
        move_card_local(&mut board, "1", "A", Some(&ids(&["2", "1", "3"])));
        assert_eq!(current_id_order(&board, "A"), ids(&["2", "1", "3"]));
    }
}

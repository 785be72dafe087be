use std::collections::HashMap;

use crate::types::{BoardSnapshot, Card, Column};

/// Derived, always-sorted projections of the board snapshot.
///
/// The cache is never mutated independently: `invalidate` is the only
/// mutator, and reads rebuild lazily from the snapshot they are given.
/// Invariant: whenever `dirty` is false, `sorted_columns` and `cards_for`
/// are exact sorted projections of the snapshot used for the last rebuild.
///
/// Sorting key is `order.unwrap_or(0)` ascending. Equal keys keep snapshot
/// position (the sort is stable); callers rely on untouched items keeping
/// their relative position across re-ranks.
#[derive(Debug, Default)]
pub struct BoardCache {
    columns: Vec<Column>,
    cards_by_column: HashMap<String, Vec<Card>>,
    dirty: bool,
}

impl BoardCache {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            cards_by_column: HashMap::new(),
            dirty: true,
        }
    }

    /// Mark every derived view stale. Called by every operation that touches
    /// columns or cards.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Columns in ascending rank order.
    pub fn sorted_columns(&mut self, board: &BoardSnapshot) -> &[Column] {
        self.ensure(board);
        &self.columns
    }

    /// Cards of one column in ascending rank order. Unknown columns yield an
    /// empty slice.
    pub fn cards_for(&mut self, board: &BoardSnapshot, column_id: &str) -> &[Card] {
        self.ensure(board);
        self.cards_by_column
            .get(column_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn ensure(&mut self, board: &BoardSnapshot) {
        if !self.dirty {
            return;
        }
        self.columns = board.columns.clone();
        self.columns.sort_by_key(|c| c.order.unwrap_or(0));
        self.cards_by_column.clear();
        for card in &board.cards {
            self.cards_by_column
                .entry(card.column_id.clone())
                .or_default()
                .push(card.clone());
        }
        for cards in self.cards_by_column.values_mut() {
            cards.sort_by_key(|c| c.order.unwrap_or(0));
        }
        self.dirty = false;
    }
}

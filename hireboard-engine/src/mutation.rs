//! Optimistic mutation protocol.
//!
//! Every mutating backend call is bracketed by a [`MutationScope`]: take a
//! snapshot, apply the speculative local change, await the backend, then
//! either commit (reconciling server-confirmed truth into the board) or roll
//! back to the exact pre-apply snapshot. The reconcile step may itself fail,
//! say a backend that replies 200 with a not-ok body, and that converts into
//! the same rollback path.

use crate::cache::BoardCache;
use crate::types::BoardSnapshot;

/// Lifecycle of one optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Speculative local change applied; backend outcome pending.
    Applied,
    /// Backend confirmed; local state reconciled with server truth.
    Committed,
    /// Local state restored to the pre-apply snapshot.
    RolledBack,
}

/// Guards one speculative mutation of the board.
///
/// A scope that is dropped while still [`MutationState::Applied`] rolls back,
/// so an early return cannot leave speculative state behind.
pub struct MutationScope<'a> {
    board: &'a mut BoardSnapshot,
    cache: &'a mut BoardCache,
    saved: Option<BoardSnapshot>,
    state: MutationState,
}

impl<'a> MutationScope<'a> {
    /// Snapshot the board before any speculative change.
    pub fn begin(board: &'a mut BoardSnapshot, cache: &'a mut BoardCache) -> Self {
        let saved = Some(board.clone());
        Self {
            board,
            cache,
            saved,
            state: MutationState::Applied,
        }
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Apply the speculative local mutation and invalidate the derived cache.
    pub fn apply(&mut self, mutate: impl FnOnce(&mut BoardSnapshot)) {
        mutate(self.board);
        self.cache.invalidate();
    }

    /// Commit the mutation, reconciling local state with what the backend
    /// confirmed. A reconcile error restores the pre-apply snapshot and is
    /// handed back to the caller.
    pub fn commit<E>(
        mut self,
        reconcile: impl FnOnce(&mut BoardSnapshot) -> Result<(), E>,
    ) -> Result<MutationState, E> {
        match reconcile(self.board) {
            Ok(()) => {
                self.saved = None;
                self.state = MutationState::Committed;
                self.cache.invalidate();
                Ok(MutationState::Committed)
            }
            Err(err) => {
                self.restore();
                Err(err)
            }
        }
    }

    /// Restore the pre-apply snapshot bit-for-bit.
    pub fn rollback(mut self) -> MutationState {
        self.restore();
        MutationState::RolledBack
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.board = saved;
            self.cache.invalidate();
            self.state = MutationState::RolledBack;
        }
    }
}

impl Drop for MutationScope<'_> {
    fn drop(&mut self) {
        if self.state == MutationState::Applied {
            self.restore();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Card;

    fn board() -> BoardSnapshot {
        BoardSnapshot {
            columns: Vec::new(),
            cards: vec![Card {
                uuid: "a".to_string(),
                column_id: "col-1".to_string(),
                order: Some(1),
                ..Default::default()
            }],
        }
    }

    fn push_card(board: &mut BoardSnapshot) {
        board.cards.push(Card {
            uuid: "b".to_string(),
            column_id: "col-1".to_string(),
            order: Some(2),
            ..Default::default()
        });
    }

    #[test]
    fn test_commit_keeps_reconciled_state() {
        let mut board = board();
        let mut cache = BoardCache::new();
        let mut scope = MutationScope::begin(&mut board, &mut cache);
        scope.apply(push_card);
        let state = scope
            .commit(|board| {
                board.cards[1].order = Some(7);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(state, MutationState::Committed);
        assert_eq!(board.cards.len(), 2);
        assert_eq!(board.cards[1].order, Some(7));
    }

    #[test]
    fn test_rollback_restores_exact_snapshot() {
        let mut board = board();
        let before = board.clone();
        let mut cache = BoardCache::new();
        let mut scope = MutationScope::begin(&mut board, &mut cache);
        scope.apply(push_card);
        assert_eq!(scope.rollback(), MutationState::RolledBack);
        assert_eq!(board, before);
    }

    #[test]
    fn test_failed_reconcile_rolls_back() {
        let mut board = board();
        let before = board.clone();
        let mut cache = BoardCache::new();
        let mut scope = MutationScope::begin(&mut board, &mut cache);
        scope.apply(push_card);
        let err = scope.commit(|_| Err::<(), _>("not ok")).unwrap_err();
        assert_eq!(err, "not ok");
        assert_eq!(board, before);
    }

    #[test]
    fn test_dropped_scope_rolls_back() {
        let mut board = board();
        let before = board.clone();
        let mut cache = BoardCache::new();
        {
            let mut scope = MutationScope::begin(&mut board, &mut cache);
            scope.apply(push_card);
        }
        assert_eq!(board, before);
        assert!(cache.is_dirty());
    }

    #[test]
    fn test_apply_invalidates_cache() {
        let mut board = board();
        let mut cache = BoardCache::new();
        cache.sorted_columns(&board);
        assert!(!cache.is_dirty());
        let mut scope = MutationScope::begin(&mut board, &mut cache);
        scope.apply(push_card);
        assert_eq!(scope.state(), MutationState::Applied);
        scope.commit(|_| Ok::<(), ()>(())).unwrap();
        assert!(cache.is_dirty());
    }
}

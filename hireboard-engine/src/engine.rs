//! The board engine: one owned instance holding the snapshot, the derived
//! cache, the undo/redo stacks and the drag session. All operations go
//! through it explicitly; there is no ambient global state.
//!
//! Every mutating operation follows the optimistic protocol: speculative
//! local apply, backend call, then commit (reconciling server truth) or
//! rollback to the exact pre-apply snapshot. Moves are the exception: their
//! persistence is multi-step and non-atomic, so any step failing discards
//! all local state and reloads from the backend instead of attempting a
//! partial repair.

use serde_json::Value;
use uuid::Uuid;

use crate::backend::{BoardBackend, TransportError};
use crate::cache::BoardCache;
use crate::drag::{DragError, DragSession, ItemSpan};
use crate::history::UndoRedoStacks;
use crate::mutation::MutationScope;
use crate::reorder::{current_id_order, move_card_local, next_order_in, normalize_column};
use crate::types::{BoardSnapshot, Card, CardDraft, CardPatch, Column, ProcessRequest};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("backend call failed: {0}")]
    Transport(#[from] TransportError),

    #[error("operation rejected: {0}")]
    Rejected(String),

    #[error("{step} could not be persisted; board reloaded from backend")]
    OutOfSync {
        step: &'static str,
        #[source]
        cause: TransportError,
    },

    #[error("card not found: {0}")]
    UnknownCard(String),

    #[error("column not found: {0}")]
    UnknownColumn(String),

    #[error(transparent)]
    Drag(#[from] DragError),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// Fired on every state change so the view layer can re-render only the
/// affected columns. An empty column list means the whole board changed.
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// A speculative local apply; the backend outcome is still pending.
    /// This is what lets the view paint optimistic state immediately.
    Applied { columns: Vec<String> },
    Mutated { columns: Vec<String> },
    RolledBack { columns: Vec<String> },
    Reloaded,
}

type Listener = Box<dyn Fn(&BoardEvent) + Send>;

/// Listener dispatch as a free function over the listener list, so it can
/// run while a [`MutationScope`] still holds the board and cache borrows.
fn notify(listeners: &[Listener], event: &BoardEvent) {
    for listener in listeners {
        listener(event);
    }
}

/// Record that a mutation's response arrived; stale responses (a later
/// mutation already committed) must not reconcile server payloads into
/// local state.
fn fresh_commit(last_committed: &mut u64, seq: u64) -> bool {
    if seq > *last_committed {
        *last_committed = seq;
        true
    } else {
        false
    }
}

pub struct BoardEngine<B: BoardBackend> {
    backend: B,
    board: BoardSnapshot,
    cache: BoardCache,
    history: UndoRedoStacks,
    drag: DragSession,
    listeners: Vec<Listener>,
    seq: u64,
    last_committed_seq: u64,
}

impl<B: BoardBackend> BoardEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            board: BoardSnapshot::default(),
            cache: BoardCache::new(),
            history: UndoRedoStacks::new(),
            drag: DragSession::new(),
            listeners: Vec::new(),
            seq: 0,
            last_committed_seq: 0,
        }
    }

    /// Initial load from the backend.
    pub async fn load(&mut self) -> Result<(), EngineError> {
        self.reload().await
    }

    /// Replace the snapshot wholesale with backend truth, discarding all
    /// local speculative state. The only recovery path after a partial
    /// persistence failure.
    pub async fn reload(&mut self) -> Result<(), EngineError> {
        let payload = self.backend.get_board().await?;
        self.board = BoardSnapshot {
            columns: payload.columns,
            cards: payload.cards,
        };
        self.cache.invalidate();
        self.last_committed_seq = self.seq;
        log::debug!(
            "board reloaded: {} columns, {} cards",
            self.board.columns.len(),
            self.board.cards.len()
        );
        self.emit(&BoardEvent::Reloaded);
        Ok(())
    }

    // --- read surface for the rendering collaborator ---

    pub fn sorted_columns(&mut self) -> &[Column] {
        self.cache.sorted_columns(&self.board)
    }

    pub fn cards_for(&mut self, column_id: &str) -> &[Card] {
        self.cache.cards_for(&self.board, column_id)
    }

    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    pub fn subscribe(&mut self, listener: impl Fn(&BoardEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn history(&self) -> &UndoRedoStacks {
        &self.history
    }

    /// Drop an undo token consumed directly (e.g. from a toast), bypassing
    /// the stack.
    pub fn discard_undo_token(&mut self, token: &str) {
        self.history.remove_undo(token);
    }

    fn emit(&self, event: &BoardEvent) {
        notify(&self.listeners, event);
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    // --- coordinator-wrapped mutations ---

    pub async fn add_column(&mut self, name: &str) -> Result<(), EngineError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Rejected("column name is required".to_string()));
        }
        let seq = self.next_seq();
        let temp_id = format!("tmp-{}", Uuid::new_v4());
        let mut scope = MutationScope::begin(&mut self.board, &mut self.cache);
        {
            let name = name.clone();
            scope.apply(move |board| {
                let order = board.columns.iter().filter_map(|c| c.order).max().unwrap_or(0);
                board.columns.push(Column {
                    id: temp_id,
                    name,
                    order: Some(order + 1),
                    created_at: None,
                });
            });
        }
        notify(&self.listeners, &BoardEvent::Applied { columns: Vec::new() });
        match self.backend.add_column(&name).await {
            Ok(resp) if resp.ok => {
                let fresh = fresh_commit(&mut self.last_committed_seq, seq);
                let commit = scope.commit(|board| {
                    if fresh && !resp.columns.is_empty() {
                        board.columns = resp.columns;
                    }
                    Ok::<(), EngineError>(())
                });
                self.settle_structural(commit)
            }
            Ok(resp) => {
                scope.rollback();
                self.emit(&BoardEvent::RolledBack { columns: Vec::new() });
                Err(EngineError::Rejected(resp.error.unwrap_or_else(|| {
                    "column could not be added".to_string()
                })))
            }
            Err(err) => {
                log::warn!("add_column failed: {}", err);
                scope.rollback();
                self.emit(&BoardEvent::RolledBack { columns: Vec::new() });
                Err(err.into())
            }
        }
    }

    pub async fn remove_column(&mut self, column_id: &str) -> Result<(), EngineError> {
        if !self.board.has_column(column_id) {
            return Err(EngineError::UnknownColumn(column_id.to_string()));
        }
        let seq = self.next_seq();
        let mut scope = MutationScope::begin(&mut self.board, &mut self.cache);
        {
            let column_id = column_id.to_string();
            scope.apply(move |board| {
                board.columns.retain(|c| c.id != column_id);
                board.cards.retain(|c| c.column_id != column_id);
            });
        }
        notify(&self.listeners, &BoardEvent::Applied { columns: Vec::new() });
        match self.backend.remove_column(column_id).await {
            Ok(resp) if resp.ok => {
                let fresh = fresh_commit(&mut self.last_committed_seq, seq);
                let undo_id = resp.undo_id.clone();
                let commit = scope.commit(|board| {
                    if fresh {
                        if let Some(columns) = resp.columns {
                            board.columns = columns;
                        }
                        if let Some(cards) = resp.cards {
                            board.cards = cards;
                        }
                    }
                    Ok::<(), EngineError>(())
                });
                if commit.is_ok() {
                    if let Some(token) = undo_id {
                        self.history.push_undo(token, true);
                    }
                }
                self.settle_structural(commit)
            }
            Ok(resp) => {
                scope.rollback();
                self.emit(&BoardEvent::RolledBack { columns: Vec::new() });
                Err(EngineError::Rejected(resp.message.unwrap_or_else(|| {
                    "column could not be removed".to_string()
                })))
            }
            Err(err) => {
                log::warn!("remove_column failed: {}", err);
                scope.rollback();
                self.emit(&BoardEvent::RolledBack { columns: Vec::new() });
                Err(err.into())
            }
        }
    }

    pub async fn add_card(&mut self, draft: &CardDraft) -> Result<(), EngineError> {
        if !self.board.has_column(&draft.column_id) {
            return Err(EngineError::UnknownColumn(draft.column_id.clone()));
        }
        let seq = self.next_seq();
        let temp_uuid = format!("tmp-{}", Uuid::new_v4());
        let column_id = draft.column_id.clone();
        let mut card = Card {
            uuid: temp_uuid.clone(),
            column_id: column_id.clone(),
            order: Some(next_order_in(&self.board, &column_id)),
            ..Default::default()
        };
        card.apply_patch(&draft.fields);
        let mut scope = MutationScope::begin(&mut self.board, &mut self.cache);
        scope.apply(move |board| board.cards.push(card));
        notify(
            &self.listeners,
            &BoardEvent::Applied {
                columns: vec![column_id.clone()],
            },
        );
        match self.backend.add_card(draft).await {
            Ok(resp) if resp.ok => {
                let fresh = fresh_commit(&mut self.last_committed_seq, seq);
                let commit = scope.commit(|board| {
                    if !fresh {
                        return Ok(());
                    }
                    if let Some(server_card) = resp.card {
                        // The temporary client id gives way to the real one.
                        if let Some(local) = board.card_mut(&temp_uuid) {
                            *local = server_card;
                        } else {
                            board.cards.push(server_card);
                        }
                    } else if let Some(cards) = resp.cards {
                        board.cards = cards;
                    } else {
                        return Err(EngineError::Rejected(
                            "malformed add-card response".to_string(),
                        ));
                    }
                    Ok(())
                });
                self.settle(commit, vec![column_id])
            }
            Ok(resp) => {
                scope.rollback();
                self.emit(&BoardEvent::RolledBack {
                    columns: vec![column_id],
                });
                Err(EngineError::Rejected(resp.error.unwrap_or_else(|| {
                    "card could not be added".to_string()
                })))
            }
            Err(err) => {
                log::warn!("add_card failed: {}", err);
                scope.rollback();
                self.emit(&BoardEvent::RolledBack {
                    columns: vec![column_id],
                });
                Err(err.into())
            }
        }
    }

    pub async fn update_card(
        &mut self,
        card_id: &str,
        patch: &CardPatch,
    ) -> Result<(), EngineError> {
        let Some(card) = self.board.card(card_id) else {
            return Err(EngineError::UnknownCard(card_id.to_string()));
        };
        let source_column = card.column_id.clone();
        let mut affected = vec![source_column.clone()];
        if let Some(value) = patch.get("column_id") {
            let target = value.as_str().unwrap_or_default();
            if !self.board.has_column(target) {
                return Err(EngineError::UnknownColumn(target.to_string()));
            }
            if target != source_column {
                affected.push(target.to_string());
            }
        }
        let seq = self.next_seq();
        // A membership change must leave both columns with contiguous
        // rankings, locally and after the server payload is reconciled.
        let moved = affected.len() > 1;
        let mut scope = MutationScope::begin(&mut self.board, &mut self.cache);
        {
            let card_id = card_id.to_string();
            let patch = patch.clone();
            let columns = affected.clone();
            scope.apply(move |board| {
                if let Some(card) = board.card_mut(&card_id) {
                    card.apply_patch(&patch);
                }
                if moved {
                    for column_id in &columns {
                        normalize_column(board, column_id);
                    }
                }
            });
        }
        notify(
            &self.listeners,
            &BoardEvent::Applied {
                columns: affected.clone(),
            },
        );
        match self.backend.update_card(card_id, patch).await {
            Ok(resp) => {
                let fresh = fresh_commit(&mut self.last_committed_seq, seq);
                let columns = affected.clone();
                let commit = scope.commit(|board| {
                    if fresh {
                        board.cards = resp.cards;
                        if moved {
                            for column_id in &columns {
                                normalize_column(board, column_id);
                            }
                        }
                    }
                    Ok::<(), EngineError>(())
                });
                self.settle(commit, affected)
            }
            Err(err) => {
                log::warn!("update_card failed: {}", err);
                scope.rollback();
                self.emit(&BoardEvent::RolledBack { columns: affected });
                Err(err.into())
            }
        }
    }

    pub async fn process_item(&mut self, request: &ProcessRequest) -> Result<(), EngineError> {
        let Some(card) = self.board.card(&request.id) else {
            return Err(EngineError::UnknownCard(request.id.clone()));
        };
        let column_id = card.column_id.clone();
        let seq = self.next_seq();
        let mut scope = MutationScope::begin(&mut self.board, &mut self.cache);
        {
            let id = request.id.clone();
            let column_id = column_id.clone();
            scope.apply(move |board| {
                board.cards.retain(|c| c.uuid != id);
                // Close the gap so the column's ranking stays contiguous.
                normalize_column(board, &column_id);
            });
        }
        notify(
            &self.listeners,
            &BoardEvent::Applied {
                columns: vec![column_id.clone()],
            },
        );
        match self.backend.process_item(request).await {
            Ok(resp) if resp.ok => {
                let fresh = fresh_commit(&mut self.last_committed_seq, seq);
                let undo_id = resp.undo_id.clone();
                let commit = scope.commit(|board| {
                    if fresh {
                        if let Some(cards) = resp.cards {
                            board.cards = cards;
                        }
                    }
                    Ok::<(), EngineError>(())
                });
                if commit.is_ok() {
                    if let Some(token) = undo_id {
                        self.history.push_undo(token, true);
                    }
                }
                self.settle(commit, vec![column_id])
            }
            Ok(resp) => {
                scope.rollback();
                self.emit(&BoardEvent::RolledBack {
                    columns: vec![column_id],
                });
                Err(EngineError::Rejected(resp.error.unwrap_or_else(|| {
                    "item could not be processed".to_string()
                })))
            }
            Err(err) => {
                log::warn!("process_item failed: {}", err);
                scope.rollback();
                self.emit(&BoardEvent::RolledBack {
                    columns: vec![column_id],
                });
                Err(err.into())
            }
        }
    }

    pub async fn remove_item(&mut self, card_id: &str) -> Result<(), EngineError> {
        let Some(card) = self.board.card(card_id) else {
            return Err(EngineError::UnknownCard(card_id.to_string()));
        };
        let column_id = card.column_id.clone();
        let seq = self.next_seq();
        let mut scope = MutationScope::begin(&mut self.board, &mut self.cache);
        {
            let id = card_id.to_string();
            let column_id = column_id.clone();
            scope.apply(move |board| {
                board.cards.retain(|c| c.uuid != id);
                normalize_column(board, &column_id);
            });
        }
        notify(
            &self.listeners,
            &BoardEvent::Applied {
                columns: vec![column_id.clone()],
            },
        );
        match self.backend.remove_item(card_id).await {
            Ok(resp) if resp.ok => {
                let fresh = fresh_commit(&mut self.last_committed_seq, seq);
                let undo_id = resp.undo_id.clone();
                let commit = scope.commit(|board| {
                    if fresh {
                        if let Some(columns) = resp.columns {
                            board.columns = columns;
                        }
                        if let Some(cards) = resp.cards {
                            board.cards = cards;
                        }
                    }
                    Ok::<(), EngineError>(())
                });
                if commit.is_ok() {
                    if let Some(token) = undo_id {
                        self.history.push_undo(token, true);
                    }
                }
                self.settle(commit, vec![column_id])
            }
            Ok(_) => {
                scope.rollback();
                self.emit(&BoardEvent::RolledBack {
                    columns: vec![column_id],
                });
                Err(EngineError::Rejected(
                    "item could not be removed".to_string(),
                ))
            }
            Err(err) => {
                log::warn!("remove_item failed: {}", err);
                scope.rollback();
                self.emit(&BoardEvent::RolledBack {
                    columns: vec![column_id],
                });
                Err(err.into())
            }
        }
    }

    fn settle(
        &mut self,
        commit: Result<crate::mutation::MutationState, EngineError>,
        columns: Vec<String>,
    ) -> Result<(), EngineError> {
        match commit {
            Ok(_) => {
                self.emit(&BoardEvent::Mutated { columns });
                Ok(())
            }
            Err(err) => {
                self.emit(&BoardEvent::RolledBack { columns });
                Err(err)
            }
        }
    }

    fn settle_structural(
        &mut self,
        commit: Result<crate::mutation::MutationState, EngineError>,
    ) -> Result<(), EngineError> {
        self.settle(commit, Vec::new())
    }

    // --- moves and reordering ---

    /// Move a card to a column, optionally with the explicit final id order
    /// of the target container.
    ///
    /// A move to the card's own column with no explicit order is a no-op:
    /// no mutation, no backend calls. Otherwise the local effect is applied
    /// speculatively, then persisted sequentially: column membership first
    /// (only if it changed), the target column's order array next, the
    /// source column's last. The steps are not atomic; if any of them fails
    /// the engine performs a full reload instead of guessing what stuck.
    pub async fn move_card(
        &mut self,
        card_id: &str,
        target_column_id: &str,
        ordered_ids: Option<Vec<String>>,
    ) -> Result<(), EngineError> {
        let Some(card) = self.board.card(card_id) else {
            return Err(EngineError::UnknownCard(card_id.to_string()));
        };
        let source_column_id = card.column_id.clone();
        let column_changed = source_column_id != target_column_id;
        if !column_changed && ordered_ids.is_none() {
            return Ok(());
        }
        if !self.board.has_column(target_column_id) {
            return Err(EngineError::UnknownColumn(target_column_id.to_string()));
        }
        let seq = self.next_seq();
        let mut affected = vec![target_column_id.to_string()];
        if column_changed {
            affected.push(source_column_id.clone());
        }

        move_card_local(
            &mut self.board,
            card_id,
            target_column_id,
            ordered_ids.as_deref(),
        );
        self.cache.invalidate();
        self.emit(&BoardEvent::Applied {
            columns: affected.clone(),
        });

        if column_changed {
            let mut patch = CardPatch::new();
            patch.insert(
                "column_id".to_string(),
                Value::String(target_column_id.to_string()),
            );
            if let Err(err) = self.backend.update_card(card_id, &patch).await {
                return self.resync("column membership", err).await;
            }
            // Response ignored: the order arrays persisted next are
            // authoritative for both columns.
        }

        let mut fresh = false;
        let target_order = current_id_order(&self.board, target_column_id);
        match self
            .backend
            .reorder_column(target_column_id, &target_order)
            .await
        {
            Ok(resp) => {
                fresh = fresh_commit(&mut self.last_committed_seq, seq);
                if fresh {
                    self.board.cards = resp.cards;
                    self.cache.invalidate();
                }
            }
            Err(err) => return self.resync("target column order", err).await,
        }

        if column_changed {
            let source_order = current_id_order(&self.board, &source_column_id);
            match self
                .backend
                .reorder_column(&source_column_id, &source_order)
                .await
            {
                Ok(resp) => {
                    if fresh {
                        self.board.cards = resp.cards;
                        self.cache.invalidate();
                    }
                }
                Err(err) => return self.resync("source column order", err).await,
            }
        }

        log::debug!("move of {} into {} persisted", card_id, target_column_id);
        self.emit(&BoardEvent::Mutated { columns: affected });
        Ok(())
    }

    async fn resync(
        &mut self,
        step: &'static str,
        cause: TransportError,
    ) -> Result<(), EngineError> {
        log::warn!(
            "{} persistence failed ({}); reloading board from backend",
            step,
            cause
        );
        self.reload().await?;
        Err(EngineError::OutOfSync { step, cause })
    }

    // --- drag gestures ---

    pub fn begin_drag(&mut self, card_id: &str) -> Result<(), EngineError> {
        let Some(card) = self.board.card(card_id) else {
            return Err(EngineError::UnknownCard(card_id.to_string()));
        };
        let source = card.column_id.clone();
        self.drag.begin(card_id, &source)?;
        Ok(())
    }

    /// Insertion point for the active drag over a candidate drop container.
    pub fn drag_insertion_point<'a>(
        &self,
        items: &'a [ItemSpan],
        y: f64,
    ) -> Result<Option<&'a str>, EngineError> {
        Ok(self.drag.insertion_point(items, y)?)
    }

    pub fn cancel_drag(&mut self) {
        self.drag.complete();
    }

    /// Complete the active drag over a target container and persist the
    /// resulting move. The drag slot stays occupied until the move settles.
    pub async fn finish_drag(
        &mut self,
        target_column_id: &str,
        ordered_ids: Vec<String>,
    ) -> Result<(), EngineError> {
        let outcome = self.drag.drop_on(target_column_id, ordered_ids)?;
        let explicit = if outcome.ordered_ids.is_empty() {
            None
        } else {
            Some(outcome.ordered_ids)
        };
        let result = self
            .move_card(&outcome.card_id, &outcome.target_column_id, explicit)
            .await;
        self.drag.complete();
        result
    }

    // --- undo / redo ---

    pub async fn undo(&mut self) -> Result<(), EngineError> {
        let entry = self.history.pop_undo().ok_or(EngineError::NothingToUndo)?;
        match self.backend.perform_undo(&entry.id).await {
            Ok(resp) if resp.ok => {
                if let Some(token) = resp.redo_id {
                    self.history.push_redo(token);
                }
                self.reload().await
            }
            Ok(resp) => {
                self.history.restore_undo(entry);
                Err(EngineError::Rejected(
                    resp.error.unwrap_or_else(|| "nothing to undo".to_string()),
                ))
            }
            Err(err) => {
                log::warn!("undo failed: {}", err);
                self.history.restore_undo(entry);
                Err(err.into())
            }
        }
    }

    pub async fn redo(&mut self) -> Result<(), EngineError> {
        let entry = self.history.pop_redo().ok_or(EngineError::NothingToRedo)?;
        match self.backend.perform_redo(&entry.id).await {
            Ok(resp) if resp.ok => {
                if let Some(token) = resp.undo_id {
                    // The counterpart token must not wipe the redo chain.
                    self.history.push_undo(token, false);
                }
                self.reload().await
            }
            Ok(resp) => {
                self.history.restore_redo(entry);
                Err(EngineError::Rejected(
                    resp.error.unwrap_or_else(|| "nothing to redo".to_string()),
                ))
            }
            Err(err) => {
                log::warn!("redo failed: {}", err);
                self.history.restore_redo(entry);
                Err(err.into())
            }
        }
    }
}

//! Drag gesture handling, decoupled from any visual toolkit.
//!
//! A gesture is a bounded session: `Idle -> Dragging -> Dropped -> Idle`.
//! Only one drag can be active at a time; the session doubles as the
//! one-slot mutex guarding concurrent drags. The session stays `Dropped`
//! while the resulting move is persisted and returns to `Idle` once the
//! owning engine settles it.

use thiserror::Error;

/// Vertical extent of one rendered card, in container coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSpan {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DragError {
    #[error("a drag is already in progress for card {0}")]
    AlreadyDragging(String),
    #[error("no drag in progress")]
    NotDragging,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        card_id: String,
        source_column_id: String,
    },
    /// The gesture ended; its move is being persisted.
    Dropped,
}

/// Emitted to the reordering engine when a gesture completes.
#[derive(Debug, Clone, PartialEq)]
pub struct DropOutcome {
    pub card_id: String,
    pub source_column_id: String,
    pub target_column_id: String,
    /// Final visual order of the drop container, as read on drop. May be
    /// empty when the container could not be read; the move then falls back
    /// to place-last semantics.
    pub ordered_ids: Vec<String>,
}

/// The id of the first item the payload would be inserted above, given the
/// items of a candidate drop container and the cursor's vertical coordinate.
///
/// An item qualifies once its midpoint sits below the cursor by at least
/// half its own height, i.e. its top edge is at or past the cursor. Among
/// qualifiers the smallest midpoint distance wins. `None` means insert at
/// the end.
pub fn nearest_below(items: &[ItemSpan], y: f64) -> Option<&str> {
    nearest_below_excluding(items, y, None)
}

fn nearest_below_excluding<'a>(
    items: &'a [ItemSpan],
    y: f64,
    exclude: Option<&str>,
) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for item in items {
        if exclude.map_or(false, |id| id == item.id) {
            continue;
        }
        let midpoint = item.top + item.height / 2.0;
        let distance = midpoint - y;
        if distance < item.height / 2.0 {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((item.id.as_str(), distance));
        }
    }
    best.map(|(id, _)| id)
}

#[derive(Debug)]
pub struct DragSession {
    state: DragState,
}

impl Default for DragSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DragSession {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn dragging_card(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { card_id, .. } => Some(card_id),
            _ => None,
        }
    }

    /// Start a gesture. Fails while another drag is active or a previous
    /// drop is still being persisted.
    pub fn begin(&mut self, card_id: &str, source_column_id: &str) -> Result<(), DragError> {
        match &self.state {
            DragState::Idle => {
                self.state = DragState::Dragging {
                    card_id: card_id.to_string(),
                    source_column_id: source_column_id.to_string(),
                };
                Ok(())
            }
            DragState::Dragging { card_id, .. } => {
                Err(DragError::AlreadyDragging(card_id.clone()))
            }
            DragState::Dropped => Err(DragError::AlreadyDragging(card_id.to_string())),
        }
    }

    /// Insertion point for the current cursor height within a candidate drop
    /// container. The dragged card itself is never a candidate.
    pub fn insertion_point<'a>(
        &self,
        items: &'a [ItemSpan],
        y: f64,
    ) -> Result<Option<&'a str>, DragError> {
        let dragging = self.dragging_card().ok_or(DragError::NotDragging)?;
        Ok(nearest_below_excluding(items, y, Some(dragging)))
    }

    /// End the gesture over a target container, emitting what the reordering
    /// engine needs. The session stays occupied until `complete` is called.
    pub fn drop_on(
        &mut self,
        target_column_id: &str,
        ordered_ids: Vec<String>,
    ) -> Result<DropOutcome, DragError> {
        match std::mem::replace(&mut self.state, DragState::Dropped) {
            DragState::Dragging {
                card_id,
                source_column_id,
            } => Ok(DropOutcome {
                card_id,
                source_column_id,
                target_column_id: target_column_id.to_string(),
                ordered_ids,
            }),
            // Not mid-drag: put the replaced state back, so a drop that is
            // still persisting keeps the slot occupied.
            other => {
                self.state = other;
                Err(DragError::NotDragging)
            }
        }
    }

    /// Release the session after the drop's move settled (success or
    /// failure), or to abort a gesture.
    pub fn complete(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans() -> Vec<ItemSpan> {
        vec![
            ItemSpan {
                id: "a".to_string(),
                top: 0.0,
                height: 40.0,
            },
            ItemSpan {
                id: "b".to_string(),
                top: 40.0,
                height: 40.0,
            },
            ItemSpan {
                id: "c".to_string(),
                top: 80.0,
                height: 40.0,
            },
        ]
    }

    #[test]
    fn test_nearest_below_between_items() {
        assert_eq!(nearest_below(&spans(), 50.0), Some("c"));
    }

    #[test]
    fn test_nearest_below_past_the_end() {
        assert_eq!(nearest_below(&spans(), 200.0), None);
    }

    #[test]
    fn test_nearest_below_at_the_top() {
        assert_eq!(nearest_below(&spans(), 0.0), Some("a"));
    }

    #[test]
    fn test_nearest_below_empty_container() {
        assert_eq!(nearest_below(&[], 10.0), None);
    }

    #[test]
    fn test_insertion_point_skips_dragged_card() {
        let mut session = DragSession::new();
        session.begin("c", "col-1").unwrap();
        // "c" is the only qualifier at y=50 but is being dragged.
        assert_eq!(session.insertion_point(&spans(), 50.0).unwrap(), None);
        assert_eq!(session.insertion_point(&spans(), 10.0).unwrap(), Some("b"));
    }

    #[test]
    fn test_single_drag_at_a_time() {
        let mut session = DragSession::new();
        session.begin("x", "col-1").unwrap();
        assert_eq!(
            session.begin("y", "col-1"),
            Err(DragError::AlreadyDragging("x".to_string()))
        );
    }

    #[test]
    fn test_drop_emits_outcome_and_occupies_until_complete() {
        let mut session = DragSession::new();
        session.begin("x", "col-1").unwrap();
        let outcome = session
            .drop_on("col-2", vec!["p".to_string(), "x".to_string()])
            .unwrap();
        assert_eq!(outcome.card_id, "x");
        assert_eq!(outcome.source_column_id, "col-1");
        assert_eq!(outcome.target_column_id, "col-2");
        assert_eq!(outcome.ordered_ids, vec!["p", "x"]);
        assert_eq!(*session.state(), DragState::Dropped);
        assert!(session.begin("y", "col-1").is_err());
        session.complete();
        assert!(session.begin("y", "col-1").is_ok());
    }

    #[test]
    fn test_drop_while_previous_drop_persists_keeps_slot_occupied() {
        let mut session = DragSession::new();
        session.begin("x", "col-1").unwrap();
        session.drop_on("col-2", Vec::new()).unwrap();
        // A second drop must not release the slot while the first one is
        // still being persisted.
        assert_eq!(
            session.drop_on("col-2", Vec::new()),
            Err(DragError::NotDragging)
        );
        assert_eq!(*session.state(), DragState::Dropped);
        assert!(session.begin("y", "col-1").is_err());
    }

    #[test]
    fn test_drop_without_drag_fails() {
        let mut session = DragSession::new();
        assert_eq!(
            session.drop_on("col-2", Vec::new()),
            Err(DragError::NotDragging)
        );
        assert_eq!(*session.state(), DragState::Idle);
    }
}

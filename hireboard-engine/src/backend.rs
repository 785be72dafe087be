//! Backend-sync interface the engine drives.
//!
//! Implemented by an external collaborator (local IPC or HTTP); the engine
//! only needs the typed surface. Response bodies mirror the backend's wire
//! shapes: camelCase token fields (`undoId`, `redoId`), `ok`/`error` result
//! envelopes, and full collection payloads where the backend re-sends
//! authoritative state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Card, CardDraft, CardPatch, Column, ProcessRequest};

/// The backend call itself failed: I/O, timeout, or a transport-level error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

fn default_true() -> bool {
    true
}

/// Raw board state as the backend holds it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardPayload {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddColumnResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveColumnResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddCardResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
}

/// Shared shape for calls that answer with the full card collection
/// (`updateCard`, `reorderColumn`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardsResponse {
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_id: Option<String>,
}

/// Answer to `performUndo` / `performRedo`: a successful undo yields the
/// complementary redo token and vice versa.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoRedoResponse {
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redo_id: Option<String>,
}

#[async_trait]
pub trait BoardBackend: Send + Sync {
    async fn get_board(&self) -> Result<BoardPayload, TransportError>;
    async fn add_column(&self, name: &str) -> Result<AddColumnResponse, TransportError>;
    async fn remove_column(&self, id: &str) -> Result<RemoveColumnResponse, TransportError>;
    async fn add_card(&self, draft: &CardDraft) -> Result<AddCardResponse, TransportError>;
    async fn update_card(&self, id: &str, patch: &CardPatch)
        -> Result<CardsResponse, TransportError>;
    async fn reorder_column(
        &self,
        id: &str,
        ordered_ids: &[String],
    ) -> Result<CardsResponse, TransportError>;
    async fn process_item(&self, payload: &ProcessRequest)
        -> Result<ProcessResponse, TransportError>;
    async fn remove_item(&self, id: &str) -> Result<RemoveItemResponse, TransportError>;
    async fn perform_undo(&self, token: &str) -> Result<UndoRedoResponse, TransportError>;
    async fn perform_redo(&self, token: &str) -> Result<UndoRedoResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let raw = r#"{ "ok": true, "undoId": "tok-1", "columns": [] }"#;
        let resp: RemoveColumnResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.undo_id.as_deref(), Some("tok-1"));
        assert_eq!(resp.columns.as_deref(), Some(&[][..]));
        assert!(resp.cards.is_none());
    }

    #[test]
    fn test_ok_defaults_to_true_when_absent() {
        let resp: UndoRedoResponse = serde_json::from_str(r#"{ "redoId": "r-1" }"#).unwrap();
        assert!(resp.ok);
        assert_eq!(resp.redo_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_add_card_response_accepts_either_shape() {
        let single: AddCardResponse =
            serde_json::from_str(r#"{ "ok": true, "card": { "uuid": "u", "column_id": "c" } }"#)
                .unwrap();
        assert!(single.card.is_some());
        let all: AddCardResponse = serde_json::from_str(r#"{ "cards": [] }"#).unwrap();
        assert!(all.card.is_none());
        assert!(all.cards.is_some());
    }
}

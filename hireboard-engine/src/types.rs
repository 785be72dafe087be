use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named stage on the board. `order` comes from the backend and is a rank,
/// not guaranteed dense or unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A single tracked candidate card. Belongs to exactly one column at a time;
/// from the client's perspective ownership transfers atomically when
/// `column_id` changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub uuid: String,
    pub column_id: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub candidate_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub req_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manager: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Domain fields the engine carries but does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A partial update for a card, keyed by field name. `uuid` is never
/// patchable; `column_id` must be validated against the column set by the
/// caller before the patch is applied.
pub type CardPatch = Map<String, Value>;

impl Card {
    /// Merge a patch into the card field by field. Unknown keys land in
    /// `extra` untouched.
    pub fn apply_patch(&mut self, patch: &CardPatch) {
        for (key, value) in patch {
            match key.as_str() {
                "uuid" => {}
                "column_id" => {
                    if let Some(s) = value.as_str() {
                        self.column_id = s.to_string();
                    }
                }
                "order" => self.order = value.as_i64(),
                "candidate_name" => self.candidate_name = string_field(value),
                "req_id" => self.req_id = string_field(value),
                "job_name" => self.job_name = string_field(value),
                "manager" => self.manager = string_field(value),
                "branch" => self.branch = string_field(value),
                "created_at" => self.created_at = value.as_str().map(str::to_string),
                "updated_at" => self.updated_at = value.as_str().map(str::to_string),
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn string_field(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

/// Payload for creating a new card: the target column plus whatever domain
/// fields the form collected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardDraft {
    pub column_id: String,
    #[serde(flatten)]
    pub fields: CardPatch,
}

/// Payload for processing (archiving) a card through its off-board flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub id: String,
    #[serde(flatten)]
    pub fields: CardPatch,
}

/// The raw columns/cards pair owned by the engine. This is the single source
/// of mutable truth; every derived view is recomputed from it. It is created
/// on initial load, mutated by every speculative or confirmed operation, and
/// replaced wholesale on reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub columns: Vec<Column>,
    pub cards: Vec<Card>,
}

impl BoardSnapshot {
    pub fn card(&self, uuid: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.uuid == uuid)
    }

    pub fn card_mut(&mut self, uuid: &str) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.uuid == uuid)
    }

    pub fn has_column(&self, column_id: &str) -> bool {
        self.columns.iter().any(|c| c.id == column_id)
    }

    pub fn cards_in<'a>(&'a self, column_id: &'a str) -> impl Iterator<Item = &'a Card> {
        self.cards.iter().filter(move |c| c.column_id == column_id)
    }

    /// Highest card rank in a column, 0 when the column is empty.
    pub fn max_order_in(&self, column_id: &str) -> i64 {
        self.cards_in(column_id)
            .filter_map(|c| c.order)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(uuid: &str, column_id: &str, order: i64) -> Card {
        Card {
            uuid: uuid.to_string(),
            column_id: column_id.to_string(),
            order: Some(order),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_patch_never_touches_uuid() {
        let mut c = card("abc", "col-1", 1);
        let mut patch = CardPatch::new();
        patch.insert("uuid".to_string(), json!("evil"));
        patch.insert("candidate_name".to_string(), json!("Dana Fisher"));
        c.apply_patch(&patch);
        assert_eq!(c.uuid, "abc");
        assert_eq!(c.candidate_name, "Dana Fisher");
    }

    #[test]
    fn test_apply_patch_keeps_unknown_fields() {
        let mut c = card("abc", "col-1", 1);
        let mut patch = CardPatch::new();
        patch.insert("icims_id".to_string(), json!("12345"));
        c.apply_patch(&patch);
        assert_eq!(c.extra.get("icims_id"), Some(&json!("12345")));
    }

    #[test]
    fn test_card_round_trips_extra_fields() {
        let raw = json!({
            "uuid": "u-1",
            "column_id": "col-1",
            "order": 3,
            "candidate_name": "Avery Cole",
            "icims_id": "998",
        });
        let c: Card = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(c.extra.get("icims_id"), Some(&json!("998")));
        let back = serde_json::to_value(&c).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_max_order_in_empty_column_is_zero() {
        let board = BoardSnapshot {
            columns: Vec::new(),
            cards: vec![card("a", "col-1", 4)],
        };
        assert_eq!(board.max_order_in("col-1"), 4);
        assert_eq!(board.max_order_in("col-2"), 0);
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SyncError;

/// The account an opportunity belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub legal_entity_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Listing entry for an opportunity: id, name and account name only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub account: Option<Account>,
}

impl OpportunitySummary {
    /// Name of the owning account, or an empty string.
    pub fn account_name(&self) -> &str {
        self.account
            .as_ref()
            .map_or("", |a| a.legal_entity_name.as_str())
    }
}

/// One page of the opportunity listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub rows: Vec<OpportunitySummary>,
}

/// Full opportunity record, including its content-block history.
///
/// Existing content blocks are kept as raw JSON so that entries of any
/// variant survive a round trip through the update call unchanged. Fields
/// this crate does not model are preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub account: Option<Account>,
    /// Ordered history, most recent first. `None` when the server did not
    /// return a history, which callers treat as "details not loaded".
    #[serde(default)]
    pub content_blocks: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Opportunity {
    /// Number of entries in the loaded history (zero when not loaded).
    pub fn history_len(&self) -> usize {
        self.content_blocks.as_ref().map_or(0, Vec::len)
    }

    /// Project the record down to its listing summary.
    pub fn summary(&self) -> OpportunitySummary {
        OpportunitySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            account: self.account.clone(),
        }
    }
}

/// Descriptor of a file persisted by the remote file service.
///
/// Every field the service returns is retained, so the copy embedded in a
/// content block matches what the server produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    #[serde(rename = "id")]
    pub file_id: String,
    #[serde(rename = "name", default)]
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_entity_id: Option<String>,
    #[serde(rename = "fileSize", default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Author of a content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Payload of a note block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteData {
    pub note_type: String,
    pub comment: String,
}

/// One immutable, timestamped entry in an opportunity's history.
///
/// Only the note variant is produced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: NoteData,
    pub files: Vec<StoredFile>,
    pub comments: Vec<Value>,
    pub expanded: bool,
    pub created_date: String,
    pub user: BlockUser,
}

impl ContentBlock {
    /// Return a new history with this block at the front, followed by every
    /// entry of `history` in its original order.
    pub fn prepend_to(&self, history: &[Value]) -> Result<Vec<Value>, SyncError> {
        let value = serde_json::to_value(self)
            .map_err(|e| SyncError::Deserialization(format!("failed to encode note: {e}")))?;

        let mut merged = Vec::with_capacity(history.len() + 1);
        merged.push(value);
        merged.extend(history.iter().cloned());
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str) -> ContentBlock {
        ContentBlock {
            id: id.into(),
            kind: "Note".into(),
            data: NoteData {
                note_type: "General".into(),
                comment: "hello".into(),
            },
            files: Vec::new(),
            comments: Vec::new(),
            expanded: false,
            created_date: "2026-10-19T08:00:00.000Z".into(),
            user: BlockUser {
                id: "u-1".into(),
                name: Some("Ada".into()),
            },
        }
    }

    #[test]
    fn detail_keeps_unknown_fields_and_foreign_blocks() {
        let json = serde_json::json!({
            "id": "opp-1",
            "name": "Fleet renewal",
            "account": {"legalEntityName": "ACME GmbH", "vat": "DE1"},
            "stage": "proposal",
            "contentBlocks": [{"id": "x", "type": "Call", "data": {"duration": 5}}]
        });
        let opp: Opportunity = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(opp.history_len(), 1);
        assert_eq!(opp.summary().account_name(), "ACME GmbH");
        assert_eq!(serde_json::to_value(&opp).unwrap(), json);
    }

    #[test]
    fn null_history_means_not_loaded() {
        let opp: Opportunity =
            serde_json::from_str(r#"{"id":"opp-1","contentBlocks":null}"#).unwrap();
        assert!(opp.content_blocks.is_none());
        let opp: Opportunity = serde_json::from_str(r#"{"id":"opp-1"}"#).unwrap();
        assert!(opp.content_blocks.is_none());
    }

    #[test]
    fn stored_file_round_trips_server_fields() {
        let json = serde_json::json!({
            "id": "f-1",
            "name": "quote.pdf",
            "fileType": "application/pdf",
            "parentEntity": "CRM_OPPORTUNITIES",
            "parentEntityId": "opp-1",
            "fileSize": 1024,
            "createdAt": "2026-10-19T08:00:00.000Z",
            "bucketS3": "files",
            "deletedAt": null
        });
        let file: StoredFile = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(file.file_id, "f-1");
        assert_eq!(file.size_bytes, Some(1024));
        assert_eq!(serde_json::to_value(&file).unwrap(), json);
    }

    #[test]
    fn note_serializes_with_wire_names() {
        let value = serde_json::to_value(block("b-1")).unwrap();
        assert_eq!(value["type"], "Note");
        assert_eq!(value["data"]["noteType"], "General");
        assert_eq!(value["createdDate"], "2026-10-19T08:00:00.000Z");
        assert_eq!(value["comments"], serde_json::json!([]));
        assert_eq!(value["expanded"], false);
        assert_eq!(value["user"]["name"], "Ada");
    }

    #[test]
    fn prepend_keeps_existing_order() {
        let history = vec![serde_json::json!({"id": "old-2"}), serde_json::json!({"id": "old-1"})];
        let merged = block("new").prepend_to(&history).unwrap();
        let ids: Vec<_> = merged.iter().map(|b| b["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["new", "old-2", "old-1"]);
    }
}

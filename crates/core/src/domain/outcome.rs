// Worker Outcome (terminal message returned for every submission)

use crate::domain::image::{ImageItem, ItemId, ItemStatus};
use crate::domain::request::ItemRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    ItemGenerated,
    JobCompleted,
    JobFailed,
    Error,
}

impl OutcomeKind {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::ItemGenerated | OutcomeKind::JobCompleted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeData {
    /// None when the request never produced an item record
    pub item_id: Option<ItemId>,
    pub url: String,
    pub status: ItemStatus,
    pub prompt: String,
    pub style: String,
    pub resolution: String,
    pub script_id: String,
    pub item_scope: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOutcome {
    pub kind: OutcomeKind,
    pub success: bool,
    pub data: OutcomeData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerOutcome {
    /// Envelope for a persisted item
    pub fn from_item(kind: OutcomeKind, item: &ImageItem) -> Self {
        Self {
            kind,
            success: kind.is_success(),
            data: OutcomeData {
                item_id: Some(item.id.clone()),
                url: item.url.clone(),
                status: item.status,
                prompt: item.prompt.clone(),
                style: item.style.to_string(),
                resolution: item.resolution.clone(),
                script_id: item.script_id.clone(),
                item_scope: item.item_scope.clone(),
                created_at: item.created_at,
                updated_at: item.updated_at,
            },
            error: item.error.clone(),
        }
    }

    /// Failure envelope for a request that has no item record
    /// (validation, persistence, worker fault, pool shutdown)
    pub fn rejected(
        request: &ItemRequest,
        error: impl Into<String>,
        fallback_url: &str,
        now_millis: i64,
    ) -> Self {
        Self {
            kind: OutcomeKind::Error,
            success: false,
            data: OutcomeData {
                item_id: None,
                url: fallback_url.to_string(),
                status: ItemStatus::Failed,
                prompt: request.prompt.clone(),
                style: request.style_or_default().to_string(),
                resolution: request.resolution_or_default().to_string(),
                script_id: request.script_id.clone(),
                item_scope: request.item_scope.clone(),
                created_at: now_millis,
                updated_at: now_millis,
            },
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_envelope_carries_fallback() {
        let req = ItemRequest {
            job_key: "j".into(),
            prompt: "p".into(),
            script_id: "s".into(),
            item_scope: "scene-1".into(),
            ..Default::default()
        };
        let outcome = WorkerOutcome::rejected(&req, "boom", "https://fallback/img.png", 42);

        assert!(!outcome.success);
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.data.url, "https://fallback/img.png");
        assert_eq!(outcome.data.item_id, None);
        assert_eq!(outcome.data.resolution, "1024x1024");
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_outcome_serializes_with_wire_names() {
        let req = ItemRequest::default();
        let outcome = WorkerOutcome::rejected(&req, "bad", "u", 1);
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["kind"], "error");
        assert_eq!(json["success"], false);
        assert!(json["data"].get("itemScope").is_some());
        assert!(json["data"].get("createdAt").is_some());
    }

    #[test]
    fn test_success_kinds() {
        assert!(OutcomeKind::ItemGenerated.is_success());
        assert!(OutcomeKind::JobCompleted.is_success());
        assert!(!OutcomeKind::JobFailed.is_success());
        assert!(!OutcomeKind::Error.is_success());
    }
}

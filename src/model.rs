//! Core data model.
//!
//! An experiment groups one dataset and a set of hypotheses under an
//! organization. These types mirror the JSON document the store's query
//! builds in Postgres, so they deserialize straight out of the one
//! `jsonb_build_object` column each row carries.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Experiment document
// ---------------------------------------------------------------------------

/// A fully shaped experiment document.
///
/// Optional subtrees (`inputRecord`, `promptVersion`, `response`) are present
/// only when the corresponding [`IncludeExperimentKeys`] flag was set for the
/// query that produced the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: Uuid,

    /// Free-form metadata attached at creation time. Opaque to the store.
    #[serde(default)]
    pub meta: serde_json::Value,

    /// Owning organization.
    pub organization: Uuid,

    pub dataset: Dataset,

    /// Creation time as rendered into the document by Postgres.
    pub created_at: String,

    /// Always a sequence, empty when no hypotheses exist yet.
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,

    /// Rows come from a per-experiment join; their order is not guaranteed.
    #[serde(default)]
    pub rows: Vec<DatasetRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRow {
    pub row_id: Uuid,

    /// Present only when the query included inputs and the row has a
    /// resolved input record visible to the experiment's organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_record: Option<InputRecord>,
}

/// Input data a dataset row was built from, keyed to its originating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    pub request_id: Uuid,

    #[serde(default)]
    pub request_path: String,

    /// Input-variable name to value. Enrichment rewrites values into
    /// resolvable signed references before the document leaves the store.
    #[serde(default)]
    pub inputs: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseObject>,
}

/// A response cross-referenced by request id. Shared between input records
/// and hypothesis runs; not owned by either.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseObject {
    #[serde(default)]
    pub body: serde_json::Value,
    pub created_at: String,
    pub completion_tokens: i64,
    pub prompt_tokens: i64,
    pub delay_ms: i64,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    pub id: Uuid,

    pub provider_key: String,

    /// The prompt version this hypothesis targets.
    pub prompt_version_id: Uuid,

    /// Template of the targeted prompt version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_version: Option<PromptTemplate>,

    /// Template of the major-version-0 ancestor in the same prompt lineage,
    /// if one with a non-null template exists in the same organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_prompt_version: Option<PromptTemplate>,

    pub model: String,

    pub status: HypothesisStatus,

    pub created_at: String,

    /// Always a sequence, empty when the hypothesis has not been run.
    #[serde(default)]
    pub runs: Vec<HypothesisRun>,
}

/// Only the template is surfaced to experiment consumers; full prompt
/// version metadata is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub template: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisRun {
    pub dataset_row_id: Uuid,

    /// Id of the request that produced this run's result.
    pub result_request_id: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseObject>,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a hypothesis.
///
/// The store performs exactly one transition, Pending -> Running, during a
/// claim. Terminal transitions belong to the external executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HypothesisStatus {
    /// Queued, waiting for a claimer.
    Pending,
    /// Claimed, execution in progress.
    Running,
    /// Done successfully. Terminal.
    Completed,
    /// Execution failed. Terminal.
    Failed,
}

impl HypothesisStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: HypothesisStatus) -> bool {
        use HypothesisStatus::*;
        matches!(
            (self, to),
            (Pending, Running) | (Running, Completed) | (Running, Failed)
        )
    }

    /// Is this a terminal status?
    pub fn is_terminal(self) -> bool {
        matches!(self, HypothesisStatus::Completed | HypothesisStatus::Failed)
    }
}

impl std::fmt::Display for HypothesisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HypothesisStatus::Pending => "PENDING",
            HypothesisStatus::Running => "RUNNING",
            HypothesisStatus::Completed => "COMPLETED",
            HypothesisStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HypothesisStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(HypothesisStatus::Pending),
            "RUNNING" => Ok(HypothesisStatus::Running),
            "COMPLETED" => Ok(HypothesisStatus::Completed),
            "FAILED" => Ok(HypothesisStatus::Failed),
            other => Err(crate::error::Error::Other(format!(
                "unknown hypothesis status: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Include flags
// ---------------------------------------------------------------------------

/// Caller-specified toggles selecting which optional subtrees the document
/// query computes and returns. Each flag is independent; everything is off
/// by default for the cheapest query and smallest payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncludeExperimentKeys {
    /// Include each dataset row's input record (org-scoped).
    pub inputs: bool,
    /// Include hypothesis prompt templates and their resolved parents.
    pub prompt_version: bool,
    /// Include response bodies wherever a response cross-reference exists.
    pub response_bodies: bool,
}

impl IncludeExperimentKeys {
    /// Everything on.
    pub fn all() -> Self {
        Self {
            inputs: true,
            prompt_version: true,
            response_bodies: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_transitions() {
        use HypothesisStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in ["PENDING", "RUNNING", "COMPLETED", "FAILED"] {
            let status: HypothesisStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("pending".parse::<HypothesisStatus>().is_err());
    }

    #[test]
    fn bare_document_deserializes_without_optional_keys() {
        // Shape produced with no include flags: no inputRecord, no
        // promptVersion, no response anywhere.
        let doc = json!({
            "id": "6f2a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
            "meta": null,
            "organization": "0a6d2c4e-1111-4222-8333-944455566677",
            "dataset": {
                "id": "7b1c2d3e-4f50-6f2a-8c1e-9d8f0b1c2d3e",
                "name": "eval-set",
                "rows": [
                    { "rowId": "332a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50" }
                ]
            },
            "createdAt": "2026-01-05T10:00:00+00:00",
            "hypotheses": [{
                "id": "442a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
                "providerKey": "pk-1",
                "promptVersionId": "552a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
                "model": "gpt-4o",
                "status": "PENDING",
                "createdAt": "2026-01-05T10:00:01+00:00",
                "runs": []
            }]
        });

        let experiment: Experiment = serde_json::from_value(doc).unwrap();
        assert!(experiment.meta.is_null());
        assert_eq!(experiment.dataset.rows.len(), 1);
        assert!(experiment.dataset.rows[0].input_record.is_none());
        let h = &experiment.hypotheses[0];
        assert_eq!(h.status, HypothesisStatus::Pending);
        assert!(h.prompt_version.is_none());
        assert!(h.parent_prompt_version.is_none());
        assert!(h.runs.is_empty());
    }

    #[test]
    fn absent_subtrees_stay_absent_on_serialize() {
        let doc = json!({
            "id": "6f2a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
            "meta": null,
            "organization": "0a6d2c4e-1111-4222-8333-944455566677",
            "dataset": {
                "id": "7b1c2d3e-4f50-6f2a-8c1e-9d8f0b1c2d3e",
                "name": "eval-set",
                "rows": [
                    { "rowId": "332a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50" }
                ]
            },
            "createdAt": "2026-01-05T10:00:00+00:00",
            "hypotheses": []
        });

        let experiment: Experiment = serde_json::from_value(doc).unwrap();
        let out = serde_json::to_value(&experiment).unwrap();
        let row = &out["dataset"]["rows"][0];
        assert!(row.get("inputRecord").is_none());
        assert_eq!(out["hypotheses"], json!([]));
    }

    #[test]
    fn empty_hypotheses_key_defaults_to_empty_vec() {
        let doc = json!({
            "id": "6f2a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
            "organization": "0a6d2c4e-1111-4222-8333-944455566677",
            "dataset": {
                "id": "7b1c2d3e-4f50-6f2a-8c1e-9d8f0b1c2d3e",
                "name": "eval-set",
                "rows": []
            },
            "createdAt": "2026-01-05T10:00:00+00:00",
            "hypotheses": []
        });
        let experiment: Experiment = serde_json::from_value(doc).unwrap();
        assert!(experiment.hypotheses.is_empty());
    }
}

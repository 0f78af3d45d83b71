//! Input enrichment.
//!
//! Raw input references inside a retrieved document are rewritten into
//! resolvable (signed) references by an external resolver, keyed by the
//! experiment's organization and the input record's originating request.
//! The resolver itself lives outside this crate; only the seam is here.

use std::collections::HashMap;
use std::future::Future;

use uuid::Uuid;

use crate::error::Result;
use crate::model::Experiment;

/// Resolves an input map into signed references.
pub trait InputResolver: Send + Sync {
    fn resolve_inputs(
        &self,
        inputs: HashMap<String, String>,
        organization: Uuid,
        source_request: Uuid,
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send;
}

/// Resolver that returns inputs unchanged. Used by the CLI and anywhere
/// signed references are not needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

impl InputResolver for PassthroughResolver {
    fn resolve_inputs(
        &self,
        inputs: HashMap<String, String>,
        _organization: Uuid,
        _source_request: Uuid,
    ) -> impl Future<Output = Result<HashMap<String, String>>> + Send {
        std::future::ready(Ok(inputs))
    }
}

/// Rewrite the inputs of every dataset row that carries an input record.
/// Rows without one are left untouched. The first resolver failure aborts
/// the whole enrichment; no partially enriched document is returned.
pub async fn enrich_experiment<R: InputResolver>(
    resolver: &R,
    experiment: &mut Experiment,
) -> Result<()> {
    let organization = experiment.organization;
    for row in &mut experiment.dataset.rows {
        if let Some(record) = &mut row.input_record {
            let inputs = std::mem::take(&mut record.inputs);
            record.inputs = resolver
                .resolve_inputs(inputs, organization, record.request_id)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    struct SigningStub;

    impl InputResolver for SigningStub {
        fn resolve_inputs(
            &self,
            inputs: HashMap<String, String>,
            organization: Uuid,
            source_request: Uuid,
        ) -> impl Future<Output = Result<HashMap<String, String>>> + Send {
            let resolved = inputs
                .into_iter()
                .map(|(k, v)| (k, format!("signed://{organization}/{source_request}/{v}")))
                .collect();
            std::future::ready(Ok(resolved))
        }
    }

    struct FailingStub;

    impl InputResolver for FailingStub {
        fn resolve_inputs(
            &self,
            _inputs: HashMap<String, String>,
            _organization: Uuid,
            _source_request: Uuid,
        ) -> impl Future<Output = Result<HashMap<String, String>>> + Send {
            std::future::ready(Err(Error::Enrichment("resolver unavailable".into())))
        }
    }

    fn experiment_with_one_input_row() -> Experiment {
        serde_json::from_value(json!({
            "id": "6f2a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
            "organization": "0a6d2c4e-1111-4222-8333-944455566677",
            "dataset": {
                "id": "7b1c2d3e-4f50-6f2a-8c1e-9d8f0b1c2d3e",
                "name": "eval-set",
                "rows": [
                    {
                        "rowId": "332a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
                        "inputRecord": {
                            "requestId": "992a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50",
                            "requestPath": "/v1/chat/completions",
                            "inputs": { "question": "raw-ref" }
                        }
                    },
                    { "rowId": "442a2f0e-8c1e-4a8e-9d8f-0b1c2d3e4f50" }
                ]
            },
            "createdAt": "2026-01-05T10:00:00+00:00",
            "hypotheses": []
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn rewrites_inputs_only_where_a_record_exists() {
        let mut experiment = experiment_with_one_input_row();
        enrich_experiment(&SigningStub, &mut experiment).await.unwrap();

        let record = experiment.dataset.rows[0].input_record.as_ref().unwrap();
        let value = &record.inputs["question"];
        assert!(value.starts_with("signed://"), "got {value}");
        assert!(value.ends_with("/raw-ref"));
        assert!(experiment.dataset.rows[1].input_record.is_none());
    }

    #[tokio::test]
    async fn resolver_failure_propagates() {
        let mut experiment = experiment_with_one_input_row();
        let err = enrich_experiment(&FailingStub, &mut experiment)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Enrichment(_)));
    }

    #[tokio::test]
    async fn passthrough_leaves_inputs_unchanged() {
        let mut experiment = experiment_with_one_input_row();
        enrich_experiment(&PassthroughResolver, &mut experiment)
            .await
            .unwrap();
        let record = experiment.dataset.rows[0].input_record.as_ref().unwrap();
        assert_eq!(record.inputs["question"], "raw-ref");
    }
}

//! Work-queue claim: atomically hand one pending experiment to one caller.
//!
//! The select and the update run as a single statement, so correctness
//! holds across concurrent service instances without any application-level
//! locking. Only the database's row locks are involved.

use std::time::Instant;

use opentelemetry::KeyValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::HypothesisStatus;
use crate::telemetry::metrics;

/// One statement, three stages:
///
/// 1. `selected` locks the oldest PENDING hypothesis and carries its
///    experiment id. Concurrent claimers all serialize on that one row;
///    a waiter holds no other locks while blocked, so stage 2 cannot form
///    a lock cycle with it. When the winner commits, the waiter's
///    re-evaluation sees RUNNING and selects nothing.
/// 2. `claimed` flips every hypothesis of that experiment that is still
///    PENDING to RUNNING. The status recheck keeps a racing claimer from
///    returning the same experiment twice.
/// 3. The final select reports the experiment id once, or no row at all
///    when the queue was empty.
const CLAIM_SQL: &str = "
    WITH selected AS (
        SELECT experiment
        FROM hypothesis
        WHERE status = 'PENDING'
        ORDER BY created_at ASC
        LIMIT 1
        FOR UPDATE
    ), claimed AS (
        UPDATE hypothesis
        SET status = 'RUNNING'
        WHERE experiment IN (SELECT experiment FROM selected)
        AND status = 'PENDING'
        RETURNING experiment
    )
    SELECT experiment FROM claimed
    LIMIT 1
";

/// Validate a status transition, returning an error if disallowed.
fn validate_transition(from: HypothesisStatus, to: HypothesisStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition { from, to })
    }
}

impl super::Db {
    /// Claim the experiment owning the oldest pending hypothesis,
    /// transitioning all of that experiment's pending hypotheses to
    /// RUNNING. Returns `None` when the queue is empty.
    pub async fn claim_next_experiment(&self) -> Result<Option<Uuid>> {
        validate_transition(HypothesisStatus::Pending, HypothesisStatus::Running)?;

        let started = Instant::now();
        let claimed: Option<(Uuid,)> = sqlx::query_as(CLAIM_SQL)
            .fetch_optional(self.pool())
            .await?;

        let experiment_id = claimed.map(|(id,)| id);
        metrics::experiment_claims().add(
            1,
            &[KeyValue::new(
                "result",
                if experiment_id.is_some() { "ok" } else { "empty" },
            )],
        );
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "experiment.claim")],
        );
        if let Some(id) = experiment_id {
            tracing::debug!(experiment = %id, "claimed pending experiment");
        }

        Ok(experiment_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_claim_transition_is_the_only_legal_one_from_pending() {
        assert!(validate_transition(HypothesisStatus::Pending, HypothesisStatus::Running).is_ok());

        let err = validate_transition(HypothesisStatus::Running, HypothesisStatus::Pending)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert!(
            validate_transition(HypothesisStatus::Pending, HypothesisStatus::Completed).is_err()
        );
    }
}

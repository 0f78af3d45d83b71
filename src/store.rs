//! Experiment retrieval service.
//!
//! Orchestrates filter compilation, the document query, execution, and
//! input enrichment. A store is a stateless service instance constructed
//! with its database handle; run as many as you like, correctness of the
//! claim path rests entirely on the database.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use uuid::Uuid;

use crate::db::query::experiment_document_query;
use crate::db::Db;
use crate::enrich::{enrich_experiment, InputResolver};
use crate::error::{Error, Result};
use crate::filter::{FilterCompiler, FilterNode, SqlParam};
use crate::model::{Experiment, IncludeExperimentKeys};
use crate::telemetry::metrics;

/// Fixed page size for listing calls.
pub const LIST_PAGE_SIZE: i64 = 30;

/// Org-scoped experiment store.
///
/// `organization` scopes every listing call; it is conjoined ahead of any
/// caller-supplied filter and can never be substituted by one. Single-id
/// lookups and claims are not org-scoped — they serve the server-side
/// executor, which works across organizations.
pub struct ExperimentStore<C, R> {
    db: Arc<Db>,
    organization: Uuid,
    filters: C,
    resolver: R,
}

impl<C: FilterCompiler, R: InputResolver> ExperimentStore<C, R> {
    pub fn new(db: Arc<Db>, organization: Uuid, filters: C, resolver: R) -> Self {
        Self {
            db,
            organization,
            filters,
            resolver,
        }
    }

    /// List experiments matching `filter`, newest first, at most
    /// [`LIST_PAGE_SIZE`] of them.
    pub async fn list_experiments(
        &self,
        filter: &FilterNode,
        include: &IncludeExperimentKeys,
    ) -> Result<Vec<Experiment>> {
        let started = Instant::now();

        let args = vec![SqlParam::Uuid(self.organization)];
        let compiled = self.filters.compile(filter, args)?;
        let predicate = format!("e.organization = $1 AND {}", compiled.predicate);
        let sql = experiment_document_query(Some(&predicate), Some(LIST_PAGE_SIZE), include);

        let mut experiments = self.db.fetch_documents(&sql, &compiled.params).await?;
        for experiment in &mut experiments {
            enrich_experiment(&self.resolver, experiment).await?;
        }

        metrics::experiment_reads().add(1, &[KeyValue::new("operation", "list")]);
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "experiment.list")],
        );
        Ok(experiments)
    }

    /// Fetch a single experiment document by id.
    pub async fn get_experiment(
        &self,
        id: Uuid,
        include: &IncludeExperimentKeys,
    ) -> Result<Experiment> {
        let started = Instant::now();

        let params = [SqlParam::Uuid(id)];
        let sql = experiment_document_query(Some("e.id = $1"), Some(1), include);

        let mut documents = self.db.fetch_documents(&sql, &params).await?;
        let mut experiment = documents
            .pop()
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        enrich_experiment(&self.resolver, &mut experiment).await?;

        metrics::experiment_reads().add(1, &[KeyValue::new("operation", "get")]);
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "experiment.get")],
        );
        Ok(experiment)
    }

    /// Claim the next pending experiment and fetch its document.
    ///
    /// Returns [`Error::EmptyQueue`] when nothing is pending; callers must
    /// branch on that before treating the result as a failure.
    pub async fn next_pending(&self, include: &IncludeExperimentKeys) -> Result<Experiment> {
        match self.db.claim_next_experiment().await? {
            Some(experiment_id) => self.get_experiment(experiment_id, include).await,
            None => Err(Error::EmptyQueue),
        }
    }
}

//! Document query builder.
//!
//! Assembles the single SQL statement that returns one nested jsonb
//! document per matching experiment: dataset rows, hypotheses and their
//! runs, with optional subtrees toggled by [`IncludeExperimentKeys`].
//! Everything is fetched in one round trip via nested sub-selects and
//! aggregation.
//!
//! The builder is filter-agnostic: a caller-supplied predicate is spliced
//! in verbatim as a boolean expression already bound to positional
//! parameters. Table aliases available to predicates: `e` (experiment),
//! `ds` (dataset), `dsr` (dataset_row), `eh` (hypothesis), `pv`
//! (prompt_version), `p` (prompt).

use crate::model::IncludeExperimentKeys;

/// Correlated sub-select producing one response object, matched by the
/// given request condition. Shared between input records and runs.
fn response_object(request_match: &str) -> String {
    format!(
        "(
            SELECT jsonb_build_object(
                'body', response.body,
                'createdAt', response.created_at,
                'completionTokens', response.completion_tokens,
                'promptTokens', response.prompt_tokens,
                'delayMs', response.delay_ms,
                'model', response.model
            )
            FROM response
            WHERE {request_match}
        )"
    )
}

/// `'inputRecord', (...)` pair for a dataset row, or nothing when inputs
/// are not requested. The originating request is constrained to the
/// experiment's organization so a cross-tenant input record can never
/// surface.
fn input_record_entry(include: &IncludeExperimentKeys) -> String {
    if !include.inputs {
        return String::new();
    }
    let response = if include.response_bodies {
        format!(
            "'response', {},",
            response_object("response.request = ir.source_request")
        )
    } else {
        String::new()
    };
    format!(
        "'inputRecord', (
            SELECT jsonb_build_object(
                {response}
                'requestId', ir.source_request,
                'requestPath', re.path,
                'inputs', ir.inputs
            )
            FROM input_record ir
            LEFT JOIN request re ON re.id = ir.source_request
            WHERE ir.id = dsr.input_record
            AND re.organization = e.organization
        ),"
    )
}

/// Aggregated `'rows'` entry for the dataset object. The aggregate runs
/// over the experiment+dataset group; a dataset with no rows yields an
/// empty array rather than `[{"rowId": null}]`.
fn dataset_rows_entry(include: &IncludeExperimentKeys) -> String {
    format!(
        "'rows', COALESCE(
            json_agg(
                jsonb_build_object(
                    {input_record}
                    'rowId', dsr.id
                )
            ) FILTER (WHERE dsr.id IS NOT NULL),
            '[]'::json
        )",
        input_record = input_record_entry(include)
    )
}

/// `'promptVersion', (...)` and `'parentPromptVersion', (...)` pairs, or
/// nothing when templates are not requested.
///
/// The parent is the major-version-0 row of the same prompt lineage with a
/// non-null template, scoped to the experiment's organization. When several
/// qualify, any single one is taken.
fn prompt_version_entries(include: &IncludeExperimentKeys) -> String {
    if !include.prompt_version {
        return String::new();
    }
    "'promptVersion', (
        SELECT jsonb_build_object('template', hpv.template)
        FROM prompt_version hpv
        WHERE hpv.id = h.prompt_version
    ),
    'parentPromptVersion', (
        SELECT jsonb_build_object('template', pv_parent.template)
        FROM prompt_version pv_current
        JOIN prompt_version pv_parent ON pv_parent.prompt_id = pv_current.prompt_id
        WHERE pv_current.id = h.prompt_version
        AND pv_parent.template IS NOT NULL
        AND pv_parent.organization = e.organization
        AND pv_current.organization = e.organization
        AND pv_parent.major_version = 0
        LIMIT 1
    ),"
        .to_string()
}

/// Aggregated `'runs'` entry for one hypothesis. Runs are guarded through
/// their own hypothesis->experiment join so only runs of this
/// organization's experiments appear.
fn runs_entry(include: &IncludeExperimentKeys) -> String {
    let response = if include.response_bodies {
        format!(
            "'response', {},",
            response_object("response.request = hr.result_request")
        )
    } else {
        String::new()
    };
    format!(
        "'runs', COALESCE((
            SELECT json_agg(
                jsonb_build_object(
                    {response}
                    'datasetRowId', hr.dataset_row,
                    'resultRequestId', hr.result_request
                )
            )
            FROM hypothesis_run hr
            LEFT JOIN hypothesis hh ON hh.id = hr.hypothesis
            LEFT JOIN experiment he ON he.id = hh.experiment
            WHERE hr.hypothesis = h.id
            AND he.organization = e.organization
        ), '[]'::json)"
    )
}

/// Aggregated `'hypotheses'` entry. An experiment with no hypotheses
/// serializes as an empty array, never null.
fn hypotheses_entry(include: &IncludeExperimentKeys) -> String {
    format!(
        "'hypotheses', COALESCE((
            SELECT json_agg(
                jsonb_build_object(
                    'id', h.id,
                    'providerKey', h.provider_key,
                    'promptVersionId', h.prompt_version,
                    {prompt_versions}
                    'model', h.model,
                    'status', h.status,
                    'createdAt', h.created_at,
                    {runs}
                )
            )
            FROM hypothesis h
            WHERE h.experiment = e.id
        ), '[]'::json)",
        prompt_versions = prompt_version_entries(include),
        runs = runs_entry(include)
    )
}

/// Build the document query.
///
/// `predicate`, when given, is inserted verbatim as the WHERE expression;
/// `limit` bounds the result after the creation-time-descending ordering.
/// Grouping is per experiment+dataset pair.
pub fn experiment_document_query(
    predicate: Option<&str>,
    limit: Option<i64>,
    include: &IncludeExperimentKeys,
) -> String {
    let where_clause = predicate
        .map(|p| format!("WHERE {p}"))
        .unwrap_or_default();
    let limit_clause = limit.map(|n| format!("LIMIT {n}")).unwrap_or_default();

    format!(
        "SELECT jsonb_build_object(
            'id', e.id,
            'meta', e.meta,
            'organization', e.organization,
            'dataset', jsonb_build_object(
                'id', ds.id,
                'name', ds.name,
                {rows}
            ),
            'createdAt', e.created_at,
            {hypotheses}
        )
        FROM experiment e
        LEFT JOIN hypothesis eh ON e.id = eh.experiment
        LEFT JOIN prompt_version pv ON pv.id = eh.prompt_version
        LEFT JOIN prompt p ON p.id = pv.prompt_id
        LEFT JOIN dataset ds ON e.dataset = ds.id
        LEFT JOIN dataset_row dsr ON dsr.dataset_id = ds.id
        {where_clause}
        GROUP BY e.id, ds.id
        ORDER BY e.created_at DESC
        {limit_clause}",
        rows = dataset_rows_entry(include),
        hypotheses = hypotheses_entry(include),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn include(inputs: bool, prompt_version: bool, response_bodies: bool) -> IncludeExperimentKeys {
        IncludeExperimentKeys {
            inputs,
            prompt_version,
            response_bodies,
        }
    }

    #[test]
    fn bare_query_has_no_optional_subtrees() {
        let sql = experiment_document_query(None, None, &IncludeExperimentKeys::default());
        assert!(!sql.contains("'inputRecord'"));
        assert!(!sql.contains("'promptVersion'"));
        assert!(!sql.contains("'parentPromptVersion'"));
        assert!(!sql.contains("'response'"));
        assert!(!sql.contains("WHERE true"));
        assert!(!sql.contains("LIMIT"));
    }

    #[test]
    fn bare_query_keeps_unconditional_shape() {
        let sql = experiment_document_query(None, None, &IncludeExperimentKeys::default());
        for key in [
            "'id'",
            "'meta'",
            "'organization'",
            "'dataset'",
            "'createdAt'",
            "'hypotheses'",
            "'rowId'",
            "'providerKey'",
            "'promptVersionId'",
            "'status'",
            "'runs'",
            "'datasetRowId'",
            "'resultRequestId'",
        ] {
            assert!(sql.contains(key), "missing {key}");
        }
        assert!(sql.contains("ORDER BY e.created_at DESC"));
        assert!(sql.contains("GROUP BY e.id, ds.id"));
    }

    #[test]
    fn inputs_flag_toggles_input_record() {
        let sql = experiment_document_query(None, None, &include(true, false, false));
        assert!(sql.contains("'inputRecord'"));
        assert!(sql.contains("'requestPath'"));
        // Cross-tenant guard on the originating request.
        assert!(sql.contains("re.organization = e.organization"));
        // Response bodies were not requested.
        assert!(!sql.contains("'response'"));
    }

    #[test]
    fn prompt_version_flag_toggles_both_templates() {
        let sql = experiment_document_query(None, None, &include(false, true, false));
        assert!(sql.contains("'promptVersion'"));
        assert!(sql.contains("'parentPromptVersion'"));
        assert!(sql.contains("pv_parent.major_version = 0"));
        assert!(sql.contains("pv_parent.organization = e.organization"));
    }

    #[test]
    fn response_bodies_flag_attaches_responses_to_runs() {
        let sql = experiment_document_query(None, None, &include(false, false, true));
        assert!(sql.contains("response.request = hr.result_request"));
        // Input records are off, so no input-side response lookup.
        assert!(!sql.contains("response.request = ir.source_request"));
    }

    #[test]
    fn response_bodies_with_inputs_matches_both_request_ids() {
        let sql = experiment_document_query(None, None, &include(true, false, true));
        assert!(sql.contains("response.request = ir.source_request"));
        assert!(sql.contains("response.request = hr.result_request"));
    }

    #[test]
    fn predicate_and_limit_are_spliced_verbatim() {
        let sql = experiment_document_query(
            Some("e.organization = $1 AND e.id = $2"),
            Some(30),
            &IncludeExperimentKeys::default(),
        );
        assert!(sql.contains("WHERE e.organization = $1 AND e.id = $2"));
        assert!(sql.trim_end().ends_with("LIMIT 30"));
    }

    #[test]
    fn empty_collections_coalesce_to_empty_arrays() {
        let sql = experiment_document_query(None, None, &IncludeExperimentKeys::default());
        // Hypotheses, rows and runs must never come back null.
        assert_eq!(sql.matches("'[]'::json").count(), 3);
    }
}

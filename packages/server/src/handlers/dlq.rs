use axum::{
    Json,
    extract::{Path, State},
};
use common::{DlqEntry, DlqStats, Reason, RecoveredBy, Source};
use tracing::{info, instrument, warn};

use crate::dlq::{ListFilter, StoreError, reconcile};
use crate::error::{AppError, ErrorBody};
use crate::extractors::AppQuery;
use crate::models::dlq::*;
use crate::state::AppState;

/// List dead-letter entries.
#[utoipa::path(
    get,
    path = "",
    tag = "Dead Letter Queue",
    operation_id = "listDlqEntries",
    summary = "List dead-letter entries",
    description = "Returns entries newest failure first. All filters are optional; `limit` defaults to 50 when unset or not positive.",
    params(ListDlqParams),
    responses(
        (status = 200, description = "Matching entries", body = [DlqEntry]),
        (status = 400, description = "Malformed query string (VALIDATION_ERROR)", body = ErrorBody),
        (status = 500, description = "Store failure (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListDlqParams>,
) -> Result<Json<Vec<DlqEntry>>, AppError> {
    let filter = ListFilter {
        recovered: params.recovered,
        reason: params.reason.filter(|r| !r.is_empty()).map(Reason::from),
        source: params.source.filter(|s| !s.is_empty()).map(Source::from),
        limit: params.limit,
    };

    let entries = state.store.list(&filter).await?;
    Ok(Json(entries))
}

/// Get DLQ statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Dead Letter Queue",
    operation_id = "getDlqStats",
    summary = "Get DLQ statistics",
    description = "Totals plus unrecovered counts grouped by reason and by source.",
    responses(
        (status = 200, description = "DLQ statistics", body = DlqStats),
        (status = 500, description = "Store failure (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<DlqStats>, AppError> {
    let stats = state.store.stats().await?;
    Ok(Json(stats))
}

/// Get a single DLQ entry.
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Dead Letter Queue",
    operation_id = "getDlqEntry",
    summary = "Get DLQ entry details",
    params(("id" = String, Path, description = "DLQ entry ID")),
    responses(
        (status = 200, description = "DLQ entry", body = DlqEntry),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Store failure (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DlqEntry>, AppError> {
    let entry = state.store.get(&id).await?;
    Ok(Json(entry))
}

/// Republish a DLQ entry to its original subject.
#[utoipa::path(
    post,
    path = "/{id}/retry",
    tag = "Dead Letter Queue",
    operation_id = "retryDlqEntry",
    summary = "Retry a DLQ entry",
    description = "Publishes the original payload, byte for byte, to the original subject and marks the entry recovered. Nothing is marked if the publish fails.",
    params(("id" = String, Path, description = "DLQ entry ID")),
    responses(
        (status = 200, description = "Entry republished", body = DlqRetryResponse),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Entry already recovered (CONFLICT)", body = ErrorBody),
        (status = 500, description = "Publish or store failure (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn retry_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DlqRetryResponse>, AppError> {
    let entry = state.store.get(&id).await?;

    if entry.recovered {
        return Err(StoreError::AlreadyRecovered(id).into());
    }

    state
        .bus
        .publish(&entry.original_subject, entry.original_payload.get().as_bytes())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to republish DLQ entry {id}: {e}")))?;

    if let Err(e) = state
        .store
        .mark_recovered(&id, RecoveredBy::API_RETRY)
        .await
    {
        warn!(
            dlq_id = %id,
            error = %e,
            "DLQ entry republished but could not be marked recovered"
        );
        return Err(e.into());
    }

    info!(dlq_id = %id, subject = %entry.original_subject, "DLQ entry retried");

    Ok(Json(DlqRetryResponse {
        status: "retried".into(),
        dlq_id: id,
    }))
}

/// Close a DLQ entry without republishing it.
#[utoipa::path(
    post,
    path = "/{id}/discard",
    tag = "Dead Letter Queue",
    operation_id = "discardDlqEntry",
    summary = "Discard a DLQ entry",
    description = "Marks the entry recovered by `manual-discard`. Nothing is published.",
    params(("id" = String, Path, description = "DLQ entry ID")),
    responses(
        (status = 200, description = "Entry discarded", body = DlqDiscardResponse),
        (status = 404, description = "Entry not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Entry already recovered (CONFLICT)", body = ErrorBody),
        (status = 500, description = "Store failure (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn discard_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DlqDiscardResponse>, AppError> {
    state
        .store
        .mark_recovered(&id, RecoveredBy::MANUAL_DISCARD)
        .await?;

    info!(dlq_id = %id, "DLQ entry discarded");

    Ok(Json(DlqDiscardResponse {
        status: "discarded".into(),
        dlq_id: id,
    }))
}

/// Retry every recoverable entry.
#[utoipa::path(
    post,
    path = "/retry-all",
    tag = "Dead Letter Queue",
    operation_id = "retryAllDlqEntries",
    summary = "Retry all recoverable entries",
    description = "Runs one recovery pass over recoverable, unrecovered entries inside the recovery window. Per-entry failures are counted, not returned as errors.",
    responses(
        (status = 200, description = "Pass summary", body = DlqRetryAllResponse),
        (status = 500, description = "Store failure (INTERNAL_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn retry_all(
    State(state): State<AppState>,
) -> Result<Json<DlqRetryAllResponse>, AppError> {
    let summary = reconcile(
        state.store.as_ref(),
        state.bus.as_ref(),
        RecoveredBy::API_RETRY_ALL,
    )
    .await?;

    info!(
        total = summary.total,
        retried = summary.retried,
        failed = summary.failed,
        "DLQ retry-all complete"
    );

    Ok(Json(summary.into()))
}

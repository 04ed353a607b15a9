//! `POST /pubsub/push`
//!
//! Decode, dispatch, audit, respond. Every path ends in a JSON response:
//! malformed bodies and payloads degrade to empty or raw values. A body that
//! cannot be read at all (too large, broken stream) is a 500 so the message
//! is redelivered, as is any fault raised by a handler or by the audit write.

use axum::{body::Bytes, extract::rejection::BytesRejection, extract::State};
use chrono::{DateTime, Utc};
use pulse_common::{Payload, PushEnvelope};
use tracing::{error, info, warn};

use super::response::PushResponse;
use crate::audit::{self, JobStatus};
use crate::context::AppContext;
use crate::error::WorkerError;
use crate::jobs::{dispatch, resolve_job, UNKNOWN_JOB};

const SUCCESS_NOTES: &str = "ok";

pub async fn push(
    State(ctx): State<AppContext>,
    body: Result<Bytes, BytesRejection>,
) -> PushResponse {
    let started_at = Utc::now();
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(
                status = %rejection.status(),
                error = %rejection.body_text(),
                "Could not read push body"
            );
            let err = WorkerError::RequestBody(rejection.body_text());
            return fail(&ctx, started_at, UNKNOWN_JOB.to_string(), err).await;
        },
    };

    let envelope = PushEnvelope::from_body(&body);
    let message = envelope.message;
    let payload = message.payload();
    let job = resolve_job(&payload, &message);

    info!(
        received_at = %started_at.to_rfc3339(),
        job = %job,
        payload = %payload.to_json_string(),
        attributes = ?message.attributes,
        message_id = ?message.message_id,
        subscription = ?envelope.subscription,
        "Received push"
    );

    handle(&ctx, started_at, job, &payload).await
}

async fn handle(
    ctx: &AppContext,
    started_at: DateTime<Utc>,
    job: String,
    payload: &Payload,
) -> PushResponse {
    let rows_processed = match dispatch(ctx, &job, payload).await {
        Ok(rows) => rows,
        Err(e) => return fail(ctx, started_at, job, e).await,
    };

    match audit::record(ctx, started_at, &job, JobStatus::Success, rows_processed, SUCCESS_NOTES)
        .await
    {
        Ok(_) => {
            info!(job = %job, rows_processed, "Job completed");
            PushResponse::success(job, rows_processed)
        },
        Err(e) => fail(ctx, started_at, job, e).await,
    }
}

async fn fail(
    ctx: &AppContext,
    started_at: DateTime<Utc>,
    job: String,
    err: WorkerError,
) -> PushResponse {
    let text = err.to_string();
    error!(job = %job, error = %text, detail = ?err, "Job failed");

    if let Err(audit_err) = audit::record(ctx, started_at, &job, JobStatus::Failed, 0, &text).await
    {
        error!(job = %job, error = %audit_err, "Could not record failed job run");
    }

    PushResponse::failure(job, text)
}

use std::sync::Arc;
use chrono::{Duration, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn, info_span, Instrument};
use crate::domain::models::job::{Job, STATUS_COMPLETED, STATUS_FAILED};
use crate::state::AppState;

const BATCH_SIZE: i32 = 10;
const RETRY_BASE_SECS: i64 = 60;

pub async fn start_background_worker(state: Arc<AppState>) {
    info!("Starting background email worker...");

    loop {
        let processed = process_pending_jobs(&state).await;
        if processed > 0 {
            info!("Processed {} email jobs", processed);
        }
        sleep(state.config.worker_poll_interval).await;
    }
}

/// One polling tick: runs every due job once and records its outcome.
pub async fn process_pending_jobs(state: &AppState) -> usize {
    let jobs = match state.job_repo.find_pending(BATCH_SIZE).await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("Failed to fetch pending jobs: {:?}", e);
            return 0;
        }
    };

    let count = jobs.len();
    for job in jobs {
        let span = info_span!(
            "background_job",
            job_id = %job.id,
            job_type = %job.job_type,
            appointment_id = %job.payload.appointment_id,
            attempt = job.attempts + 1
        );
        process_job(state, &job).instrument(span).await;
    }
    count
}

async fn process_job(state: &AppState, job: &Job) {
    info!("Processing job: {}", job.job_type);
    let payload = &job.payload.0;
    let report = state.email_dispatcher
        .dispatch(payload.event, &payload.appointment_id, payload.changes.as_ref(), Some(&job.id))
        .await;

    if !report.has_failures() {
        info!("Job completed successfully");
        if let Err(e) = state.job_repo.update_status(&job.id, STATUS_COMPLETED, None).await {
            error!("Failed to mark job as completed: {:?}", e);
        }
        return;
    }

    let err_msg = format!("client={:?} business={:?}", report.client_email, report.business_email);
    let attempts = job.attempts + 1;
    if attempts < state.config.email_max_attempts {
        // Already-sent recipients are skipped on retry through the mail ledger.
        let delay = Duration::seconds(RETRY_BASE_SECS * (1i64 << (attempts - 1).clamp(0, 10)));
        warn!(attempts, "Job failed, retrying in {}s: {}", delay.num_seconds(), err_msg);
        if let Err(e) = state.job_repo.retry_later(&job.id, attempts, Utc::now() + delay, Some(err_msg)).await {
            error!("Failed to reschedule job: {:?}", e);
        }
    } else {
        error!(attempts, "Job failed permanently: {}", err_msg);
        if let Err(e) = state.job_repo.update_status(&job.id, STATUS_FAILED, Some(err_msg)).await {
            error!("Failed to mark job as failed: {:?}", e);
        }
    }
}

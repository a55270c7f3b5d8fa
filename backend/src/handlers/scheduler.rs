//! Manual trigger surface for the work generation engine.
//!
//! The periodic schedule covers normal operation; these routes let an
//! authenticated operator force a run, either across all contracts or for
//! one specific contract.

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::jobs::{JobError, JobExecutionLog, WorkGenerationResult};
use crate::{ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct RunGenerationRequest {
    /// Restrict the run to a single contract.
    pub contract_id: Option<Uuid>,
}

pub fn scheduler_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run", post(run_generation))
        .route("/runs", get(list_runs))
}

async fn run_generation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Option<Json<RunGenerationRequest>>,
) -> ApiResult<Json<WorkGenerationResult>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let now = Utc::now();

    info!(
        "Manual work generation triggered by {} (contract: {:?})",
        user.email, request.contract_id
    );

    let result = match request.contract_id {
        Some(contract_id) => state.engine.run_contract(contract_id, now).await,
        None => state.engine.run(now).await,
    };

    match result {
        Ok(result) => Ok(Json(result)),
        Err(JobError::ContractNotFound(id)) => {
            Err(AppError::NotFound(format!("Contract {}", id)))
        }
        Err(e) => Err(AppError::InternalError(e.to_string())),
    }
}

async fn list_runs(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
) -> ApiResult<Json<Vec<JobExecutionLog>>> {
    Ok(Json(state.scheduler.get_execution_logs().await))
}

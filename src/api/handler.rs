use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::models::*;
use crate::{
    airdrop::{
        estimator::Estimate,
        models::{TaskStatusView, TaskSummary},
        readiness::ReadinessReport,
        service::{AirdropService, CreateTask, SlotCreationRequest, SlotCreationResult, SlotPool},
    },
    error::{AppResult, ValidationError},
    ledger::{models::Network, signer::Credential},
    signing::client::SigningStatus,
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AirdropService>,
    /// Used when a request does not name a network
    pub default_network: Network,
}

impl AppState {
    pub(crate) fn network(&self, requested: Option<Network>) -> Network {
        requested.unwrap_or(self.default_network)
    }
}

/// Health check
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        networks: state.service.networks(),
        signing_enabled: state.service.signing_enabled(),
        tasks: state.service.list_tasks().len(),
    })
}

/// Cost and duration of a uniform batch
/// POST /airdrop/estimate
pub async fn estimate_airdrop(
    State(state): State<AppState>,
    Json(request): Json<EstimateRequest>,
) -> AppResult<Json<Estimate>> {
    request.validate()?;
    let estimate = state
        .service
        .estimate(request.recipient_count, request.amount_per_recipient)?;
    Ok(Json(estimate))
}

/// POST /airdrop/readiness
pub async fn check_readiness(
    State(state): State<AppState>,
    Json(request): Json<ReadinessRequest>,
) -> AppResult<Json<ReadinessReport>> {
    request.validate()?;
    let network = state.network(request.network);

    let report = state
        .service
        .check_readiness(network, &request.account, request.recipient_count)
        .await?;

    info!(
        "🔎 Readiness for {} on {}: ready={} ({} issues)",
        report.account,
        network,
        report.ready,
        report.issues.len()
    );
    Ok(Json(report))
}

/// Register a distribution and start it in the background
/// POST /airdrop/tasks
pub async fn create_airdrop(
    State(state): State<AppState>,
    Json(request): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<CreateTaskResponse>)> {
    request.validate()?;
    let network = state.network(request.network);

    let handle = state
        .service
        .create_task(CreateTask {
            credential: request.credential.into(),
            network,
            asset: request.asset,
            recipients: request.recipients,
            amount_per_recipient: request.amount_per_recipient,
            mode: request.mode,
            preflight: request.preflight,
        })
        .await?;

    let view = state.service.get_task_status(handle.id)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateTaskResponse {
            task_id: handle.id,
            status: view.status,
            total_recipients: view.total,
            message: format!(
                "Airdrop to {} recipients on {} accepted",
                view.total, network
            ),
        }),
    ))
}

/// GET /airdrop/tasks
pub async fn list_airdrops(State(state): State<AppState>) -> Json<Vec<TaskSummary>> {
    Json(state.service.list_tasks())
}

/// GET /airdrop/tasks/:id
pub async fn get_airdrop_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TaskStatusView>> {
    Ok(Json(state.service.get_task_status(id)?))
}

/// POST /airdrop/tasks/:id/cancel
pub async fn cancel_airdrop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TaskStatusView>> {
    Ok(Json(state.service.cancel_task(id)?))
}

/// POST /slots/list
pub async fn list_slots(
    State(state): State<AppState>,
    Json(request): Json<SlotListRequest>,
) -> AppResult<Json<SlotPool>> {
    request.validate()?;
    let pool = state
        .service
        .get_account_slots(state.network(request.network), &request.account)
        .await?;
    Ok(Json(pool))
}

/// Ticket creation approved by the account holder in their wallet
/// POST /slots/request
pub async fn request_slots(
    State(state): State<AppState>,
    Json(request): Json<SlotRequestRequest>,
) -> AppResult<Json<SlotCreationRequest>> {
    request.validate()?;
    let created = state
        .service
        .request_slot_creation(
            state.network(request.network),
            &request.account,
            request.count,
        )
        .await?;
    Ok(Json(created))
}

/// Ticket creation signed with a secret credential
/// POST /slots/create
pub async fn create_slots(
    State(state): State<AppState>,
    Json(request): Json<SlotCreateRequest>,
) -> AppResult<Json<SlotCreationResult>> {
    request.validate()?;
    let credential = Credential::from(request.credential);
    if credential.is_interactive() {
        return Err(ValidationError::InvalidCredential(
            "interactive credentials use /slots/request".to_string(),
        )
        .into());
    }

    let result = state
        .service
        .create_slots(state.network(request.network), credential, request.count)
        .await?;
    Ok(Json(result))
}

/// GET /signing/:request_id
pub async fn get_signing_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> AppResult<Json<SigningStatus>> {
    Ok(Json(state.service.get_signing_status(&request_id).await?))
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::airdrop::models::{AssetDescriptor, RecipientSpec, SubmissionMode, TaskStatus};
use crate::ledger::models::Network;
use crate::ledger::signer::Credential;

// ========== REQUEST MODELS ==========

/// Credential as supplied by the client
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CredentialRequest {
    Secret { secret: String },
    Interactive { account: String },
}

impl fmt::Debug for CredentialRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&Credential::from(self.clone()), f)
    }
}

impl From<CredentialRequest> for Credential {
    fn from(request: CredentialRequest) -> Self {
        match request {
            CredentialRequest::Secret { secret } => Credential::Secret(secret),
            CredentialRequest::Interactive { account } => Credential::Interactive { account },
        }
    }
}

/// POST /airdrop/estimate
#[derive(Debug, Deserialize, Validate)]
pub struct EstimateRequest {
    #[validate(range(min = 1, message = "at least one recipient is required"))]
    pub recipient_count: usize,
    pub amount_per_recipient: Decimal,
}

/// POST /airdrop/readiness
#[derive(Debug, Deserialize, Validate)]
pub struct ReadinessRequest {
    pub network: Option<Network>,
    #[validate(length(min = 25, max = 35, message = "invalid account address"))]
    pub account: String,
    #[validate(range(min = 1, message = "at least one recipient is required"))]
    pub recipient_count: usize,
}

/// POST /airdrop/tasks
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub credential: CredentialRequest,
    pub network: Option<Network>,
    #[serde(default)]
    pub asset: AssetDescriptor,
    #[validate(length(min = 1, message = "at least one recipient is required"))]
    pub recipients: Vec<RecipientSpec>,
    pub amount_per_recipient: Option<Decimal>,
    #[serde(default)]
    pub mode: SubmissionMode,
    #[serde(default)]
    pub preflight: bool,
}

/// POST /slots/list
#[derive(Debug, Deserialize, Validate)]
pub struct SlotListRequest {
    pub network: Option<Network>,
    #[validate(length(min = 25, max = 35, message = "invalid account address"))]
    pub account: String,
}

/// POST /slots/request
#[derive(Debug, Deserialize, Validate)]
pub struct SlotRequestRequest {
    pub network: Option<Network>,
    #[validate(length(min = 25, max = 35, message = "invalid account address"))]
    pub account: String,
    #[validate(range(min = 1, max = 250))]
    pub count: u32,
}

/// POST /slots/create
#[derive(Debug, Deserialize, Validate)]
pub struct SlotCreateRequest {
    pub network: Option<Network>,
    pub credential: CredentialRequest,
    #[validate(range(min = 1, max = 250))]
    pub count: u32,
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub total_recipients: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub networks: Vec<Network>,
    pub signing_enabled: bool,
    pub tasks: usize,
}

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, warn};
use uuid::Uuid;

use crate::airdrop::estimator::{self, Estimate, FeeSchedule};
use crate::airdrop::executor::{DistributionExecutor, ExecutorConfig};
use crate::airdrop::holdings::{
    self, AccountBalance, AddressCheck, IssuedToken, IssuerTokens, WalletAssets,
};
use crate::airdrop::models::{
    AirdropTask, AssetDescriptor, RecipientSpec, SubmissionMode, TaskStatus, TaskStatusView,
    TaskSummary,
};
use crate::airdrop::readiness::{ReadinessReport, ReadinessValidator};
use crate::airdrop::registry::{TaskEvent, TaskRegistry};
use crate::airdrop::slots::{slot_create_request, validate_slot_request};
use crate::airdrop::validation;
use crate::error::{AppError, AppResult, LedgerError, SigningError, StateError, ValidationError};
use crate::ledger::client::{bounded, LedgerRouter, NetworkServices};
use crate::ledger::models::{Network, UnsignedTransaction, MAX_SLOTS_PER_ACCOUNT};
use crate::ledger::signer::{Credential, TransactionSigner};
use crate::signing::client::{SigningMetadata, SigningRequest, SigningService, SigningStatus};

#[derive(Debug, Clone)]
pub struct AirdropSettings {
    pub max_recipients: usize,
    pub max_concurrent_tasks: usize,
    pub fees: FeeSchedule,
    pub executor: ExecutorConfig,
}

impl Default for AirdropSettings {
    fn default() -> Self {
        Self {
            max_recipients: 1000,
            max_concurrent_tasks: 5,
            fees: FeeSchedule::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

/// Everything needed to start one distribution
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub credential: Credential,
    pub network: Network,
    pub asset: AssetDescriptor,
    pub recipients: Vec<RecipientSpec>,
    /// Applies to recipients that do not carry their own amount
    pub amount_per_recipient: Option<Decimal>,
    pub mode: SubmissionMode,
    /// Run a readiness check before accepting the task
    pub preflight: bool,
}

/// Returned as soon as the task is registered; the worker runs on its own
pub struct TaskHandle {
    pub id: Uuid,
    join: JoinHandle<TaskStatus>,
}

impl TaskHandle {
    /// Wait for the worker to finish
    pub async fn wait(self) -> TaskStatus {
        self.join.await.unwrap_or(TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPool {
    pub account: String,
    pub network: Network,
    /// Ascending
    pub slots: Vec<u32>,
    pub count: usize,
    pub max_slots: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCreationRequest {
    pub account: String,
    pub count: u32,
    pub request: SigningRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCreationResult {
    pub account: String,
    pub created: u32,
    pub tx_ref: String,
    pub slots: Vec<u32>,
}

/// Entry point for everything the HTTP layer exposes
pub struct AirdropService {
    settings: AirdropSettings,
    networks: Arc<LedgerRouter>,
    registry: Arc<dyn TaskRegistry>,
    workers: Arc<Semaphore>,
    signing: Option<Arc<dyn SigningService>>,
    readiness: ReadinessValidator,
}

impl AirdropService {
    pub fn new(
        settings: AirdropSettings,
        networks: LedgerRouter,
        registry: Arc<dyn TaskRegistry>,
        signing: Option<Arc<dyn SigningService>>,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(settings.max_concurrent_tasks.max(1)));
        let readiness = ReadinessValidator::new(settings.fees, settings.executor.call_timeout);

        Self {
            settings,
            networks: Arc::new(networks),
            registry,
            workers,
            signing,
            readiness,
        }
    }

    pub fn settings(&self) -> &AirdropSettings {
        &self.settings
    }

    pub fn networks(&self) -> Vec<Network> {
        self.networks.registered_networks()
    }

    pub fn signing_enabled(&self) -> bool {
        self.signing.is_some()
    }

    fn services(&self, network: Network) -> AppResult<&NetworkServices> {
        Ok(self.networks.get(network)?)
    }

    fn signing_service(&self) -> AppResult<&Arc<dyn SigningService>> {
        self.signing
            .as_ref()
            .ok_or(AppError::Signing(SigningError::NotConfigured))
    }

    async fn resolve_signer(
        &self,
        services: &NetworkServices,
        credential: &Credential,
    ) -> AppResult<Arc<dyn TransactionSigner>> {
        match time::timeout(
            self.settings.executor.call_timeout,
            services.resolver.resolve(credential),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(LedgerError::Timeout("credential resolution".to_string()).into()),
        }
    }

    /// Validate, register and schedule a distribution. Every check runs
    /// before the task exists, so a rejected request leaves no trace.
    pub async fn create_task(&self, request: CreateTask) -> AppResult<TaskHandle> {
        validation::validate_credential(&request.credential)?;
        let asset = validation::validate_asset(&request.asset)?;
        let recipients = validation::normalize_recipients(
            &request.recipients,
            request.amount_per_recipient,
            &asset,
            self.settings.max_recipients,
        )?;
        let services = self.services(request.network)?.clone();

        let mut funding_account = request
            .credential
            .declared_account()
            .map(str::to_string);

        if request.preflight {
            let signer = self.resolve_signer(&services, &request.credential).await?;
            let account = signer.account().to_string();
            let required_slots = match request.mode {
                SubmissionMode::Slots => recipients.len(),
                SubmissionMode::Sequence => 0,
            };

            let report = self
                .readiness
                .check(
                    services.ledger.as_ref(),
                    &account,
                    required_slots,
                    recipients.len(),
                )
                .await?;
            if !report.ready {
                return Err(AppError::Readiness(Box::new(report)));
            }
            funding_account = Some(account);
        }

        let asset_label = asset.label().to_string();
        let task = AirdropTask::new(
            funding_account,
            request.network,
            asset,
            request.mode,
            recipients,
            self.settings.fees.fee_per_tx_drops,
        );
        let id = task.id;
        let total = task.recipients.len();
        let total_amount = task.total_amount;
        let writer = self.registry.create(task);

        info!(
            "📋 Airdrop task {} created: {} {} to {} recipients on {}",
            id,
            total_amount,
            asset_label,
            total,
            request.network
        );

        let executor = DistributionExecutor::new(
            services.ledger.clone(),
            services.resolver.clone(),
            self.settings.executor.clone(),
        );
        let workers = self.workers.clone();
        let credential = request.credential;

        let join = tokio::spawn(async move {
            let _permit = match workers.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("⚠️  Worker pool closed, task {} not started", id);
                    if let Err(e) = writer.fail("worker pool unavailable") {
                        warn!("⚠️  Could not fail task {}: {}", id, e);
                    }
                    return TaskStatus::Failed;
                }
            };
            executor.run(writer, credential).await
        });

        Ok(TaskHandle { id, join })
    }

    pub fn get_task_status(&self, id: Uuid) -> AppResult<TaskStatusView> {
        self.registry
            .snapshot(id)
            .map(|task| task.status_view())
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))
    }

    pub fn list_tasks(&self) -> Vec<TaskSummary> {
        self.registry.list()
    }

    pub fn subscribe(&self, id: Uuid) -> AppResult<broadcast::Receiver<TaskEvent>> {
        self.registry
            .subscribe(id)
            .ok_or_else(|| AppError::NotFound(format!("Task {} not found", id)))
    }

    /// Stops the worker before its next submission
    pub fn cancel_task(&self, id: Uuid) -> AppResult<TaskStatusView> {
        match self.registry.request_cancel(id) {
            None => Err(AppError::NotFound(format!("Task {} not found", id))),
            Some(false) => {
                let status = self.get_task_status(id)?.status;
                Err(StateError::InvalidTransition {
                    from: status,
                    to: TaskStatus::Failed,
                }
                .into())
            }
            Some(true) => {
                info!("🛑 Cancellation requested for task {}", id);
                self.get_task_status(id)
            }
        }
    }

    pub fn estimate(&self, recipient_count: usize, amount_per_recipient: Decimal) -> AppResult<Estimate> {
        if recipient_count == 0 {
            return Err(ValidationError::NoRecipients.into());
        }
        if recipient_count > self.settings.max_recipients {
            return Err(ValidationError::TooManyRecipients {
                count: recipient_count,
                max: self.settings.max_recipients,
            }
            .into());
        }
        validation::validate_amount_range(amount_per_recipient)?;

        Ok(estimator::estimate(
            recipient_count,
            amount_per_recipient,
            &self.settings.fees,
            self.settings.executor.tx_delay,
        )?)
    }

    /// Readiness of an account to run the ticket path for `recipient_count`
    pub async fn check_readiness(
        &self,
        network: Network,
        account: &str,
        recipient_count: usize,
    ) -> AppResult<ReadinessReport> {
        let account = validation::validate_address(account)?;
        if recipient_count == 0 {
            return Err(ValidationError::NoRecipients.into());
        }
        let services = self.services(network)?;

        Ok(self
            .readiness
            .check(
                services.ledger.as_ref(),
                &account,
                recipient_count,
                recipient_count,
            )
            .await?)
    }

    pub async fn get_account_slots(&self, network: Network, account: &str) -> AppResult<SlotPool> {
        let account = validation::validate_address(account)?;
        let services = self.services(network)?;

        let mut slots = bounded(
            "account_objects",
            self.settings.executor.call_timeout,
            services.ledger.get_slots(&account),
        )
        .await?;
        slots.sort_unstable();
        slots.dedup();

        Ok(SlotPool {
            account,
            network,
            count: slots.len(),
            slots,
            max_slots: MAX_SLOTS_PER_ACCOUNT,
        })
    }

    /// Ask the account holder to approve ticket creation in their wallet.
    /// The signing service submits the transaction once approved.
    pub async fn request_slot_creation(
        &self,
        network: Network,
        account: &str,
        count: u32,
    ) -> AppResult<SlotCreationRequest> {
        let signing = self.signing_service()?;
        let pool = self.get_account_slots(network, account).await?;
        validate_slot_request(pool.count, count)?;

        let request = signing
            .create_signing_request(
                &slot_create_request(&pool.account, count),
                SigningMetadata {
                    instruction: format!("Create {} tickets for airdrop distribution", count),
                    submit: true,
                    blob: json!({ "purpose": "ticket_create", "network": network }),
                },
            )
            .await?;

        info!(
            "🎫 Ticket creation for {} ({} tickets) awaiting approval: {}",
            pool.account, count, request.request_id
        );

        Ok(SlotCreationRequest {
            account: pool.account,
            count,
            request,
        })
    }

    /// Create tickets directly with a secret credential
    pub async fn create_slots(
        &self,
        network: Network,
        credential: Credential,
        count: u32,
    ) -> AppResult<SlotCreationResult> {
        validation::validate_credential(&credential)?;
        let services = self.services(network)?.clone();
        let limit = self.settings.executor.call_timeout;

        let signer = self.resolve_signer(&services, &credential).await?;
        let account = signer.account().to_string();

        let existing = bounded("account_objects", limit, services.ledger.get_slots(&account)).await?;
        validate_slot_request(existing.len(), count)?;

        let fee = bounded("fee", limit, services.ledger.get_fee()).await?;
        let info = bounded("account_info", limit, services.ledger.get_account(&account)).await?;
        let current = bounded("ledger_current", limit, services.ledger.current_ledger()).await?;

        let tx = UnsignedTransaction::slot_create(&account, count, fee, info.sequence)
            .expiring_after(current, 0);
        let signed = match time::timeout(self.settings.executor.signing_timeout, signer.sign(&tx)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(SigningError::Timeout.into()),
        };
        let outcome = bounded(
            "submit",
            self.settings.executor.submit_timeout,
            services.ledger.submit(&signed),
        )
        .await?;

        if !outcome.accepted() {
            return Err(LedgerError::Rejected {
                code: outcome.engine_result.clone(),
                message: outcome.error_detail(),
            }
            .into());
        }

        let mut slots = bounded("account_objects", limit, services.ledger.get_slots(&account)).await?;
        slots.sort_unstable();
        slots.dedup();

        info!("🎫 Created {} tickets for {}: {}", count, account, outcome.tx_ref);

        Ok(SlotCreationResult {
            account,
            created: count,
            tx_ref: outcome.tx_ref,
            slots,
        })
    }

    /// Screen a pasted address list; invalid entries are reported, not fatal
    pub fn check_addresses(&self, addresses: &[String]) -> AppResult<AddressCheck> {
        if addresses.is_empty() {
            return Err(ValidationError::NoRecipients.into());
        }
        if addresses.len() > self.settings.max_recipients {
            return Err(ValidationError::TooManyRecipients {
                count: addresses.len(),
                max: self.settings.max_recipients,
            }
            .into());
        }
        Ok(holdings::check_addresses(addresses))
    }

    pub async fn get_account_balance(
        &self,
        network: Network,
        account: &str,
    ) -> AppResult<AccountBalance> {
        let account = validation::validate_address(account)?;
        let services = self.services(network)?;

        let info = bounded(
            "account_info",
            self.settings.executor.call_timeout,
            services.ledger.get_account(&account),
        )
        .await?;
        Ok(AccountBalance::new(network, info))
    }

    /// Assets the account can distribute. An unfunded account is reported
    /// with a zero native balance instead of an error.
    pub async fn get_wallet_assets(&self, network: Network, account: &str) -> AppResult<WalletAssets> {
        let account = validation::validate_address(account)?;
        let services = self.services(network)?;
        let limit = self.settings.executor.call_timeout;

        let info = match bounded("account_info", limit, services.ledger.get_account(&account)).await
        {
            Ok(info) => Some(info),
            Err(LedgerError::AccountNotFound(_)) => {
                warn!("⚠️  {} is not funded on {}", account, network);
                None
            }
            Err(e) => return Err(e.into()),
        };
        let lines = match info {
            Some(_) => {
                bounded("account_lines", limit, services.ledger.get_trust_lines(&account)).await?
            }
            None => Vec::new(),
        };

        Ok(holdings::wallet_assets(&account, network, info.as_ref(), &lines))
    }

    /// Currencies issued by `issuer` with their outstanding supply
    pub async fn get_issuer_tokens(&self, network: Network, issuer: &str) -> AppResult<IssuerTokens> {
        let issuer = validation::validate_address(issuer)?;
        let services = self.services(network)?;

        let obligations = bounded(
            "gateway_balances",
            self.settings.executor.call_timeout,
            services.ledger.get_obligations(&issuer),
        )
        .await?;

        info!(
            "🪙 {} issues {} currencies on {}",
            issuer,
            obligations.len(),
            network
        );
        Ok(holdings::issuer_tokens(&issuer, network, obligations))
    }

    pub async fn get_issued_token(
        &self,
        network: Network,
        issuer: &str,
        code: &str,
    ) -> AppResult<IssuedToken> {
        validation::validate_currency_code(code)?;
        let tokens = self.get_issuer_tokens(network, issuer).await?;

        tokens
            .find(code)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{} issued by {}", code, tokens.issuer)))
    }

    pub async fn get_signing_status(&self, request_id: &str) -> AppResult<SigningStatus> {
        let signing = self.signing_service()?;
        Ok(signing.get_signing_status(request_id).await?)
    }

    /// Forget finished tasks older than `max_age`
    pub fn purge_finished(&self, max_age: chrono::Duration) -> usize {
        self.registry.purge_finished(Utc::now() - max_age)
    }
}

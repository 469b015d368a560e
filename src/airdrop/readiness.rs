use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::airdrop::estimator::FeeSchedule;
use crate::airdrop::slots::SlotAllocation;
use crate::error::LedgerError;
use crate::ledger::client::{bounded, LedgerClient};
use crate::ledger::models::{drops_to_xrp, AccountInfo, Network, MAX_SLOTS_PER_ACCOUNT};

/// Structured diagnostic answering "can this account fund this batch now?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub account: String,
    pub network: Network,
    pub ready: bool,
    pub account_exists: bool,
    pub balance_drops: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance_xrp: Decimal,
    pub available_for_operations_drops: u64,
    pub available_slots: usize,
    pub required_slots: usize,
    pub slots_to_create: usize,
    /// The missing tickets fit under the per-account ceiling
    pub slots_creatable: bool,
    pub slot_creation_reserve_drops: u64,
    pub fee_budget_drops: u64,
    pub balance_deficit_drops: u64,
    /// Tickets a run would consume, lowest first
    pub slot_ids: Vec<u32>,
    pub issues: Vec<String>,
}

impl ReadinessReport {
    fn account_not_found(account: &str, network: Network, required_slots: usize) -> Self {
        Self {
            account: account.to_string(),
            network,
            ready: false,
            account_exists: false,
            balance_drops: 0,
            balance_xrp: Decimal::ZERO,
            available_for_operations_drops: 0,
            available_slots: 0,
            required_slots,
            slots_to_create: 0,
            slots_creatable: false,
            slot_creation_reserve_drops: 0,
            fee_budget_drops: 0,
            balance_deficit_drops: 0,
            slot_ids: Vec::new(),
            issues: vec![format!("Account not found: {}", account)],
        }
    }
}

/// Pure readiness rule.
///
/// `required_slots` is the number of tickets the run needs (zero for the
/// sequence path); `transaction_count` sizes the fee budget.
pub fn evaluate(
    account: &str,
    network: Network,
    info: Option<&AccountInfo>,
    slot_pool: &[u32],
    required_slots: usize,
    transaction_count: usize,
    fees: &FeeSchedule,
) -> ReadinessReport {
    let Some(info) = info else {
        return ReadinessReport::account_not_found(account, network, required_slots);
    };

    let allocation = SlotAllocation::allocate(slot_pool, required_slots);
    let mut unique_pool = slot_pool.to_vec();
    unique_pool.sort_unstable();
    unique_pool.dedup();
    let available_slots = unique_pool.len();

    let slots_to_create = required_slots.saturating_sub(available_slots);
    let slots_creatable =
        slots_to_create > 0 && available_slots + slots_to_create <= MAX_SLOTS_PER_ACCOUNT as usize;
    let slot_creation_reserve_drops =
        (slots_to_create as u64).saturating_mul(fees.owner_reserve_drops);
    let fee_budget_drops = (transaction_count as u64).saturating_mul(fees.fee_per_tx_drops);
    let available_for_operations_drops =
        info.balance_drops.saturating_sub(fees.base_reserve_drops);
    let needed_drops = slot_creation_reserve_drops.saturating_add(fee_budget_drops);
    let balance_deficit_drops = needed_drops.saturating_sub(available_for_operations_drops);

    let mut issues = Vec::new();

    if slots_to_create > 0 {
        let remedy = if slots_creatable {
            format!("{} can be created", slots_to_create)
        } else {
            format!(
                "creating {} would exceed the limit of {} tickets per account",
                slots_to_create, MAX_SLOTS_PER_ACCOUNT
            )
        };
        issues.push(format!(
            "Insufficient tickets: {} available, {} required; {}",
            available_slots, required_slots, remedy
        ));
    }

    if balance_deficit_drops > 0 {
        issues.push(format!(
            "Insufficient balance: {} XRP available after the {} XRP base reserve, {} XRP required ({} XRP ticket reserve + {} XRP fees)",
            drops_to_xrp(available_for_operations_drops),
            drops_to_xrp(fees.base_reserve_drops),
            drops_to_xrp(needed_drops),
            drops_to_xrp(slot_creation_reserve_drops),
            drops_to_xrp(fee_budget_drops),
        ));
    }

    ReadinessReport {
        account: account.to_string(),
        network,
        ready: issues.is_empty(),
        account_exists: true,
        balance_drops: info.balance_drops,
        balance_xrp: drops_to_xrp(info.balance_drops),
        available_for_operations_drops,
        available_slots,
        required_slots,
        slots_to_create,
        slots_creatable,
        slot_creation_reserve_drops,
        fee_budget_drops,
        balance_deficit_drops,
        slot_ids: allocation.slot_ids(),
        issues,
    }
}

/// Reads ledger state and applies [`evaluate`]
pub struct ReadinessValidator {
    fees: FeeSchedule,
    call_timeout: Duration,
}

impl ReadinessValidator {
    pub fn new(fees: FeeSchedule, call_timeout: Duration) -> Self {
        Self { fees, call_timeout }
    }

    /// Transport failures are returned as errors; only a missing account is
    /// folded into the report.
    pub async fn check(
        &self,
        ledger: &dyn LedgerClient,
        account: &str,
        required_slots: usize,
        transaction_count: usize,
    ) -> Result<ReadinessReport, LedgerError> {
        let network = ledger.network();

        let info = match bounded("account_info", self.call_timeout, ledger.get_account(account))
            .await
        {
            Ok(info) => info,
            Err(LedgerError::AccountNotFound(_)) => {
                info!("🔍 Readiness check: {} not found on {}", account, network);
                return Ok(ReadinessReport::account_not_found(
                    account,
                    network,
                    required_slots,
                ));
            }
            Err(e) => return Err(e),
        };

        let slots = if required_slots > 0 {
            bounded("account_objects", self.call_timeout, ledger.get_slots(account)).await?
        } else {
            Vec::new()
        };

        let report = evaluate(
            account,
            network,
            Some(&info),
            &slots,
            required_slots,
            transaction_count,
            &self.fees,
        );

        debug!(
            "🔍 Readiness for {} on {}: ready={} issues={}",
            account,
            network,
            report.ready,
            report.issues.len()
        );
        Ok(report)
    }
}

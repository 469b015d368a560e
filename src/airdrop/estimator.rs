use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ValidationError;
use crate::ledger::models::{drops_to_xrp, DROPS_PER_XRP};

/// Ledger cost parameters used for estimates and readiness checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub fee_per_tx_drops: u64,
    /// Reserve that keeps the account alive, never spendable
    pub base_reserve_drops: u64,
    /// Reserve locked per owned ledger object (one per ticket)
    pub owner_reserve_drops: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_per_tx_drops: 12,
            base_reserve_drops: 10 * DROPS_PER_XRP,
            owner_reserve_drops: 2 * DROPS_PER_XRP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub recipient_count: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_per_recipient: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_amount: Decimal,
    pub fee_per_transaction_drops: u64,
    pub total_fee_drops: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_fee_xrp: Decimal,
    pub estimated_seconds: f64,
    pub estimated_minutes: f64,
}

/// Cost and duration of a uniform batch
pub fn estimate(
    recipient_count: usize,
    amount_per_recipient: Decimal,
    fees: &FeeSchedule,
    delay: Duration,
) -> Result<Estimate, ValidationError> {
    let total_amount = amount_per_recipient
        .checked_mul(Decimal::from(recipient_count as u64))
        .ok_or_else(|| {
            ValidationError::InvalidAmount(format!(
                "{} x {} recipients is out of range",
                amount_per_recipient, recipient_count
            ))
        })?;
    let total_fee_drops = fees
        .fee_per_tx_drops
        .saturating_mul(recipient_count as u64);
    let estimated_seconds = recipient_count as f64 * delay.as_secs_f64();

    Ok(Estimate {
        recipient_count,
        amount_per_recipient,
        total_amount,
        fee_per_transaction_drops: fees.fee_per_tx_drops,
        total_fee_drops,
        total_fee_xrp: drops_to_xrp(total_fee_drops),
        estimated_seconds: round2(estimated_seconds),
        estimated_minutes: round2(estimated_seconds / 60.0),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Drops per XRP
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// The ledger refuses to let one account own more tickets than this
pub const MAX_SLOTS_PER_ACCOUNT: u32 = 250;

/// Ledgers a transaction may wait for inclusion before `LastLedgerSequence`
/// makes it permanently invalid
pub const LEDGER_WINDOW: u32 = 20;

/// Network selector - every task and ledger call is bound to exactly one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    /// Return all supported networks
    pub fn all() -> Vec<Network> {
        vec![Network::Testnet, Network::Mainnet]
    }
}

impl FromStr for Network {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(ValidationError::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Account state as read from a validated ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account: String,
    pub balance_drops: u64,
    pub sequence: u32,
}

/// One trust line as seen from the queried account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLine {
    /// As stored on the ledger: three characters or 40 hex digits
    pub currency: String,
    /// The other side of the line, the issuer when `balance` is positive
    pub counterparty: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub limit: Decimal,
}

/// Amount of one currency an issuer has outstanding across all holders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Issued-currency values arrive in plain or scientific notation
pub fn parse_ledger_value(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Amount field of a payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAmount {
    Drops(u64),
    Issued {
        currency: String,
        issuer: String,
        value: Decimal,
    },
}

/// How a transaction claims its place in the account's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SequenceTag {
    Sequence(u32),
    Slot(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Payment {
        destination: String,
        amount: LedgerAmount,
    },
    SlotCreate {
        count: u32,
    },
}

/// A fully specified transaction, ready to be signed without any autofill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub account: String,
    pub kind: TransactionKind,
    pub fee_drops: u64,
    pub tag: SequenceTag,
    /// Last ledger the transaction may be included in
    pub last_ledger: Option<u32>,
}

impl UnsignedTransaction {
    pub fn payment(
        account: &str,
        destination: &str,
        amount: LedgerAmount,
        fee_drops: u64,
        tag: SequenceTag,
    ) -> Self {
        Self {
            account: account.to_string(),
            kind: TransactionKind::Payment {
                destination: destination.to_string(),
                amount,
            },
            fee_drops,
            tag,
            last_ledger: None,
        }
    }

    pub fn slot_create(account: &str, count: u32, fee_drops: u64, sequence: u32) -> Self {
        Self {
            account: account.to_string(),
            kind: TransactionKind::SlotCreate { count },
            fee_drops,
            tag: SequenceTag::Sequence(sequence),
            last_ledger: None,
        }
    }

    /// Valid for `LEDGER_WINDOW` (plus `extra`) ledgers after `current`
    pub fn expiring_after(mut self, current: u32, extra: u32) -> Self {
        self.last_ledger = Some(current.saturating_add(LEDGER_WINDOW).saturating_add(extra));
        self
    }

    /// Ledger JSON representation (`tx_json`)
    ///
    /// Slot-tagged transactions carry `Sequence: 0` and the slot in
    /// `TicketSequence`; the two forms are built directly, never patched.
    pub fn to_json(&self) -> serde_json::Value {
        let mut tx = match &self.kind {
            TransactionKind::Payment { destination, amount } => json!({
                "TransactionType": "Payment",
                "Account": self.account,
                "Destination": destination,
                "Amount": amount_json(amount),
            }),
            TransactionKind::SlotCreate { count } => json!({
                "TransactionType": "TicketCreate",
                "Account": self.account,
                "TicketCount": count,
            }),
        };

        tx["Fee"] = json!(self.fee_drops.to_string());
        match self.tag {
            SequenceTag::Sequence(seq) => {
                tx["Sequence"] = json!(seq);
            }
            SequenceTag::Slot(slot) => {
                tx["Sequence"] = json!(0);
                tx["TicketSequence"] = json!(slot);
            }
        }
        if let Some(last) = self.last_ledger {
            tx["LastLedgerSequence"] = json!(last);
        }
        tx
    }
}

fn amount_json(amount: &LedgerAmount) -> serde_json::Value {
    match amount {
        LedgerAmount::Drops(drops) => json!(drops.to_string()),
        LedgerAmount::Issued {
            currency,
            issuer,
            value,
        } => json!({
            "currency": encode_currency_code(currency),
            "issuer": issuer,
            "value": value.normalize().to_string(),
        }),
    }
}

/// Standard three-letter codes go on the wire as-is; anything longer is sent
/// in the 160-bit hex form, right-padded with zeros.
pub fn encode_currency_code(code: &str) -> String {
    if code.len() == 3 {
        return code.to_string();
    }
    if code.len() == 40 && code.chars().all(|c| c.is_ascii_hexdigit()) {
        return code.to_ascii_uppercase();
    }
    let mut bytes = [0u8; 20];
    let raw = code.as_bytes();
    let len = raw.len().min(20);
    bytes[..len].copy_from_slice(&raw[..len]);
    hex::encode_upper(bytes)
}

/// Signed blob plus its hash, as produced by a signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub blob: String,
    pub hash: String,
    /// Carried over from the unsigned transaction
    pub last_ledger: Option<u32>,
}

/// Final verdict of the ledger on a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub tx_ref: String,
    pub engine_result: String,
    pub engine_result_message: Option<String>,
    pub validated: bool,
}

impl SubmitOutcome {
    pub fn accepted(&self) -> bool {
        self.engine_result == "tesSUCCESS"
    }

    /// `tes` and `tec` results are included in a ledger and burn the sequence
    /// (or slot) they were submitted with.
    pub fn consumes_sequence(&self) -> bool {
        self.engine_result.starts_with("tes") || self.engine_result.starts_with("tec")
    }

    /// Machine code first, human text after when the node supplied one
    pub fn error_detail(&self) -> String {
        match &self.engine_result_message {
            Some(message) if !message.is_empty() => {
                format!("{}: {}", self.engine_result, message)
            }
            _ => self.engine_result.clone(),
        }
    }
}

pub fn drops_to_xrp(drops: u64) -> Decimal {
    Decimal::from(drops) / Decimal::from(DROPS_PER_XRP)
}

/// Converts a display-unit amount to drops. `None` when the amount is negative,
/// has more precision than one drop, or overflows.
pub fn xrp_to_drops(xrp: Decimal) -> Option<u64> {
    if xrp.is_sign_negative() {
        return None;
    }
    let drops = xrp.checked_mul(Decimal::from(DROPS_PER_XRP))?;
    if !drops.fract().is_zero() {
        return None;
    }
    drops.trunc().to_u64()
}

//! Scripted ledger, signer and signing-service doubles shared by unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{LedgerError, SigningError};
use crate::ledger::client::LedgerClient;
use crate::ledger::models::*;
use crate::ledger::signer::{Credential, CredentialResolver, TransactionSigner};
use crate::signing::client::{
    QrRefs, SigningMetadata, SigningRequest, SigningService, SigningStatus,
};

/// In-memory ledger that applies submitted transactions the way a node
/// would: sequence, ticket and `LastLedgerSequence` checks, reserve-free
/// balances, scripted rejections per destination.
pub struct MockLedger {
    network: Network,
    fee_drops: u64,
    accounts: Mutex<HashMap<String, AccountInfo>>,
    slots: Mutex<HashMap<String, Vec<u32>>>,
    trust_lines: HashMap<String, Vec<TrustLine>>,
    obligations: HashMap<String, Vec<Obligation>>,
    rejections: HashMap<String, String>,
    transport_failures: HashSet<String>,
    unreachable: bool,
    submit_delay: Duration,
    destination_delays: HashMap<String, Duration>,
    ledger_index: AtomicU32,
    ledgers_per_submit: u32,
    submissions: Mutex<Vec<Value>>,
    submitted_at: Mutex<Vec<Instant>>,
    account_reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            network: Network::Testnet,
            fee_drops: 12,
            accounts: Mutex::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
            trust_lines: HashMap::new(),
            obligations: HashMap::new(),
            rejections: HashMap::new(),
            transport_failures: HashSet::new(),
            unreachable: false,
            submit_delay: Duration::ZERO,
            destination_delays: HashMap::new(),
            ledger_index: AtomicU32::new(1000),
            ledgers_per_submit: 0,
            submissions: Mutex::new(Vec::new()),
            submitted_at: Mutex::new(Vec::new()),
            account_reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_account(self, account: &str, balance_drops: u64, sequence: u32) -> Self {
        self.accounts.lock().insert(
            account.to_string(),
            AccountInfo {
                account: account.to_string(),
                balance_drops,
                sequence,
            },
        );
        self
    }

    pub fn with_slots(self, account: &str, slots: Vec<u32>) -> Self {
        self.slots.lock().insert(account.to_string(), slots);
        self
    }

    /// Payments to `destination` are included with `engine_result`
    pub fn rejecting(mut self, destination: &str, engine_result: &str) -> Self {
        self.rejections
            .insert(destination.to_string(), engine_result.to_string());
        self
    }

    /// Submitting a payment to `destination` fails before reaching the node
    pub fn failing_transport(mut self, destination: &str) -> Self {
        self.transport_failures.insert(destination.to_string());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_trust_lines(mut self, account: &str, lines: Vec<TrustLine>) -> Self {
        self.trust_lines.insert(account.to_string(), lines);
        self
    }

    pub fn with_obligations(mut self, issuer: &str, obligations: Vec<Obligation>) -> Self {
        self.obligations.insert(issuer.to_string(), obligations);
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Submissions to `destination` take `delay` instead of the default
    pub fn delaying(mut self, destination: &str, delay: Duration) -> Self {
        self.destination_delays.insert(destination.to_string(), delay);
        self
    }

    /// Ledgers that close while each submission waits in the queue
    pub fn closing_ledgers_per_submit(mut self, ledgers: u32) -> Self {
        self.ledgers_per_submit = ledgers;
        self
    }

    /// When each transaction reached the node
    pub fn submission_times(&self) -> Vec<Instant> {
        self.submitted_at.lock().clone()
    }

    /// Transactions that reached the node, as JSON, in arrival order
    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().clone()
    }

    pub fn account_reads(&self) -> usize {
        self.account_reads.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), LedgerError> {
        if self.unreachable {
            return Err(LedgerError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn apply(&self, tx: &Value) -> SubmitOutcome {
        let index = self.submissions.lock().len();
        let account = tx["Account"].as_str().unwrap_or_default().to_string();
        let sequence = tx["Sequence"].as_u64().unwrap_or_default() as u32;
        let ticket = tx["TicketSequence"].as_u64().map(|t| t as u32);
        let last_ledger = tx["LastLedgerSequence"].as_u64().map(|l| l as u32);

        let verdict = |engine_result: &str| SubmitOutcome {
            tx_ref: format!("HASH{:04}", index),
            engine_result: engine_result.to_string(),
            engine_result_message: None,
            validated: engine_result.starts_with("tes") || engine_result.starts_with("tec"),
        };

        if matches!(last_ledger, Some(last) if self.ledger_index.load(Ordering::SeqCst) > last) {
            return verdict("tefMAX_LEDGER");
        }

        let mut accounts = self.accounts.lock();
        let Some(info) = accounts.get_mut(&account) else {
            return verdict("terNO_ACCOUNT");
        };

        let mut slots = self.slots.lock();
        let pool = slots.entry(account.clone()).or_default();
        let ticket_position = match ticket {
            Some(ticket) => match pool.iter().position(|s| *s == ticket) {
                Some(position) => Some(position),
                None => return verdict("tefNO_TICKET"),
            },
            None if sequence < info.sequence => return verdict("tefPAST_SEQ"),
            None if sequence > info.sequence => return verdict("terPRE_SEQ"),
            None => None,
        };

        let engine_result = match tx["TransactionType"].as_str() {
            Some("TicketCreate") => "tesSUCCESS",
            _ => {
                let destination = tx["Destination"].as_str().unwrap_or_default();
                self.rejections
                    .get(destination)
                    .map(String::as_str)
                    .unwrap_or("tesSUCCESS")
            }
        };
        let outcome = verdict(engine_result);
        if !outcome.consumes_sequence() {
            return outcome;
        }

        match ticket_position {
            Some(position) => {
                pool.remove(position);
            }
            None => info.sequence += 1,
        }
        if tx["TransactionType"] == "TicketCreate" {
            let count = tx["TicketCount"].as_u64().unwrap_or_default() as u32;
            pool.extend(info.sequence..info.sequence + count);
            info.sequence += count;
        }
        outcome
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_account(&self, account: &str) -> Result<AccountInfo, LedgerError> {
        self.check_reachable()?;
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        self.accounts
            .lock()
            .get(account)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
    }

    async fn get_slots(&self, account: &str) -> Result<Vec<u32>, LedgerError> {
        self.check_reachable()?;
        if !self.accounts.lock().contains_key(account) {
            return Err(LedgerError::AccountNotFound(account.to_string()));
        }
        Ok(self.slots.lock().get(account).cloned().unwrap_or_default())
    }

    async fn get_fee(&self) -> Result<u64, LedgerError> {
        self.check_reachable()?;
        Ok(self.fee_drops)
    }

    async fn current_ledger(&self) -> Result<u32, LedgerError> {
        self.check_reachable()?;
        Ok(self.ledger_index.load(Ordering::SeqCst))
    }

    async fn get_trust_lines(&self, account: &str) -> Result<Vec<TrustLine>, LedgerError> {
        self.check_reachable()?;
        if !self.accounts.lock().contains_key(account) {
            return Err(LedgerError::AccountNotFound(account.to_string()));
        }
        Ok(self.trust_lines.get(account).cloned().unwrap_or_default())
    }

    async fn get_obligations(&self, issuer: &str) -> Result<Vec<Obligation>, LedgerError> {
        self.check_reachable()?;
        if !self.accounts.lock().contains_key(issuer) {
            return Err(LedgerError::AccountNotFound(issuer.to_string()));
        }
        Ok(self.obligations.get(issuer).cloned().unwrap_or_default())
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitOutcome, LedgerError> {
        self.check_reachable()?;
        let parsed: Value = serde_json::from_str(&tx.blob)
            .map_err(|e| LedgerError::MalformedResponse(e.to_string()))?;

        let destination = parsed["Destination"].as_str().unwrap_or_default();
        if self.transport_failures.contains(destination) {
            return Err(LedgerError::Transport("connection reset".to_string()));
        }

        let delay = self
            .destination_delays
            .get(destination)
            .copied()
            .unwrap_or(self.submit_delay);
        self.submitted_at.lock().push(Instant::now());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.ledger_index
            .fetch_add(self.ledgers_per_submit, Ordering::SeqCst);
        let outcome = self.apply(&parsed);
        self.submissions.lock().push(parsed);
        Ok(outcome)
    }
}

/// Signs by serializing the transaction JSON as the "blob"
pub struct MockSigner {
    account: String,
}

impl MockSigner {
    pub fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
        }
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    fn account(&self) -> &str {
        &self.account
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SigningError> {
        Ok(SignedTransaction {
            blob: tx.to_json().to_string(),
            hash: String::new(),
            last_ledger: tx.last_ledger,
        })
    }
}

/// Resolves every secret to one fixed account
pub struct MockResolver {
    account: Option<String>,
}

impl MockResolver {
    pub fn new(account: &str) -> Self {
        Self {
            account: Some(account.to_string()),
        }
    }

    pub fn unusable() -> Self {
        Self { account: None }
    }
}

#[async_trait]
impl CredentialResolver for MockResolver {
    async fn resolve(
        &self,
        credential: &Credential,
    ) -> Result<Arc<dyn TransactionSigner>, SigningError> {
        let account = match (credential, &self.account) {
            (_, None) => {
                return Err(SigningError::UnusableCredential("badSeed".to_string()));
            }
            (Credential::Interactive { account }, _) => account.clone(),
            (Credential::Secret(_), Some(account)) => account.clone(),
        };
        Ok(Arc::new(MockSigner::new(&account)))
    }
}

#[derive(Debug, Clone)]
pub enum ScriptedStatus {
    Pending,
    Signed { account: String },
    Cancelled,
    Expired,
}

/// Signing service that answers status polls from a script; the last entry
/// repeats once the script runs out
pub struct MockSigningService {
    script: Vec<ScriptedStatus>,
    polls: AtomicUsize,
    created: Mutex<Vec<(Value, SigningMetadata)>>,
}

impl MockSigningService {
    pub fn new(script: Vec<ScriptedStatus>) -> Self {
        Self {
            script,
            polls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn created_requests(&self) -> Vec<(Value, SigningMetadata)> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl SigningService for MockSigningService {
    async fn create_signing_request(
        &self,
        tx: &Value,
        metadata: SigningMetadata,
    ) -> Result<SigningRequest, SigningError> {
        let mut created = self.created.lock();
        created.push((tx.clone(), metadata));

        Ok(SigningRequest {
            request_id: format!("request-{}", created.len()),
            refs: QrRefs {
                qr_png: Some("https://signing.test/qr.png".to_string()),
                qr_matrix: None,
                sign_url: Some("https://signing.test/sign".to_string()),
                websocket_status: None,
            },
            pushed: false,
        })
    }

    async fn get_signing_status(&self, _request_id: &str) -> Result<SigningStatus, SigningError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .get(poll)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(ScriptedStatus::Pending);

        Ok(match step {
            ScriptedStatus::Pending => SigningStatus::default(),
            ScriptedStatus::Cancelled => SigningStatus {
                cancelled: true,
                ..Default::default()
            },
            ScriptedStatus::Expired => SigningStatus {
                expired: true,
                ..Default::default()
            },
            ScriptedStatus::Signed { account } => {
                let blob = self
                    .created
                    .lock()
                    .last()
                    .map(|(tx, _)| tx.to_string())
                    .unwrap_or_default();
                SigningStatus {
                    signed: true,
                    tx_ref: Some("SIGNEDHASH".to_string()),
                    signed_blob: Some(blob),
                    account: Some(account),
                    ..Default::default()
                }
            }
        })
    }
}

#[test]
fn test_mock_ledger_applies_tickets() {
    let ledger = MockLedger::new().with_account("rFunding", 100, 5);
    let create = UnsignedTransaction::slot_create("rFunding", 3, 12, 5).to_json();

    let outcome = ledger.apply(&create);
    assert!(outcome.accepted());

    let info = ledger.accounts.lock().get("rFunding").cloned().unwrap();
    assert_eq!(info.sequence, 9);
    assert_eq!(ledger.slots.lock()["rFunding"], vec![6, 7, 8]);

    let payment = json!({
        "TransactionType": "Payment",
        "Account": "rFunding",
        "Destination": "rDest",
        "Sequence": 0,
        "TicketSequence": 7,
    });
    assert!(ledger.apply(&payment).accepted());
    assert_eq!(ledger.apply(&payment).engine_result, "tefNO_TICKET");

    let mut expired = payment.clone();
    expired["TicketSequence"] = json!(8);
    expired["LastLedgerSequence"] = json!(999);
    assert_eq!(ledger.apply(&expired).engine_result, "tefMAX_LEDGER");
    assert_eq!(ledger.slots.lock()["rFunding"], vec![6, 8]);
}

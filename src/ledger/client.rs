use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{LedgerError, ValidationError};
use crate::ledger::models::*;
use crate::ledger::signer::CredentialResolver;

/// Ledger capability consumed by the readiness validator and the executor
///
/// INVARIANTS:
/// - `submit` only reports an outcome that can no longer change
/// - `get_account` maps a missing/unfunded account to `LedgerError::AccountNotFound`
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Network this client talks to
    fn network(&self) -> Network;

    async fn get_account(&self, account: &str) -> Result<AccountInfo, LedgerError>;

    /// Slot (ticket) identifiers currently owned by the account, unordered
    async fn get_slots(&self, account: &str) -> Result<Vec<u32>, LedgerError>;

    /// Base transaction fee in drops
    async fn get_fee(&self) -> Result<u64, LedgerError>;

    /// Index of the open ledger new transactions would land in
    async fn current_ledger(&self) -> Result<u32, LedgerError>;

    /// Returns once the transaction is validated, rejected, or past its
    /// `LastLedgerSequence` without being included
    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitOutcome, LedgerError>;

    async fn get_trust_lines(&self, account: &str) -> Result<Vec<TrustLine>, LedgerError>;

    /// Currencies the account issues, with the amount outstanding
    async fn get_obligations(&self, issuer: &str) -> Result<Vec<Obligation>, LedgerError>;
}

/// Runs a ledger call under a deadline; an elapsed deadline becomes
/// `LedgerError::Timeout` naming the operation.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(operation.to_string())),
    }
}

/// Everything a worker needs for one network
#[derive(Clone)]
pub struct NetworkServices {
    pub ledger: Arc<dyn LedgerClient>,
    pub resolver: Arc<dyn CredentialResolver>,
}

/// LedgerRouter - routes calls to the services registered for a network
pub struct LedgerRouter {
    networks: HashMap<Network, NetworkServices>,
}

impl LedgerRouter {
    pub fn new() -> Self {
        Self {
            networks: HashMap::new(),
        }
    }

    /// Register the services for a network
    ///
    /// Only call this during system initialization
    pub fn register(&mut self, network: Network, services: NetworkServices) {
        info!("Registering ledger services for network: {}", network);
        self.networks.insert(network, services);
    }

    pub fn get(&self, network: Network) -> Result<&NetworkServices, ValidationError> {
        self.networks
            .get(&network)
            .ok_or_else(|| ValidationError::UnsupportedNetwork(network.to_string()))
    }

    pub fn registered_networks(&self) -> Vec<Network> {
        let mut networks: Vec<Network> = self.networks.keys().copied().collect();
        networks.sort_by_key(|n| n.as_str());
        networks
    }
}

impl Default for LedgerRouter {
    fn default() -> Self {
        Self::new()
    }
}

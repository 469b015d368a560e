use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::SigningError;
use crate::ledger::models::{SignedTransaction, UnsignedTransaction};
use crate::ledger::rpc::{JsonRpcLedgerClient, RpcSigner};
use crate::signing::client::SigningService;
use crate::signing::interactive::InteractiveSigner;

/// How the funding account authorizes transactions
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Family seed held for the duration of the run, never persisted
    Secret(String),
    /// Each transaction is approved by the account holder through the signing service
    Interactive { account: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Secret(_) => f.write_str("Credential::Secret(<redacted>)"),
            Credential::Interactive { account } => f
                .debug_struct("Credential::Interactive")
                .field("account", account)
                .finish(),
        }
    }
}

impl Credential {
    /// Account known without resolving the credential
    pub fn declared_account(&self) -> Option<&str> {
        match self {
            Credential::Secret(_) => None,
            Credential::Interactive { account } => Some(account),
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Credential::Interactive { .. })
    }
}

/// Signs transactions for a single account
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    fn account(&self) -> &str;

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SigningError>;
}

/// Turns a credential into a signer bound to its account
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, credential: &Credential)
        -> Result<Arc<dyn TransactionSigner>, SigningError>;
}

/// Secrets are signed by the ledger node, interactive credentials by the
/// signing service when one is configured
pub struct DefaultResolver {
    rpc: Arc<JsonRpcLedgerClient>,
    signing: Option<Arc<dyn SigningService>>,
    poll_interval: Duration,
    signing_timeout: Duration,
}

impl DefaultResolver {
    pub fn new(
        rpc: Arc<JsonRpcLedgerClient>,
        signing: Option<Arc<dyn SigningService>>,
        poll_interval: Duration,
        signing_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            signing,
            poll_interval,
            signing_timeout,
        }
    }
}

#[async_trait]
impl CredentialResolver for DefaultResolver {
    async fn resolve(
        &self,
        credential: &Credential,
    ) -> Result<Arc<dyn TransactionSigner>, SigningError> {
        match credential {
            Credential::Secret(secret) => {
                let account = self.rpc.derive_account(secret).await?;
                Ok(Arc::new(RpcSigner::new(
                    account,
                    secret.clone(),
                    self.rpc.clone(),
                )))
            }
            Credential::Interactive { account } => {
                let service = self.signing.clone().ok_or(SigningError::NotConfigured)?;
                Ok(Arc::new(InteractiveSigner::new(
                    account.clone(),
                    service,
                    self.poll_interval,
                    self.signing_timeout,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let credential = Credential::Secret("sEdTM1uX8pu2do5XvTnutH6HsouMaM2".to_string());
        let rendered = format!("{:?}", credential);

        assert!(!rendered.contains("sEdTM1uX8pu2do5XvTnutH6HsouMaM2"));
        assert!(rendered.contains("redacted"));
        assert_eq!(credential.declared_account(), None);
    }

    #[test]
    fn test_interactive_declares_account() {
        let credential = Credential::Interactive {
            account: "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh".to_string(),
        };

        assert!(credential.is_interactive());
        assert_eq!(
            credential.declared_account(),
            Some("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh")
        );
    }
}

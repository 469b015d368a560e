use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{info, warn};

use crate::error::SigningError;
use crate::ledger::models::{SignedTransaction, TransactionKind, UnsignedTransaction};
use crate::ledger::signer::TransactionSigner;
use crate::signing::client::{SigningMetadata, SigningService};

/// Signs by asking the account holder to approve every transaction through
/// the signing service. The service only signs; submission stays with the
/// executor.
pub struct InteractiveSigner {
    account: String,
    service: Arc<dyn SigningService>,
    poll_interval: Duration,
    timeout: Duration,
}

impl InteractiveSigner {
    pub fn new(
        account: String,
        service: Arc<dyn SigningService>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            account,
            service,
            poll_interval,
            timeout,
        }
    }

    fn instruction(tx: &UnsignedTransaction) -> String {
        match &tx.kind {
            TransactionKind::Payment { destination, .. } => {
                format!("Approve airdrop payment to {}", destination)
            }
            TransactionKind::SlotCreate { count } => {
                format!("Approve creation of {} tickets", count)
            }
        }
    }
}

#[async_trait]
impl TransactionSigner for InteractiveSigner {
    fn account(&self) -> &str {
        &self.account
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SigningError> {
        let request = self
            .service
            .create_signing_request(
                &tx.to_json(),
                SigningMetadata {
                    instruction: Self::instruction(tx),
                    submit: false,
                    blob: json!({ "purpose": "airdrop" }),
                },
            )
            .await?;

        let start = Instant::now();
        loop {
            if start.elapsed() >= self.timeout {
                warn!("⏰ Signing request {} timed out", request.request_id);
                return Err(SigningError::Timeout);
            }

            time::sleep(self.poll_interval).await;

            let status = match self.service.get_signing_status(&request.request_id).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("⚠️  Polling signing request {} failed: {}", request.request_id, e);
                    continue;
                }
            };

            if status.cancelled {
                return Err(SigningError::Cancelled);
            }
            if status.expired {
                return Err(SigningError::Expired);
            }
            if status.signed {
                if let Some(signer) = status.account.as_deref() {
                    if signer != self.account {
                        return Err(SigningError::UnusableCredential(format!(
                            "signed by {} instead of {}",
                            signer, self.account
                        )));
                    }
                }

                let blob = status.signed_blob.ok_or_else(|| {
                    SigningError::Request("signed request carried no blob".to_string())
                })?;
                info!("✍️  Signing request {} approved", request.request_id);

                return Ok(SignedTransaction {
                    blob,
                    hash: status.tx_ref.unwrap_or_default(),
                    last_ledger: tx.last_ledger,
                });
            }
        }
    }
}

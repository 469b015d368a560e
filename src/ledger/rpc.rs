use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, warn};

use crate::error::{LedgerError, SigningError};
use crate::ledger::client::LedgerClient;
use crate::ledger::models::*;
use crate::ledger::signer::TransactionSigner;

/// Page size for `account_objects`
const OBJECTS_PAGE_LIMIT: u32 = 400;

#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    pub network: Network,
    /// Bound on each individual HTTP round trip
    pub request_timeout: Duration,
    /// Interval between `tx` lookups while waiting for validation
    pub poll_interval: Duration,
    /// How long a transaction without `LastLedgerSequence` may take to reach
    /// a validated ledger
    pub validation_timeout: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>, network: Network, request_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            network,
            request_timeout,
            poll_interval: Duration::from_secs(1),
            validation_timeout: Duration::from_secs(30),
        }
    }
}

/// Ledger client speaking the node's JSON-RPC interface over HTTP
pub struct JsonRpcLedgerClient {
    config: RpcConfig,
    http: reqwest::Client,
}

impl JsonRpcLedgerClient {
    pub fn new(config: RpcConfig) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { config, http })
    }

    /// Issue one JSON-RPC call and return its `result` object. Error results
    /// become `LedgerError::Rpc` carrying the node's error token.
    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let body = json!({
            "method": method,
            "params": [params],
        });

        let response = self.http.post(&self.config.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!(
                "{} returned HTTP {}",
                method, status
            )));
        }

        let mut payload: Value = response.json().await?;
        let result = payload
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| LedgerError::MalformedResponse(format!("{}: missing result", method)))?;

        if result.get("status").and_then(Value::as_str) == Some("error") {
            let code = result
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let message = result
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or(&code)
                .to_string();
            return Err(LedgerError::Rpc { code, message });
        }

        Ok(result)
    }

    /// Derive the classic address behind a family seed
    pub async fn derive_account(&self, secret: &str) -> Result<String, SigningError> {
        let params = if is_hex_seed(secret) {
            json!({ "seed_hex": secret })
        } else {
            json!({ "seed": secret })
        };

        // error text from the node may echo the seed
        let result = self
            .request("wallet_propose", params)
            .await
            .map_err(|e| SigningError::UnusableCredential(redacted_reason(&e)))?;

        result
            .get("account_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SigningError::UnusableCredential("no account derived".to_string()))
    }

    /// Sign a fully specified transaction offline through the node
    pub async fn sign_json(
        &self,
        tx: &UnsignedTransaction,
        secret: &str,
    ) -> Result<SignedTransaction, SigningError> {
        let result = self
            .request(
                "sign",
                json!({
                    "tx_json": tx.to_json(),
                    "secret": secret,
                    "offline": true,
                }),
            )
            .await
            .map_err(|e| SigningError::Request(redacted_reason(&e)))?;

        let blob = str_field(&result, "tx_blob")
            .ok_or_else(|| SigningError::Request("sign: missing tx_blob".to_string()))?;
        let hash = result
            .get("tx_json")
            .and_then(|tx| str_field(tx, "hash"))
            .unwrap_or_default();

        Ok(SignedTransaction {
            blob,
            hash,
            last_ledger: tx.last_ledger,
        })
    }

    async fn validated_ledger(&self) -> Result<u32, LedgerError> {
        let result = self
            .request("ledger", json!({ "ledger_index": "validated" }))
            .await?;
        u32_field(&result, "ledger_index")
            .ok_or_else(|| LedgerError::MalformedResponse("ledger: bad ledger_index".into()))
    }

    /// Poll `tx` until the transaction appears in a validated ledger. With a
    /// `LastLedgerSequence`, the wait ends only when the transaction is
    /// validated or a validated ledger beyond that index exists without it.
    async fn wait_for_validation(
        &self,
        hash: &str,
        last_ledger: Option<u32>,
    ) -> Result<SubmitOutcome, LedgerError> {
        let start = Instant::now();

        loop {
            time::sleep(self.config.poll_interval).await;

            // read before the lookup: once past, no later ledger can include it
            let expired = match last_ledger {
                Some(last) => match self.validated_ledger().await {
                    Ok(validated) => validated > last,
                    Err(e) => {
                        warn!("⚠️  Validated ledger lookup failed: {}", e);
                        false
                    }
                },
                None => false,
            };

            let absent = match self.request("tx", json!({ "transaction": hash })).await {
                Ok(result) if result.get("validated").and_then(Value::as_bool) == Some(true) => {
                    let engine_result = result
                        .get("meta")
                        .and_then(|meta| str_field(meta, "TransactionResult"))
                        .ok_or_else(|| {
                            LedgerError::MalformedResponse(format!("tx {}: missing meta", hash))
                        })?;

                    return Ok(SubmitOutcome {
                        tx_ref: hash.to_string(),
                        engine_result,
                        engine_result_message: None,
                        validated: true,
                    });
                }
                Ok(_) => {
                    debug!("⏳ {} not yet validated", hash);
                    true
                }
                Err(LedgerError::Rpc { code, .. }) if code == "txnNotFound" => {
                    debug!("⏳ {} not yet visible", hash);
                    true
                }
                Err(e) => {
                    warn!("⚠️  tx lookup for {} failed: {}", hash, e);
                    false
                }
            };

            match last_ledger {
                Some(last) if expired && absent => return Ok(expired_outcome(hash, last)),
                None if start.elapsed() >= self.config.validation_timeout => {
                    return Err(LedgerError::Timeout(format!("validation of {}", hash)));
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    fn network(&self) -> Network {
        self.config.network
    }

    async fn get_account(&self, account: &str) -> Result<AccountInfo, LedgerError> {
        let result = self
            .request(
                "account_info",
                json!({ "account": account, "ledger_index": "validated" }),
            )
            .await
            .map_err(|e| not_found_as(e, account))?;

        let data = result
            .get("account_data")
            .ok_or_else(|| LedgerError::MalformedResponse("account_info: no account_data".into()))?;

        let balance_drops = str_field(data, "Balance")
            .and_then(|b| b.parse::<u64>().ok())
            .ok_or_else(|| LedgerError::MalformedResponse("account_info: bad Balance".into()))?;
        let sequence = data
            .get("Sequence")
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s).ok())
            .ok_or_else(|| LedgerError::MalformedResponse("account_info: bad Sequence".into()))?;

        Ok(AccountInfo {
            account: account.to_string(),
            balance_drops,
            sequence,
        })
    }

    async fn get_slots(&self, account: &str) -> Result<Vec<u32>, LedgerError> {
        let mut slots = Vec::new();
        let mut marker: Option<Value> = None;

        loop {
            let mut params = json!({
                "account": account,
                "type": "ticket",
                "ledger_index": "validated",
                "limit": OBJECTS_PAGE_LIMIT,
            });
            if let Some(m) = marker.take() {
                params["marker"] = m;
            }

            let result = self
                .request("account_objects", params)
                .await
                .map_err(|e| not_found_as(e, account))?;

            if let Some(objects) = result.get("account_objects").and_then(Value::as_array) {
                slots.extend(
                    objects
                        .iter()
                        .filter_map(|o| o.get("TicketSequence").and_then(Value::as_u64))
                        .filter_map(|s| u32::try_from(s).ok()),
                );
            }

            match result.get("marker") {
                Some(m) if !m.is_null() => marker = Some(m.clone()),
                _ => break,
            }
        }

        Ok(slots)
    }

    async fn get_fee(&self) -> Result<u64, LedgerError> {
        let result = self.request("fee", json!({})).await?;

        result
            .get("drops")
            .and_then(|d| str_field(d, "base_fee"))
            .and_then(|f| f.parse::<u64>().ok())
            .ok_or_else(|| LedgerError::MalformedResponse("fee: bad drops.base_fee".into()))
    }

    async fn current_ledger(&self) -> Result<u32, LedgerError> {
        let result = self.request("ledger_current", json!({})).await?;
        u32_field(&result, "ledger_current_index").ok_or_else(|| {
            LedgerError::MalformedResponse("ledger_current: bad ledger_current_index".into())
        })
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitOutcome, LedgerError> {
        let result = self
            .request("submit", json!({ "tx_blob": tx.blob }))
            .await?;

        let engine_result = str_field(&result, "engine_result")
            .ok_or_else(|| LedgerError::MalformedResponse("submit: no engine_result".into()))?;
        let engine_result_message = str_field(&result, "engine_result_message");
        let hash = result
            .get("tx_json")
            .and_then(|t| str_field(t, "hash"))
            .unwrap_or_else(|| tx.hash.clone());

        debug!("📨 Submitted {}: preliminary {}", hash, engine_result);

        // malformed, failed locally or otherwise never forwarded: final now
        if is_final_preliminary(&engine_result) {
            return Ok(SubmitOutcome {
                tx_ref: hash,
                engine_result,
                engine_result_message,
                validated: false,
            });
        }

        let mut outcome = self.wait_for_validation(&hash, tx.last_ledger).await?;
        if outcome.engine_result == engine_result {
            outcome.engine_result_message = engine_result_message;
        }
        Ok(outcome)
    }

    async fn get_trust_lines(&self, account: &str) -> Result<Vec<TrustLine>, LedgerError> {
        let mut lines = Vec::new();
        let mut marker: Option<Value> = None;

        loop {
            let mut params = json!({
                "account": account,
                "ledger_index": "validated",
                "limit": OBJECTS_PAGE_LIMIT,
            });
            if let Some(m) = marker.take() {
                params["marker"] = m;
            }

            let result = self
                .request("account_lines", params)
                .await
                .map_err(|e| not_found_as(e, account))?;

            if let Some(page) = result.get("lines").and_then(Value::as_array) {
                lines.extend(page.iter().filter_map(parse_trust_line));
            }

            match result.get("marker") {
                Some(m) if !m.is_null() => marker = Some(m.clone()),
                _ => break,
            }
        }

        Ok(lines)
    }

    async fn get_obligations(&self, issuer: &str) -> Result<Vec<Obligation>, LedgerError> {
        let result = self
            .request(
                "gateway_balances",
                json!({ "account": issuer, "ledger_index": "validated" }),
            )
            .await
            .map_err(|e| not_found_as(e, issuer))?;

        Ok(parse_obligations(&result))
    }
}

/// Signs through the node with a secret held in memory
pub struct RpcSigner {
    account: String,
    secret: String,
    rpc: Arc<JsonRpcLedgerClient>,
}

impl RpcSigner {
    pub fn new(account: String, secret: String, rpc: Arc<JsonRpcLedgerClient>) -> Self {
        Self {
            account,
            secret,
            rpc,
        }
    }
}

#[async_trait]
impl TransactionSigner for RpcSigner {
    fn account(&self) -> &str {
        &self.account
    }

    async fn sign(&self, tx: &UnsignedTransaction) -> Result<SignedTransaction, SigningError> {
        self.rpc.sign_json(tx, &self.secret).await
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Ledger indexes arrive as numbers or, from some methods, as strings
fn u32_field(value: &Value, key: &str) -> Option<u32> {
    let field = value.get(key)?;
    field
        .as_u64()
        .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
        .and_then(|n| u32::try_from(n).ok())
}

fn parse_trust_line(line: &Value) -> Option<TrustLine> {
    Some(TrustLine {
        currency: str_field(line, "currency")?,
        counterparty: str_field(line, "account")?,
        balance: str_field(line, "balance").and_then(|b| parse_ledger_value(&b))?,
        limit: str_field(line, "limit")
            .and_then(|l| parse_ledger_value(&l))
            .unwrap_or_default(),
    })
}

/// `obligations` maps currency code to the amount outstanding; absent when
/// the account issues nothing
fn parse_obligations(result: &Value) -> Vec<Obligation> {
    let mut obligations: Vec<Obligation> = result
        .get("obligations")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(currency, amount)| {
                    Some(Obligation {
                        currency: currency.clone(),
                        amount: amount.as_str().and_then(parse_ledger_value)?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    obligations.sort_by(|a, b| a.currency.cmp(&b.currency));
    obligations
}

/// Verdict for a transaction whose `LastLedgerSequence` passed without it
/// being included; it can never be applied afterwards
fn expired_outcome(hash: &str, last_ledger: u32) -> SubmitOutcome {
    SubmitOutcome {
        tx_ref: hash.to_string(),
        engine_result: "tefMAX_LEDGER".to_string(),
        engine_result_message: Some(format!(
            "not included by ledger {}, transaction expired",
            last_ledger
        )),
        validated: false,
    }
}

fn not_found_as(error: LedgerError, account: &str) -> LedgerError {
    match error {
        LedgerError::Rpc { code, .. } if code == "actNotFound" => {
            LedgerError::AccountNotFound(account.to_string())
        }
        other => other,
    }
}

fn redacted_reason(error: &LedgerError) -> String {
    match error {
        LedgerError::Rpc { code, .. } => code.clone(),
        LedgerError::Timeout(_) => "timed out".to_string(),
        LedgerError::Transport(_) => "ledger unreachable".to_string(),
        _ => "unexpected response".to_string(),
    }
}

fn is_hex_seed(secret: &str) -> bool {
    secret.len() == 32 && secret.chars().all(|c| c.is_ascii_hexdigit())
}

/// Preliminary results that can never turn into a validated transaction.
/// `terQUEUED` is still pending and is polled like a success.
fn is_final_preliminary(engine_result: &str) -> bool {
    engine_result.starts_with("tem")
        || engine_result.starts_with("tef")
        || engine_result.starts_with("tel")
        || (engine_result.starts_with("ter") && engine_result != "terQUEUED")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_final_preliminary_results() {
        assert!(is_final_preliminary("temBAD_AMOUNT"));
        assert!(is_final_preliminary("tefPAST_SEQ"));
        assert!(is_final_preliminary("telINSUF_FEE_P"));
        assert!(is_final_preliminary("terPRE_SEQ"));
        assert!(!is_final_preliminary("terQUEUED"));
        assert!(!is_final_preliminary("tesSUCCESS"));
        assert!(!is_final_preliminary("tecUNFUNDED_PAYMENT"));
    }

    #[test]
    fn test_expired_outcome_is_final_failure() {
        let outcome = expired_outcome("ABCD", 1020);

        assert!(!outcome.accepted());
        assert!(!outcome.consumes_sequence());
        assert!(is_final_preliminary(&outcome.engine_result));
        assert_eq!(
            outcome.error_detail(),
            "tefMAX_LEDGER: not included by ledger 1020, transaction expired"
        );
    }

    #[test]
    fn test_ledger_index_fields() {
        let result = json!({ "ledger_current_index": 1021, "ledger_index": "1019" });

        assert_eq!(u32_field(&result, "ledger_current_index"), Some(1021));
        assert_eq!(u32_field(&result, "ledger_index"), Some(1019));
        assert_eq!(u32_field(&result, "missing"), None);
    }

    #[test]
    fn test_trust_lines_and_obligations_parsing() {
        let line = json!({
            "account": "rIssuer",
            "currency": "USD",
            "balance": "12.5",
            "limit": "1000",
        });
        let parsed = parse_trust_line(&line).unwrap();
        assert_eq!(parsed.counterparty, "rIssuer");
        assert_eq!(parsed.balance, Decimal::new(125, 1));
        assert_eq!(parsed.limit, Decimal::from(1000));
        assert!(parse_trust_line(&json!({ "account": "rIssuer" })).is_none());

        let result = json!({
            "obligations": {
                "USD": "5000",
                "534F4C4F00000000000000000000000000000000": "1e3",
            }
        });
        let obligations = parse_obligations(&result);
        assert_eq!(obligations.len(), 2);
        assert_eq!(obligations[0].currency, "534F4C4F00000000000000000000000000000000");
        assert_eq!(obligations[0].amount, Decimal::from(1000));
        assert_eq!(obligations[1].amount, Decimal::from(5000));
        assert!(parse_obligations(&json!({})).is_empty());
    }

    #[test]
    fn test_not_found_mapping() {
        let error = LedgerError::Rpc {
            code: "actNotFound".to_string(),
            message: "Account not found.".to_string(),
        };
        assert_eq!(
            not_found_as(error, "rFunding"),
            LedgerError::AccountNotFound("rFunding".to_string())
        );

        let other = LedgerError::Rpc {
            code: "tooBusy".to_string(),
            message: "The server is too busy".to_string(),
        };
        assert!(matches!(not_found_as(other, "rFunding"), LedgerError::Rpc { .. }));
    }

    #[test]
    fn test_reason_never_echoes_node_text() {
        let error = LedgerError::Rpc {
            code: "badSeed".to_string(),
            message: "Disallowed seed snoopy123".to_string(),
        };
        assert_eq!(redacted_reason(&error), "badSeed");
        assert!(is_hex_seed("DEDCE9CE67B451D852FD4E846FCDE31C"));
        assert!(!is_hex_seed("snoPBrXtMeMyMHUVTgbuqAfg1SUTb"));
    }
}

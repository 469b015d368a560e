use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info};

use crate::error::SigningError;

/// References handed to the account holder so they can approve a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrRefs {
    pub qr_png: Option<String>,
    pub qr_matrix: Option<String>,
    pub sign_url: Option<String>,
    pub websocket_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub request_id: String,
    pub refs: QrRefs,
    /// Whether the service pushed a notification to the holder's device
    pub pushed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningStatus {
    pub signed: bool,
    pub cancelled: bool,
    pub expired: bool,
    pub tx_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_blob: Option<String>,
    /// Account that signed, when the service reports it
    pub account: Option<String>,
}

impl SigningStatus {
    pub fn is_resolved(&self) -> bool {
        self.signed || self.cancelled || self.expired
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningMetadata {
    /// Text shown to the account holder in the wallet
    pub instruction: String,
    /// Let the service submit the signed transaction itself
    pub submit: bool,
    #[serde(default)]
    pub blob: Value,
}

/// Remote signing service (QR / push approval by the account holder)
#[async_trait]
pub trait SigningService: Send + Sync {
    async fn create_signing_request(
        &self,
        tx: &Value,
        metadata: SigningMetadata,
    ) -> Result<SigningRequest, SigningError>;

    async fn get_signing_status(&self, request_id: &str) -> Result<SigningStatus, SigningError>;
}

#[derive(Debug, Clone)]
pub struct XamanConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout: Duration,
    /// Minutes before an unanswered request expires on the service
    pub expire_minutes: u32,
}

/// Client for the Xaman platform payload API
pub struct XamanClient {
    config: XamanConfig,
    http: reqwest::Client,
}

impl XamanClient {
    pub fn new(config: XamanConfig) -> Result<Self, SigningError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SigningError::Request(e.without_url().to_string()))?;

        Ok(Self { config, http })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("X-API-Key", &self.config.api_key)
            .header("X-API-Secret", &self.config.api_secret)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, SigningError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Signing service returned {}: {}", status, body);
            return Err(SigningError::Request(format!("signing service returned {}", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SigningError::Request(e.without_url().to_string()))
    }
}

#[async_trait]
impl SigningService for XamanClient {
    async fn create_signing_request(
        &self,
        tx: &Value,
        metadata: SigningMetadata,
    ) -> Result<SigningRequest, SigningError> {
        let body = json!({
            "txjson": tx,
            "options": {
                "submit": metadata.submit,
                "expire": self.config.expire_minutes,
            },
            "custom_meta": {
                "instruction": metadata.instruction,
                "blob": metadata.blob,
            },
        });

        let response = self
            .authorized(self.http.post(format!("{}/payload", self.config.base_url)))
            .json(&body)
            .send()
            .await
            .map_err(|e| SigningError::Request(e.without_url().to_string()))?;

        let payload = Self::read_json(response).await?;
        let request = parse_created(&payload)?;

        info!("📱 Signing request created: {}", request.request_id);
        Ok(request)
    }

    async fn get_signing_status(&self, request_id: &str) -> Result<SigningStatus, SigningError> {
        let response = self
            .authorized(
                self.http
                    .get(format!("{}/payload/{}", self.config.base_url, request_id)),
            )
            .send()
            .await
            .map_err(|e| SigningError::Request(e.without_url().to_string()))?;

        let payload = Self::read_json(response).await?;
        Ok(parse_status(&payload))
    }
}

fn text(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn flag(value: &Value, pointer: &str) -> bool {
    value.pointer(pointer).and_then(Value::as_bool).unwrap_or(false)
}

fn parse_created(payload: &Value) -> Result<SigningRequest, SigningError> {
    let request_id = text(payload, "/uuid")
        .ok_or_else(|| SigningError::Request("signing service returned no uuid".to_string()))?;

    Ok(SigningRequest {
        request_id,
        refs: QrRefs {
            qr_png: text(payload, "/refs/qr_png"),
            qr_matrix: text(payload, "/refs/qr_matrix"),
            sign_url: text(payload, "/next/always"),
            websocket_status: text(payload, "/refs/websocket_status"),
        },
        pushed: flag(payload, "/pushed"),
    })
}

fn parse_status(payload: &Value) -> SigningStatus {
    SigningStatus {
        signed: flag(payload, "/meta/signed"),
        cancelled: flag(payload, "/meta/cancelled"),
        expired: flag(payload, "/meta/expired"),
        tx_ref: text(payload, "/response/txid"),
        signed_blob: text(payload, "/response/hex"),
        account: text(payload, "/response/account"),
    }
}

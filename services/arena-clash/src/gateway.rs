//! ZapUPI payment gateway client
//!
//! Both calls post form-encoded credentials to a fixed endpoint and read the
//! `status` field of the JSON reply.

use arena_store::{Money, MoneyParseError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::instructions::wallet::DepositOutcome;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

/// Payment state as reported by the gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayStatus {
    Success,
    Pending,
    Failed,
}

impl GatewayStatus {
    /// Map the gateway's free-form status words; `None` for anything unknown
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "completed" | "paid" => Some(GatewayStatus::Success),
            "pending" | "created" | "processing" | "initiated" => Some(GatewayStatus::Pending),
            "failed" | "failure" | "cancelled" | "canceled" | "expired" | "rejected" => {
                Some(GatewayStatus::Failed)
            }
            _ => None,
        }
    }
}

/// Read an amount sent either as a JSON string (`"50.00"`) or number (`50`)
pub fn parse_amount(value: &Value) -> Result<Money, MoneyParseError> {
    match value {
        Value::String(s) => Money::parse_decimal(s),
        Value::Number(n) => Money::parse_decimal(&n.to_string()),
        other => Err(MoneyParseError::Invalid(other.to_string())),
    }
}

#[derive(Clone, Debug)]
pub struct CreateOrder {
    pub order_id: String,
    pub amount: Money,
    pub customer_mobile: String,
    pub remark: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_id: String,
    /// Hosted payment page the player is redirected to
    pub payment_url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, order: &CreateOrder) -> Result<GatewayOrder, GatewayError>;

    async fn order_status(&self, order_id: &str) -> Result<DepositOutcome, GatewayError>;
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateOrderReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    payment_url: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderStatusReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<OrderStatusData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderStatusData {
    status: String,
    #[serde(default)]
    amount: Option<Value>,
    #[serde(default)]
    utr: Option<String>,
}

pub(crate) fn interpret_create(
    order_id: &str,
    reply: CreateOrderReply,
) -> Result<GatewayOrder, GatewayError> {
    if GatewayStatus::parse(&reply.status) != Some(GatewayStatus::Success) {
        return Err(GatewayError::Rejected(
            reply.message.unwrap_or_else(|| reply.status.clone()),
        ));
    }
    let payment_url = reply
        .payment_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| GatewayError::Malformed("missing payment_url".to_string()))?;
    Ok(GatewayOrder {
        order_id: reply.order_id.unwrap_or_else(|| order_id.to_string()),
        payment_url,
    })
}

pub(crate) fn interpret_status(reply: OrderStatusReply) -> Result<DepositOutcome, GatewayError> {
    if GatewayStatus::parse(&reply.status) != Some(GatewayStatus::Success) {
        return Err(GatewayError::Rejected(
            reply.message.unwrap_or_else(|| reply.status.clone()),
        ));
    }
    let data = reply
        .data
        .ok_or_else(|| GatewayError::Malformed("missing data".to_string()))?;
    let status = GatewayStatus::parse(&data.status)
        .ok_or_else(|| GatewayError::Malformed(format!("unknown order status `{}`", data.status)))?;
    Ok(match status {
        GatewayStatus::Success => DepositOutcome::Paid {
            amount: data
                .amount
                .as_ref()
                .map(parse_amount)
                .transpose()
                .map_err(|e| GatewayError::Malformed(e.to_string()))?,
            utr: data.utr.filter(|utr| !utr.is_empty()),
        },
        GatewayStatus::Pending => DepositOutcome::Pending,
        GatewayStatus::Failed => DepositOutcome::Failed {
            reason: Some(data.status),
        },
    })
}

/// HTTP client for the hosted ZapUPI API
pub struct ZapUpiClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl ZapUpiClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url, path)
    }
}

#[async_trait]
impl PaymentGateway for ZapUpiClient {
    async fn create_order(&self, order: &CreateOrder) -> Result<GatewayOrder, GatewayError> {
        let amount = order.amount.to_decimal_string();
        let mut form = vec![
            ("token_key", self.config.token_key.as_str()),
            ("secret_key", self.config.secret_key.as_str()),
            ("amount", amount.as_str()),
            ("order_id", order.order_id.as_str()),
            ("customer_mobile", order.customer_mobile.as_str()),
            ("remark", order.remark.as_str()),
        ];
        if let Some(url) = &self.config.redirect_url {
            form.push(("redirect_url", url.as_str()));
        }

        let reply: CreateOrderReply = self
            .http
            .post(self.endpoint("create-order"))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        let result = interpret_create(&order.order_id, reply);
        if let Err(err) = &result {
            tracing::warn!(order_id = %order.order_id, error = %err, "gateway refused order");
        }
        result
    }

    async fn order_status(&self, order_id: &str) -> Result<DepositOutcome, GatewayError> {
        let form = [
            ("token_key", self.config.token_key.as_str()),
            ("secret_key", self.config.secret_key.as_str()),
            ("order_id", order_id),
        ];

        let reply: OrderStatusReply = self
            .http
            .post(self.endpoint("order-status"))
            .form(&form)
            .send()
            .await?
            .json()
            .await?;

        interpret_status(reply)
    }
}

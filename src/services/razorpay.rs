// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Razorpay API client for checkout orders and payment signatures.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Razorpay rejects receipts longer than this.
pub const MAX_RECEIPT_LEN: usize = 40;

/// Order creation request.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Amount in paise
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

/// An order as the gateway reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    /// Amount in paise
    pub amount: u64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "notes_map")]
    pub notes: BTreeMap<String, String>,
}

impl Order {
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Razorpay sends `"notes": []` for an order created without notes.
fn notes_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Notes {
        Map(BTreeMap<String, serde_json::Value>),
        List(Vec<serde_json::Value>),
    }

    Ok(match Notes::deserialize(deserializer)? {
        Notes::Map(map) => map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect(),
        Notes::List(_) => BTreeMap::new(),
    })
}

/// Errors from the Razorpay API.
#[derive(Debug, thiserror::Error)]
pub enum RazorpayError {
    /// The gateway answered with a structured error.
    #[error("Razorpay error {code}: {description}")]
    Gateway {
        status: u16,
        code: String,
        description: String,
    },

    /// The request never got a usable answer.
    #[error("Razorpay request failed: {0}")]
    Transport(String),
}

#[derive(Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RazorpayClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against a custom API root (local fakes in tests).
    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create an order. The gateway's order object is returned untouched.
    pub async fn create_order(
        &self,
        key_id: &str,
        key_secret: &str,
        order: &OrderRequest,
    ) -> Result<serde_json::Value, RazorpayError> {
        let url = format!("{}/v1/orders", self.base_url);

        let response = self
            .http
            .post(&url)
            .basic_auth(key_id, Some(key_secret))
            .json(order)
            .send()
            .await
            .map_err(|e| RazorpayError::Transport(e.to_string()))?;

        Self::parse_response(response).await
    }

    /// Fetch an order by ID, as the gateway recorded it.
    pub async fn fetch_order(
        &self,
        key_id: &str,
        key_secret: &str,
        order_id: &str,
    ) -> Result<Order, RazorpayError> {
        let url = format!(
            "{}/v1/orders/{}",
            self.base_url,
            urlencoding::encode(order_id)
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(key_id, Some(key_secret))
            .send()
            .await
            .map_err(|e| RazorpayError::Transport(e.to_string()))?;

        Self::parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RazorpayError> {
        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| RazorpayError::Transport(format!("invalid order JSON: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GatewayErrorBody>(&body) {
            Ok(parsed) => Err(RazorpayError::Gateway {
                status: status.as_u16(),
                code: parsed.error.code,
                description: parsed.error.description,
            }),
            Err(_) => Err(RazorpayError::Transport(format!("HTTP {}: {}", status, body))),
        }
    }
}

/// Receipt ID for an order: truncated user ID plus a millisecond timestamp.
///
/// Not globally unique, but two orders from the same user in the same
/// millisecond are the only collision.
pub fn receipt_id(uid: &str, now_millis: i64) -> String {
    let prefix: String = uid.chars().filter(char::is_ascii_alphanumeric).take(8).collect();
    let mut receipt = format!("rcpt_{}_{}", prefix, now_millis);
    receipt.truncate(MAX_RECEIPT_LEN);
    receipt
}

/// Expected checkout signature for an order/payment pair.
pub fn payment_signature(order_id: &str, payment_id: &str, key_secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check a checkout signature in constant time.
pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    key_secret: &str,
) -> bool {
    let Some(expected) = payment_signature(order_id, payment_id, key_secret) else {
        return false;
    };
    let provided = signature.trim().to_ascii_lowercase();
    subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), provided.as_bytes()).into()
}

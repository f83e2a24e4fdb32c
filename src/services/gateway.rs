//! Outbound payment-gateway client (create-payment call).

use chrono::Utc;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::Payment;
use crate::error::LedgerError;

#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    api_url: String,
    shop_id: String,
    secret_key: String,
    return_url: String,
}

/// A created gateway payment: our ledger row plus the redirect URL the
/// user must follow to pay.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub payment_id: i64,
    pub confirmation_url: String,
}

impl GatewayClient {
    /// None when gateway credentials are not configured (manual payments
    /// only).
    pub fn from_config(config: &Config) -> Option<Self> {
        let shop_id = config.gateway_shop_id.clone()?;
        let secret_key = config.gateway_secret_key.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            api_url: config.gateway_api_url.clone(),
            shop_id,
            secret_key,
            return_url: config.gateway_return_url.clone(),
        })
    }

    /// Creates the local pending payment, then the gateway payment.
    ///
    /// The idempotency key is random per attempt, so a caller retry makes
    /// a fresh gateway payment; local dedup is the caller's job. A
    /// gateway failure marks the local payment canceled and surfaces the
    /// error, no silent retry.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_payment(
        &self,
        pool: &sqlx::SqlitePool,
        user_id: i64,
        amount: i64,
        target_type: &str,
        target_id: i64,
        chat_id: i64,
        message_id: i64,
        description: &str,
    ) -> Result<CreatedPayment, LedgerError> {
        let payment = Payment::create(
            pool,
            user_id,
            amount,
            "gateway",
            target_type,
            target_id,
            Some(chat_id),
            Some(message_id),
            Utc::now(),
        )
        .await?;

        let payload = json!({
            "amount": { "value": format!("{amount}.00"), "currency": "RUB" },
            "capture": true,
            "confirmation": { "type": "redirect", "return_url": self.return_url },
            "description": description,
            "metadata": { "payment_id": payment.id.to_string() },
            "payment_method_data": { "type": "bank_card" },
        });

        let response = self
            .http
            .post(&self.api_url)
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                Payment::mark_canceled(pool, payment.id).await?;
                error!(payment_id = payment.id, "gateway request failed: {e}");
                return Err(LedgerError::Gateway(e.to_string()));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Payment::mark_canceled(pool, payment.id).await?;
            error!(payment_id = payment.id, %status, "gateway rejected payment: {body}");
            return Err(LedgerError::Gateway(format!("gateway returned {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LedgerError::Gateway(e.to_string()))?;

        let gateway_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LedgerError::Gateway("response missing payment id".into()))?;
        let confirmation_url = body
            .pointer("/confirmation/confirmation_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LedgerError::Gateway("response missing confirmation url".into()))?;

        Payment::set_gateway_id(pool, payment.id, gateway_id).await?;
        info!(payment_id = payment.id, gateway_id, "gateway payment created");

        Ok(CreatedPayment {
            payment_id: payment.id,
            confirmation_url: confirmation_url.to_string(),
        })
    }
}

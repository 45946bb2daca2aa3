use crate::entities::{credit_transaction_entity, debit_transaction_entity, payment_intent_entity};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditTransactionResponse {
    pub id: i32,
    pub amount: i64,
    /// 实付金额（最小货币单位）
    pub real_value: i64,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<credit_transaction_entity::Model> for CreditTransactionResponse {
    fn from(m: credit_transaction_entity::Model) -> Self {
        Self {
            id: m.id,
            amount: m.amount,
            real_value: m.real_value,
            refunded: m.refunded,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DebitTransactionResponse {
    pub id: i32,
    pub amount: i64,
    pub real_value: i64,
    pub created_at: DateTime<Utc>,
}

impl From<debit_transaction_entity::Model> for DebitTransactionResponse {
    fn from(m: debit_transaction_entity::Model) -> Self {
        Self {
            id: m.id,
            amount: m.amount,
            real_value: m.real_value,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub balance: i64,
    pub credits: Vec<CreditTransactionResponse>,
    pub debits: Vec<DebitTransactionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseCreditsRequest {
    #[schema(example = 10)]
    pub credits: i64,
}

impl PurchaseCreditsRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.credits < 1 {
            return Err(AppError::ValidationError(
                "You must buy at least 1 credit".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseIntentResponse {
    pub intent_id: i32,
    pub external_intent_id: String,
    /// 前端确认支付所需
    pub client_secret: Option<String>,
    pub requested_credits: i64,
    pub amount_due: i64,
    pub currency: String,
}

impl PurchaseIntentResponse {
    pub fn build(
        intent: payment_intent_entity::Model,
        client_secret: Option<String>,
        currency: &str,
    ) -> Self {
        Self {
            intent_id: intent.id,
            external_intent_id: intent.external_intent_id,
            client_secret,
            requested_credits: intent.requested_credits,
            amount_due: intent.amount_due,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IntentStatusResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundPreviewResponse {
    pub transaction: Option<CreditTransactionResponse>,
    pub refundable: bool,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundResponse {
    pub success: bool,
    /// 实际退款金额（最小货币单位）
    pub refunded_value: i64,
    pub balance: i64,
}

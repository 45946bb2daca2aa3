//! 支付机构抽象
//!
//! 业务层只依赖 `PaymentAuthority`，生产环境由 `StripeService` 实现，
//! 测试中使用内存实现。

use crate::error::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityCharge {
    pub id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub amount_received: i64,
    pub charges: Vec<AuthorityCharge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityRefund {
    pub id: String,
    pub succeeded: bool,
    /// 实际退款金额
    pub amount: i64,
}

/// 已验签的 webhook 事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentIntentSucceeded { intent_id: String },
    Other { event_type: String },
}

#[async_trait]
pub trait PaymentAuthority: Send + Sync {
    fn currency(&self) -> &str;

    async fn create_intent(&self, amount: i64, user_id: i32) -> AppResult<AuthorityIntent>;

    async fn modify_intent(&self, intent_id: &str, amount: i64) -> AppResult<AuthorityIntent>;

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<AuthorityIntent>;

    async fn refund_charge(&self, charge_id: &str) -> AppResult<AuthorityRefund>;

    /// 校验签名并解析事件，签名或负载无效时返回错误
    fn parse_webhook(&self, payload: &str, signature: &str) -> AppResult<WebhookEvent>;
}

pub type SharedAuthority = Arc<dyn PaymentAuthority>;

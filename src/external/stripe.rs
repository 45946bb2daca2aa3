use crate::config::StripeConfig;
use crate::error::{AppError, AppResult};
use crate::external::payment::{
    AuthorityCharge, AuthorityIntent, AuthorityRefund, PaymentAuthority, WebhookEvent,
};
use async_trait::async_trait;
use std::collections::HashMap;
use stripe::{
    Charge, ChargeId, Client, CreatePaymentIntent, CreateRefund, Currency, EventObject,
    EventType, Expandable, PaymentIntent, PaymentIntentId, Refund, UpdatePaymentIntent, Webhook,
};

#[derive(Clone)]
pub struct StripeService {
    client: Client,
    config: StripeConfig,
    currency: Currency,
}

impl StripeService {
    pub fn new(config: StripeConfig) -> AppResult<Self> {
        let currency = config
            .currency
            .parse::<Currency>()
            .map_err(|_| AppError::ConfigError(format!("Unsupported currency: {}", config.currency)))?;
        Ok(Self {
            client: Client::new(config.secret_key.clone()),
            config,
            currency,
        })
    }

    fn parse_intent_id(intent_id: &str) -> AppResult<PaymentIntentId> {
        intent_id
            .parse::<PaymentIntentId>()
            .map_err(|e| AppError::ExternalApiError(format!("Invalid payment intent id: {e}")))
    }

    /// 将 Stripe PaymentIntent 转换为内部结构；latest_charge 未展开时单独查询
    async fn to_authority_intent(&self, intent: PaymentIntent) -> AppResult<AuthorityIntent> {
        let mut charges = Vec::new();
        match intent.latest_charge {
            Some(Expandable::Object(charge)) => charges.push(AuthorityCharge {
                id: charge.id.to_string(),
                amount: charge.amount,
            }),
            Some(Expandable::Id(charge_id)) => {
                let charge = Charge::retrieve(&self.client, &charge_id, &[])
                    .await
                    .map_err(|e| AppError::ExternalApiError(format!("Failed to retrieve charge: {e}")))?;
                charges.push(AuthorityCharge {
                    id: charge.id.to_string(),
                    amount: charge.amount,
                });
            }
            None => {}
        }

        Ok(AuthorityIntent {
            id: intent.id.to_string(),
            client_secret: intent.client_secret,
            amount: intent.amount,
            amount_received: intent.amount_received,
            charges,
        })
    }
}

#[async_trait]
impl PaymentAuthority for StripeService {
    fn currency(&self) -> &str {
        &self.config.currency
    }

    async fn create_intent(&self, amount: i64, user_id: i32) -> AppResult<AuthorityIntent> {
        let mut params = CreatePaymentIntent::new(amount, self.currency);
        params.metadata = Some(HashMap::from([(
            "user_id".to_string(),
            user_id.to_string(),
        )]));

        let intent = PaymentIntent::create(&self.client, params)
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create payment intent: {e}")))?;

        log::info!("Created payment intent {} for user {}", intent.id, user_id);
        self.to_authority_intent(intent).await
    }

    async fn modify_intent(&self, intent_id: &str, amount: i64) -> AppResult<AuthorityIntent> {
        let id = Self::parse_intent_id(intent_id)?;
        let mut params = UpdatePaymentIntent::new();
        params.amount = Some(amount);

        let intent = PaymentIntent::update(&self.client, &id, params)
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to update payment intent: {e}")))?;
        self.to_authority_intent(intent).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<AuthorityIntent> {
        let id = Self::parse_intent_id(intent_id)?;
        let intent = PaymentIntent::retrieve(&self.client, &id, &["latest_charge"])
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to retrieve payment intent: {e}")))?;
        self.to_authority_intent(intent).await
    }

    async fn refund_charge(&self, charge_id: &str) -> AppResult<AuthorityRefund> {
        let charge = charge_id
            .parse::<ChargeId>()
            .map_err(|e| AppError::ExternalApiError(format!("Invalid charge id: {e}")))?;
        let mut params = CreateRefund::new();
        params.charge = Some(charge);

        let refund = Refund::create(&self.client, params)
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to create refund: {e}")))?;

        // status 在不同 API 版本中为字符串或枚举，统一按序列化结果比较
        let succeeded = serde_json::to_value(&refund.status)?
            .as_str()
            .map(|s| s == "succeeded")
            .unwrap_or(false);

        Ok(AuthorityRefund {
            id: refund.id.to_string(),
            succeeded,
            amount: refund.amount,
        })
    }

    fn parse_webhook(&self, payload: &str, signature: &str) -> AppResult<WebhookEvent> {
        let event = Webhook::construct_event(payload, signature, &self.config.webhook_secret)
            .map_err(|e| AppError::ValidationError(format!("Invalid webhook: {e}")))?;

        log::info!("Received Stripe webhook event: {} ({})", event.type_, event.id);

        match (event.type_, event.data.object) {
            (EventType::PaymentIntentSucceeded, EventObject::PaymentIntent(intent)) => {
                Ok(WebhookEvent::PaymentIntentSucceeded {
                    intent_id: intent.id.to_string(),
                })
            }
            (event_type, _) => Ok(WebhookEvent::Other {
                event_type: event_type.to_string(),
            }),
        }
    }
}

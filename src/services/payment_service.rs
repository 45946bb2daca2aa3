//! 积分购买：在本地购买意图与外部支付机构之间建立对应关系，并在确认到账后幂等入账

use crate::database::is_unique_violation;
use crate::entities::payment_intent_entity as intents;
use crate::error::{AppError, AppResult};
use crate::external::{SharedAuthority, WebhookEvent};
use crate::models::PurchaseIntentResponse;
use crate::services::wallet_service;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};

#[derive(Clone)]
pub struct PaymentService {
    pool: DatabaseConnection,
    authority: SharedAuthority,
    credit_price: i64,
}

impl PaymentService {
    pub fn new(pool: DatabaseConnection, authority: SharedAuthority, credit_price: i64) -> Self {
        Self {
            pool,
            authority,
            credit_price,
        }
    }

    /// 购买指定积分需支付的金额（最小货币单位）
    pub fn amount_for_credits(&self, credits: i64) -> AppResult<i64> {
        if credits < 1 {
            return Err(AppError::ValidationError(
                "You must buy at least 1 credit".to_string(),
            ));
        }
        credits
            .checked_mul(self.credit_price)
            .ok_or_else(|| AppError::ValidationError("Too many credits requested".to_string()))
    }

    /// 创建或复用用户唯一的未完成购买意图
    pub async fn create_or_reuse_intent(
        &self,
        user_id: i32,
        credits: i64,
    ) -> AppResult<PurchaseIntentResponse> {
        let amount_due = self.amount_for_credits(credits)?;

        if let Some(reused) = self.reuse_pending(user_id, credits, amount_due).await? {
            return Ok(reused);
        }

        let external = self.authority.create_intent(amount_due, user_id).await?;
        let now = Utc::now();
        let inserted = intents::ActiveModel {
            user_id: Set(user_id),
            external_intent_id: Set(external.id.clone()),
            requested_credits: Set(credits),
            amount_due: Set(amount_due),
            complete: Set(false),
            open_user_id: Set(Some(user_id)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(intent) => {
                log::info!(
                    "Created purchase intent {} ({}) for user {}: {} credits, amount {}",
                    intent.id,
                    intent.external_intent_id,
                    user_id,
                    credits,
                    amount_due
                );
                Ok(PurchaseIntentResponse::build(
                    intent,
                    external.client_secret,
                    self.authority.currency(),
                ))
            }
            Err(e) if is_unique_violation(&e) => {
                // 并发请求已创建了未完成意图，复用之；本次创建的外部意图不会被使用
                log::warn!(
                    "Concurrent purchase for user {}: external intent {} is orphaned",
                    user_id,
                    external.id
                );
                self.reuse_pending(user_id, credits, amount_due)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError("Pending purchase intent disappeared".to_string())
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reuse_pending(
        &self,
        user_id: i32,
        credits: i64,
        amount_due: i64,
    ) -> AppResult<Option<PurchaseIntentResponse>> {
        // 锁住未完成意图直到提交，保证外部金额与本地记录按同一顺序修改
        let txn = self.pool.begin().await?;
        let Some(pending) = intents::Entity::find()
            .filter(intents::Column::UserId.eq(user_id))
            .filter(intents::Column::Complete.eq(false))
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            txn.commit().await?;
            return Ok(None);
        };

        // 外部失败时直接返回错误，事务回滚，本地记录保持不变
        let external = self
            .authority
            .modify_intent(&pending.external_intent_id, amount_due)
            .await?;

        let mut active = pending.into_active_model();
        active.requested_credits = Set(credits);
        active.amount_due = Set(amount_due);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        log::info!(
            "Reused purchase intent {} for user {}: {} credits, amount {}",
            updated.id,
            user_id,
            credits,
            amount_due
        );
        Ok(Some(PurchaseIntentResponse::build(
            updated,
            external.client_secret,
            self.authority.currency(),
        )))
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<intents::Model>> {
        Ok(intents::Entity::find()
            .filter(intents::Column::ExternalIntentId.eq(external_id))
            .one(&self.pool)
            .await?)
    }

    /// 确认到账并入账，幂等。
    ///
    /// 已完成直接返回 true；外部查询失败或金额不一致返回 false 且不做任何修改。
    pub async fn fulfill(&self, intent: &intents::Model) -> AppResult<bool> {
        // 以数据库最新状态为准（购买意图可能在调用方读取后被复用修改）
        let Some(intent) = intents::Entity::find_by_id(intent.id).one(&self.pool).await? else {
            return Err(AppError::NotFound("Payment intent not found".to_string()));
        };
        if intent.complete {
            return Ok(true);
        }

        let external = match self
            .authority
            .retrieve_intent(&intent.external_intent_id)
            .await
        {
            Ok(external) => external,
            Err(e) => {
                log::error!(
                    "Failed to retrieve payment intent {}: {}",
                    intent.external_intent_id,
                    e
                );
                return Ok(false);
            }
        };

        let Some(charge) = external.charges.first() else {
            log::info!("Payment intent {} has no charge yet", intent.external_intent_id);
            return Ok(false);
        };
        if external.amount_received != intent.amount_due || charge.amount != intent.amount_due {
            log::error!(
                "Payment intent {} amount mismatch: due {}, received {}, charged {}, needs manual reconciliation",
                intent.external_intent_id,
                intent.amount_due,
                external.amount_received,
                charge.amount
            );
            return Ok(false);
        }

        let txn = self.pool.begin().await?;
        let completed = intents::Entity::update_many()
            .col_expr(intents::Column::Complete, Expr::value(true))
            .col_expr(intents::Column::OpenUserId, Expr::value(Option::<i32>::None))
            .col_expr(intents::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(intents::Column::Id.eq(intent.id))
            .filter(intents::Column::Complete.eq(false))
            .filter(intents::Column::AmountDue.eq(intent.amount_due))
            .exec(&txn)
            .await?;

        if completed.rows_affected == 0 {
            // 并发的另一次确认已完成入账，或金额刚被修改
            txn.commit().await?;
            let current = intents::Entity::find_by_id(intent.id).one(&self.pool).await?;
            return Ok(current.map(|i| i.complete).unwrap_or(false));
        }

        let wallet = wallet_service::ensure_wallet(&txn, intent.user_id).await?;
        let balance = wallet_service::credit(
            &txn,
            wallet.id,
            intent.requested_credits,
            intent.amount_due,
            Some(charge.id.clone()),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Fulfilled payment intent {}: user {} +{} credits, balance {}",
            intent.external_intent_id,
            intent.user_id,
            intent.requested_credits,
            balance
        );
        Ok(true)
    }

    /// 用户轮询自己的购买意图，顺带尝试确认
    pub async fn poll(&self, user_id: i32, intent_id: i32) -> AppResult<bool> {
        let intent = intents::Entity::find_by_id(intent_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment intent not found".to_string()))?;
        if intent.user_id != user_id {
            return Err(AppError::PermissionDenied);
        }
        self.fulfill(&intent).await
    }

    pub fn parse_webhook(&self, payload: &str, signature: &str) -> AppResult<WebhookEvent> {
        self.authority.parse_webhook(payload, signature)
    }

    /// 处理已验签的 webhook 事件
    pub async fn handle_webhook_event(&self, event: WebhookEvent) -> AppResult<()> {
        match event {
            WebhookEvent::PaymentIntentSucceeded { intent_id } => {
                match self.find_by_external_id(&intent_id).await? {
                    Some(intent) => {
                        if !self.fulfill(&intent).await? {
                            log::warn!("Payment intent {intent_id} succeeded but was not fulfilled");
                        }
                    }
                    None => {
                        log::error!(
                            "Payment intent {intent_id} succeeded but has no local record, needs manual reconciliation"
                        );
                    }
                }
                Ok(())
            }
            WebhookEvent::Other { event_type } => {
                log::info!("Unhandled webhook event type: {event_type}");
                Ok(())
            }
        }
    }
}

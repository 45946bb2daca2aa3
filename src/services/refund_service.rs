//! 退款：撤销钱包最近一笔未退款的购买

use crate::entities::credit_transaction_entity as credits;
use crate::error::{AppError, AppResult};
use crate::external::SharedAuthority;
use crate::models::{RefundPreviewResponse, RefundResponse};
use crate::services::wallet_service;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};

/// 可退款期限（天）
pub const REFUND_WINDOW_DAYS: i64 = 90;

/// 判断一笔入账是否可退款：未退款、有对应的支付记录、在期限内、余额足以扣回
pub fn can_refund(transaction: &credits::Model, balance: i64, now: DateTime<Utc>) -> bool {
    !transaction.refunded
        && transaction.external_charge_id.is_some()
        && balance >= transaction.amount
        && transaction.created_at >= now - Duration::days(REFUND_WINDOW_DAYS)
}

#[derive(Clone)]
pub struct RefundService {
    pool: DatabaseConnection,
    authority: SharedAuthority,
}

impl RefundService {
    pub fn new(pool: DatabaseConnection, authority: SharedAuthority) -> Self {
        Self { pool, authority }
    }

    /// 期限内最近一笔未退款的付费入账
    pub async fn find_refundable_transaction(
        &self,
        wallet_id: i32,
    ) -> AppResult<Option<credits::Model>> {
        let cutoff = Utc::now() - Duration::days(REFUND_WINDOW_DAYS);
        Ok(credits::Entity::find()
            .filter(credits::Column::WalletId.eq(wallet_id))
            .filter(credits::Column::Refunded.eq(false))
            .filter(credits::Column::RealValue.gte(1))
            .filter(credits::Column::CreatedAt.gte(cutoff))
            .order_by_desc(credits::Column::CreatedAt)
            .order_by_desc(credits::Column::Id)
            .one(&self.pool)
            .await?)
    }

    pub async fn preview(&self, user_id: i32) -> AppResult<RefundPreviewResponse> {
        let Some(wallet) = wallet_service::find_wallet(&self.pool, user_id).await? else {
            return Ok(RefundPreviewResponse {
                transaction: None,
                refundable: false,
                balance: 0,
            });
        };
        let transaction = self.find_refundable_transaction(wallet.id).await?;
        let refundable = transaction
            .as_ref()
            .map(|t| can_refund(t, wallet.balance, Utc::now()))
            .unwrap_or(false);
        Ok(RefundPreviewResponse {
            transaction: transaction.map(Into::into),
            refundable,
            balance: wallet.balance,
        })
    }

    /// 退还用户最近一笔购买
    pub async fn refund_latest(&self, user_id: i32) -> AppResult<RefundResponse> {
        let wallet = wallet_service::find_wallet(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::ValidationError("You have no purchases to refund".to_string()))?;
        let transaction = self
            .find_refundable_transaction(wallet.id)
            .await?
            .ok_or_else(|| AppError::ValidationError("You have no purchases to refund".to_string()))?;
        if !can_refund(&transaction, wallet.balance, Utc::now()) {
            return Err(AppError::ValidationError(
                "This purchase can no longer be refunded".to_string(),
            ));
        }

        let (success, refunded_value) = self.refund(&transaction).await?;
        let balance = wallet_service::find_wallet(&self.pool, user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or(0);
        Ok(RefundResponse {
            success,
            refunded_value,
            balance,
        })
    }

    /// 执行退款，返回 (是否成功, 实际退款金额)。
    ///
    /// 本地扣回与外部退款在同一事务内：外部失败则回滚，本地不留任何修改。
    pub async fn refund(&self, transaction: &credits::Model) -> AppResult<(bool, i64)> {
        let Some(charge_id) = transaction.external_charge_id.clone() else {
            return Ok((false, 0));
        };

        let txn = self.pool.begin().await?;

        // 先占用该笔入账，防止并发重复退款
        let claimed = credits::Entity::update_many()
            .col_expr(credits::Column::Refunded, Expr::value(true))
            .filter(credits::Column::Id.eq(transaction.id))
            .filter(credits::Column::Refunded.eq(false))
            .exec(&txn)
            .await?;
        if claimed.rows_affected == 0 {
            txn.rollback().await?;
            return Ok((false, 0));
        }

        if !wallet_service::withdraw_balance(&txn, transaction.wallet_id, transaction.amount).await? {
            log::info!(
                "Refund of credit {} rejected: insufficient balance",
                transaction.id
            );
            txn.rollback().await?;
            return Ok((false, 0));
        }

        let refund = match self.authority.refund_charge(&charge_id).await {
            Ok(refund) if refund.succeeded => refund,
            Ok(refund) => {
                log::warn!("Refund {} for charge {} did not succeed", refund.id, charge_id);
                txn.rollback().await?;
                return Ok((false, 0));
            }
            Err(e) => {
                log::error!("Refund request for charge {charge_id} failed: {e}");
                txn.rollback().await?;
                return Ok((false, 0));
            }
        };

        let persisted: Result<(), DbErr> = async {
            wallet_service::record_debit(
                &txn,
                transaction.wallet_id,
                transaction.amount,
                refund.amount,
            )
            .await?;
            txn.commit().await
        }
        .await;

        if let Err(e) = persisted {
            log::error!(
                "Refund {} for charge {} succeeded but could not be recorded (credit {}, wallet {}): {}; needs manual reconciliation",
                refund.id,
                charge_id,
                transaction.id,
                transaction.wallet_id,
                e
            );
            return Err(e.into());
        }

        log::info!(
            "Refunded credit {} ({} credits, {} refunded) for wallet {}",
            transaction.id,
            transaction.amount,
            refund.amount,
            transaction.wallet_id
        );
        Ok((true, refund.amount))
    }
}

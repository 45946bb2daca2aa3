//! 积分账本
//!
//! 所有余额变动都通过这里的函数完成，并同时写入不可变流水。
//! 函数对 `ConnectionTrait` 泛型，调用方传入事务即可与其它写操作组合为原子操作。

use crate::entities::{
    credit_transaction_entity as credits, debit_transaction_entity as debits,
    wallet_entity as wallets,
};
use crate::error::AppResult;
use crate::models::WalletResponse;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

const RECENT_TRANSACTIONS: u64 = 20;

pub async fn find_wallet<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> Result<Option<wallets::Model>, DbErr> {
    wallets::Entity::find()
        .filter(wallets::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// 获取用户钱包，不存在则创建
///
/// 用 `ON CONFLICT DO NOTHING` 插入，并发的首次创建不会触发唯一约束错误，
/// 也不会中止调用方的事务。
pub async fn ensure_wallet<C: ConnectionTrait>(db: &C, user_id: i32) -> Result<wallets::Model, DbErr> {
    let wallet = wallets::ActiveModel {
        user_id: Set(user_id),
        balance: Set(0),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    wallets::Entity::insert(wallet)
        .on_conflict(
            OnConflict::column(wallets::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    find_wallet(db, user_id)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("wallet for user {user_id}")))
}

/// 入账：增加余额并写入流水，返回新余额
pub async fn credit<C: ConnectionTrait>(
    db: &C,
    wallet_id: i32,
    amount: i64,
    real_value: i64,
    external_charge_id: Option<String>,
) -> Result<i64, DbErr> {
    wallets::Entity::update_many()
        .col_expr(
            wallets::Column::Balance,
            Expr::col(wallets::Column::Balance).add(amount),
        )
        .filter(wallets::Column::Id.eq(wallet_id))
        .exec(db)
        .await?;

    credits::ActiveModel {
        wallet_id: Set(wallet_id),
        amount: Set(amount),
        real_value: Set(real_value),
        external_charge_id: Set(external_charge_id),
        refunded: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let wallet = wallets::Entity::find_by_id(wallet_id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("wallet {wallet_id}")))?;
    Ok(wallet.balance)
}

/// 条件扣减余额（balance >= amount），不写流水。余额不足或金额为负时返回 false
pub async fn withdraw_balance<C: ConnectionTrait>(
    db: &C,
    wallet_id: i32,
    amount: i64,
) -> Result<bool, DbErr> {
    if amount < 0 {
        return Ok(false);
    }
    let result = wallets::Entity::update_many()
        .col_expr(
            wallets::Column::Balance,
            Expr::col(wallets::Column::Balance).sub(amount),
        )
        .filter(wallets::Column::Id.eq(wallet_id))
        .filter(wallets::Column::Balance.gte(amount))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn record_debit<C: ConnectionTrait>(
    db: &C,
    wallet_id: i32,
    amount: i64,
    real_value: i64,
) -> Result<debits::Model, DbErr> {
    debits::ActiveModel {
        wallet_id: Set(wallet_id),
        amount: Set(amount),
        real_value: Set(real_value),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// 扣减：余额充足时扣减并写入流水；否则不做任何修改并返回 None
pub async fn debit<C: ConnectionTrait>(
    db: &C,
    wallet_id: i32,
    amount: i64,
    real_value: i64,
) -> Result<Option<debits::Model>, DbErr> {
    if !withdraw_balance(db, wallet_id, amount).await? {
        return Ok(None);
    }
    let debit = record_debit(db, wallet_id, amount, real_value).await?;
    Ok(Some(debit))
}

/// 按用户扣减，用户没有钱包时视为余额不足
pub async fn debit_user<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    amount: i64,
    real_value: i64,
) -> Result<Option<debits::Model>, DbErr> {
    match find_wallet(db, user_id).await? {
        Some(wallet) => debit(db, wallet.id, amount, real_value).await,
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct WalletService {
    pool: DatabaseConnection,
}

impl WalletService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn get_balance(&self, user_id: i32) -> AppResult<i64> {
        Ok(find_wallet(&self.pool, user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or(0))
    }

    /// 钱包概览：余额与最近的流水
    pub async fn get_wallet(&self, user_id: i32) -> AppResult<WalletResponse> {
        let Some(wallet) = find_wallet(&self.pool, user_id).await? else {
            return Ok(WalletResponse {
                balance: 0,
                credits: vec![],
                debits: vec![],
            });
        };

        let credit_list = credits::Entity::find()
            .filter(credits::Column::WalletId.eq(wallet.id))
            .order_by_desc(credits::Column::CreatedAt)
            .order_by_desc(credits::Column::Id)
            .limit(RECENT_TRANSACTIONS)
            .all(&self.pool)
            .await?;
        let debit_list = debits::Entity::find()
            .filter(debits::Column::WalletId.eq(wallet.id))
            .order_by_desc(debits::Column::CreatedAt)
            .order_by_desc(debits::Column::Id)
            .limit(RECENT_TRANSACTIONS)
            .all(&self.pool)
            .await?;

        Ok(WalletResponse {
            balance: wallet.balance,
            credits: credit_list.into_iter().map(Into::into).collect(),
            debits: debit_list.into_iter().map(Into::into).collect(),
        })
    }
}

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 入账流水，除 refunded 标记（只能 false -> true）外不可变
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "credit_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub wallet_id: i32,
    pub amount: i64,
    /// 实付金额（最小货币单位）
    pub real_value: i64,
    pub external_charge_id: Option<String>,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! 测试辅助：内存 SQLite 数据库与内存支付机构

use crate::entities::{TicketType, ticket_entity as tickets};
use crate::error::{AppError, AppResult};
use crate::external::{
    AuthorityCharge, AuthorityIntent, AuthorityRefund, PaymentAuthority, WebhookEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 创建已执行全部迁移的内存 SQLite 数据库
pub async fn setup_test_db() -> AppResult<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// 直接插入一条工单，stage 时间戳按需给出
pub async fn insert_ticket(
    db: &DatabaseConnection,
    user_id: i32,
    ticket_type: TicketType,
    title: &str,
    created_at: DateTime<Utc>,
) -> AppResult<tickets::Model> {
    let ticket = tickets::ActiveModel {
        user_id: Set(user_id),
        ticket_type: Set(ticket_type),
        title: Set(title.to_string()),
        content: Set(format!("{title} content")),
        image_url: Set(None),
        created_at: Set(created_at),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(ticket)
}

/// 插入一条已审核的工单
pub async fn insert_approved_ticket(
    db: &DatabaseConnection,
    user_id: i32,
    ticket_type: TicketType,
    title: &str,
) -> AppResult<tickets::Model> {
    let now = Utc::now();
    let ticket = insert_ticket(db, user_id, ticket_type, title, now).await?;
    let mut active: tickets::ActiveModel = ticket.into();
    active.approved_at = Set(Some(now));
    Ok(active.update(db).await?)
}

struct FakeState {
    next_id: u32,
    intents: HashMap<String, AuthorityIntent>,
    failing: bool,
    refund_succeeds: bool,
    refunded_charges: Vec<String>,
    created: usize,
}

/// 内存支付机构，用于驱动购买、退款与 webhook 流程
pub struct FakeAuthority {
    state: Mutex<FakeState>,
}

impl FakeAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                next_id: 0,
                intents: HashMap::new(),
                failing: false,
                refund_succeeds: true,
                refunded_charges: Vec::new(),
                created: 0,
            }),
        })
    }

    /// 模拟用户完成支付：全额到账并生成一笔 charge
    pub fn pay(&self, intent_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let charge_id = format!("ch_{}", state.next_id);
        if let Some(intent) = state.intents.get_mut(intent_id) {
            intent.amount_received = intent.amount;
            intent.charges = vec![AuthorityCharge {
                id: charge_id,
                amount: intent.amount,
            }];
        }
    }

    /// 模拟部分到账
    pub fn pay_partial(&self, intent_id: &str, received: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(intent) = state.intents.get_mut(intent_id) {
            intent.amount_received = received;
            intent.charges = vec![AuthorityCharge {
                id: "ch_partial".to_string(),
                amount: received,
            }];
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn set_refund_succeeds(&self, succeeds: bool) {
        self.state.lock().unwrap().refund_succeeds = succeeds;
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn intent(&self, intent_id: &str) -> Option<AuthorityIntent> {
        self.state.lock().unwrap().intents.get(intent_id).cloned()
    }

    pub fn refunded_charges(&self) -> Vec<String> {
        self.state.lock().unwrap().refunded_charges.clone()
    }

    fn check_available(&self) -> AppResult<()> {
        if self.state.lock().unwrap().failing {
            return Err(AppError::ExternalApiError("authority unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentAuthority for FakeAuthority {
    fn currency(&self) -> &str {
        "gbp"
    }

    async fn create_intent(&self, amount: i64, _user_id: i32) -> AppResult<AuthorityIntent> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.created += 1;
        let id = format!("pi_{}", state.next_id);
        let intent = AuthorityIntent {
            id: id.clone(),
            client_secret: Some(format!("{id}_secret")),
            amount,
            amount_received: 0,
            charges: vec![],
        };
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn modify_intent(&self, intent_id: &str, amount: i64) -> AppResult<AuthorityIntent> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let intent = state
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| AppError::ExternalApiError(format!("no such intent {intent_id}")))?;
        intent.amount = amount;
        Ok(intent.clone())
    }

    async fn retrieve_intent(&self, intent_id: &str) -> AppResult<AuthorityIntent> {
        self.check_available()?;
        self.intent(intent_id)
            .ok_or_else(|| AppError::ExternalApiError(format!("no such intent {intent_id}")))
    }

    async fn refund_charge(&self, charge_id: &str) -> AppResult<AuthorityRefund> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let amount = state
            .intents
            .values()
            .flat_map(|i| i.charges.iter())
            .find(|c| c.id == charge_id)
            .map(|c| c.amount)
            .unwrap_or(0);
        if !state.refund_succeeds {
            return Ok(AuthorityRefund {
                id: format!("re_{charge_id}"),
                succeeded: false,
                amount: 0,
            });
        }
        state.refunded_charges.push(charge_id.to_string());
        Ok(AuthorityRefund {
            id: format!("re_{charge_id}"),
            succeeded: true,
            amount,
        })
    }

    /// 签名固定为 "valid"；负载形如 {"type": "...", "intent_id": "..."}
    fn parse_webhook(&self, payload: &str, signature: &str) -> AppResult<WebhookEvent> {
        if signature != "valid" {
            return Err(AppError::ValidationError("bad signature".to_string()));
        }
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| AppError::ValidationError(format!("bad payload: {e}")))?;
        let event_type = value["type"].as_str().unwrap_or_default().to_string();
        match (event_type.as_str(), value["intent_id"].as_str()) {
            ("payment_intent.succeeded", Some(intent_id)) => {
                Ok(WebhookEvent::PaymentIntentSucceeded {
                    intent_id: intent_id.to_string(),
                })
            }
            _ => Ok(WebhookEvent::Other { event_type }),
        }
    }
}

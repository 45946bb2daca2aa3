use crate::database::is_unique_violation;
use crate::entities::{label_entity as labels, ticket_label_entity as ticket_labels};
use crate::error::{AppError, AppResult};
use crate::models::{LabelRequest, LabelResponse};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

/// 批量查询工单标签，按标签名排序
pub async fn labels_for_tickets<C: ConnectionTrait>(
    db: &C,
    ticket_ids: &[i32],
) -> Result<HashMap<i32, Vec<LabelResponse>>, DbErr> {
    let mut result: HashMap<i32, Vec<LabelResponse>> = HashMap::new();
    if ticket_ids.is_empty() {
        return Ok(result);
    }

    let links = ticket_labels::Entity::find()
        .filter(ticket_labels::Column::TicketId.is_in(ticket_ids.iter().copied()))
        .all(db)
        .await?;
    if links.is_empty() {
        return Ok(result);
    }

    let label_ids: HashSet<i32> = links.iter().map(|l| l.label_id).collect();
    let by_id: HashMap<i32, labels::Model> = labels::Entity::find()
        .filter(labels::Column::Id.is_in(label_ids))
        .order_by_asc(labels::Column::Name)
        .all(db)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect();

    for link in links {
        if let Some(label) = by_id.get(&link.label_id) {
            result
                .entry(link.ticket_id)
                .or_default()
                .push(label.clone().into());
        }
    }
    for list in result.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(result)
}

/// 替换工单的标签集合；存在未知标签时返回 ValidationError 且不做修改
pub async fn set_ticket_labels<C: ConnectionTrait>(
    db: &C,
    ticket_id: i32,
    label_ids: &[i32],
) -> AppResult<()> {
    let wanted: HashSet<i32> = label_ids.iter().copied().collect();
    if !wanted.is_empty() {
        let found = labels::Entity::find()
            .filter(labels::Column::Id.is_in(wanted.iter().copied()))
            .all(db)
            .await?;
        if found.len() != wanted.len() {
            return Err(AppError::ValidationError("Unknown label".to_string()));
        }
    }

    ticket_labels::Entity::delete_many()
        .filter(ticket_labels::Column::TicketId.eq(ticket_id))
        .exec(db)
        .await?;

    for label_id in wanted {
        ticket_labels::ActiveModel {
            ticket_id: Set(ticket_id),
            label_id: Set(label_id),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct LabelService {
    pool: DatabaseConnection,
}

impl LabelService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<LabelResponse>> {
        let list = labels::Entity::find()
            .order_by_asc(labels::Column::Name)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    pub async fn create(&self, req: LabelRequest) -> AppResult<LabelResponse> {
        req.validate()?;
        let inserted = labels::ActiveModel {
            name: Set(req.name.trim().to_string()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;
        match inserted {
            Ok(label) => Ok(label.into()),
            Err(e) if is_unique_violation(&e) => Err(duplicate_name()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn rename(&self, id: i32, req: LabelRequest) -> AppResult<LabelResponse> {
        req.validate()?;
        let label = labels::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Label not found".to_string()))?;

        let mut active: labels::ActiveModel = label.into();
        active.name = Set(req.name.trim().to_string());
        match active.update(&self.pool).await {
            Ok(label) => Ok(label.into()),
            Err(e) if is_unique_violation(&e) => Err(duplicate_name()),
            Err(e) => Err(e.into()),
        }
    }

    /// 删除标签及其与工单的关联
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        ticket_labels::Entity::delete_many()
            .filter(ticket_labels::Column::LabelId.eq(id))
            .exec(&txn)
            .await?;
        let result = labels::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::NotFound("Label not found".to_string()));
        }
        txn.commit().await?;
        log::info!("Deleted label {id}");
        Ok(())
    }
}

fn duplicate_name() -> AppError {
    AppError::ValidationError("A label with this name already exists".to_string())
}

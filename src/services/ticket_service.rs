//! 工单：创建、编辑、删除、详情、列表与生命周期推进

use crate::database::is_unique_violation;
use crate::entities::{
    comment_entity as comments, pageview_entity as pageviews, ticket_entity as tickets,
    ticket_label_entity as ticket_labels, vote_entity as votes,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateTicketRequest, PaginatedResponse, PaginationParams, Stage, StageTimeline,
    TicketDetailResponse, TicketOrder, TicketQuery, TicketResponse, TicketStatus, TicketTotals,
    UpdateTicketRequest,
};
use crate::services::{comment_service, label_service, vote_service};
use crate::utils::{Permission, Principal};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    TransactionTrait,
};
use std::collections::HashMap;

/// 已审核的工单对所有人可见；未审核的仅作者与可修改状态的人可见
pub fn is_visible(ticket: &tickets::Model, principal: Option<&Principal>) -> bool {
    if ticket.approved_at.is_some() {
        return true;
    }
    principal
        .map(|p| p.user_id == ticket.user_id || p.has(Permission::UpdateStatus))
        .unwrap_or(false)
}

fn stage_column(stage: Stage) -> tickets::Column {
    match stage {
        Stage::Approved => tickets::Column::ApprovedAt,
        Stage::Doing => tickets::Column::DoingAt,
        Stage::Done => tickets::Column::DoneAt,
    }
}

/// 写入目标阶段，并用 COALESCE 回填尚未设置的前序阶段
///
/// 以目标列为空作为条件，已写入的时间戳不会被覆盖。返回是否有行被更新。
pub async fn write_stage<C: ConnectionTrait>(
    db: &C,
    ticket_id: i32,
    target: Stage,
    now: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let mut update = tickets::Entity::update_many()
        .col_expr(stage_column(target), Expr::value(now))
        .filter(tickets::Column::Id.eq(ticket_id))
        .filter(stage_column(target).is_null());
    for stage in target.predecessors() {
        let column = stage_column(*stage);
        update = update.col_expr(
            column,
            Func::coalesce([Expr::col(column).into(), Expr::value(now)]).into(),
        );
    }
    let result = update.exec(db).await?;
    Ok(result.rows_affected > 0)
}

/// 批量统计票数、浏览数与评论数
pub async fn totals_for<C: ConnectionTrait>(
    db: &C,
    ticket_ids: &[i32],
) -> Result<HashMap<i32, TicketTotals>, DbErr> {
    let mut totals: HashMap<i32, TicketTotals> = HashMap::new();
    if ticket_ids.is_empty() {
        return Ok(totals);
    }

    let vote_rows: Vec<(i32, Option<i64>)> = votes::Entity::find()
        .select_only()
        .column(votes::Column::TicketId)
        .column_as(Expr::col(votes::Column::Count).sum(), "total")
        .filter(votes::Column::TicketId.is_in(ticket_ids.iter().copied()))
        .group_by(votes::Column::TicketId)
        .into_tuple()
        .all(db)
        .await?;
    for (id, total) in vote_rows {
        totals.entry(id).or_default().votes = total.unwrap_or(0);
    }

    let view_rows: Vec<(i32, i64)> = pageviews::Entity::find()
        .select_only()
        .column(pageviews::Column::TicketId)
        .column_as(Expr::col(pageviews::Column::Id).count(), "total")
        .filter(pageviews::Column::TicketId.is_in(ticket_ids.iter().copied()))
        .group_by(pageviews::Column::TicketId)
        .into_tuple()
        .all(db)
        .await?;
    for (id, total) in view_rows {
        totals.entry(id).or_default().views = total;
    }

    let comment_rows: Vec<(i32, i64)> = comments::Entity::find()
        .select_only()
        .column(comments::Column::TicketId)
        .column_as(Expr::col(comments::Column::Id).count(), "total")
        .filter(comments::Column::TicketId.is_in(ticket_ids.iter().copied()))
        .group_by(comments::Column::TicketId)
        .into_tuple()
        .all(db)
        .await?;
    for (id, total) in comment_rows {
        totals.entry(id).or_default().comments = total;
    }

    Ok(totals)
}

/// 排序用的子查询
pub(crate) fn order_expr(order: TicketOrder) -> Option<&'static str> {
    match order {
        TicketOrder::Votes => Some(
            r#"(SELECT COALESCE(SUM("votes"."count"), 0) FROM "votes" WHERE "votes"."ticket_id" = "tickets"."id")"#,
        ),
        TicketOrder::Views => Some(
            r#"(SELECT COUNT(*) FROM "pageviews" WHERE "pageviews"."ticket_id" = "tickets"."id")"#,
        ),
        TicketOrder::Comments => Some(
            r#"(SELECT COUNT(*) FROM "comments" WHERE "comments"."ticket_id" = "tickets"."id")"#,
        ),
        TicketOrder::Recent | TicketOrder::Oldest => None,
    }
}

fn filter_status(query: Select<tickets::Entity>, status: TicketStatus) -> Select<tickets::Entity> {
    match status {
        TicketStatus::AwaitingApproval => query.filter(tickets::Column::ApprovedAt.is_null()),
        TicketStatus::Approved => query
            .filter(tickets::Column::ApprovedAt.is_not_null())
            .filter(tickets::Column::DoingAt.is_null())
            .filter(tickets::Column::DoneAt.is_null()),
        TicketStatus::Doing => query
            .filter(tickets::Column::DoingAt.is_not_null())
            .filter(tickets::Column::DoneAt.is_null()),
        TicketStatus::Done => query.filter(tickets::Column::DoneAt.is_not_null()),
    }
}

fn filter_visible(
    query: Select<tickets::Entity>,
    principal: Option<&Principal>,
) -> Select<tickets::Entity> {
    match principal {
        None => query.filter(tickets::Column::ApprovedAt.is_not_null()),
        Some(p) if p.has(Permission::UpdateStatus) => query,
        Some(p) => query.filter(
            Condition::any()
                .add(tickets::Column::ApprovedAt.is_not_null())
                .add(tickets::Column::UserId.eq(p.user_id)),
        ),
    }
}

#[derive(Clone)]
pub struct TicketService {
    pool: DatabaseConnection,
}

impl TicketService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i32, req: CreateTicketRequest) -> AppResult<TicketResponse> {
        req.validate()?;

        let txn = self.pool.begin().await?;
        let ticket = tickets::ActiveModel {
            user_id: Set(user_id),
            ticket_type: Set(req.ticket_type),
            title: Set(req.title.trim().to_string()),
            content: Set(req.content),
            image_url: Set(req.image_url),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        label_service::set_ticket_labels(&txn, ticket.id, &req.label_ids).await?;
        txn.commit().await?;

        log::info!(
            "User {} created {} ticket {}",
            user_id,
            ticket.ticket_type,
            ticket.id
        );
        self.to_response(ticket).await
    }

    pub async fn get(&self, id: i32) -> AppResult<tickets::Model> {
        tickets::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))
    }

    /// 对调用者不可见的工单按不存在处理
    pub async fn get_visible(
        &self,
        id: i32,
        principal: Option<&Principal>,
    ) -> AppResult<tickets::Model> {
        let ticket = self.get(id).await?;
        if !is_visible(&ticket, principal) {
            return Err(AppError::NotFound("Ticket not found".to_string()));
        }
        Ok(ticket)
    }

    pub async fn update(
        &self,
        ticket: tickets::Model,
        req: UpdateTicketRequest,
    ) -> AppResult<TicketResponse> {
        req.validate()?;

        let txn = self.pool.begin().await?;
        let ticket_id = ticket.id;
        let mut active: tickets::ActiveModel = ticket.into();
        if let Some(title) = req.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(content) = req.content {
            active.content = Set(content);
        }
        if let Some(image_url) = req.image_url {
            active.image_url = Set(Some(image_url).filter(|u| !u.is_empty()));
        }
        active.edited_at = Set(Some(Utc::now()));
        let ticket = active.update(&txn).await?;

        if let Some(label_ids) = req.label_ids {
            label_service::set_ticket_labels(&txn, ticket_id, &label_ids).await?;
        }
        txn.commit().await?;

        self.to_response(ticket).await
    }

    /// 删除工单及其投票、浏览、评论与标签关联
    pub async fn delete(&self, ticket: tickets::Model) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        votes::Entity::delete_many()
            .filter(votes::Column::TicketId.eq(ticket.id))
            .exec(&txn)
            .await?;
        pageviews::Entity::delete_many()
            .filter(pageviews::Column::TicketId.eq(ticket.id))
            .exec(&txn)
            .await?;
        // 先删回复，再删顶层评论
        comments::Entity::delete_many()
            .filter(comments::Column::TicketId.eq(ticket.id))
            .filter(comments::Column::ReplyTo.is_not_null())
            .exec(&txn)
            .await?;
        comments::Entity::delete_many()
            .filter(comments::Column::TicketId.eq(ticket.id))
            .exec(&txn)
            .await?;
        ticket_labels::Entity::delete_many()
            .filter(ticket_labels::Column::TicketId.eq(ticket.id))
            .exec(&txn)
            .await?;
        tickets::Entity::delete_by_id(ticket.id).exec(&txn).await?;
        txn.commit().await?;

        log::info!("Deleted ticket {}", ticket.id);
        Ok(())
    }

    /// 推进工单阶段；目标阶段已设置（含并发设置）时返回 None
    pub async fn set_status(&self, ticket_id: i32, target: Stage) -> AppResult<Option<Stage>> {
        let ticket = self.get(ticket_id).await?;
        let now = Utc::now();
        if StageTimeline::from(&ticket).advance(target, now).is_none() {
            return Ok(None);
        }

        if !write_stage(&self.pool, ticket_id, target, now).await? {
            return Ok(None);
        }

        log::info!("Ticket {ticket_id} moved to {target}");
        Ok(Some(target))
    }

    /// 记录一次浏览，同一 session 对同一工单只计一次
    pub async fn record_pageview(&self, ticket_id: i32, session_key: &str) -> AppResult<()> {
        let inserted = pageviews::ActiveModel {
            ticket_id: Set(ticket_id),
            session_key: Set(session_key.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn detail(
        &self,
        ticket: tickets::Model,
        principal: Option<&Principal>,
        session_key: Option<&str>,
    ) -> AppResult<TicketDetailResponse> {
        if let Some(key) = session_key {
            self.record_pageview(ticket.id, key).await?;
        }

        let has_voted = match principal {
            Some(p) => vote_service::has_voted(&self.pool, ticket.id, p.user_id).await?,
            None => false,
        };
        let comments = comment_service::threads_for(&self.pool, ticket.id).await?;
        let ticket = self.to_response(ticket).await?;

        Ok(TicketDetailResponse {
            ticket,
            comments,
            has_voted,
        })
    }

    pub async fn list(
        &self,
        query: &TicketQuery,
        principal: Option<&Principal>,
    ) -> AppResult<PaginatedResponse<TicketResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut select = filter_visible(tickets::Entity::find(), principal);
        if let Some(ticket_type) = query.ticket_type {
            select = select.filter(tickets::Column::TicketType.eq(ticket_type));
        }
        if let Some(status) = query.status {
            select = filter_status(select, status);
        }

        let total = select.clone().count(&self.pool).await?;

        let order = query.order_by.unwrap_or_default();
        select = match (order, order_expr(order)) {
            (TicketOrder::Oldest, _) => select
                .order_by_asc(tickets::Column::CreatedAt)
                .order_by_asc(tickets::Column::Id),
            (_, Some(expr)) => select
                .order_by(Expr::cust(expr), Order::Desc)
                .order_by_desc(tickets::Column::CreatedAt)
                .order_by_desc(tickets::Column::Id),
            (_, None) => select
                .order_by_desc(tickets::Column::CreatedAt)
                .order_by_desc(tickets::Column::Id),
        };

        let models = select
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;
        let items = self.to_responses(models).await?;

        Ok(PaginatedResponse::new(items, &params, total))
    }

    async fn to_response(&self, ticket: tickets::Model) -> AppResult<TicketResponse> {
        let mut list = self.to_responses(vec![ticket]).await?;
        list.pop()
            .ok_or_else(|| AppError::InternalError("ticket response missing".to_string()))
    }

    async fn to_responses(&self, models: Vec<tickets::Model>) -> AppResult<Vec<TicketResponse>> {
        let ids: Vec<i32> = models.iter().map(|t| t.id).collect();
        let totals = totals_for(&self.pool, &ids).await?;
        let mut labels = label_service::labels_for_tickets(&self.pool, &ids).await?;

        Ok(models
            .into_iter()
            .map(|t| {
                let totals = totals.get(&t.id).copied().unwrap_or_default();
                let labels = labels.remove(&t.id).unwrap_or_default();
                TicketResponse::build(t, totals, labels)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TicketType;
    use crate::models::{CreateCommentRequest, LabelRequest};
    use crate::services::{CommentService, LabelService, VoteService, wallet_service};
    use crate::test_utils::{insert_approved_ticket, insert_ticket, setup_test_db};
    use chrono::Duration;
    use std::collections::HashSet;

    fn user(id: i32) -> Principal {
        Principal::new(id, HashSet::new())
    }

    fn staff(id: i32) -> Principal {
        Principal::new(id, [Permission::UpdateStatus].into_iter().collect())
    }

    fn new_ticket(ticket_type: TicketType, title: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            ticket_type,
            title: title.to_string(),
            content: "Steps to reproduce".to_string(),
            image_url: None,
            label_ids: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_ticket_awaits_approval() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let label = LabelService::new(db.clone())
            .create(LabelRequest {
                name: "ui".to_string(),
            })
            .await?;

        let mut req = new_ticket(TicketType::Bug, "  Button broken ");
        req.label_ids = vec![label.id];
        let ticket = service.create(1, req).await?;

        assert_eq!(ticket.title, "Button broken");
        assert_eq!(ticket.status, TicketStatus::AwaitingApproval);
        assert_eq!(ticket.vote_total, 0);
        assert_eq!(ticket.labels, vec![label]);

        let mut bad = new_ticket(TicketType::Bug, "Bad labels");
        bad.label_ids = vec![42];
        assert!(matches!(
            service.create(1, bad).await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(tickets::Entity::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_visibility_rules() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let awaiting = insert_ticket(&db, 1, TicketType::Bug, "Awaiting", Utc::now()).await?;
        insert_ticket(&db, 2, TicketType::Bug, "Someone else's", Utc::now()).await?;
        insert_approved_ticket(&db, 3, TicketType::Feature, "Approved").await?;

        let query = TicketQuery::default();
        assert_eq!(service.list(&query, None).await?.total, 1);
        assert_eq!(service.list(&query, Some(&user(1))).await?.total, 2);
        assert_eq!(service.list(&query, Some(&staff(9))).await?.total, 3);

        assert!(matches!(
            service.get_visible(awaiting.id, None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(service.get_visible(awaiting.id, Some(&user(1))).await.is_ok());
        assert!(service.get_visible(awaiting.id, Some(&user(2))).await.is_err());
        assert!(service.get_visible(awaiting.id, Some(&staff(9))).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_and_ordering() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let voting = VoteService::new(db.clone());
        let now = Utc::now();

        let old = insert_ticket(&db, 1, TicketType::Bug, "Old", now - Duration::days(2)).await?;
        let new = insert_ticket(&db, 1, TicketType::Bug, "New", now).await?;
        let feature = insert_ticket(&db, 1, TicketType::Feature, "Feature", now).await?;
        for id in [old.id, new.id, feature.id] {
            service.set_status(id, Stage::Approved).await?;
        }
        service.set_status(feature.id, Stage::Doing).await?;

        let old = service.get(old.id).await?;
        voting.vote(&old, 5, None).await?;
        voting.vote(&old, 6, None).await?;

        let bugs = TicketQuery {
            ticket_type: Some(TicketType::Bug),
            ..Default::default()
        };
        let titles = |page: PaginatedResponse<TicketResponse>| {
            page.items.into_iter().map(|t| t.title).collect::<Vec<_>>()
        };
        assert_eq!(titles(service.list(&bugs, None).await?), vec!["New", "Old"]);

        let by_votes = TicketQuery {
            ticket_type: Some(TicketType::Bug),
            order_by: Some(TicketOrder::Votes),
            ..Default::default()
        };
        let listed = service.list(&by_votes, None).await?;
        assert_eq!(listed.items[0].title, "Old");
        assert_eq!(listed.items[0].vote_total, 2);

        let oldest = TicketQuery {
            order_by: Some(TicketOrder::Oldest),
            ..Default::default()
        };
        assert_eq!(service.list(&oldest, None).await?.items[0].title, "Old");

        let doing = TicketQuery {
            status: Some(TicketStatus::Doing),
            ..Default::default()
        };
        assert_eq!(titles(service.list(&doing, None).await?), vec!["Feature"]);

        let paged = TicketQuery {
            per_page: Some(2),
            page: Some(2),
            ..Default::default()
        };
        let page = service.list(&paged, None).await?;
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_status_backfills_and_rejects_repeat() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let ticket = insert_ticket(&db, 1, TicketType::Bug, "Crash", Utc::now()).await?;

        assert_eq!(service.set_status(ticket.id, Stage::Done).await?, Some(Stage::Done));
        let done = service.get(ticket.id).await?;
        assert!(done.approved_at.is_some());
        assert!(done.doing_at.is_some());
        assert_eq!(StageTimeline::from(&done).status(), TicketStatus::Done);

        assert_eq!(service.set_status(ticket.id, Stage::Approved).await?, None);
        assert_eq!(service.get(ticket.id).await?.approved_at, done.approved_at);
        assert!(matches!(
            service.set_status(999, Stage::Approved).await,
            Err(AppError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_write_stage_keeps_stage_set_meanwhile() -> AppResult<()> {
        let db = setup_test_db().await?;
        let ticket = insert_ticket(&db, 1, TicketType::Feature, "Export", Utc::now()).await?;

        // 读取之后另一请求已审核该工单
        let approved_at = Utc::now() - chrono::Duration::days(3);
        let mut active: tickets::ActiveModel = ticket.clone().into();
        active.approved_at = Set(Some(approved_at));
        active.update(&db).await?;

        let now = Utc::now();
        assert!(write_stage(&db, ticket.id, Stage::Done, now).await?);
        let done = TicketService::new(db.clone()).get(ticket.id).await?;
        assert_eq!(done.approved_at, Some(approved_at));
        assert_eq!(done.doing_at, Some(now));
        assert_eq!(done.done_at, Some(now));

        assert!(!write_stage(&db, ticket.id, Stage::Done, Utc::now()).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_ticket() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Bug, "Crash").await?;

        let updated = service
            .update(
                ticket.clone(),
                UpdateTicketRequest {
                    title: Some("Crash on save".to_string()),
                    ..Default::default()
                },
            )
            .await?;
        assert_eq!(updated.title, "Crash on save");
        assert_eq!(updated.content, ticket.content);
        assert!(updated.edited_at.is_some());

        let invalid = UpdateTicketRequest {
            title: Some(String::new()),
            ..Default::default()
        };
        assert!(service.update(ticket, invalid).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_detail_counts_one_view_per_session() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Bug, "Crash").await?;
        VoteService::new(db.clone()).vote(&ticket, 2, None).await?;

        service.detail(ticket.clone(), None, Some("abc")).await?;
        service.detail(ticket.clone(), None, Some("abc")).await?;
        service.detail(ticket.clone(), None, None).await?;
        let detail = service
            .detail(ticket.clone(), Some(&user(2)), Some("user:2"))
            .await?;

        assert_eq!(detail.ticket.view_total, 2);
        assert_eq!(detail.ticket.vote_total, 1);
        assert!(detail.has_voted);

        let other = service.detail(ticket, Some(&user(3)), None).await?;
        assert!(!other.has_voted);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_cascades() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = TicketService::new(db.clone());
        let comments_svc = CommentService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Feature, "Dark mode").await?;

        let wallet = wallet_service::ensure_wallet(&db, 2).await?;
        wallet_service::credit(&db, wallet.id, 5, 0, None).await?;
        VoteService::new(db.clone()).vote(&ticket, 2, Some(2)).await?;
        let top = comments_svc
            .add(
                ticket.id,
                2,
                CreateCommentRequest {
                    content: "Yes please".to_string(),
                    reply_to: None,
                },
            )
            .await?;
        comments_svc
            .add(
                ticket.id,
                1,
                CreateCommentRequest {
                    content: "Soon".to_string(),
                    reply_to: Some(top.id),
                },
            )
            .await?;
        service.record_pageview(ticket.id, "abc").await?;

        service.delete(ticket.clone()).await?;

        assert!(matches!(
            service.get(ticket.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(votes::Entity::find().count(&db).await?, 0);
        assert_eq!(comments::Entity::find().count(&db).await?, 0);
        assert_eq!(pageviews::Entity::find().count(&db).await?, 0);
        // 投票花费的积分不退回
        assert_eq!(wallet_service::find_wallet(&db, 2).await?.unwrap().balance, 3);
        Ok(())
    }
}

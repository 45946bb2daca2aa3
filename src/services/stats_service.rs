//! 统计与路线图

use crate::entities::{
    TicketType, comment_entity as comments, credit_transaction_entity as credits,
    debit_transaction_entity as debits, pageview_entity as pageviews, ticket_entity as tickets,
    vote_entity as votes,
};
use crate::error::AppResult;
use crate::models::{
    AllTicketsChartData, AllTicketsStatsResponse, DateRangeQuery, MAX_OFFSET, RoadmapItem,
    RoadmapResponse, SummaryStats, TicketChartData, TicketLink, TicketOrder, TicketStatsResponse,
    TopTicket, TransactionChartData, TransactionStatsResponse,
};
use crate::services::ticket_service::{order_expr, totals_for};
use crate::utils::{Aggregate, DateRange, bucket_by_day, filter_date_range, humanize_interval};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Select,
};

pub const ROADMAP_PAGE_SIZE: u64 = 10;
pub const TOP_TICKETS: u64 = 5;

/// 解析统计查询的日期范围，以今天 (UTC) 为基准
pub fn resolve_range(query: &DateRangeQuery) -> AppResult<DateRange> {
    DateRange::resolve(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        Utc::now().date_naive(),
    )
}

#[derive(Clone)]
pub struct StatsService {
    pool: DatabaseConnection,
}

impl StatsService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 首页概览
    pub async fn summary(&self, now: DateTime<Utc>) -> AppResult<SummaryStats> {
        let bugs = tickets::Entity::find().filter(tickets::Column::TicketType.eq(TicketType::Bug));
        let features =
            tickets::Entity::find().filter(tickets::Column::TicketType.eq(TicketType::Feature));

        let bugs_this_week = bugs
            .clone()
            .filter(tickets::Column::DoneAt.gte(now - Duration::days(7)))
            .count(&self.pool)
            .await?;
        let features_coming_soon = features
            .clone()
            .filter(tickets::Column::DoingAt.is_not_null())
            .filter(tickets::Column::DoneAt.is_null())
            .count(&self.pool)
            .await?;
        let total_features_implemented = features
            .clone()
            .filter(tickets::Column::DoneAt.is_not_null())
            .count(&self.pool)
            .await?;

        let most_requested_feature = self
            .top_by_votes(
                features
                    .filter(tickets::Column::ApprovedAt.is_not_null())
                    .filter(tickets::Column::DoneAt.is_null()),
                1,
            )
            .await?
            .into_iter()
            .next()
            .map(|top| top.link);

        let fixed = bugs
            .filter(tickets::Column::DoneAt.is_not_null())
            .all(&self.pool)
            .await?;
        let average_bug_fix_time = average_interval(&fixed).map(humanize_interval);

        Ok(SummaryStats {
            bugs_this_week,
            features_coming_soon,
            total_features_implemented,
            most_requested_feature,
            average_bug_fix_time,
        })
    }

    pub async fn ticket_stats(
        &self,
        ticket: &tickets::Model,
        range: &DateRange,
    ) -> AppResult<TicketStatsResponse> {
        let comment_rows = filter_date_range(
            comments::Entity::find().filter(comments::Column::TicketId.eq(ticket.id)),
            comments::Column::CreatedAt,
            Some(range.start),
            Some(range.end),
        )
        .all(&self.pool)
        .await?;
        let view_rows = filter_date_range(
            pageviews::Entity::find().filter(pageviews::Column::TicketId.eq(ticket.id)),
            pageviews::Column::CreatedAt,
            Some(range.start),
            Some(range.end),
        )
        .all(&self.pool)
        .await?;
        let vote_rows = filter_date_range(
            votes::Entity::find().filter(votes::Column::TicketId.eq(ticket.id)),
            votes::Column::CreatedAt,
            Some(range.start),
            Some(range.end),
        )
        .all(&self.pool)
        .await?;

        Ok(TicketStatsResponse {
            ticket: TicketLink::new(ticket.id, ticket.title.clone()),
            date_range: range.into(),
            chart_data: TicketChartData {
                comments: bucket_by_day(&comment_rows, |c| c.created_at, |_| 1, Aggregate::Count),
                views: bucket_by_day(&view_rows, |v| v.created_at, |_| 1, Aggregate::Count),
                votes: bucket_by_day(
                    &vote_rows,
                    |v| v.created_at,
                    |v| i64::from(v.count),
                    Aggregate::Sum,
                ),
            },
        })
    }

    pub async fn all_tickets_stats(&self, range: &DateRange) -> AppResult<AllTicketsStatsResponse> {
        let start = Some(range.start);
        let end = Some(range.end);

        let created = filter_date_range(
            tickets::Entity::find(),
            tickets::Column::CreatedAt,
            start,
            end,
        )
        .all(&self.pool)
        .await?;
        let (bug_rows, feature_rows): (Vec<_>, Vec<_>) = created
            .into_iter()
            .partition(|t| t.ticket_type == TicketType::Bug);

        let comment_rows =
            filter_date_range(comments::Entity::find(), comments::Column::CreatedAt, start, end)
                .all(&self.pool)
                .await?;
        let view_rows =
            filter_date_range(pageviews::Entity::find(), pageviews::Column::CreatedAt, start, end)
                .all(&self.pool)
                .await?;
        let vote_rows =
            filter_date_range(votes::Entity::find(), votes::Column::CreatedAt, start, end)
                .all(&self.pool)
                .await?;

        let awaiting_approval = tickets::Entity::find()
            .filter(tickets::Column::ApprovedAt.is_null())
            .count(&self.pool)
            .await?;

        let approved = |ticket_type: TicketType| {
            tickets::Entity::find()
                .filter(tickets::Column::TicketType.eq(ticket_type))
                .filter(tickets::Column::ApprovedAt.is_not_null())
        };
        let top_features = self
            .top_by_votes(approved(TicketType::Feature), TOP_TICKETS)
            .await?;
        let top_bugs = self.top_by_votes(approved(TicketType::Bug), TOP_TICKETS).await?;

        let created_at = |t: &tickets::Model| t.created_at;
        Ok(AllTicketsStatsResponse {
            date_range: range.into(),
            chart_data: AllTicketsChartData {
                bugs: bucket_by_day(&bug_rows, created_at, |_| 1, Aggregate::Count),
                features: bucket_by_day(&feature_rows, created_at, |_| 1, Aggregate::Count),
                comments: bucket_by_day(&comment_rows, |c| c.created_at, |_| 1, Aggregate::Count),
                views: bucket_by_day(&view_rows, |v| v.created_at, |_| 1, Aggregate::Count),
                votes: bucket_by_day(
                    &vote_rows,
                    |v| v.created_at,
                    |v| i64::from(v.count),
                    Aggregate::Sum,
                ),
            },
            awaiting_approval,
            top_features,
            top_bugs,
        })
    }

    /// 销售额与退款额（实付金额）
    pub async fn transaction_stats(&self, range: &DateRange) -> AppResult<TransactionStatsResponse> {
        let sales = filter_date_range(
            credits::Entity::find().filter(credits::Column::RealValue.gt(0)),
            credits::Column::CreatedAt,
            Some(range.start),
            Some(range.end),
        )
        .all(&self.pool)
        .await?;
        let refunds = filter_date_range(
            debits::Entity::find().filter(debits::Column::RealValue.gt(0)),
            debits::Column::CreatedAt,
            Some(range.start),
            Some(range.end),
        )
        .all(&self.pool)
        .await?;

        Ok(TransactionStatsResponse {
            date_range: range.into(),
            chart_data: TransactionChartData {
                sales: bucket_by_day(&sales, |c| c.created_at, |c| c.real_value, Aggregate::Sum),
                refunds: bucket_by_day(&refunds, |d| d.created_at, |d| d.real_value, Aggregate::Sum),
            },
        })
    }

    /// 路线图：进行中的排在前面，其后是已完成的（按完成时间倒序）
    pub async fn roadmap(&self, page: Option<u64>) -> AppResult<RoadmapResponse> {
        let page = page.unwrap_or(1).max(1);
        let in_progress = tickets::Entity::find()
            .filter(tickets::Column::DoingAt.is_not_null())
            .filter(tickets::Column::DoneAt.is_null())
            .order_by_desc(tickets::Column::DoingAt)
            .order_by_desc(tickets::Column::Id);
        let done = tickets::Entity::find()
            .filter(tickets::Column::DoneAt.is_not_null())
            .order_by_desc(tickets::Column::DoneAt)
            .order_by_desc(tickets::Column::Id);

        let in_progress_total = in_progress.clone().count(&self.pool).await?;
        let done_total = done.clone().count(&self.pool).await?;
        let last_page = (in_progress_total + done_total)
            .div_ceil(ROADMAP_PAGE_SIZE)
            .max(1);

        let offset = (page - 1).saturating_mul(ROADMAP_PAGE_SIZE).min(MAX_OFFSET);
        let mut items = Vec::new();

        if offset < in_progress_total {
            let rows = in_progress
                .offset(offset)
                .limit(ROADMAP_PAGE_SIZE)
                .all(&self.pool)
                .await?;
            items.extend(rows.into_iter().map(|t| {
                RoadmapItem::new(t.id, t.title, t.ticket_type, "Coming Soon".to_string())
            }));
        }

        let remaining = ROADMAP_PAGE_SIZE - items.len() as u64;
        if remaining > 0 {
            let rows = done
                .offset(offset.saturating_sub(in_progress_total))
                .limit(remaining)
                .all(&self.pool)
                .await?;
            items.extend(rows.into_iter().map(|t| {
                let date = t
                    .done_at
                    .map(|d| d.format("%d/%m/%y").to_string())
                    .unwrap_or_default();
                RoadmapItem::new(t.id, t.title, t.ticket_type, date)
            }));
        }

        Ok(RoadmapResponse {
            page,
            tickets: items,
            done: page >= last_page,
        })
    }

    async fn top_by_votes(
        &self,
        query: Select<tickets::Entity>,
        limit: u64,
    ) -> AppResult<Vec<TopTicket>> {
        let mut query = query;
        if let Some(expr) = order_expr(TicketOrder::Votes) {
            query = query.order_by(Expr::cust(expr), Order::Desc);
        }
        let rows = query
            .order_by_asc(tickets::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;

        let ids: Vec<i32> = rows.iter().map(|t| t.id).collect();
        let totals = totals_for(&self.pool, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|t| TopTicket {
                votes: totals.get(&t.id).map(|x| x.votes).unwrap_or(0),
                link: TicketLink::new(t.id, t.title),
            })
            .collect())
    }
}

/// 已完成工单从创建到完成的平均耗时
fn average_interval(fixed: &[tickets::Model]) -> Option<Duration> {
    let spans: Vec<i64> = fixed
        .iter()
        .filter_map(|t| t.done_at.map(|done| (done - t.created_at).num_seconds()))
        .collect();
    if spans.is_empty() {
        return None;
    }
    let avg = spans.iter().sum::<i64>() / spans.len() as i64;
    Some(Duration::seconds(avg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRangeInfo, Stage};
    use crate::services::{TicketService, wallet_service};
    use crate::test_utils::{insert_approved_ticket, insert_ticket, setup_test_db};
    use sea_orm::{ActiveModelTrait, Set};

    fn day_range(days_back: i64) -> DateRange {
        let today = Utc::now().date_naive();
        DateRange {
            start: today - Duration::days(days_back),
            end: today,
            is_default: false,
        }
    }

    async fn insert_vote(
        db: &DatabaseConnection,
        ticket_id: i32,
        count: i32,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        votes::ActiveModel {
            ticket_id: Set(ticket_id),
            user_id: Set(count),
            count: Set(count),
            created_at: Set(at),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_summary() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = StatsService::new(db.clone());
        let tickets_svc = TicketService::new(db.clone());
        let now = Utc::now();

        let empty = service.summary(now).await?;
        assert_eq!(empty.bugs_this_week, 0);
        assert!(empty.most_requested_feature.is_none());
        assert!(empty.average_bug_fix_time.is_none());

        let bug = insert_ticket(&db, 1, TicketType::Bug, "Crash", now - Duration::days(2)).await?;
        tickets_svc.set_status(bug.id, Stage::Done).await?;

        let quiet = insert_approved_ticket(&db, 1, TicketType::Feature, "Quiet").await?;
        let popular = insert_approved_ticket(&db, 1, TicketType::Feature, "Popular").await?;
        insert_vote(&db, popular.id, 4, now).await?;
        insert_vote(&db, quiet.id, 1, now).await?;

        let doing = insert_approved_ticket(&db, 1, TicketType::Feature, "Doing").await?;
        tickets_svc.set_status(doing.id, Stage::Doing).await?;
        let shipped = insert_approved_ticket(&db, 1, TicketType::Feature, "Shipped").await?;
        tickets_svc.set_status(shipped.id, Stage::Done).await?;

        let summary = service.summary(now + Duration::seconds(1)).await?;
        assert_eq!(summary.bugs_this_week, 1);
        assert_eq!(summary.features_coming_soon, 1);
        assert_eq!(summary.total_features_implemented, 1);
        let most = summary.most_requested_feature.unwrap();
        assert_eq!(most.id, popular.id);
        assert_eq!(most.url, format!("/tickets/{}/", popular.id));
        assert_eq!(summary.average_bug_fix_time.as_deref(), Some("2 days"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ticket_stats_buckets_by_day() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = StatsService::new(db.clone());
        let ticket = insert_approved_ticket(&db, 1, TicketType::Feature, "Dark mode").await?;
        let now = Utc::now();

        insert_vote(&db, ticket.id, 1, now - Duration::days(2)).await?;
        insert_vote(&db, ticket.id, 2, now - Duration::days(1)).await?;
        insert_vote(&db, ticket.id, 3, now - Duration::days(1)).await?;
        // 超出统计范围
        insert_vote(&db, ticket.id, 9, now - Duration::days(30)).await?;

        let stats = service.ticket_stats(&ticket, &day_range(7)).await?;
        let totals: Vec<i64> = stats.chart_data.votes.iter().map(|d| d.total).collect();
        assert_eq!(totals, vec![1, 5]);
        assert_eq!(
            stats.chart_data.votes[1].date,
            (now - Duration::days(1)).date_naive()
        );
        assert!(stats.chart_data.comments.is_empty());
        assert_eq!(stats.ticket.id, ticket.id);
        assert!(stats.date_range.label.starts_with("Between "));
        Ok(())
    }

    #[tokio::test]
    async fn test_all_tickets_stats() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = StatsService::new(db.clone());
        let now = Utc::now();

        insert_ticket(&db, 1, TicketType::Bug, "Awaiting", now).await?;
        let bug = insert_approved_ticket(&db, 1, TicketType::Bug, "Bug").await?;
        let mut features = Vec::new();
        for i in 0..6 {
            let f = insert_approved_ticket(&db, 1, TicketType::Feature, &format!("F{i}")).await?;
            insert_vote(&db, f.id, i + 1, now).await?;
            features.push(f);
        }

        let stats = service.all_tickets_stats(&day_range(7)).await?;
        assert_eq!(stats.awaiting_approval, 1);
        assert_eq!(stats.chart_data.bugs.iter().map(|d| d.total).sum::<i64>(), 2);
        assert_eq!(stats.chart_data.features.iter().map(|d| d.total).sum::<i64>(), 6);
        assert_eq!(stats.chart_data.votes.iter().map(|d| d.total).sum::<i64>(), 21);

        assert_eq!(stats.top_features.len(), TOP_TICKETS as usize);
        assert_eq!(stats.top_features[0].link.id, features[5].id);
        assert_eq!(stats.top_features[0].votes, 6);
        assert_eq!(stats.top_bugs.len(), 1);
        assert_eq!(stats.top_bugs[0].link.id, bug.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_transaction_stats() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = StatsService::new(db.clone());
        let wallet = wallet_service::ensure_wallet(&db, 1).await?;
        wallet_service::credit(&db, wallet.id, 10, 600, Some("ch_1".into())).await?;
        wallet_service::credit(&db, wallet.id, 5, 300, Some("ch_2".into())).await?;
        // 赠送的积分与投票花费不计入
        wallet_service::credit(&db, wallet.id, 3, 0, None).await?;
        wallet_service::debit(&db, wallet.id, 2, 0).await?;
        wallet_service::debit(&db, wallet.id, 5, 300).await?;

        let stats = service.transaction_stats(&day_range(7)).await?;
        assert_eq!(stats.chart_data.sales.len(), 1);
        assert_eq!(stats.chart_data.sales[0].total, 900);
        assert_eq!(stats.chart_data.refunds.len(), 1);
        assert_eq!(stats.chart_data.refunds[0].total, 300);
        Ok(())
    }

    #[tokio::test]
    async fn test_roadmap_paging() -> AppResult<()> {
        let db = setup_test_db().await?;
        let service = StatsService::new(db.clone());
        let tickets_svc = TicketService::new(db.clone());

        for i in 0..12 {
            let t = insert_approved_ticket(&db, 1, TicketType::Feature, &format!("Doing {i}")).await?;
            tickets_svc.set_status(t.id, Stage::Doing).await?;
        }
        for i in 0..3 {
            let t = insert_approved_ticket(&db, 1, TicketType::Bug, &format!("Done {i}")).await?;
            tickets_svc.set_status(t.id, Stage::Done).await?;
        }
        // 未开始的不出现在路线图上
        insert_approved_ticket(&db, 1, TicketType::Feature, "Later").await?;

        let first = service.roadmap(None).await?;
        assert_eq!(first.page, 1);
        assert_eq!(first.tickets.len(), 10);
        assert!(first.tickets.iter().all(|t| t.date == "Coming Soon"));
        assert!(!first.done);

        let second = service.roadmap(Some(2)).await?;
        assert_eq!(second.tickets.len(), 5);
        assert_eq!(second.tickets[1].date, "Coming Soon");
        assert_eq!(second.tickets[2].ticket_type, "Bug");
        assert_eq!(
            second.tickets[2].date,
            Utc::now().date_naive().format("%d/%m/%y").to_string()
        );
        assert!(second.done);

        let beyond = service.roadmap(Some(5)).await?;
        assert!(beyond.tickets.is_empty());
        assert!(beyond.done);

        let huge = service.roadmap(Some(u64::MAX)).await?;
        assert!(huge.tickets.is_empty());
        assert!(huge.done);
        Ok(())
    }

    #[test]
    fn test_resolve_range_defaults() {
        let range = resolve_range(&DateRangeQuery::default()).unwrap();
        assert!(range.is_default);
        assert_eq!(range.end - range.start, Duration::days(7));
        assert_eq!(DateRangeInfo::from(&range).label, "For This Week");

        let bad = DateRangeQuery {
            start_date: Some("2024-02-10".to_string()),
            end_date: Some("2024-02-01".to_string()),
        };
        assert!(resolve_range(&bad).is_err());
    }
}

use super::respond;
use crate::error::AppResult;
use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::stats_service::resolve_range;
use crate::services::{StatsService, TicketService};
use crate::utils::{AccessContext, Permission};
use actix_web::{HttpRequest, HttpResponse, Result, web};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/stats/summary",
    tag = "stats",
    responses(
        (status = 200, description = "首页概览", body = SummaryStats)
    )
)]
pub async fn summary(service: web::Data<StatsService>) -> Result<HttpResponse> {
    respond(service.summary(Utc::now()).await)
}

#[utoipa::path(
    get,
    path = "/stats/tickets",
    tag = "stats",
    params(DateRangeQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部工单统计", body = AllTicketsStatsResponse),
        (status = 400, description = "日期范围无效"),
        (status = 403, description = "无权限")
    )
)]
pub async fn all_tickets_stats(
    service: web::Data<StatsService>,
    req: HttpRequest,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        AccessContext::new(principal.as_ref()).require_permission(Permission::ViewAllStats)?;
        let range = resolve_range(&query)?;
        service.all_tickets_stats(&range).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/stats/tickets/{id}",
    tag = "stats",
    params(
        ("id" = i32, Path, description = "工单ID"),
        DateRangeQuery
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "单个工单统计", body = TicketStatsResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "工单不存在")
    )
)]
pub async fn ticket_stats(
    service: web::Data<StatsService>,
    tickets: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<i32>,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let ticket = tickets.get(*path).await?;
        AccessContext::new(principal.as_ref())
            .owned_by(ticket.user_id)
            .require_author_or(Permission::ViewAllStats)?;
        let range = resolve_range(&query)?;
        service.ticket_stats(&ticket, &range).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/stats/transactions",
    tag = "stats",
    params(DateRangeQuery),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "交易统计", body = TransactionStatsResponse),
        (status = 403, description = "无权限")
    )
)]
pub async fn transaction_stats(
    service: web::Data<StatsService>,
    req: HttpRequest,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        AccessContext::new(principal.as_ref())
            .require_permission(Permission::ViewTransactionStats)?;
        let range = resolve_range(&query)?;
        service.transaction_stats(&range).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/roadmap",
    tag = "stats",
    params(RoadmapQuery),
    responses(
        (status = 200, description = "路线图", body = RoadmapResponse)
    )
)]
pub async fn roadmap(
    service: web::Data<StatsService>,
    query: web::Query<RoadmapQuery>,
) -> Result<HttpResponse> {
    respond(service.roadmap(query.page).await)
}

pub fn stats_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stats")
            .route("/summary", web::get().to(summary))
            .route("/tickets", web::get().to(all_tickets_stats))
            .route("/tickets/{id}", web::get().to(ticket_stats))
            .route("/transactions", web::get().to(transaction_stats)),
    )
    .route("/roadmap", web::get().to(roadmap));
}

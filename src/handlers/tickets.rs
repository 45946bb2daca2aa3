use super::comments::{add_comment, edit_comment};
use super::respond;
use crate::error::{AppError, AppResult};
use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::{TicketService, VoteService};
use crate::utils::{AccessContext, Permission, Principal};
use actix_web::{HttpRequest, HttpResponse, Result, web};

const SESSION_HEADER: &str = "X-Session-Key";

/// 浏览计数用的会话标识：优先取请求头，其次是登录用户
fn session_key(req: &HttpRequest, principal: Option<&Principal>) -> Option<String> {
    req.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| principal.map(|p| format!("user:{}", p.user_id)))
}

#[utoipa::path(
    get,
    path = "/tickets",
    tag = "tickets",
    params(TicketQuery),
    responses(
        (status = 200, description = "获取工单列表成功", body = PaginatedTicketResponse)
    )
)]
pub async fn list_tickets(
    service: web::Data<TicketService>,
    req: HttpRequest,
    query: web::Query<TicketQuery>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    respond(service.list(&query, principal.as_ref()).await)
}

#[utoipa::path(
    post,
    path = "/tickets",
    tag = "tickets",
    request_body = CreateTicketRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建工单成功", body = TicketResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "未授权")
    )
)]
pub async fn create_ticket(
    service: web::Data<TicketService>,
    req: HttpRequest,
    request: web::Json<CreateTicketRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_login()?;
        service.create(user.user_id, request.into_inner()).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "tickets",
    params(
        ("id" = i32, Path, description = "工单ID"),
        ("X-Session-Key" = Option<String>, Header, description = "浏览计数用的会话标识")
    ),
    responses(
        (status = 200, description = "获取工单详情成功", body = TicketDetailResponse),
        (status = 404, description = "工单不存在")
    )
)]
pub async fn get_ticket(
    service: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let session = session_key(&req, principal.as_ref());
    let result: AppResult<_> = async {
        let ticket = service.get_visible(*path, principal.as_ref()).await?;
        service
            .detail(ticket, principal.as_ref(), session.as_deref())
            .await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    put,
    path = "/tickets/{id}",
    tag = "tickets",
    params(("id" = i32, Path, description = "工单ID")),
    request_body = UpdateTicketRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新工单成功", body = TicketResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "工单不存在")
    )
)]
pub async fn update_ticket(
    service: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<UpdateTicketRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let ticket = service.get(*path).await?;
        AccessContext::new(principal.as_ref())
            .owned_by(ticket.user_id)
            .require_author_or(Permission::EditAllTickets)?;
        service.update(ticket, request.into_inner()).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    delete,
    path = "/tickets/{id}",
    tag = "tickets",
    params(("id" = i32, Path, description = "工单ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除工单成功", body = MessageResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "工单不存在")
    )
)]
pub async fn delete_ticket(
    service: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let ticket = service.get(*path).await?;
        AccessContext::new(principal.as_ref())
            .owned_by(ticket.user_id)
            .require_author_or(Permission::EditAllTickets)?;
        service.delete(ticket).await
    }
    .await;
    match result {
        Ok(()) => Ok(HttpResponse::Ok().json(MessageResponse {
            success: true,
            message: "Ticket deleted".to_string(),
        })),
        Err(e) => respond::<()>(Err(e)),
    }
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/status/{stage}",
    tag = "tickets",
    params(
        ("id" = i32, Path, description = "工单ID"),
        ("stage" = String, Path, description = "目标阶段: approved / doing / done")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "状态更新成功", body = StatusChangeResponse),
        (status = 400, description = "阶段无效或已设置"),
        (status = 403, description = "无权限")
    )
)]
pub async fn set_status(
    service: web::Data<TicketService>,
    req: HttpRequest,
    path: web::Path<(i32, String)>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let (ticket_id, stage) = path.into_inner();
    let result: AppResult<_> = async {
        AccessContext::new(principal.as_ref()).require_permission(Permission::UpdateStatus)?;
        let stage: Stage = stage.parse()?;
        match service.set_status(ticket_id, stage).await? {
            Some(stage) => Ok(StatusChangeResponse {
                ticket_id,
                stage,
                status: stage.into(),
            }),
            None => Err(AppError::ValidationError(format!(
                "Ticket is already {stage}"
            ))),
        }
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/vote",
    tag = "tickets",
    params(("id" = i32, Path, description = "工单ID")),
    request_body = VoteRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "投票成功", body = VoteOutcome),
        (status = 400, description = "已投票或积分不足"),
        (status = 401, description = "未授权")
    )
)]
pub async fn vote(
    tickets: web::Data<TicketService>,
    votes: web::Data<VoteService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: Option<web::Json<VoteRequest>>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let credits = request.and_then(|r| r.into_inner().credits);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_login()?;
        let ticket = tickets.get_visible(*path, Some(user)).await?;
        let outcome = votes.vote(&ticket, user.user_id, credits).await?;
        if outcome.success {
            Ok(outcome)
        } else {
            Err(AppError::ValidationError(outcome.message))
        }
    }
    .await;
    respond(result)
}

pub fn tickets_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tickets")
            .route("", web::get().to(list_tickets))
            .route("", web::post().to(create_ticket))
            .route("/{id}", web::get().to(get_ticket))
            .route("/{id}", web::put().to(update_ticket))
            .route("/{id}", web::delete().to(delete_ticket))
            .route("/{id}/status/{stage}", web::post().to(set_status))
            .route("/{id}/vote", web::post().to(vote))
            .route("/{id}/comments", web::post().to(add_comment))
            .route("/{id}/comments/{comment_id}", web::put().to(edit_comment)),
    );
}

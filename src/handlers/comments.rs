use super::respond;
use crate::error::AppResult;
use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::{CommentService, TicketService};
use crate::utils::{AccessContext, Permission};
use actix_web::{HttpRequest, HttpResponse, Result, web};

#[utoipa::path(
    post,
    path = "/tickets/{id}/comments",
    tag = "comments",
    params(("id" = i32, Path, description = "工单ID")),
    request_body = CreateCommentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "发表评论成功", body = CommentResponse),
        (status = 400, description = "内容为空或回复目标无效"),
        (status = 404, description = "工单不存在")
    )
)]
pub async fn add_comment(
    tickets: web::Data<TicketService>,
    comments: web::Data<CommentService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_login()?;
        let ticket = tickets.get_visible(*path, Some(user)).await?;
        comments
            .add(ticket.id, user.user_id, request.into_inner())
            .await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    put,
    path = "/tickets/{id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("id" = i32, Path, description = "工单ID"),
        ("comment_id" = i32, Path, description = "评论ID")
    ),
    request_body = UpdateCommentRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "修改评论成功", body = CommentResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "评论不存在")
    )
)]
pub async fn edit_comment(
    comments: web::Data<CommentService>,
    req: HttpRequest,
    path: web::Path<(i32, i32)>,
    request: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let (ticket_id, comment_id) = path.into_inner();
    let result: AppResult<_> = async {
        let comment = comments.get(ticket_id, comment_id).await?;
        AccessContext::new(principal.as_ref())
            .owned_by(comment.user_id)
            .require_author_or(Permission::EditAllComments)?;
        comments.edit(comment, request.into_inner().content).await
    }
    .await;
    respond(result)
}

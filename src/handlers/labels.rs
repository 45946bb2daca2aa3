use super::respond;
use crate::error::AppResult;
use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::LabelService;
use crate::utils::{AccessContext, Permission};
use actix_web::{HttpRequest, HttpResponse, Result, web};

#[utoipa::path(
    get,
    path = "/labels",
    tag = "labels",
    responses(
        (status = 200, description = "获取标签列表成功", body = [LabelResponse])
    )
)]
pub async fn list_labels(service: web::Data<LabelService>) -> Result<HttpResponse> {
    respond(service.list().await)
}

#[utoipa::path(
    post,
    path = "/labels",
    tag = "labels",
    request_body = LabelRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建标签成功", body = LabelResponse),
        (status = 400, description = "名称无效或重复"),
        (status = 403, description = "无权限")
    )
)]
pub async fn create_label(
    service: web::Data<LabelService>,
    req: HttpRequest,
    request: web::Json<LabelRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        AccessContext::new(principal.as_ref()).require_permission(Permission::ManageLabels)?;
        service.create(request.into_inner()).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    put,
    path = "/labels/{id}",
    tag = "labels",
    params(("id" = i32, Path, description = "标签ID")),
    request_body = LabelRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "重命名标签成功", body = LabelResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "标签不存在")
    )
)]
pub async fn rename_label(
    service: web::Data<LabelService>,
    req: HttpRequest,
    path: web::Path<i32>,
    request: web::Json<LabelRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        AccessContext::new(principal.as_ref()).require_permission(Permission::ManageLabels)?;
        service.rename(*path, request.into_inner()).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    delete,
    path = "/labels/{id}",
    tag = "labels",
    params(("id" = i32, Path, description = "标签ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除标签成功"),
        (status = 403, description = "无权限"),
        (status = 404, description = "标签不存在")
    )
)]
pub async fn delete_label(
    service: web::Data<LabelService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        AccessContext::new(principal.as_ref()).require_permission(Permission::ManageLabels)?;
        service.delete(*path).await?;
        Ok(serde_json::json!({ "id": *path }))
    }
    .await;
    respond(result)
}

pub fn labels_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/labels")
            .route("", web::get().to(list_labels))
            .route("", web::post().to(create_label))
            .route("/{id}", web::put().to(rename_label))
            .route("/{id}", web::delete().to(delete_label)),
    );
}

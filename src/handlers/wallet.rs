use super::respond;
use crate::error::{AppError, AppResult};
use crate::middlewares::current_principal;
use crate::models::*;
use crate::services::{PaymentService, RefundService, WalletService};
use crate::utils::AccessContext;
use actix_web::{HttpRequest, HttpResponse, Result, web};

#[utoipa::path(
    get,
    path = "/wallet",
    tag = "wallet",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取钱包成功", body = WalletResponse),
        (status = 401, description = "未授权"),
        (status = 403, description = "该账号不能持有钱包")
    )
)]
pub async fn get_wallet(
    service: web::Data<WalletService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_wallet_holder()?;
        service.get_wallet(user.user_id).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/wallet/purchase",
    tag = "wallet",
    request_body = PurchaseCreditsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "创建或复用购买意图成功", body = PurchaseIntentResponse),
        (status = 400, description = "请求参数错误"),
        (status = 502, description = "支付服务不可用")
    )
)]
pub async fn purchase_credits(
    service: web::Data<PaymentService>,
    req: HttpRequest,
    request: web::Json<PurchaseCreditsRequest>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_wallet_holder()?;
        request.validate()?;
        service
            .create_or_reuse_intent(user.user_id, request.credits)
            .await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/wallet/intents/{id}",
    tag = "wallet",
    params(("id" = i32, Path, description = "购买意图ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "查询并尝试确认购买", body = IntentStatusResponse),
        (status = 403, description = "不是本人的购买意图"),
        (status = 404, description = "购买意图不存在")
    )
)]
pub async fn poll_intent(
    service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i32>,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_wallet_holder()?;
        let success = service.poll(user.user_id, *path).await?;
        Ok(IntentStatusResponse { success })
    }
    .await;
    respond(result)
}

#[utoipa::path(
    get,
    path = "/wallet/refund",
    tag = "wallet",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "可退款的购买记录", body = RefundPreviewResponse)
    )
)]
pub async fn refund_preview(
    service: web::Data<RefundService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_wallet_holder()?;
        service.preview(user.user_id).await
    }
    .await;
    respond(result)
}

#[utoipa::path(
    post,
    path = "/wallet/refund",
    tag = "wallet",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "退款成功", body = RefundResponse),
        (status = 400, description = "没有可退款的购买或退款失败")
    )
)]
pub async fn refund(service: web::Data<RefundService>, req: HttpRequest) -> Result<HttpResponse> {
    let principal = current_principal(&req);
    let result: AppResult<_> = async {
        let user = AccessContext::new(principal.as_ref()).require_wallet_holder()?;
        let refunded = service.refund_latest(user.user_id).await?;
        if !refunded.success {
            return Err(AppError::ValidationError(
                "The refund could not be processed".to_string(),
            ));
        }
        Ok(refunded)
    }
    .await;
    respond(result)
}

pub fn wallet_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("", web::get().to(get_wallet))
            .route("/purchase", web::post().to(purchase_credits))
            .route("/intents/{id}", web::get().to(poll_intent))
            .route("/refund", web::get().to(refund_preview))
            .route("/refund", web::post().to(refund)),
    );
}

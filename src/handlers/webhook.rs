use crate::services::PaymentService;
use actix_web::{HttpRequest, HttpResponse, Result, web};
use log::{error, info, warn};

/// Stripe webhook处理器
///
/// 验签失败返回 400；存储等处理错误返回 500，由 Stripe 重试（入账是幂等的）
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    payments: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let signature = match req.headers().get("stripe-signature") {
        Some(sig) => sig.to_str().unwrap_or(""),
        None => {
            warn!("Missing Stripe-Signature header");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing Stripe-Signature header"
            })));
        }
    };

    let Ok(payload) = std::str::from_utf8(&body) else {
        error!("Invalid UTF-8 in webhook payload");
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Invalid payload encoding"
        })));
    };

    let event = match payments.parse_webhook(payload, signature) {
        Ok(event) => event,
        Err(e) => {
            error!("Webhook signature verification failed: {e}");
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid signature"
            })));
        }
    };

    info!("Received Stripe webhook event: {event:?}");

    match payments.handle_webhook_event(event).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "received": true
        }))),
        Err(e) => {
            error!("Failed to process webhook event: {e}");
            Ok(HttpResponse::InternalServerError().json(serde_json::json!({
                "received": false,
                "error": "Processing failed"
            })))
        }
    }
}

/// 配置webhook路由
pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/stripe", web::post().to(stripe_webhook)));
}

pub mod comments;
pub mod labels;
pub mod stats;
pub mod tickets;
pub mod wallet;
pub mod webhook;


pub use labels::labels_config;
pub use stats::stats_config;
pub use tickets::tickets_config;
pub use wallet::wallet_config;
pub use webhook::webhook_config;

use crate::error::AppResult;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;

/// 统一的成功/失败响应体
fn respond<T: Serialize>(result: AppResult<T>) -> actix_web::Result<HttpResponse> {
    match result {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": data
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

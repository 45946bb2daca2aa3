use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 通用错误体：`{"success": false, "error": {"code", "message"}}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    #[schema(example = "VALIDATION_ERROR")]
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

/// 只携带提示信息的成功响应
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

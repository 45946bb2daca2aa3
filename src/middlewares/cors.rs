use actix_cors::Cors;
use actix_web::http::header;

/// 根据配置的来源构建 CORS；未配置来源时放开（本地开发）
pub fn create_cors(origins: &[String]) -> Cors {
    let cors = if origins.is_empty() {
        Cors::default().allowed_origin_fn(|_, _req_head| true)
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
        .allowed_header("X-Session-Key")
        .max_age(3600)
}

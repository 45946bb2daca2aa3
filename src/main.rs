use actix_web::{App, HttpServer, middleware::Logger, web};
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use chrono::Local;  // timestamp in log lines
use std::sync::Arc;

use ticket_tracker::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{SharedAuthority, StripeService},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // 支付机构
    let authority: SharedAuthority = Arc::new(
        StripeService::new(config.stripe.clone()).expect("Failed to create Stripe client"),
    );

    // 创建服务
    let wallet_service = WalletService::new(pool.clone());
    let payment_service =
        PaymentService::new(pool.clone(), authority.clone(), config.stripe.credit_price);
    let refund_service = RefundService::new(pool.clone(), authority);
    let ticket_service = TicketService::new(pool.clone());
    let vote_service = VoteService::new(pool.clone());
    let comment_service = CommentService::new(pool.clone());
    let label_service = LabelService::new(pool.clone());
    let stats_service = StatsService::new(pool.clone());

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let cors_origins = config.server.cors_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors(&cors_origins))
            .wrap(Logger::default())
            .app_data(web::Data::new(wallet_service.clone()))
            .app_data(web::Data::new(payment_service.clone()))
            .app_data(web::Data::new(refund_service.clone()))
            .app_data(web::Data::new(ticket_service.clone()))
            .app_data(web::Data::new(vote_service.clone()))
            .app_data(web::Data::new(comment_service.clone()))
            .app_data(web::Data::new(label_service.clone()))
            .app_data(web::Data::new(stats_service.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::tickets_config)
                    .configure(handlers::labels_config)
                    .configure(handlers::wallet_config)
                    .configure(handlers::stats_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}

use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::TicketType;
use crate::handlers;
use crate::models::*;
use crate::utils::DayTotal;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::tickets::list_tickets,
        handlers::tickets::create_ticket,
        handlers::tickets::get_ticket,
        handlers::tickets::update_ticket,
        handlers::tickets::delete_ticket,
        handlers::tickets::set_status,
        handlers::tickets::vote,
        handlers::comments::add_comment,
        handlers::comments::edit_comment,
        handlers::labels::list_labels,
        handlers::labels::create_label,
        handlers::labels::rename_label,
        handlers::labels::delete_label,
        handlers::wallet::get_wallet,
        handlers::wallet::purchase_credits,
        handlers::wallet::poll_intent,
        handlers::wallet::refund_preview,
        handlers::wallet::refund,
        handlers::stats::summary,
        handlers::stats::all_tickets_stats,
        handlers::stats::ticket_stats,
        handlers::stats::transaction_stats,
        handlers::stats::roadmap,
    ),
    components(
        schemas(
            TicketType,
            Stage,
            TicketStatus,
            TicketOrder,
            CreateTicketRequest,
            UpdateTicketRequest,
            TicketResponse,
            TicketDetailResponse,
            PaginatedTicketResponse,
            VoteRequest,
            VoteOutcome,
            StatusChangeResponse,
            CreateCommentRequest,
            UpdateCommentRequest,
            CommentResponse,
            CommentThread,
            LabelRequest,
            LabelResponse,
            CreditTransactionResponse,
            DebitTransactionResponse,
            WalletResponse,
            PurchaseCreditsRequest,
            PurchaseIntentResponse,
            IntentStatusResponse,
            RefundPreviewResponse,
            RefundResponse,
            DayTotal,
            TicketLink,
            SummaryStats,
            DateRangeInfo,
            TicketChartData,
            TicketStatsResponse,
            AllTicketsChartData,
            TopTicket,
            AllTicketsStatsResponse,
            TransactionChartData,
            TransactionStatsResponse,
            RoadmapItem,
            RoadmapResponse,
            ApiError,
            ApiErrorResponse,
            MessageResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "tickets", description = "Bug report and feature request API"),
        (name = "comments", description = "Ticket comment API"),
        (name = "labels", description = "Label management API"),
        (name = "wallet", description = "Credits, purchases and refunds API"),
        (name = "stats", description = "Statistics and roadmap API"),
    ),
    info(
        title = "Ticket Tracker API",
        version = "0.1.0",
        description = "Ticket Tracker REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

pub mod comment_service;
pub mod label_service;
pub mod payment_service;
pub mod refund_service;
pub mod stats_service;
pub mod ticket_service;
pub mod vote_service;
pub mod wallet_service;

pub use comment_service::CommentService;
pub use label_service::LabelService;
pub use payment_service::PaymentService;
pub use refund_service::RefundService;
pub use stats_service::StatsService;
pub use ticket_service::TicketService;
pub use vote_service::VoteService;
pub use wallet_service::WalletService;

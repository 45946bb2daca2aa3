pub mod comments;
pub mod credit_transactions;
pub mod debit_transactions;
pub mod labels;
pub mod pageviews;
pub mod payment_intents;
pub mod ticket_labels;
pub mod tickets;
pub mod votes;
pub mod wallets;

pub use comments as comment_entity;
pub use credit_transactions as credit_transaction_entity;
pub use debit_transactions as debit_transaction_entity;
pub use labels as label_entity;
pub use pageviews as pageview_entity;
pub use payment_intents as payment_intent_entity;
pub use ticket_labels as ticket_label_entity;
pub use tickets as ticket_entity;
pub use votes as vote_entity;
pub use wallets as wallet_entity;

pub use tickets::TicketType;

pub mod comment;
pub mod common;
pub mod label;
pub mod pagination;
pub mod stats;
pub mod ticket;
pub mod wallet;

pub use comment::*;
pub use common::*;
pub use label::*;
pub use pagination::*;
pub use stats::*;
pub use ticket::*;
pub use wallet::*;

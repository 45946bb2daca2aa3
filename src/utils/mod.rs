pub mod aggregation;
pub mod jwt;
pub mod permissions;

pub use aggregation::*;
pub use jwt::*;
pub use permissions::*;

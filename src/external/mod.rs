pub mod payment;
pub mod stripe;

pub use self::payment::*;
pub use self::stripe::StripeService;

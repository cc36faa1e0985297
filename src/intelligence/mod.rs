pub mod factors;
pub mod inference;

pub use factors::collect_factors;
pub use inference::{InferenceClient, InferenceError, MarketContext};

mod rate_limit;
mod router;
mod state;

pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use router::build_router;
pub use state::ServeState;

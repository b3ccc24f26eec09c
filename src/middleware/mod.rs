pub mod auth;
pub mod permission;
pub mod rate_limit;
pub mod recover;
pub mod request_id;
pub mod response;

pub use auth::{authenticate, Principal};
pub use permission::{require_permission, PermissionGate};
pub use rate_limit::{rate_limit, RateLimitConfig, RateLimiter};
pub use response::{ApiResponse, ApiResult};

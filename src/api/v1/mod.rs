mod cookie;
mod error;
mod handler;
mod router;
mod session;

pub use cookie::{ACCESS_COOKIE_NAME, CookiePolicy, REFRESH_COOKIE_NAME};
pub use error::{ApiErrorCode, recover_error};
pub use router::routes;
pub use session::{with_role, with_session};

//! Browser-side half of the session: a cookie-jar HTTP client whose
//! protected calls survive access-token expiry through a shared refresh.

mod coordinator;
mod error;
mod http;

pub use coordinator::*;
pub use error::*;
pub use http::*;

//! In-process backends. Used by the test suites and by `backend = "memory"`
//! in settings for local runs without Redis or MySQL.

mod refresh_store_memory;
mod user_repo_memory;

pub use refresh_store_memory::*;
pub use user_repo_memory::*;

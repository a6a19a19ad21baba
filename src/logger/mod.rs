//! Process-wide tracing setup. Starts at `info` (or `RUST_LOG`) and is
//! narrowed to the configured filter once settings are parsed.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};

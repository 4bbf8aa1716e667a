//! Configuration, filesystem paths and logging bootstrap for biogate.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, Secrets, DEFAULT_AUTH_API_URL, DEFAULT_COMPLETION_API_URL, DEFAULT_COMPLETION_MAX_TOKENS,
    DEFAULT_COMPLETION_MODEL, DEFAULT_COUNTRY_API_URL, DEFAULT_LOG_LEVEL, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_POLL_MAX_ATTEMPTS, DEFAULT_REQUEST_FROM,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;

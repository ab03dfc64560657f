//! Logging utilities for the crapc library
//!
//! This module provides the default failure logger used by
//! [`JsonInterface`](crate::jsonrpc::JsonInterface) and convenient re-exports
//! of the log crate macros for consistent logging across the library.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::Error;
use crate::jsonrpc::ErrorCode;

/// Error returned by a failure logger
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Observes every error before it is turned into a response.
///
/// It sees the full error, including detail that is never sent to the
/// client. Returning `Err` marks the response message, nothing more.
pub type ErrorLogger = Arc<dyn Fn(&Error) -> Result<(), BoxError> + Send + Sync>;

/// Log a dispatch failure through the `log` facade.
///
/// Client mistakes go out at debug level, everything else at error level.
pub fn log_failure(err: &Error) -> Result<(), BoxError> {
    match ErrorCode::from_error(err) {
        ErrorCode::InternalError => error!("request failed: {}", err),
        code => debug!("request rejected ({}): {}", code.code(), err),
    }
    Ok(())
}

/// [`log_failure`] as a replaceable hook
pub fn default_logger() -> ErrorLogger {
    Arc::new(log_failure)
}

// Re-export the log crate and its macros
pub use log::{LevelFilter, debug, error, info, trace, warn};

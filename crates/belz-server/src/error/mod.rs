//! Error handling for the Belz API server.

pub mod response;
pub mod types;

pub use types::{ApiError, ApiResult};

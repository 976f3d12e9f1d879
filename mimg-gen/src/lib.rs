//! mimg-gen library interface for integration testing

pub mod api;
pub mod error;
pub mod services;

pub use crate::api::server::{build_router, AppContext};
pub use crate::error::{ApiError, ApiResult};

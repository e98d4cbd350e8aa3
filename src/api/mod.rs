//! Backend API access.
//!
//! `ApiClient` owns transport and the response envelope; `endpoints` holds
//! one typed function per backend route. Errors are `ApiError` throughout.

pub mod client;
pub mod endpoints;
pub mod error;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::ApiClient;
pub use error::{ApiError, ErrorKind, ErrorPresentation};

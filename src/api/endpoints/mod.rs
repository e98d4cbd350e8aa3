//! Typed backend endpoints.
//!
//! One module per resource. Every function is a thin call through
//! `ApiClient`; paths are relative to the `/api/v1` prefix.

pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod files;
pub mod pipeline;
pub mod projects;
pub mod review;

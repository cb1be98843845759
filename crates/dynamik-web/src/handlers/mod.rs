//! HTTP handlers for all web routes.

pub mod api;
pub mod results;
pub mod setup;
pub mod upload;

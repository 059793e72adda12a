//! HTTP route handlers.

pub mod health;
pub mod landing;
pub mod metrics;

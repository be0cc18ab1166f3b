//! HTTP handlers for tenant-aware routes.

pub mod tenant;
pub use tenant::*;

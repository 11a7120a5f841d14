//! Data models for the FixFinder marketplace.
//!
//! Field names serialize in camelCase to match the web client.

mod conversation;
mod offer;
mod service_request;
mod user;

pub use conversation::*;
pub use offer::*;
pub use service_request::*;
pub use user::*;

//! trailmate/crates/tm-core/src/lib.rs
//!
//! The domain model and interface definitions for TrailMate.

pub mod error;
pub mod feed;
pub mod models;
pub mod traits;
pub mod validation;

// Re-exporting for easier access in other crates
pub use error::*;
pub use feed::{FeedEvent, FeedSender, LiveFeed};
pub use models::*;
pub use traits::*;

//! Resource manager
//!
//! - **engine**: the manager itself plus its background processor
//! - **completion**: the per-request single-shot completion primitive

pub mod completion;
pub mod engine;

pub use completion::FutureRequestStatus;
pub use engine::ResourceManager;

// Application layer - use cases and orchestration

pub mod directory;
pub mod error;
pub mod outbox;
pub mod service;

pub use directory::*;
pub use error::*;
pub use outbox::*;
pub use service::*;

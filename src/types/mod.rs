//! Core types shared by the adapters, the router and both ends of the channel.

pub mod events;
pub mod options;
pub mod provider_id;

// Re-export commonly used types
pub use events::*;
pub use options::*;
pub use provider_id::*;

//! Shared types for the isoraster workspace: the plate-carrée grid scheme,
//! sparse tiled storage, binary blobs and readers/writers, the routing-data
//! cache, the progress sink, and concurrency-limit tuning.

pub mod concurrency;
pub use concurrency::*;
pub mod config;
pub use config::*;
pub mod io;
pub mod macros;
pub mod progress;
pub mod types;
pub use types::*;

//! One-to-many travel-time propagation (components 4.G, 4.I): opportunity
//! tiles and the request-level processor that combines a street search, an
//! optional transit search, and an egress table into travel-time durations
//! and an access histogram for a single origin.

mod opportunity;
mod processor;

pub use opportunity::*;
pub use processor::*;

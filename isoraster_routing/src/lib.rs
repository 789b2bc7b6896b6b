//! isoraster routing: street and transit search, the per-cell connector and
//! egress-tile evaluations, and the egress-table builder that turns a
//! transport network into a [`SparseEgressTable`] ready for the propagation
//! pipeline.
//!
//! The underlying street graph and transit schedule are external
//! collaborators ([`StreetLayer`], [`TransitLayer`]) supplied by the caller;
//! this crate only consumes them through their trait boundary.

mod connector;
mod egress_builder;
mod egress_tile;
mod sparse_egress_table;
mod street;
mod transit;

pub use connector::*;
pub use egress_builder::*;
pub use egress_tile::*;
pub use sparse_egress_table::*;
pub use street::*;
pub use transit::*;

//! # isoraster
//!
//! A cumulative-opportunities accessibility engine: builds street/transit
//! egress tables (component E) and renders travel-time and opportunity
//! rasters (component I) from them.
//!
//! This crate is the binary's glue: CLI entry point, the on-disk network/
//! opportunity-grid file adapters that stand in for a real OSM/GTFS loader,
//! the [`RoutingResources`](isoraster_batch::RoutingResources) wiring for
//! batch runs, and run configuration. The routing, propagation, and batch
//! algorithms themselves live in their own crates, re-exported below.

pub mod config;
pub mod density_grid;
pub mod network;
pub mod resources;
pub mod tools;

pub use isoraster_batch as batch;
pub use isoraster_core as core;
pub use isoraster_derive as derive;
pub use isoraster_image as image;
pub use isoraster_propagation as propagation;
pub use isoraster_routing as routing;

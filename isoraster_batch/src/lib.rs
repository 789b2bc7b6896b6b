//! Many-to-many batch jobs (§4.J/§4.K/§4.L): job state and its results
//! buffer, the single-lock job manager that serialises task dispatch and
//! schedules finalization, the worker-pool that drains tasks through the
//! one-to-many processor, and the visual-progress event streams a batch
//! client watches.

pub mod job;
pub mod manager;
pub mod visual_progress;
pub mod worker_pool;

pub use job::*;
pub use manager::*;
pub use visual_progress::*;
pub use worker_pool::*;

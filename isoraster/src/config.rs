//! The binary's typed configuration (§ ambient stack "Configuration"):
//! wraps [`isoraster_core::Config`]'s cache kind with a worker-pool sizing
//! override, built straight from CLI flags. No config file format is
//! introduced; this only exists so the subcommands construct their
//! collaborators from one place instead of scattering flag reads.

use isoraster_core::config::{CacheKind, Config};

/// Resolved run configuration: the routing-data cache kind and how many
/// worker threads a `batch` run should use.
pub struct RunConfig {
	pub core: Config,
	pub pool_size: Option<usize>,
}

impl RunConfig {
	#[must_use]
	pub fn new(disk_cache: bool, pool_size: Option<usize>) -> RunConfig {
		RunConfig {
			core: Config { cache: if disk_cache { CacheKind::new_disk() } else { CacheKind::new_memory() } },
			pool_size,
		}
	}

	#[must_use]
	pub fn resolved_pool_size(&self) -> usize {
		self.pool_size.unwrap_or_else(isoraster_batch::default_pool_size)
	}
}

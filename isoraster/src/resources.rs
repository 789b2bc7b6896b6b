//! Wires the [`RoutingResources`] collaborator boundary to on-disk data: a
//! network id resolves to a JSON street/transit description under a data
//! directory, an egress id to a built [`SparseEgressTable`] binary, and a
//! destination id to an opportunity-grid binary or JSON density file.
//!
//! [`isoraster_core::RoutingDataCache`] is generic over a `Sized` payload,
//! so it caches the two owned record types directly
//! (`RoutingDataCache<SparseEgressTable>`, `RoutingDataCache<OpportunityGrid>`);
//! street/transit collaborators are trait objects (`dyn StreetLayer`), which
//! don't fit that cache without an extra `Box` indirection, so this module
//! keeps its own small id -> `Arc<dyn _>` map for those two instead.

use anyhow::{Context, Result};
use isoraster_batch::RoutingResources;
use isoraster_core::{Blob, RoutingDataCache};
use isoraster_propagation::OpportunityGrid;
use isoraster_routing::{SparseEgressTable, StreetLayer, TransitLayer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::density_grid::load_opportunity_grid;
use crate::network::{NoTransitLayer, load_street, load_transit};

/// [`RoutingResources`] backed by a flat data directory: every id names a
/// file relative to `data_dir`, built ahead of time by `build-egress` or
/// authored by hand for small test networks.
pub struct FileRoutingResources {
	data_dir: PathBuf,
	street_transit: Mutex<HashMap<String, (Arc<dyn StreetLayer>, Option<Arc<dyn TransitLayer>>)>>,
	egress_cache: RoutingDataCache<SparseEgressTable>,
	opportunity_cache: RoutingDataCache<OpportunityGrid>,
}

impl FileRoutingResources {
	#[must_use]
	pub fn new(data_dir: PathBuf) -> FileRoutingResources {
		FileRoutingResources {
			data_dir,
			street_transit: Mutex::new(HashMap::new()),
			egress_cache: RoutingDataCache::new(),
			opportunity_cache: RoutingDataCache::new(),
		}
	}

	fn load_network(&self, network_id: &str) -> Result<(Arc<dyn StreetLayer>, Option<Arc<dyn TransitLayer>>)> {
		if let Some(cached) = self.street_transit.lock().expect("street/transit cache lock poisoned").get(network_id) {
			return Ok(cached.clone());
		}
		let street: Arc<dyn StreetLayer> = Arc::new(load_street(&self.data_dir, network_id)?);
		let transit: Option<Arc<dyn TransitLayer>> = load_transit(&self.data_dir, network_id)?.map(|t| Arc::new(t) as Arc<dyn TransitLayer>);
		let entry = (street, transit);
		self
			.street_transit
			.lock()
			.expect("street/transit cache lock poisoned")
			.insert(network_id.to_string(), entry.clone());
		Ok(entry)
	}
}

impl RoutingResources for FileRoutingResources {
	fn street(&self, network_id: &str) -> Result<Arc<dyn StreetLayer>> {
		Ok(self.load_network(network_id)?.0)
	}

	fn transit(&self, network_id: &str) -> Result<Option<Arc<dyn TransitLayer>>> {
		Ok(self.load_network(network_id)?.1)
	}

	fn egress(&self, egress_id: &str) -> Result<Arc<SparseEgressTable>> {
		self.egress_cache.get_or_load(egress_id, || {
			let path = self.data_dir.join(format!("{egress_id}.egress.bin"));
			let bytes = std::fs::read(&path).with_context(|| format!("reading egress table {}", path.display()))?;
			SparseEgressTable::from_bytes(Blob::from(bytes))
		})
	}

	fn opportunities(&self, destination_id: &str) -> Result<Arc<OpportunityGrid>> {
		self.opportunity_cache.get_or_load(destination_id, || {
			let bin_path = self.data_dir.join(format!("{destination_id}.opportunities.bin"));
			if bin_path.exists() {
				let bytes = std::fs::read(&bin_path).with_context(|| format!("reading opportunity grid {}", bin_path.display()))?;
				return OpportunityGrid::from_bytes(Blob::from(bytes));
			}
			let json_path = self.data_dir.join(format!("{destination_id}.json"));
			load_opportunity_grid(&json_path)
		})
	}
}

/// Builds a concrete zero-stop transit layer for a network with no schedule
/// file, so callers that need a `&dyn TransitLayer` unconditionally (e.g.
/// [`isoraster_routing::build_egress_table`]) always have one.
#[must_use]
pub fn no_transit() -> Arc<dyn TransitLayer> {
	Arc::new(NoTransitLayer)
}

//! Name/version lookup over the graph's run and build nodes.
//!
//! Each package name maps to a list of `{run, build}` entries sorted by
//! the run node's version interval, lowest first. Remote nodes fill the
//! run slot. The table is a view over the node set and can be rebuilt at
//! any time; a graph fresh from deserialization has no table until the
//! first query touches it.

use std::collections::HashMap;

use tracing::{debug, error, trace, warn};

use crate::error::{GraphError, Result};
use crate::node::NodeRole;
use crate::pkgver::{PackageVer, PkgVerInterval, VersionBound};

use super::{NodeId, PkgGraph};

/// The `{run, build}` pair indexed under a package name.
///
/// At rest `run_node` is always populated; build-only entries exist only
/// transiently during a deferred-sort bulk rebuild and are repaired away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupNode {
	/// Run or Remote node tracking the package's run-time presence.
	pub run_node: Option<NodeId>,
	/// Build node for the package; absent for remote packages.
	pub build_node: Option<NodeId>,
}

impl PkgGraph {
	/// Builds the lookup table if it doesn't exist yet.
	pub(crate) fn ensure_lookup(&mut self) {
		if self.lookup.is_some() {
			return;
		}
		self.lookup = Some(HashMap::new());

		// Run and remote nodes go in first so every entry has its run slot
		// before any build node comes looking for one.
		let all = self.all_nodes();
		for &id in &all {
			if self.has_run_role(id) {
				let _ = self.add_to_lookup(id, true);
			}
		}
		for &id in &all {
			if !self.has_run_role(id) {
				let _ = self.add_to_lookup(id, true);
			}
		}

		// Entries that never found a run node are repaired by deleting the
		// orphaned build node. Subgraph extraction over a repaired cycle
		// can produce these legitimately.
		let mut lookup = self.lookup.take().expect("lookup just created");
		let mut orphans = Vec::new();
		for (name, bucket) in lookup.iter_mut() {
			bucket.retain(|entry| {
				if entry.run_node.is_some() {
					return true;
				}
				debug!("Lookup for {} has no run node, lost in a cycle fix? Removing it", name);
				if let Some(build) = entry.build_node {
					orphans.push(build);
				}
				false
			});
		}
		for orphan in orphans {
			self.remove_node_raw(orphan);
		}

		for bucket in lookup.values_mut() {
			bucket.sort_by(|a, b| self.run_interval(a).cmp(&self.run_interval(b)));
		}
		self.lookup = Some(lookup);
	}

	fn has_run_role(&self, id: NodeId) -> bool {
		self.node(id)
			.map(|n| matches!(n.role, NodeRole::Run | NodeRole::Remote))
			.unwrap_or(false)
	}

	/// Sort key of an entry: the run node's interval. The build node is
	/// deliberately never consulted.
	fn run_interval(&self, entry: &LookupNode) -> PkgVerInterval {
		entry
			.run_node
			.and_then(|id| self.node(id))
			.and_then(|n| n.versioned_pkg.as_ref())
			.and_then(|pkg| pkg.interval().ok())
			.unwrap_or_default()
	}

	fn validate_node_for_lookup(&self, id: NodeId) -> Result<()> {
		let node = self.node(id).ok_or(GraphError::NodeNotFound(id.0))?;
		if !node.role.is_indexable() {
			return Err(GraphError::InvalidNodeRole { node: node.friendly_name() });
		}
		// Reachable through deserialized payloads, so the message must not
		// rely on friendly_name(), which assumes the package is present.
		let pkg = node.versioned_pkg.as_ref().ok_or_else(|| GraphError::InvalidInterval {
			node: node.to_string(),
			reason: "has no package version".to_string(),
		})?;

		// Conflicting entries for the same name and version.
		if let Some((_, entry)) = self.exact_slot(pkg)? {
			let duplicate = match node.role {
				NodeRole::Build => entry.build_node.is_some(),
				// A remote node provides the same utility as a run node
				NodeRole::Run | NodeRole::Remote => entry.run_node.is_some(),
				_ => false,
			};
			if duplicate {
				return Err(GraphError::DuplicateLookup { node: node.friendly_name() });
			}
		}

		let interval = pkg.interval().map_err(|err| {
			error!("Failed to create version interval for {}", node);
			err
		})?;

		// Only remote nodes may carry two-sided constraints.
		if node.role != NodeRole::Remote {
			if interval.upper_bound != VersionBound::Maximum && interval.upper_bound != interval.lower_bound {
				return Err(GraphError::InvalidInterval {
					node: node.friendly_name(),
					reason: "is a run node and can't have double conditionals".to_string(),
				});
			}
			if !interval.lower_inclusive {
				return Err(GraphError::InvalidInterval {
					node: node.friendly_name(),
					reason: "is a run node and can't have non-inclusive lower bounds ('ver > ?')".to_string(),
				});
			}
		}
		Ok(())
	}

	/// Registers a node with the lookup table. Non-indexable roles are
	/// skipped silently. With `defer_sort` the bucket is left unsorted and
	/// a build node may arrive before its run node (bulk rebuild).
	pub(crate) fn add_to_lookup(&mut self, id: NodeId, defer_sort: bool) -> Result<()> {
		let node = self.node(id).ok_or(GraphError::NodeNotFound(id.0))?;
		let role = node.role;
		if !role.is_indexable() {
			trace!("Skipping {}, not valid for lookup", node);
			return Ok(());
		}
		self.validate_node_for_lookup(id)?;

		let node = self.node(id).expect("node just validated");
		trace!("Adding {} to lookup", node);
		let pkg = node.versioned_pkg.clone().expect("indexable node without a package");

		let slot = self.exact_slot(&pkg)?;
		if slot.is_none() && !defer_sort && role == NodeRole::Build {
			return Err(GraphError::MissingRunNode { node: self.describe(id) });
		}

		let mut lookup = self.lookup.take().expect("lookup initialized before inserts");
		let bucket = lookup.entry(pkg.name.clone()).or_default();
		let entry_index = match slot {
			Some((i, _)) => i,
			None => {
				bucket.push(LookupNode::default());
				bucket.len() - 1
			}
		};
		// Occupancy was checked during validation.
		match role {
			NodeRole::Build => bucket[entry_index].build_node = Some(id),
			NodeRole::Run | NodeRole::Remote => bucket[entry_index].run_node = Some(id),
			_ => unreachable!("role checked above"),
		}

		if !defer_sort {
			bucket.sort_by(|a, b| self.run_interval(a).cmp(&self.run_interval(b)));
		}
		self.lookup = Some(lookup);
		Ok(())
	}

	/// Finds the entry whose run interval exactly equals the request,
	/// along with its bucket position. The table must already exist.
	fn exact_slot(&self, pkg: &PackageVer) -> Result<Option<(usize, LookupNode)>> {
		let requested = pkg.interval()?;
		let lookup = self.lookup.as_ref().expect("lookup initialized before queries");
		let Some(bucket) = lookup.get(&pkg.name) else { return Ok(None) };

		let mut found = None;
		for (i, entry) in bucket.iter().enumerate() {
			let Some(run) = entry.run_node else {
				return Err(self.orphaned_build(entry, &pkg.name));
			};
			if self.node_interval(run)? == requested {
				found = Some((i, *entry));
			}
		}
		Ok(found)
	}

	fn node_interval(&self, id: NodeId) -> Result<PkgVerInterval> {
		match self.node(id).and_then(|n| n.versioned_pkg.as_ref()) {
			Some(pkg) => pkg.interval(),
			None => Ok(PkgVerInterval::default()),
		}
	}

	fn orphaned_build(&self, entry: &LookupNode, name: &str) -> GraphError {
		let node = entry
			.build_node
			.map(|b| self.describe(b))
			.unwrap_or_else(|| "<none>".to_string());
		GraphError::OrphanedBuildNode { node, name: name.to_string() }
	}

	/// Entry whose run interval equals the request exactly, or `None`.
	pub fn find_exact_pkg(&mut self, pkg: &PackageVer) -> Result<Option<LookupNode>> {
		self.ensure_lookup();
		Ok(self.exact_slot(pkg)?.map(|(_, entry)| entry))
	}

	/// Highest-versioned entry whose run interval satisfies the request.
	/// Supports two-sided requests. Warns when a remote entry wins over a
	/// satisfying local one, since there is no fallback once the remote
	/// turns out to be unavailable.
	pub fn find_double_conditional_pkg(&mut self, pkg: &PackageVer) -> Result<Option<LookupNode>> {
		self.ensure_lookup();
		let requested = pkg.interval()?;
		let lookup = self.lookup.as_ref().expect("lookup initialized before queries");
		let Some(bucket) = lookup.get(&pkg.name) else { return Ok(None) };

		let mut best_local: Option<LookupNode> = None;
		let mut chosen: Option<LookupNode> = None;
		for entry in bucket {
			let Some(run) = entry.run_node else {
				return Err(self.orphaned_build(entry, &pkg.name));
			};
			if self.node_interval(run)?.satisfies(&requested) {
				// Only local packages have a build node
				if entry.build_node.is_some() {
					best_local = Some(*entry);
				}
				// Keep going, the bucket is sorted lowest first
				chosen = Some(*entry);
			}
		}

		if let (Some(local), Some(winner)) = (best_local, chosen) {
			if local.run_node != winner.run_node {
				let fmt_node = |entry: &LookupNode| {
					entry
						.run_node
						.and_then(|r| self.node(r))
						.map(|n| n.to_string())
						.unwrap_or_default()
				};
				warn!(
					"Resolving '{}' to remote node '{}' instead of local node '{}'",
					pkg,
					fmt_node(&winner),
					fmt_node(&local)
				);
			}
		}
		Ok(chosen)
	}

	/// Alias for [`Self::find_double_conditional_pkg`].
	pub fn find_best_pkg(&mut self, pkg: &PackageVer) -> Result<Option<LookupNode>> {
		self.find_double_conditional_pkg(pkg)
	}

	/// Removes a node's lookup entry without touching the graph.
	pub(crate) fn remove_node_from_lookup(&mut self, id: NodeId) {
		let name = self.node(id).and_then(|n| n.versioned_pkg.as_ref()).map(|p| p.name.clone());
		if let Some(name) = name {
			self.splice_lookup_entry(&name, id);
		}
	}

	/// Splices out the entry referencing `id`, preserving bucket order.
	pub(crate) fn splice_lookup_entry(&mut self, name: &str, id: NodeId) {
		let Some(lookup) = self.lookup.as_mut() else { return };
		let Some(bucket) = lookup.get_mut(name) else { return };
		if let Some(pos) = bucket
			.iter()
			.position(|e| e.run_node == Some(id) || e.build_node == Some(id))
		{
			bucket.remove(pos);
		}
	}

	/// Every node occupying a run slot, ascending by id.
	pub fn all_run_nodes(&mut self) -> Vec<NodeId> {
		self.ensure_lookup();
		let lookup = self.lookup.as_ref().expect("lookup initialized");
		let mut out: Vec<NodeId> = lookup.values().flatten().filter_map(|e| e.run_node).collect();
		out.sort_unstable();
		out
	}

	/// Every node occupying a build slot, ascending by id.
	pub fn all_build_nodes(&mut self) -> Vec<NodeId> {
		self.ensure_lookup();
		let lookup = self.lookup.as_ref().expect("lookup initialized");
		let mut out: Vec<NodeId> = lookup.values().flatten().filter_map(|e| e.build_node).collect();
		out.sort_unstable();
		out
	}
}

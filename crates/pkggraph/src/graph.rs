//! The package dependency graph.
//!
//! [`PkgGraph`] owns every node, keyed by a [`NodeId`] that is unique and
//! monotonic for the lifetime of the graph. Edges point from dependent to
//! dependency. A name/version lookup table is maintained in lockstep with
//! node insertion and removal; see [`LookupNode`] for the query side.

use std::collections::HashMap;

use petgraph::prelude::*;
use tracing::{debug, error, trace, warn};

use crate::error::{GraphError, Result};
use crate::node::{NodeRole, NodeState, PkgNode, NO_REPO, NO_RPM_PATH, NO_SRPM_PATH};
use crate::pkgver::PackageVer;

mod dag;
mod lookup;

pub use lookup::LookupNode;

/// Unique node identifier within one [`PkgGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

pub struct PkgGraph {
	graph: StableDiGraph<PkgNode, ()>,
	indices: HashMap<NodeId, NodeIndex>,
	next_id: u64,
	/// Lazily built so a graph can be decoded before the table exists;
	/// `None` means "rebuild from the node set on first use".
	lookup: Option<HashMap<String, Vec<LookupNode>>>,
}

impl Default for PkgGraph {
	fn default() -> Self {
		Self::new()
	}
}

impl PkgGraph {
	pub fn new() -> Self {
		PkgGraph {
			graph: StableDiGraph::new(),
			indices: HashMap::new(),
			next_id: 0,
			lookup: None,
		}
	}

	pub fn len(&self) -> usize {
		self.graph.node_count()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.node_count() == 0
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.indices.contains_key(&id)
	}

	pub fn node(&self, id: NodeId) -> Option<&PkgNode> {
		self.idx(id).map(|idx| &self.graph[idx])
	}

	pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut PkgNode> {
		self.idx(id).map(|idx| &mut self.graph[idx])
	}

	pub fn nodes(&self) -> impl Iterator<Item = &PkgNode> {
		self.graph.node_weights()
	}

	/// All node ids, ascending.
	pub fn all_nodes(&self) -> Vec<NodeId> {
		let mut ids: Vec<NodeId> = self.indices.keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	/// Every edge as a `(from, to)` pair, sorted.
	pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
		let mut out: Vec<(NodeId, NodeId)> = self
			.graph
			.edge_indices()
			.map(|e| {
				let (a, b) = self.graph.edge_endpoints(e).expect("edge without endpoints");
				(self.graph[a].id, self.graph[b].id)
			})
			.collect();
		out.sort_unstable();
		out
	}

	fn idx(&self, id: NodeId) -> Option<NodeIndex> {
		self.indices.get(&id).copied()
	}

	pub(crate) fn alloc_node_id(&mut self) -> NodeId {
		let id = NodeId(self.next_id);
		self.next_id += 1;
		id
	}

	fn insert_node(&mut self, mut node: PkgNode) -> NodeId {
		let id = self.alloc_node_id();
		node.id = id;
		let idx = self.graph.add_node(node);
		self.indices.insert(id, idx);
		id
	}

	/// Inserts a node that already carries an id (deserialization and
	/// subgraph extraction). Bumps the id counter past it.
	pub(crate) fn add_existing_node(&mut self, node: PkgNode) -> Result<NodeId> {
		let id = node.id;
		if self.indices.contains_key(&id) {
			return Err(GraphError::DuplicateNodeId(id.0));
		}
		self.next_id = self.next_id.max(id.0 + 1);
		let idx = self.graph.add_node(node);
		self.indices.insert(id, idx);
		Ok(id)
	}

	fn remove_node_raw(&mut self, id: NodeId) {
		if let Some(idx) = self.indices.remove(&id) {
			self.graph.remove_node(idx);
		}
	}

	fn describe(&self, id: NodeId) -> String {
		self.node(id).map(|n| n.friendly_name()).unwrap_or_else(|| format!("id {id}"))
	}

	fn edge_failure(&self, from: NodeId, to: NodeId) -> GraphError {
		let srpm = |id: NodeId| {
			self.node(id).map(|n| n.srpm_path.clone()).unwrap_or_else(|| format!("id {id}"))
		};
		GraphError::EdgeFailure { from: srpm(from), to: srpm(to) }
	}

	pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
		match (self.idx(from), self.idx(to)) {
			(Some(a), Some(b)) => self.graph.find_edge(a, b).is_some(),
			_ => false,
		}
	}

	/// Adds a directed edge. Duplicate edges, self loops, and unknown
	/// endpoints are rejected with a recoverable error.
	pub fn add_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
		trace!("Adding edge: {} -> {}", self.describe(from), self.describe(to));
		if self.has_edge(from, to) {
			return Err(self.edge_failure(from, to));
		}
		self.set_edge(from, to)
	}

	/// Like [`Self::add_edge`] but idempotent on duplicates. Internal
	/// construction paths (meta nodes, collapse mirroring) use this so a
	/// shared dependent doesn't abort the operation.
	pub(crate) fn set_edge(&mut self, from: NodeId, to: NodeId) -> Result<()> {
		if from == to {
			return Err(self.edge_failure(from, to));
		}
		let (a, b) = match (self.idx(from), self.idx(to)) {
			(Some(a), Some(b)) => (a, b),
			_ => return Err(self.edge_failure(from, to)),
		};
		if self.graph.find_edge(a, b).is_none() {
			self.graph.add_edge(a, b, ());
		}
		Ok(())
	}

	/// Removes an edge if present.
	pub fn remove_edge(&mut self, from: NodeId, to: NodeId) {
		if let (Some(a), Some(b)) = (self.idx(from), self.idx(to)) {
			if let Some(edge) = self.graph.find_edge(a, b) {
				self.graph.remove_edge(edge);
			}
		}
	}

	/// Predecessor ids of `id` (its dependents), ascending.
	pub fn to(&self, id: NodeId) -> Vec<NodeId> {
		self.neighbors(id, Incoming)
	}

	/// Successor ids of `id` (its dependencies), ascending.
	pub fn from(&self, id: NodeId) -> Vec<NodeId> {
		self.neighbors(id, Outgoing)
	}

	fn neighbors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
		let Some(idx) = self.idx(id) else { return Vec::new() };
		let mut out: Vec<NodeId> = self
			.graph
			.neighbors_directed(idx, direction)
			.map(|n| self.graph[n].id)
			.collect();
		out.sort_unstable();
		out
	}

	/// Adds a new package node and registers it with the lookup table.
	/// When registration fails the node is left in the graph, unindexed,
	/// and the error is returned; the caller may remove it.
	#[allow(clippy::too_many_arguments)]
	pub fn add_pkg_node(
		&mut self,
		pkg: PackageVer,
		state: NodeState,
		role: NodeRole,
		srpm_path: &str,
		rpm_path: &str,
		spec_path: &str,
		source_dir: &str,
		architecture: &str,
		source_repo: &str,
	) -> Result<NodeId> {
		let (id, indexed) =
			self.try_add_pkg_node(pkg, state, role, srpm_path, rpm_path, spec_path, source_dir, architecture, source_repo);
		indexed.map(|()| id)
	}

	#[allow(clippy::too_many_arguments)]
	fn try_add_pkg_node(
		&mut self,
		pkg: PackageVer,
		state: NodeState,
		role: NodeRole,
		srpm_path: &str,
		rpm_path: &str,
		spec_path: &str,
		source_dir: &str,
		architecture: &str,
		source_repo: &str,
	) -> (NodeId, Result<()>) {
		// The table has to exist before the insert, otherwise a later lazy
		// rebuild would try to repair this node as an orphan.
		self.ensure_lookup();

		let implicit = pkg.is_implicit();
		let node = PkgNode {
			id: NodeId(0),
			versioned_pkg: Some(pkg),
			state,
			role,
			srpm_path: srpm_path.to_string(),
			rpm_path: rpm_path.to_string(),
			spec_path: spec_path.to_string(),
			source_dir: source_dir.to_string(),
			architecture: architecture.to_string(),
			source_repo: source_repo.to_string(),
			goal_name: String::new(),
			implicit,
		};
		let id = self.insert_node(node);
		let indexed = self.add_to_lookup(id, false);
		(id, indexed)
	}

	/// Removes a node and splices its lookup entry out. Removing either
	/// half of a `{run, build}` pair drops the whole entry; the partner is
	/// re-indexed (or repaired away) on the next lazy rebuild.
	pub fn remove_pkg_node(&mut self, id: NodeId) {
		let name = self.node(id).and_then(|n| n.versioned_pkg.as_ref()).map(|p| p.name.clone());
		self.remove_node_raw(id);
		if let Some(name) = name {
			self.splice_lookup_entry(&name, id);
		}
	}

	/// Copies a node under a fresh id. The clone has no edges and is not
	/// registered with the lookup table.
	pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId> {
		let node = self.node(id).ok_or(GraphError::NodeNotFound(id.0))?.clone();
		Ok(self.insert_node(node))
	}

	/// Adds a meta node with edges `from[i] -> meta -> to[i]`.
	pub fn add_meta_node(&mut self, from: &[NodeId], to: &[NodeId]) -> Result<NodeId> {
		let meta = PkgNode {
			id: NodeId(0),
			versioned_pkg: None,
			state: NodeState::Meta,
			role: NodeRole::PureMeta,
			srpm_path: String::new(),
			rpm_path: String::new(),
			spec_path: String::new(),
			source_dir: String::new(),
			architecture: String::new(),
			source_repo: String::new(),
			goal_name: String::new(),
			implicit: false,
		};
		let meta_id = self.insert_node(meta);

		if let Err(err) = self.connect_meta_node(meta_id, from, to) {
			let names = |ids: &[NodeId]| ids.iter().map(|&n| self.describe(n)).collect::<Vec<_>>().join(" ");
			error!("Couldn't add meta node from [{}] to [{}]", names(from), names(to));
			self.remove_node_raw(meta_id);
			return Err(GraphError::MetaNodeFailed { source: Box::new(err) });
		}
		Ok(meta_id)
	}

	fn connect_meta_node(&mut self, meta_id: NodeId, from: &[NodeId], to: &[NodeId]) -> Result<()> {
		trace!("Adding edges TO the meta node:");
		for &n in from {
			trace!("\t'{}' -> '{}'", self.describe(n), self.describe(meta_id));
			self.set_edge(n, meta_id)?;
		}
		trace!("Adding edges FROM the meta node:");
		for &n in to {
			trace!("\t'{}' -> '{}'", self.describe(meta_id), self.describe(n));
			self.set_edge(meta_id, n)?;
		}
		Ok(())
	}

	pub fn find_goal_node(&self, goal_name: &str) -> Option<NodeId> {
		self.nodes()
			.find(|n| n.role == NodeRole::Goal && n.goal_name == goal_name)
			.map(|n| n.id)
	}

	/// Adds a goal node depending on the requested packages. An empty
	/// package list targets every indexed run node. Unmatched packages are
	/// logged, or fail the call when `strict` is set; the goal node stays
	/// in the graph either way.
	pub fn add_goal_node(&mut self, goal_name: &str, packages: &[PackageVer], strict: bool) -> Result<NodeId> {
		if self.find_goal_node(goal_name).is_some() {
			return Err(GraphError::GoalAlreadyExists(goal_name.to_string()));
		}

		let goal = PkgNode {
			id: NodeId(0),
			versioned_pkg: None,
			state: NodeState::Meta,
			role: NodeRole::Goal,
			srpm_path: NO_SRPM_PATH.to_string(),
			rpm_path: NO_RPM_PATH.to_string(),
			spec_path: String::new(),
			source_dir: String::new(),
			architecture: String::new(),
			source_repo: NO_REPO.to_string(),
			goal_name: goal_name.to_string(),
			implicit: false,
		};
		let goal_id = self.insert_node(goal);

		if packages.is_empty() {
			debug!("Adding \"{}\" goal for all nodes", goal_name);
			for run in self.all_run_nodes() {
				self.set_edge(goal_id, run)?;
			}
			return Ok(goal_id);
		}

		debug!("Adding \"{}\" goal", goal_name);
		let mut goal_set: Vec<&PackageVer> = Vec::new();
		for pkg in packages {
			if !goal_set.iter().any(|p| *p == pkg) {
				goal_set.push(pkg);
			}
		}

		let mut missing = false;
		for pkg in goal_set {
			// Exact match first so a requested revision is honored, then
			// the more general search.
			let mut entry = self.find_exact_pkg(pkg)?;
			if entry.is_none() {
				entry = self.find_best_pkg(pkg)?;
			}
			match entry.and_then(|e| e.run_node) {
				Some(run) => {
					trace!("Found {} to satisfy {}", self.describe(run), pkg);
					self.set_edge(goal_id, run)?;
				}
				None => {
					warn!("Could not goal package {}", pkg);
					missing = true;
				}
			}
		}

		if strict && missing {
			return Err(GraphError::GoalMissingPackages);
		}
		Ok(goal_id)
	}

	/// Collapses `victims` into a new node tied to `parent`, which must be
	/// a run node. The new node inherits every parent attribute except the
	/// package version; each victim's dependents are mirrored onto it. On
	/// failure the graph and lookup are restored to their previous state.
	pub fn create_collapsed_node(&mut self, pkg: PackageVer, parent: NodeId, victims: &[NodeId]) -> Result<NodeId> {
		let parent_node = self.node(parent).ok_or(GraphError::NodeNotFound(parent.0))?;
		if parent_node.role != NodeRole::Run {
			return Err(GraphError::CollapseParentNotRun(parent_node.friendly_name()));
		}
		let inherited = (
			parent_node.state,
			parent_node.role,
			parent_node.srpm_path.clone(),
			parent_node.rpm_path.clone(),
			parent_node.spec_path.clone(),
			parent_node.source_dir.clone(),
			parent_node.architecture.clone(),
			parent_node.source_repo.clone(),
		);

		let victim_names: Vec<String> = victims.iter().map(|&v| self.describe(v)).collect();
		debug!("Collapsing ({:?}) into ({}) with ({}) as a parent.", victim_names, pkg, self.describe(parent));

		// Take the victims out of the lookup first so the replacement
		// doesn't trip a name/version conflict. Undone on failure.
		self.ensure_lookup();
		for &victim in victims {
			self.remove_node_from_lookup(victim);
		}

		match self.collapse_into(pkg.clone(), parent, victims, inherited) {
			Ok(new_node) => Ok(new_node),
			Err((new_node, err)) => {
				if let Some(id) = new_node {
					self.remove_pkg_node(id);
				}
				for &victim in victims {
					if let Err(lookup_err) = self.add_to_lookup(victim, false) {
						error!(
							"Failed to add node ({}) back to lookup table. Error: {}",
							self.describe(victim),
							lookup_err
						);
					}
				}
				Err(GraphError::Collapse { pkg: pkg.to_string(), source: Box::new(err) })
			}
		}
	}

	#[allow(clippy::type_complexity)]
	fn collapse_into(
		&mut self,
		pkg: PackageVer,
		parent: NodeId,
		victims: &[NodeId],
		inherited: (NodeState, NodeRole, String, String, String, String, String, String),
	) -> std::result::Result<NodeId, (Option<NodeId>, GraphError)> {
		let (state, role, srpm, rpm, spec, source_dir, architecture, repo) = inherited;
		let (new_node, indexed) =
			self.try_add_pkg_node(pkg, state, role, &srpm, &rpm, &spec, &source_dir, &architecture, &repo);
		if let Err(err) = indexed {
			return Err((Some(new_node), err));
		}

		if let Err(err) = self.set_edge(new_node, parent) {
			return Err((Some(new_node), err));
		}

		// Mirror the dependents of every victim onto the new node.
		for &victim in victims {
			for dependent in self.to(victim) {
				if let Err(err) = self.set_edge(dependent, new_node) {
					return Err((Some(new_node), err));
				}
			}
		}

		// Removals are unrecoverable, do them last.
		for &victim in victims {
			self.remove_pkg_node(victim);
		}
		Ok(new_node)
	}

	/// New graph holding every node reachable from `root` and the edges
	/// among them. Node records are copied but keep their ids; the id
	/// counter continues from this graph's so the two can't collide.
	pub fn create_sub_graph(&self, root: NodeId) -> Result<PkgGraph> {
		if !self.contains(root) {
			return Err(GraphError::NodeNotFound(root.0));
		}
		let mut sub = PkgGraph::new();
		let visited = self.all_nodes_from(root);
		for &id in &visited {
			sub.add_existing_node(self.node(id).expect("visited node missing").clone())?;
		}
		for &id in &visited {
			for successor in self.from(id) {
				sub.set_edge(id, successor)?;
			}
		}
		sub.next_id = self.next_id;
		debug!("Created sub graph with {} nodes rooted at \"{}\"", sub.len(), self.describe(root));
		Ok(sub)
	}

	/// Every node reachable from `root`, in depth-first visit order.
	pub fn all_nodes_from(&self, root: NodeId) -> Vec<NodeId> {
		let Some(start) = self.idx(root) else { return Vec::new() };
		let mut dfs = Dfs::new(&self.graph, start);
		let mut out = Vec::new();
		while let Some(idx) = dfs.next(&self.graph) {
			out.push(self.graph[idx].id);
		}
		out
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn pkg(name: &str, version: &str) -> PackageVer {
		PackageVer {
			name: name.to_string(),
			version: version.to_string(),
			condition: "=".to_string(),
			..Default::default()
		}
	}

	fn add_run(g: &mut PkgGraph, name: &str, version: &str) -> NodeId {
		g.add_pkg_node(
			pkg(name, version),
			NodeState::Build,
			NodeRole::Run,
			&format!("{name}.src.rpm"),
			&format!("{name}.rpm"),
			&format!("{name}.spec"),
			"src",
			"x86_64",
			"local",
		)
		.expect("add run node")
	}

	#[test]
	fn ids_are_monotonic_and_unique() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		g.remove_pkg_node(a);
		let c = add_run(&mut g, "c", "1");
		assert!(a < b && b < c);
		assert_eq!(g.len(), 2);
	}

	#[test]
	fn duplicate_edge_is_rejected() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		g.add_edge(a, b).unwrap();
		assert!(matches!(g.add_edge(a, b), Err(GraphError::EdgeFailure { .. })));
		assert_eq!(g.edges(), vec![(a, b)]);
	}

	#[test]
	fn self_loop_is_rejected() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		assert!(g.add_edge(a, a).is_err());
	}

	#[test]
	fn edge_to_unknown_node_is_rejected() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		assert!(matches!(g.add_edge(a, NodeId(404)), Err(GraphError::EdgeFailure { .. })));
	}

	#[test]
	fn removing_a_node_drops_its_edges() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		g.add_edge(a, b).unwrap();
		g.remove_pkg_node(b);
		assert!(g.edges().is_empty());
		assert!(g.to(a).is_empty() && g.from(a).is_empty());
	}

	#[test]
	fn clone_differs_only_in_id_and_edges() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		g.add_edge(a, b).unwrap();
		let c = g.clone_node(a).unwrap();
		assert_ne!(a, c);
		assert_eq!(g.node(a).unwrap(), g.node(c).unwrap());
		assert!(g.from(c).is_empty() && g.to(c).is_empty());
	}

	#[test]
	fn meta_node_wires_both_sides() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		let c = add_run(&mut g, "c", "1");
		let meta = g.add_meta_node(&[a], &[b, c]).unwrap();
		assert_eq!(g.node(meta).unwrap().role, NodeRole::PureMeta);
		assert_eq!(g.node(meta).unwrap().state, NodeState::Meta);
		assert_eq!(g.to(meta), vec![a]);
		assert_eq!(g.from(meta), vec![b, c]);
	}

	#[test]
	fn sub_graph_keeps_ids_and_reachable_edges() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		let c = add_run(&mut g, "c", "1");
		let stray = add_run(&mut g, "stray", "1");
		g.add_edge(a, b).unwrap();
		g.add_edge(b, c).unwrap();
		g.add_edge(stray, c).unwrap();

		let sub = g.create_sub_graph(a).unwrap();
		assert_eq!(sub.len(), 3);
		assert!(sub.contains(a) && sub.contains(b) && sub.contains(c));
		assert!(!sub.contains(stray));
		assert_eq!(sub.edges(), vec![(a, b), (b, c)]);
	}

	#[test]
	fn package_less_run_node_is_skipped_by_lookup_rebuild() {
		let mut g = PkgGraph::new();
		// a decoded payload can claim the Run role while carrying no package
		let rogue = PkgNode {
			id: NodeId(7),
			versioned_pkg: None,
			state: NodeState::Unresolved,
			role: NodeRole::Run,
			srpm_path: String::new(),
			rpm_path: String::new(),
			spec_path: String::new(),
			source_dir: String::new(),
			architecture: String::new(),
			source_repo: String::new(),
			goal_name: String::new(),
			implicit: false,
		};
		g.add_existing_node(rogue).unwrap();

		// the rebuild triggered here must report the rogue node as a lookup
		// error, not panic while formatting it
		let a = add_run(&mut g, "a", "1");
		assert_eq!(
			g.find_exact_pkg(&pkg("a", "1")).unwrap().and_then(|e| e.run_node),
			Some(a)
		);
		assert!(g.contains(NodeId(7)));
		assert!(!g.all_run_nodes().contains(&NodeId(7)));
	}

	#[test]
	fn goal_nodes_reject_duplicate_names() {
		let mut g = PkgGraph::new();
		add_run(&mut g, "a", "1");
		g.add_goal_node("ALL", &[], false).unwrap();
		assert!(matches!(g.add_goal_node("ALL", &[], false), Err(GraphError::GoalAlreadyExists(_))));
	}

	#[test]
	fn empty_goal_targets_every_run_node() {
		let mut g = PkgGraph::new();
		let a = add_run(&mut g, "a", "1");
		let b = add_run(&mut g, "b", "1");
		let goal = g.add_goal_node("ALL", &[], false).unwrap();
		assert_eq!(g.from(goal), vec![a, b]);
		let node = g.node(goal).unwrap();
		assert_eq!(node.srpm_path, NO_SRPM_PATH);
		assert_eq!(node.rpm_path, NO_RPM_PATH);
		assert_eq!(node.source_repo, NO_REPO);
	}

	#[test]
	fn strict_goal_fails_on_missing_package() {
		let mut g = PkgGraph::new();
		add_run(&mut g, "a", "1");
		let err = g.add_goal_node("goal", &[pkg("nope", "1")], true);
		assert!(matches!(err, Err(GraphError::GoalMissingPackages)));
		// non-strict logs and carries on
		assert!(g.add_goal_node("lenient", &[pkg("nope", "1")], false).is_ok());
	}
}

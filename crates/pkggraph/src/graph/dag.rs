//! Cycle detection and the two repair policies that turn the graph into a
//! DAG.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::prelude::*;

use tracing::{debug, error, trace, warn};

use crate::error::{GraphError, Result};
use crate::node::{NodeRole, NodeState};
use crate::prebuilt::{is_srpm_prebuilt, ArtifactFileCheck};

use super::{NodeId, PkgGraph};

impl PkgGraph {
	/// Repeatedly finds and repairs directed cycles until none remain.
	///
	/// Two repairs are attempted per cycle, in order: merging an
	/// intra-spec cycle behind a meta node, then bypassing a build
	/// dependency whose SRPM is already fully built on disk. If neither
	/// applies the cycle is reported with its full trace and the graph is
	/// left as-is.
	pub fn make_dag(&mut self, files: &dyn ArtifactFileCheck) -> Result<()> {
		loop {
			let Some(cycle) = self.find_any_directed_cycle() else {
				return Ok(());
			};
			if let Err(err) = self.fix_cycle(&cycle, files) {
				return Err(self.format_cycle_error(&cycle, err));
			}
		}
	}

	/// Some directed cycle, as `[n0, n1, .., nk, n0]` where every adjacent
	/// pair is an edge of the graph. `None` when the graph is acyclic.
	/// Which cycle is returned is unspecified.
	pub fn find_any_directed_cycle(&self) -> Option<Vec<NodeId>> {
		for scc in tarjan_scc(&self.graph) {
			// Self loops are rejected at insertion, so a cycle needs at
			// least two members.
			if scc.len() < 2 {
				continue;
			}
			let members: HashSet<NodeIndex> = scc.iter().copied().collect();

			// Walk successors inside the component until a node repeats;
			// the repeated suffix is a cycle.
			let mut path = vec![scc[0]];
			let mut position: HashMap<NodeIndex, usize> = HashMap::new();
			position.insert(scc[0], 0);
			loop {
				let current = *path.last().expect("walk path is never empty");
				let next = self
					.graph
					.neighbors_directed(current, Outgoing)
					.find(|n| members.contains(n))
					.expect("strongly connected node with no successor in its component");
				if let Some(&start) = position.get(&next) {
					let mut cycle: Vec<NodeId> = path[start..].iter().map(|&i| self.graph[i].id).collect();
					cycle.push(self.graph[next].id);
					return Some(cycle);
				}
				position.insert(next, path.len());
				path.push(next);
			}
		}
		None
	}

	fn fix_cycle(&mut self, cycle: &[NodeId], files: &dyn ArtifactFileCheck) -> Result<()> {
		let names: Vec<String> = cycle.iter().map(|&n| self.describe(n)).collect();
		debug!("Found cycle: {:?}", names);

		// The first element repeats as the last, drop it.
		let trimmed = &cycle[1..];

		if self.fix_intra_spec_cycle(trimmed).is_ok() {
			return Ok(());
		}
		self.fix_prebuilt_srpms_cycle(trimmed, files)
	}

	/// Repairs a cycle with no build nodes in it. All edges between cycle
	/// members are dropped and their outside dependents are rewired
	/// through a single meta node, so dependents wait for the whole group
	/// while the group members no longer reference each other.
	fn fix_intra_spec_cycle(&mut self, trimmed: &[NodeId]) -> Result<()> {
		debug!("Checking if cycle contains build nodes.");
		for &current in trimmed {
			if self.node(current).map(|n| n.role) == Some(NodeRole::Build) {
				debug!("Cycle contains build dependencies, cannot be solved this way.");
				return Err(GraphError::CycleUnresolvable(
					"cycle contains build dependencies, unresolvable".to_string(),
				));
			}
		}

		debug!("Breaking cycle edges.");
		for (i, &current) in trimmed.iter().enumerate() {
			for &next in &trimmed[i + 1..] {
				if self.has_edge(current, next) {
					trace!("\t'{}' -> '{}'", self.describe(current), self.describe(next));
					self.remove_edge(current, next);
				}
				if self.has_edge(next, current) {
					trace!("\t'{}' -> '{}'", self.describe(next), self.describe(current));
					self.remove_edge(next, current);
				}
			}
		}

		// Whatever still points into the cycle comes from outside it.
		let mut dependents = BTreeSet::new();
		for &current in trimmed {
			debug!("Breaking NON-cycle edges connected to cycle node '{}'.", self.describe(current));
			for dependent in self.to(current) {
				trace!("\t'{}' -> '{}'", self.describe(dependent), self.describe(current));
				dependents.insert(dependent);
				self.remove_edge(dependent, current);
			}
		}

		let dependents: Vec<NodeId> = dependents.into_iter().collect();
		self.add_meta_node(&dependents, trimmed)?;
		Ok(())
	}

	/// Repairs a cycle that crosses a build dependency on an SRPM whose
	/// artifacts already exist on disk. The run node is cloned into a
	/// PreBuilt node and the offending build edges move over to the clone.
	fn fix_prebuilt_srpms_cycle(&mut self, trimmed: &[NodeId], files: &dyn ArtifactFileCheck) -> Result<()> {
		debug!("Checking if cycle contains pre-built SRPMs.");

		for (i, &previous) in trimmed.iter().enumerate() {
			let current = trimmed[(i + 1) % trimmed.len()];

			// Only a "build node -> run node" edge is a candidate:
			// 1. Explicit rebuild requests edge goal nodes straight to run
			//    nodes; touching anything but build edges could skip one.
			// 2. A build cycle always crosses SRPMs over such an edge (the
			//    BuildRequires); breakable means the required SRPM's
			//    artifacts are already on disk.
			let build_to_run_edge = self.node(previous).map(|n| n.role) == Some(NodeRole::Build)
				&& self.node(current).map(|n| n.role) == Some(NodeRole::Run);
			if !build_to_run_edge {
				continue;
			}

			let (current_srpm, previous_srpm) = match (self.node(current), self.node(previous)) {
				(Some(c), Some(p)) => (c.srpm_path.clone(), p.srpm_path.clone()),
				_ => continue,
			};
			let (prebuilt, _, _) = is_srpm_prebuilt(&current_srpm, self, None, files);
			if !prebuilt {
				continue;
			}

			debug!(
				"Cycle contains pre-built SRPM '{}'. Replacing edges from build nodes associated with '{}' with an edge to a new 'PreBuilt' node.",
				current_srpm, previous_srpm
			);

			let clone = self.clone_node(current)?;
			{
				let node = self.node_mut(clone).expect("clone just created");
				node.state = NodeState::UpToDate;
				node.role = NodeRole::PreBuilt;
			}
			debug!("Adding a 'PreBuilt' node '{}' with id {}.", self.describe(clone), clone);

			for parent in self.to(current) {
				let redirect = self
					.node(parent)
					.map(|n| n.role == NodeRole::Build && n.srpm_path == previous_srpm)
					.unwrap_or(false);
				if redirect {
					self.remove_edge(parent, current);
					if let Err(err) = self.add_edge(parent, clone) {
						error!("Adding edge failed for {} -> {}", self.describe(parent), self.describe(clone));
						return Err(err);
					}
				}
			}
			return Ok(());
		}

		Err(GraphError::CycleUnresolvable(
			"cycle contains no pre-build SRPMs, unresolvable".to_string(),
		))
	}

	fn format_cycle_error(&self, cycle: &[NodeId], err: GraphError) -> GraphError {
		let mut trace = String::new();
		for (i, &node) in cycle.iter().enumerate() {
			if i > 0 {
				trace.push_str(" --> ");
			}
			trace.push_str(&format!("{{{}}}", self.describe(node)));
		}
		error!("Unfixable circular dependency found:\t{}\terror: {}", trace, err);

		// Cycles among toolchain packages can only be broken with the
		// pre-built artifacts those packages normally bootstrap from.
		warn!("Dependency cycles involving build nodes can only be resolved with pre-built RPMs.");
		warn!("If this build normally consumes a pre-built toolchain, re-prime it so its RPMs are");
		warn!("present in the RPM output directory, then re-run graph generation.");

		GraphError::CyclesDetected { trace }
	}
}

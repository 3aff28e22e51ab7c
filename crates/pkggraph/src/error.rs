pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors produced while building, querying, or repairing a package graph.
///
/// Lookup and edge errors are recoverable: the graph is left in a usable
/// state and the caller decides whether to continue. Cycle errors from
/// [`crate::graph::PkgGraph::make_dag`] are fatal for the current graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
	/// Lookup attempted on a node whose role is not Build, Run, or Remote.
	#[error("{node} has invalid type for lookup")]
	InvalidNodeRole { node: String },
	/// The matching lookup entry already has a node in this slot.
	#[error("already have a lookup entry for {node}")]
	DuplicateLookup { node: String },
	/// A non-remote node carries a version interval the lookup can't index.
	#[error("{node} {reason}")]
	InvalidInterval { node: String, reason: String },
	#[error("unknown version condition '{0}'")]
	UnknownCondition(String),
	/// A build node was inserted without a corresponding run node while
	/// sorting was not deferred.
	#[error("can't add {node}, no corresponding run node found and not deferring sort")]
	MissingRunNode { node: String },
	/// A lookup entry with no run node was observed during a query.
	#[error("found orphaned build node '{node}' for name '{name}'")]
	OrphanedBuildNode { node: String, name: String },
	#[error("failed to add edge: '{from}' -> '{to}'")]
	EdgeFailure { from: String, to: String },
	#[error("duplicate node id {0}")]
	DuplicateNodeId(u64),
	#[error("no node with id {0} in graph")]
	NodeNotFound(u64),
	#[error("cannot collapse nodes to a non run node ({0})")]
	CollapseParentNotRun(String),
	#[error("collapsing nodes into ({pkg}) failed")]
	Collapse {
		pkg: String,
		#[source]
		source: Box<GraphError>,
	},
	#[error("adding meta node failed")]
	MetaNodeFailed {
		#[source]
		source: Box<GraphError>,
	},
	#[error("can't have two goal nodes named {0}")]
	GoalAlreadyExists(String),
	#[error("could not find all goal nodes with strict=true")]
	GoalMissingPackages,
	/// Neither repair policy applies to the current cycle.
	#[error("{0}")]
	CycleUnresolvable(String),
	#[error("cycles detected in dependency graph: {trace}")]
	CyclesDetected { trace: String },
	#[error("encoding {field}: {message}")]
	Serialize { field: &'static str, message: String },
	#[error("decoding {field}: {message}")]
	Deserialize { field: &'static str, message: String },
	#[error("invalid graph description: {0}")]
	Parse(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

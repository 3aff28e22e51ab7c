//! The package node record and its classifiers.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GraphError, Result};
use crate::graph::NodeId;
use crate::pkgver::{PackageVer, PkgVerInterval};

/// Placeholder source archive path for nodes that have none (goal nodes).
pub const NO_SRPM_PATH: &str = "<NO_SRPM_PATH>";
/// Placeholder artifact path, treated as absent by pre-built checks.
pub const NO_RPM_PATH: &str = "<NO_RPM_PATH>";
/// Placeholder source repository.
pub const NO_REPO: &str = "<NO_REPO>";

/// Where a node is in its lifecycle: meta bookkeeping, waiting to be
/// built, already built, fetched, or failed.
///
/// The discriminants are the wire encoding; 0 is reserved for an unknown
/// state and is never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
	Meta = 1,
	Build = 2,
	UpToDate = 3,
	Unresolved = 4,
	Cached = 5,
	BuildError = 6,
}

/// What a node is for. Build and Run nodes come in pairs for local
/// packages; Remote stands in for a Run supplied by an external
/// repository; the rest are structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
	Build = 1,
	Run = 2,
	Goal = 3,
	Remote = 4,
	PureMeta = 5,
	PreBuilt = 6,
}

impl NodeState {
	pub(crate) fn as_wire(self) -> u32 {
		self as u32
	}

	pub(crate) fn from_wire(value: u32) -> Option<Self> {
		match value {
			1 => Some(NodeState::Meta),
			2 => Some(NodeState::Build),
			3 => Some(NodeState::UpToDate),
			4 => Some(NodeState::Unresolved),
			5 => Some(NodeState::Cached),
			6 => Some(NodeState::BuildError),
			_ => None,
		}
	}
}

impl NodeRole {
	pub(crate) fn as_wire(self) -> u32 {
		self as u32
	}

	pub(crate) fn from_wire(value: u32) -> Option<Self> {
		match value {
			1 => Some(NodeRole::Build),
			2 => Some(NodeRole::Run),
			3 => Some(NodeRole::Goal),
			4 => Some(NodeRole::Remote),
			5 => Some(NodeRole::PureMeta),
			6 => Some(NodeRole::PreBuilt),
			_ => None,
		}
	}

	/// Only these roles participate in the name/version lookup.
	pub(crate) fn is_indexable(self) -> bool {
		matches!(self, NodeRole::Build | NodeRole::Run | NodeRole::Remote)
	}
}

impl std::fmt::Display for NodeState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			NodeState::Meta => "Meta",
			NodeState::Build => "Build",
			NodeState::UpToDate => "UpToDate",
			NodeState::Unresolved => "Unresolved",
			NodeState::Cached => "Cached",
			NodeState::BuildError => "BuildError",
		};
		write!(f, "{name}")
	}
}

impl std::fmt::Display for NodeRole {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			NodeRole::Build => "Build",
			NodeRole::Run => "Run",
			NodeRole::Goal => "Goal",
			NodeRole::Remote => "Remote",
			NodeRole::PureMeta => "PureMeta",
			NodeRole::PreBuilt => "PreBuilt",
		};
		write!(f, "{name}")
	}
}

/// One node of the dependency graph.
///
/// The id is assigned by the owning graph and survives for the node's
/// lifetime there; it is not part of the serialized payload and not part
/// of equality.
#[derive(Debug, Clone)]
pub struct PkgNode {
	pub(crate) id: NodeId,
	pub versioned_pkg: Option<PackageVer>,
	pub state: NodeState,
	pub role: NodeRole,
	/// SRPM file this package is generated from, usually shared with the
	/// other nodes of the same spec.
	pub srpm_path: String,
	/// RPM file that provides this package.
	pub rpm_path: String,
	pub spec_path: String,
	pub source_dir: String,
	pub architecture: String,
	pub source_repo: String,
	/// Only meaningful for goal nodes.
	pub goal_name: String,
	pub implicit: bool,
}

impl PkgNode {
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Short human-readable summary, `<name>-<version>-<ROLE><state>`.
	pub fn friendly_name(&self) -> String {
		match self.role {
			NodeRole::Build => {
				let pkg = self.pkg();
				format!("{}-{}-BUILD<{}>", pkg.name, pkg.version, self.state)
			}
			NodeRole::Run => {
				let pkg = self.pkg();
				format!("{}-{}-RUN<{}>", pkg.name, pkg.version, self.state)
			}
			NodeRole::Remote => {
				let pkg = self.pkg();
				let mut version = format!("{}{}", pkg.condition, pkg.version);
				if !pkg.s_condition.is_empty() || !pkg.s_version.is_empty() {
					version = format!("{},{}{}", version, pkg.s_condition, pkg.s_version);
				}
				format!("{}-{}-REMOTE<{}>", pkg.name, version, self.state)
			}
			NodeRole::Goal => self.goal_name.clone(),
			NodeRole::PureMeta => format!("Meta({})", self.id),
			NodeRole::PreBuilt => {
				let pkg = self.pkg();
				format!("{}-{}-PREBUILT<{}>", pkg.name, pkg.version, self.state)
			}
		}
	}

	/// Identifier used in the graph description file. Includes the id so
	/// it stays unique even between nodes with identical payloads.
	pub(crate) fn dot_id(&self) -> String {
		format!("{} (ID={},TYPE={},STATE={})", self.friendly_name(), self.id, self.role, self.state)
	}

	/// Fill color for the graph description file.
	pub fn dot_color(&self) -> &'static str {
		match self.state {
			NodeState::Meta => {
				if self.role == NodeRole::Goal {
					"deeppink"
				} else {
					"aquamarine"
				}
			}
			NodeState::Build => "gold",
			NodeState::BuildError => "darkorange",
			NodeState::UpToDate => {
				if self.role == NodeRole::PreBuilt {
					"greenyellow"
				} else {
					"forestgreen"
				}
			}
			NodeState::Unresolved => "crimson",
			NodeState::Cached => "darkorchid",
		}
	}

	/// Name of the spec associated with this node, `.` if it has none.
	pub fn spec_name(&self) -> String {
		let base = std::path::Path::new(&self.spec_path)
			.file_name()
			.map(|f| f.to_string_lossy().into_owned())
			.unwrap_or_else(|| ".".to_string());
		base.strip_suffix(".spec").map(str::to_string).unwrap_or(base)
	}

	/// File name of the SRPM associated with this node, `.` if it has none.
	pub fn srpm_file_name(&self) -> String {
		std::path::Path::new(&self.srpm_path)
			.file_name()
			.map(|f| f.to_string_lossy().into_owned())
			.unwrap_or_else(|| ".".to_string())
	}

	fn pkg(&self) -> &PackageVer {
		self.versioned_pkg.as_ref().expect("package node without version information")
	}

	fn interval(&self) -> Option<PkgVerInterval> {
		self.versioned_pkg.as_ref().and_then(|pkg| pkg.interval().ok())
	}
}

/// Equality is semantic, not identity: the version intervals must match
/// (or both packages be absent) along with every other field. Ids and
/// edges are deliberately ignored so nodes can be matched across a
/// serialization round trip.
impl PartialEq for PkgNode {
	fn eq(&self, other: &Self) -> bool {
		let pkgs_match = match (&self.versioned_pkg, &other.versioned_pkg) {
			(None, None) => true,
			(Some(_), Some(_)) => match (self.interval(), other.interval()) {
				(Some(a), Some(b)) => a == b,
				_ => self.versioned_pkg == other.versioned_pkg,
			},
			_ => false,
		};
		pkgs_match
			&& self.state == other.state
			&& self.role == other.role
			&& self.srpm_path == other.srpm_path
			&& self.rpm_path == other.rpm_path
			&& self.spec_path == other.spec_path
			&& self.source_dir == other.source_dir
			&& self.architecture == other.architecture
			&& self.source_repo == other.source_repo
			&& self.goal_name == other.goal_name
			&& self.implicit == other.implicit
	}
}

impl std::fmt::Display for PkgNode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let (name, version) = if self.role == NodeRole::Goal {
			(self.goal_name.clone(), String::new())
		} else if let Some(pkg) = &self.versioned_pkg {
			(
				pkg.name.clone(),
				format!("{}{},{}{}", pkg.condition, pkg.version, pkg.s_condition, pkg.s_version),
			)
		} else {
			("<NO NAME>".to_string(), String::new())
		};
		write!(
			f,
			"{}({}):<ID:{} Type:{} State:{} Rpm:{}> from '{}' in '{}'",
			name, version, self.id, self.role, self.state, self.rpm_path, self.srpm_path, self.source_repo
		)
	}
}

fn push<T: Serialize>(buffer: &mut Vec<u8>, value: &T, field: &'static str) -> Result<()> {
	ciborium::ser::into_writer(value, &mut *buffer)
		.map_err(|e| GraphError::Serialize { field, message: e.to_string() })
}

fn pull<T: DeserializeOwned>(buffer: &mut &[u8], field: &'static str) -> Result<T> {
	ciborium::de::from_reader(buffer)
		.map_err(|e| GraphError::Deserialize { field, message: e.to_string() })
}

/// Encodes every field except the id as a sequence of self-describing
/// values, in a fixed order. The decoder reads the same order back.
pub(crate) fn encode_node(node: &PkgNode) -> Result<Vec<u8>> {
	let mut buffer = Vec::new();
	push(&mut buffer, &node.versioned_pkg.is_some(), "HasVersionedPkg")?;
	if let Some(pkg) = &node.versioned_pkg {
		push(&mut buffer, pkg, "VersionedPkg")?;
	}
	push(&mut buffer, &node.state.as_wire(), "State")?;
	push(&mut buffer, &node.role.as_wire(), "Type")?;
	push(&mut buffer, &node.srpm_path, "SrpmPath")?;
	push(&mut buffer, &node.rpm_path, "RpmPath")?;
	push(&mut buffer, &node.spec_path, "SpecPath")?;
	push(&mut buffer, &node.source_dir, "SourceDir")?;
	push(&mut buffer, &node.architecture, "Architecture")?;
	push(&mut buffer, &node.source_repo, "SourceRepo")?;
	push(&mut buffer, &node.goal_name, "GoalName")?;
	push(&mut buffer, &node.implicit, "Implicit")?;
	Ok(buffer)
}

/// Decodes a node payload. The returned node has a zero id; the caller is
/// responsible for restoring the id it was assigned.
pub(crate) fn decode_node(mut buffer: &[u8]) -> Result<PkgNode> {
	let has_pkg: bool = pull(&mut buffer, "HasVersionedPkg")?;
	let versioned_pkg = if has_pkg { Some(pull(&mut buffer, "VersionedPkg")?) } else { None };
	let state_wire: u32 = pull(&mut buffer, "State")?;
	let state = NodeState::from_wire(state_wire)
		.ok_or(GraphError::Deserialize { field: "State", message: format!("invalid value {state_wire}") })?;
	let role_wire: u32 = pull(&mut buffer, "Type")?;
	let role = NodeRole::from_wire(role_wire)
		.ok_or(GraphError::Deserialize { field: "Type", message: format!("invalid value {role_wire}") })?;
	Ok(PkgNode {
		id: NodeId(0),
		versioned_pkg,
		state,
		role,
		srpm_path: pull(&mut buffer, "SrpmPath")?,
		rpm_path: pull(&mut buffer, "RpmPath")?,
		spec_path: pull(&mut buffer, "SpecPath")?,
		source_dir: pull(&mut buffer, "SourceDir")?,
		architecture: pull(&mut buffer, "Architecture")?,
		source_repo: pull(&mut buffer, "SourceRepo")?,
		goal_name: pull(&mut buffer, "GoalName")?,
		implicit: pull(&mut buffer, "Implicit")?,
	})
}

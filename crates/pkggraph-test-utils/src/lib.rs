//! Helpers shared by the pkggraph integration tests.

use std::collections::HashSet;

use pkggraph::{ArtifactFileCheck, NodeId, NodeRole, NodeState, PackageVer, PkgGraph};

pub fn pkg(name: &str, condition: &str, version: &str) -> PackageVer {
	PackageVer {
		name: name.to_string(),
		version: version.to_string(),
		condition: condition.to_string(),
		..Default::default()
	}
}

pub fn pkg_two(name: &str, condition: &str, version: &str, s_condition: &str, s_version: &str) -> PackageVer {
	PackageVer {
		s_version: s_version.to_string(),
		s_condition: s_condition.to_string(),
		..pkg(name, condition, version)
	}
}

pub fn srpm_path(name: &str, version: &str) -> String {
	format!("{name}-{version}.src.rpm")
}

pub fn rpm_path(name: &str, version: &str) -> String {
	format!("{name}-{version}.x86_64.rpm")
}

fn add_local(g: &mut PkgGraph, name: &str, version: &str, role: NodeRole) -> NodeId {
	g.add_pkg_node(
		pkg(name, "=", version),
		NodeState::Build,
		role,
		&srpm_path(name, version),
		&rpm_path(name, version),
		&format!("{name}.spec"),
		&format!("{name}/"),
		"x86_64",
		"local",
	)
	.unwrap_or_else(|e| panic!("failed to add {role:?} node for {name}-{version}: {e}"))
}

/// Run node of a locally built package.
pub fn add_run(g: &mut PkgGraph, name: &str, version: &str) -> NodeId {
	add_local(g, name, version, NodeRole::Run)
}

/// Build node of a locally built package; add the matching run node first.
pub fn add_build(g: &mut PkgGraph, name: &str, version: &str) -> NodeId {
	add_local(g, name, version, NodeRole::Build)
}

/// Remote dependency, optionally with a second version constraint.
pub fn add_remote(g: &mut PkgGraph, name: &str, condition: &str, version: &str, s_condition: &str, s_version: &str) -> NodeId {
	g.add_pkg_node(
		pkg_two(name, condition, version, s_condition, s_version),
		NodeState::Unresolved,
		NodeRole::Remote,
		"",
		"",
		"",
		"",
		"x86_64",
		"upstream",
	)
	.unwrap_or_else(|e| panic!("failed to add remote node for {name}: {e}"))
}

/// Artifact presence stub backed by a fixed set of paths.
#[derive(Debug, Default)]
pub struct PresentFiles(pub HashSet<String>);

impl PresentFiles {
	pub fn with(paths: &[String]) -> Self {
		PresentFiles(paths.iter().cloned().collect())
	}
}

impl ArtifactFileCheck for PresentFiles {
	fn is_file(&self, path: &str) -> bool {
		self.0.contains(path)
	}
}

/// Artifact presence stub that never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFiles;

impl ArtifactFileCheck for NoFiles {
	fn is_file(&self, _path: &str) -> bool {
		false
	}
}

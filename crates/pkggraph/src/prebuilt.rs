//! Pre-built SRPM detection.
//!
//! An SRPM counts as pre-built when every RPM its run nodes provide
//! already exists on disk. The filesystem is reached through
//! [`ArtifactFileCheck`] so DAG repair can be exercised without touching
//! real files.

use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, trace};

use crate::graph::PkgGraph;
use crate::node::{NodeRole, NO_RPM_PATH};

/// Answers "does this artifact exist?".
pub trait ArtifactFileCheck {
	fn is_file(&self, path: &str) -> bool;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsCheck;

impl ArtifactFileCheck for FsCheck {
	fn is_file(&self, path: &str) -> bool {
		std::path::Path::new(path).is_file()
	}
}

/// Checks whether `srpm_path` is pre-built. Returns the verdict along
/// with the RPMs the SRPM is expected to provide and whichever of them
/// are missing. When `graph_lock` is given it is held in shared mode for
/// the duration of the node enumeration.
pub fn is_srpm_prebuilt(
	srpm_path: &str,
	graph: &PkgGraph,
	graph_lock: Option<&RwLock<()>>,
	files: &dyn ArtifactFileCheck,
) -> (bool, Vec<String>, Vec<String>) {
	let expected = rpms_provided_by_srpm(srpm_path, graph, graph_lock);
	trace!("Expected RPMs from {}: {:?}", srpm_path, expected);
	let (is_prebuilt, missing) = find_all_rpms(files, &expected);
	trace!("Missing RPMs from {}: {:?}", srpm_path, missing);
	(is_prebuilt, expected, missing)
}

/// All RPMs produced from an SRPM file, deduplicated. Placeholder paths
/// are treated as "no artifact".
fn rpms_provided_by_srpm(srpm_path: &str, graph: &PkgGraph, graph_lock: Option<&RwLock<()>>) -> Vec<String> {
	let _guard = graph_lock.map(|lock| lock.read().unwrap_or_else(PoisonError::into_inner));

	let mut rpms = BTreeSet::new();
	for node in graph.nodes() {
		if !matches!(node.role, NodeRole::Run | NodeRole::Remote) {
			continue;
		}
		if node.srpm_path != srpm_path {
			continue;
		}
		if node.rpm_path.is_empty() || node.rpm_path == NO_RPM_PATH {
			continue;
		}
		rpms.insert(node.rpm_path.clone());
	}
	rpms.into_iter().collect()
}

fn find_all_rpms(files: &dyn ArtifactFileCheck, expected: &[String]) -> (bool, Vec<String>) {
	let mut missing = Vec::new();
	for rpm in expected {
		if !files.is_file(rpm) {
			debug!("Did not find ({})", rpm);
			missing.push(rpm.clone());
		}
	}
	(missing.is_empty(), missing)
}

//! Package dependency graph engine for a source-package build pipeline.
//!
//! The graph models every package involved in a build: locally built
//! packages appear as paired build/run nodes, externally supplied ones as
//! remote nodes, plus goal and meta nodes for structure. A versioned
//! lookup resolves package queries to the best matching node,
//! [`PkgGraph::make_dag`] repairs dependency cycles, and the whole graph
//! round-trips through a DOT description file.

pub mod dot;
pub mod error;
pub mod graph;
pub mod node;
pub mod pkgver;
pub mod prebuilt;

pub use error::{GraphError, Result};
pub use graph::{LookupNode, NodeId, PkgGraph};
pub use node::{NodeRole, NodeState, PkgNode, NO_REPO, NO_RPM_PATH, NO_SRPM_PATH};
pub use pkgver::{PackageVer, PkgVerInterval, RpmVersion, VersionBound};
pub use prebuilt::{is_srpm_prebuilt, ArtifactFileCheck, FsCheck};

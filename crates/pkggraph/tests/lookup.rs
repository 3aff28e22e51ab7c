//! Lookup table behavior: exact and best-match queries, duplicate
//! rejection, version ordering, and lazy rebuild repair.

use pkggraph::{GraphError, NodeRole, NodeState, PkgGraph};
use pkggraph_test_utils::*;

#[test]
fn exact_lookup_returns_both_slots() {
	let mut g = PkgGraph::new();
	let run = add_run(&mut g, "foo", "1.0");
	let build = add_build(&mut g, "foo", "1.0");

	let entry = g.find_exact_pkg(&pkg("foo", "=", "1.0")).unwrap().expect("entry for foo");
	assert_eq!(entry.run_node, Some(run));
	assert_eq!(entry.build_node, Some(build));
}

#[test]
fn exact_lookup_misses_other_versions() {
	let mut g = PkgGraph::new();
	add_run(&mut g, "foo", "1.0");
	assert!(g.find_exact_pkg(&pkg("foo", "=", "2.0")).unwrap().is_none());
	assert!(g.find_exact_pkg(&pkg("bar", "=", "1.0")).unwrap().is_none());
}

#[test]
fn duplicate_build_slot_is_rejected() {
	let mut g = PkgGraph::new();
	add_run(&mut g, "foo", "1.0");
	add_build(&mut g, "foo", "1.0");

	let before = g.len();
	let err = g.add_pkg_node(
		pkg("foo", "=", "1.0"),
		NodeState::Build,
		NodeRole::Build,
		"foo-second.src.rpm",
		"foo-second.rpm",
		"foo.spec",
		"foo/",
		"x86_64",
		"local",
	);
	assert!(matches!(err, Err(GraphError::DuplicateLookup { .. })));
	// the rejected node stays in the graph, unindexed
	assert_eq!(g.len(), before + 1);
}

#[test]
fn duplicate_run_slot_is_rejected() {
	let mut g = PkgGraph::new();
	add_run(&mut g, "foo", "1.0");
	let err = g.add_pkg_node(
		pkg("foo", "=", "1.0"),
		NodeState::Build,
		NodeRole::Run,
		"x.src.rpm",
		"x.rpm",
		"x.spec",
		"x/",
		"x86_64",
		"local",
	);
	assert!(matches!(err, Err(GraphError::DuplicateLookup { .. })));
}

#[test]
fn build_without_run_is_rejected() {
	let mut g = PkgGraph::new();
	let err = g.add_pkg_node(
		pkg("lonely", "=", "1.0"),
		NodeState::Build,
		NodeRole::Build,
		"lonely.src.rpm",
		"lonely.rpm",
		"lonely.spec",
		"lonely/",
		"x86_64",
		"local",
	);
	assert!(matches!(err, Err(GraphError::MissingRunNode { .. })));
}

#[test]
fn run_nodes_reject_double_conditionals() {
	let mut g = PkgGraph::new();
	let err = g.add_pkg_node(
		pkg_two("foo", ">=", "1", "<", "2"),
		NodeState::Build,
		NodeRole::Run,
		"foo.src.rpm",
		"foo.rpm",
		"foo.spec",
		"foo/",
		"x86_64",
		"local",
	);
	assert!(matches!(err, Err(GraphError::InvalidInterval { .. })));
}

#[test]
fn run_nodes_reject_exclusive_lower_bounds() {
	let mut g = PkgGraph::new();
	let err = g.add_pkg_node(
		pkg("foo", ">", "1"),
		NodeState::Build,
		NodeRole::Run,
		"foo.src.rpm",
		"foo.rpm",
		"foo.spec",
		"foo/",
		"x86_64",
		"local",
	);
	assert!(matches!(err, Err(GraphError::InvalidInterval { .. })));
}

#[test]
fn remote_nodes_may_be_two_sided() {
	let mut g = PkgGraph::new();
	let remote = add_remote(&mut g, "foo", ">=", "1", "<", "2");
	// a plain run node for the same name still fits
	let run = add_run(&mut g, "foo", "1.5");

	let best = g.find_best_pkg(&pkg_two("foo", ">=", "1", "<", "2")).unwrap().expect("match");
	assert_eq!(best.run_node, Some(run));
	assert!(best.build_node.is_none());
	assert_ne!(best.run_node, Some(remote));
}

#[test]
fn remote_wins_when_it_carries_the_highest_version() {
	let mut g = PkgGraph::new();
	add_run(&mut g, "foo", "1.5");
	add_build(&mut g, "foo", "1.5");
	let remote = add_remote(&mut g, "foo", ">=", "2", "<", "3");

	// both entries satisfy, the remote sorts higher; this is the
	// remote-over-local case that logs a warning
	let best = g.find_best_pkg(&pkg_two("foo", ">=", "1", "<", "3")).unwrap().expect("match");
	assert_eq!(best.run_node, Some(remote));
	assert!(best.build_node.is_none());
}

#[test]
fn best_match_returns_highest_satisfying_version() {
	let mut g = PkgGraph::new();
	add_run(&mut g, "foo", "2.0");
	add_run(&mut g, "foo", "1.0");
	let highest = add_run(&mut g, "foo", "3.0");
	add_run(&mut g, "foo", "0.9");

	let best = g.find_best_pkg(&pkg("foo", ">=", "1.0")).unwrap().expect("match");
	assert_eq!(best.run_node, Some(highest));
}

#[test]
fn best_match_honors_the_request_interval() {
	let mut g = PkgGraph::new();
	let mid = add_run(&mut g, "foo", "1.7");
	add_run(&mut g, "foo", "3.0");

	let best = g.find_best_pkg(&pkg_two("foo", ">=", "1", "<", "2")).unwrap().expect("match");
	assert_eq!(best.run_node, Some(mid));
}

#[test]
fn removed_nodes_disappear_from_lookup() {
	let mut g = PkgGraph::new();
	let run = add_run(&mut g, "foo", "1.0");
	add_build(&mut g, "foo", "1.0");

	g.remove_pkg_node(run);
	assert!(g.find_exact_pkg(&pkg("foo", "=", "1.0")).unwrap().is_none());
}

#[test]
fn lazy_rebuild_purges_orphaned_build_nodes() {
	let mut g = PkgGraph::new();
	let run = add_run(&mut g, "foo", "1.0");
	add_build(&mut g, "foo", "1.0");
	g.remove_pkg_node(run);
	// the build node is still in the graph, just unindexed
	assert_eq!(g.len(), 1);

	// a fresh copy rebuilds the lookup lazily and repairs the orphan by
	// deleting it
	let mut copy = g.deep_copy().unwrap();
	assert_eq!(copy.len(), 1);
	assert!(copy.find_exact_pkg(&pkg("foo", "=", "1.0")).unwrap().is_none());
	assert_eq!(copy.len(), 0);
}

#[test]
fn subgraph_purges_orphaned_build_nodes() {
	let mut g = PkgGraph::new();
	let root = add_run(&mut g, "root", "1.0");
	add_run(&mut g, "dep", "1.0");
	let dep_build = add_build(&mut g, "dep", "1.0");
	// only the build half of "dep" is reachable from the root
	g.add_edge(root, dep_build).unwrap();

	let mut sub = g.create_sub_graph(root).unwrap();
	assert_eq!(sub.len(), 2);
	assert!(sub.find_exact_pkg(&pkg("dep", "=", "1.0")).unwrap().is_none());
	assert!(!sub.contains(dep_build));
}

#[test]
fn all_run_and_build_nodes_enumerate_the_lookup() {
	let mut g = PkgGraph::new();
	let run_a = add_run(&mut g, "a", "1.0");
	let build_a = add_build(&mut g, "a", "1.0");
	let run_b = add_run(&mut g, "b", "1.0");
	let remote = add_remote(&mut g, "c", ">=", "1", "", "");
	g.add_goal_node("ALL", &[], false).unwrap();

	assert_eq!(g.all_run_nodes(), vec![run_a, run_b, remote]);
	assert_eq!(g.all_build_nodes(), vec![build_a]);
}

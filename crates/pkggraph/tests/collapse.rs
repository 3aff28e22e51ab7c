//! Collapsing several run nodes into a replacement tied to a parent.

use pkggraph::{GraphError, NodeRole, PkgGraph};
use pkggraph_test_utils::*;

#[test]
fn collapse_mirrors_dependents_onto_the_new_node() {
	let mut g = PkgGraph::new();
	let parent = add_run(&mut g, "foo", "1.0");
	let victim_a = add_run(&mut g, "foo-a", "1.0");
	let victim_b = add_run(&mut g, "foo-b", "1.0");
	let x = add_run(&mut g, "x", "1.0");
	let y = add_run(&mut g, "y", "1.0");
	g.add_edge(x, victim_a).unwrap();
	g.add_edge(y, victim_b).unwrap();

	let merged = g
		.create_collapsed_node(pkg("foo-merged", "=", "1.0"), parent, &[victim_a, victim_b])
		.unwrap();

	// the new node inherits the parent's attributes, minus the package
	let new_node = g.node(merged).unwrap();
	let parent_node = g.node(parent).unwrap();
	assert_eq!(new_node.role, NodeRole::Run);
	assert_eq!(new_node.state, parent_node.state);
	assert_eq!(new_node.srpm_path, parent_node.srpm_path);
	assert_eq!(new_node.versioned_pkg.as_ref().unwrap().name, "foo-merged");

	// rewired edges
	assert!(g.has_edge(merged, parent));
	assert!(g.has_edge(x, merged));
	assert!(g.has_edge(y, merged));

	// the victims are gone, from the graph and from the lookup
	assert!(!g.contains(victim_a) && !g.contains(victim_b));
	assert!(g.find_exact_pkg(&pkg("foo-a", "=", "1.0")).unwrap().is_none());
	assert!(g.find_exact_pkg(&pkg("foo-b", "=", "1.0")).unwrap().is_none());

	// and the replacement is indexed
	let entry = g.find_exact_pkg(&pkg("foo-merged", "=", "1.0")).unwrap().expect("merged entry");
	assert_eq!(entry.run_node, Some(merged));
}

#[test]
fn collapse_rejects_a_non_run_parent() {
	let mut g = PkgGraph::new();
	add_run(&mut g, "foo", "1.0");
	let build = add_build(&mut g, "foo", "1.0");
	let victim = add_run(&mut g, "bar", "1.0");

	let err = g.create_collapsed_node(pkg("merged", "=", "1.0"), build, &[victim]);
	assert!(matches!(err, Err(GraphError::CollapseParentNotRun(_))));
	assert!(g.contains(victim));
}

#[test]
fn failed_collapse_restores_the_lookup() {
	let mut g = PkgGraph::new();
	let parent = add_run(&mut g, "foo", "1.0");
	let victim = add_run(&mut g, "bar", "1.0");
	let x = add_run(&mut g, "x", "1.0");
	g.add_edge(x, victim).unwrap();
	let len_before = g.len();

	// the replacement collides with the parent's own lookup entry
	let err = g.create_collapsed_node(pkg("foo", "=", "1.0"), parent, &[victim]);
	assert!(matches!(err, Err(GraphError::Collapse { .. })));

	// no stray node, victim back in the lookup, edges untouched
	assert_eq!(g.len(), len_before);
	let entry = g.find_exact_pkg(&pkg("bar", "=", "1.0")).unwrap().expect("restored entry");
	assert_eq!(entry.run_node, Some(victim));
	assert!(g.has_edge(x, victim));
}

//! Reading and writing the graph as a `dependency_graph` DOT digraph.
//!
//! Every node statement carries the whole node as a base64 payload in the
//! `NodeInBase64` attribute; the `SRPM`, `fillcolor`, and `style`
//! attributes are human-readable aids and are ignored on read. The reader
//! accepts the subset this writer emits (one statement per line, quoted
//! identifiers) and warns on attributes it doesn't know.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{info, trace, warn};

use crate::error::{GraphError, Result};
use crate::graph::{NodeId, PkgGraph};
use crate::node::{self, NodeRole, NodeState, PkgNode};

/// Serializes a graph into DOT format.
pub fn write_dot_graph<W: Write>(graph: &PkgGraph, mut output: W) -> Result<()> {
	writeln!(output, "strict digraph dependency_graph {{")?;
	for id in graph.all_nodes() {
		let node = graph.node(id).expect("listed node missing");
		let payload = STANDARD.encode(node::encode_node(node)?);
		writeln!(
			output,
			"\t{} [NodeInBase64={}, SRPM={}, fillcolor={}, style={}];",
			quote(&node.dot_id()),
			quote(&payload),
			quote(&node.srpm_path),
			quote(node.dot_color()),
			quote("filled"),
		)?;
	}
	for (from, to) in graph.edges() {
		let from_id = graph.node(from).expect("edge endpoint missing").dot_id();
		let to_id = graph.node(to).expect("edge endpoint missing").dot_id();
		writeln!(output, "\t{} -> {};", quote(&from_id), quote(&to_id))?;
	}
	writeln!(output, "}}")?;
	Ok(())
}

/// De-serializes a DOT stream into `graph`. Node ids are assigned fresh
/// in encounter order; the payload's stale id is discarded.
pub fn read_dot_graph<R: Read>(graph: &mut PkgGraph, mut input: R) -> Result<()> {
	let mut text = String::new();
	input.read_to_string(&mut text)?;

	let mut ids_by_name: std::collections::HashMap<String, NodeId> = std::collections::HashMap::new();
	for raw in text.lines() {
		let line = raw.trim();
		if line.is_empty()
			|| line.starts_with("//")
			|| line.starts_with('#')
			|| line.starts_with("strict digraph")
			|| line.starts_with("digraph")
			|| line == "{"
			|| line == "}"
		{
			continue;
		}

		let (name, rest) = parse_quoted(line)?;
		let rest = rest.trim_start();
		if let Some(rest) = rest.strip_prefix("->") {
			let (target, _) = parse_quoted(rest.trim_start())?;
			let from = *ids_by_name
				.get(&name)
				.ok_or_else(|| GraphError::Parse(format!("edge references undefined node \"{name}\"")))?;
			let to = *ids_by_name
				.get(&target)
				.ok_or_else(|| GraphError::Parse(format!("edge references undefined node \"{target}\"")))?;
			graph.set_edge(from, to)?;
			continue;
		}

		let id = graph.alloc_node_id();
		let mut node = placeholder_node(id);
		if rest.starts_with('[') {
			for (key, value) in parse_attributes(rest)? {
				match key.as_str() {
					"NodeInBase64" => {
						trace!("Decoding base 64");
						let payload = STANDARD
							.decode(value.as_bytes())
							.map_err(|e| GraphError::Deserialize { field: "NodeInBase64", message: e.to_string() })?;
						let mut decoded = node::decode_node(&payload)?;
						// The id assigned by this reader is the truth, the
						// encoded one is from the previous graph.
						decoded.id = id;
						node = decoded;
					}
					"SRPM" => trace!("Ignoring srpm"),
					"fillcolor" => trace!("Ignoring color"),
					"style" => trace!("Ignoring fill"),
					other => warn!("Unable to unmarshal an unknown key \"{}\"", other),
				}
			}
		}
		graph.add_existing_node(node)?;
		ids_by_name.insert(name, id);
	}
	Ok(())
}

pub fn write_dot_graph_file(graph: &PkgGraph, path: &Path) -> Result<()> {
	info!("Writing DOT graph to {}", path.display());
	let file = File::create(path)?;
	let mut writer = BufWriter::new(file);
	write_dot_graph(graph, &mut writer)?;
	writer.flush()?;
	Ok(())
}

pub fn read_dot_graph_file(graph: &mut PkgGraph, path: &Path) -> Result<()> {
	info!("Reading DOT graph from {}", path.display());
	let file = File::open(path)?;
	read_dot_graph(graph, BufReader::new(file))
}

impl PkgGraph {
	/// Deep copy by round-tripping through the DOT format; everything the
	/// format preserves, this preserves.
	pub fn deep_copy(&self) -> Result<PkgGraph> {
		let mut buffer = Vec::new();
		write_dot_graph(self, &mut buffer)?;
		let mut copy = PkgGraph::new();
		read_dot_graph(&mut copy, buffer.as_slice())?;
		Ok(copy)
	}
}

/// Stand-in for a node statement with no payload attribute.
fn placeholder_node(id: NodeId) -> PkgNode {
	PkgNode {
		id,
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
	}
}

fn quote(value: &str) -> String {
	let mut out = String::with_capacity(value.len() + 2);
	out.push('"');
	for c in value.chars() {
		if c == '"' || c == '\\' {
			out.push('\\');
		}
		out.push(c);
	}
	out.push('"');
	out
}

/// Parses a leading quoted string, returning it unescaped along with the
/// remaining input.
fn parse_quoted(input: &str) -> Result<(String, &str)> {
	let mut chars = input.char_indices();
	if chars.next().map(|(_, c)| c) != Some('"') {
		return Err(GraphError::Parse(format!("expected quoted identifier at: {input}")));
	}
	let mut out = String::new();
	let mut escaped = false;
	for (i, c) in chars {
		if escaped {
			out.push(c);
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == '"' {
			return Ok((out, &input[i + 1..]));
		} else {
			out.push(c);
		}
	}
	Err(GraphError::Parse("unterminated quoted string".to_string()))
}

/// Parses a `[key="value", ..]` attribute list.
fn parse_attributes(input: &str) -> Result<Vec<(String, String)>> {
	let mut rest = input
		.strip_prefix('[')
		.ok_or_else(|| GraphError::Parse(format!("expected attribute list at: {input}")))?;
	let mut attributes = Vec::new();
	loop {
		rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
		if rest.starts_with(']') {
			return Ok(attributes);
		}
		if rest.is_empty() {
			return Err(GraphError::Parse("unterminated attribute list".to_string()));
		}
		let eq = rest
			.find('=')
			.ok_or_else(|| GraphError::Parse(format!("attribute without value at: {rest}")))?;
		let key = rest[..eq].trim().to_string();
		let (value, after) = parse_quoted(rest[eq + 1..].trim_start())?;
		attributes.push((key, value));
		rest = after;
	}
}

//! GraphViz export of the declared graph, for debugging frame structure.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::builder::RdgBuilder;
use crate::edge::{RdgEdge, TextureRole};
use crate::graph::NodeId;
use crate::node::{PassKind, RdgNode};

fn pass_fill_color(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Render => "orange",
        PassKind::Compute => "yellow",
        PassKind::Copy => "lightgrey",
        PassKind::Present => "lightblue",
        PassKind::RayTracing => "violet",
    }
}

fn write_label(edge: &RdgEdge) -> &'static str {
    match edge {
        RdgEdge::Texture(edge) => {
            if edge.roles.contains(TextureRole::AS_COLOR) {
                "Color"
            } else if edge.roles.contains(TextureRole::AS_DEPTH_STENCIL) {
                "Depth"
            } else if edge.roles.contains(TextureRole::AS_SHADER_READ_WRITE) {
                "UAV"
            } else if edge.roles.contains(TextureRole::AS_TRANSFER_DST) {
                "Transfer"
            } else {
                "Write"
            }
        }
        RdgEdge::Buffer(_) => "Write",
    }
}

fn read_label(edge: &RdgEdge) -> &'static str {
    match edge {
        RdgEdge::Texture(edge) => {
            if edge.roles.contains(TextureRole::AS_SHADER_READ) {
                "SRV"
            } else if edge.roles.contains(TextureRole::AS_TRANSFER_SRC) {
                "Transfer"
            } else if edge.roles.contains(TextureRole::AS_PRESENT) {
                "Present"
            } else {
                "Read"
            }
        }
        RdgEdge::Buffer(_) => "Read",
    }
}

impl RdgBuilder {
    /// Writes the declared graph as a `.dot` file: passes are colored
    /// rectangles, textures green boxes, buffers cyan cylinders; write edges
    /// are red, read edges blue.
    pub fn export_graphviz(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let graph = self.graph();
        let blackboard = self.blackboard();

        let mut out = String::new();
        out.push_str("digraph RDG {\n");
        out.push_str("    rankdir=LR;\n");
        out.push_str("    node [fontname=\"Arial\"];\n");
        out.push_str("    edge [fontname=\"Arial\", fontsize=10];\n");

        let resource_name = |id: NodeId| -> Option<String> {
            graph.node(id).map(|node| node.name().to_owned())
        };

        for (name, &pass_id) in &blackboard.passes {
            let Some(pass) = graph.node(pass_id).and_then(RdgNode::as_pass) else { continue };
            let _ = writeln!(
                out,
                "    \"{name}\" [shape=rectangle, style=filled, fillcolor={}, label=\"{name}\"];",
                pass_fill_color(pass.kind),
            );

            // Writes: pass -> resource.
            for &edge_id in graph.out_edges(pass_id) {
                let Some(edge) = graph.edge(edge_id) else { continue };
                let Some(target) = resource_name(graph.edge_to(edge_id)) else { continue };
                let _ = writeln!(
                    out,
                    "    \"{name}\" -> \"{target}\" [label=\"{}\", color=red];",
                    write_label(edge),
                );
            }

            // Reads: resource -> pass.
            for &edge_id in graph.in_edges(pass_id) {
                let Some(edge) = graph.edge(edge_id) else { continue };
                let Some(source) = resource_name(graph.edge_from(edge_id)) else { continue };
                let _ = writeln!(
                    out,
                    "    \"{source}\" -> \"{name}\" [label=\"{}\", color=blue];",
                    read_label(edge),
                );
            }
        }

        for name in blackboard.textures.keys() {
            let _ = writeln!(
                out,
                "    \"{name}\" [shape=box, style=filled, fillcolor=lightgreen, label=\"{name}\\nTexture\"];",
            );
        }
        for name in blackboard.buffers.keys() {
            let _ = writeln!(
                out,
                "    \"{name}\" [shape=cylinder, style=filled, fillcolor=lightcyan, label=\"{name}\\nBuffer\"];",
            );
        }

        out.push_str("}\n");

        if let Err(err) = fs::write(path, out) {
            log::error!("failed to export graphviz to {}: {err}", path.display());
            return;
        }
        log::info!("exported RDG to {}", path.display());
    }
}

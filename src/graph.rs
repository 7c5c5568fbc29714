//! Reference graph between record types
//!
//! One node per record type, one edge per reference field, pointing from the
//! record type holding the identifier to the record type it names.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::registry::{EntityKind, SchemaRegistry};

/// Edge payload: the field carrying the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub field: &'static str,
    /// Field holds a list of identifiers
    pub many: bool,
}

/// One end of a reference as seen from the other record type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub kind: EntityKind,
    pub field: &'static str,
    pub many: bool,
}

#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    graph: DiGraph<EntityKind, ReferenceEdge>,
    nodes: HashMap<EntityKind, NodeIndex>,
}

impl ReferenceGraph {
    pub fn build(registry: &SchemaRegistry) -> Self {
        let mut graph = DiGraph::with_capacity(registry.len(), registry.len() * 2);
        let nodes: HashMap<EntityKind, NodeIndex> = registry
            .iter()
            .map(|schema| (schema.kind, graph.add_node(schema.kind)))
            .collect();

        for schema in registry.iter() {
            for reference in schema.references() {
                graph.add_edge(
                    nodes[&schema.kind],
                    nodes[&reference.target],
                    ReferenceEdge {
                        field: reference.field,
                        many: reference.many,
                    },
                );
            }
        }

        Self { graph, nodes }
    }

    fn links(&self, kind: EntityKind, direction: Direction) -> Vec<Link> {
        let Some(&node) = self.nodes.get(&kind) else {
            return Vec::new();
        };
        let mut links: Vec<Link> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                Link {
                    kind: self.graph[other],
                    field: edge.weight().field,
                    many: edge.weight().many,
                }
            })
            .collect();
        links.sort_by(|a, b| (a.kind, a.field).cmp(&(b.kind, b.field)));
        links
    }

    /// Record types `kind` points at, with the field on `kind`
    pub fn references_from(&self, kind: EntityKind) -> Vec<Link> {
        self.links(kind, Direction::Outgoing)
    }

    /// Record types pointing at `kind`, with the field on the referrer
    pub fn referenced_by(&self, kind: EntityKind) -> Vec<Link> {
        self.links(kind, Direction::Incoming)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

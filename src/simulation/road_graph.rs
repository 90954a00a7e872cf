//! Connectivity graph over placed roads and intersections
//!
//! One node per road entity. Two neighbouring entities are joined when both
//! of the sides that face each other carry traffic; every join is stored as a
//! pair of directed edges labelled with the heading of travel. Pedestrians
//! read their exits from here and the world uses it for connectivity
//! diagnostics after generation.

use std::collections::HashMap;

use petgraph::algo::{astar, connected_components};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use super::generator::CityMap;
use super::types::{Heading, RoadId};

#[derive(Debug, Default, Clone)]
pub struct RoadGraph {
    graph: DiGraph<RoadId, Heading>,
    road_to_node: HashMap<RoadId, NodeIndex>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every road entity of `map`
    pub fn build(map: &CityMap) -> Self {
        let mut graph = Self::new();
        for road in &map.roads {
            let node = graph.graph.add_node(road.id);
            graph.road_to_node.insert(road.id, node);
        }

        for road in &map.roads {
            for heading in Heading::ALL {
                if !road.connects(heading) {
                    continue;
                }
                let Some(next) = map.grid.step(road.coord, heading) else {
                    continue;
                };
                let Some(neighbour) = map.road_at(next) else {
                    continue;
                };
                if neighbour.connects(heading.opposite()) {
                    graph.add_edge(road.id, neighbour.id, heading);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, from: RoadId, to: RoadId, heading: Heading) {
        if let (Some(&a), Some(&b)) = (self.road_to_node.get(&from), self.road_to_node.get(&to)) {
            self.graph.add_edge(a, b, heading);
        }
    }

    pub fn road_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of undirected joins
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count() / 2
    }

    /// Number of disconnected road networks
    pub fn component_count(&self) -> usize {
        connected_components(&self.graph)
    }

    /// Every entity reachable in one step from `road`, with the heading that
    /// leads there
    pub fn exits(&self, road: RoadId) -> Vec<(Heading, RoadId)> {
        let Some(&node) = self.road_to_node.get(&road) else {
            return Vec::new();
        };
        self.graph
            .edges(node)
            .map(|edge| (*edge.weight(), self.graph[edge.target()]))
            .collect()
    }

    /// The neighbour reached by leaving `road` in `heading`, if that side is
    /// joined to one
    pub fn exit_toward(&self, road: RoadId, heading: Heading) -> Option<RoadId> {
        self.exits(road)
            .into_iter()
            .find(|(h, _)| *h == heading)
            .map(|(_, id)| id)
    }

    /// Fewest-hops route between two entities, both ends included
    pub fn route(&self, from: RoadId, to: RoadId) -> Option<Vec<RoadId>> {
        let start = *self.road_to_node.get(&from)?;
        let goal = *self.road_to_node.get(&to)?;
        let (_, path) = astar(
            &self.graph,
            start,
            |node| node == goal,
            |_| 1u32,
            |_| 0u32,
        )?;
        Some(path.into_iter().map(|node| self.graph[node]).collect())
    }
}

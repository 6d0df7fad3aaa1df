#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory pipe network topology with shortest-path distance queries.
//!
//! Holds one DMA's distribution network as an undirected graph (nodes are
//! junctions, edges are pipe segments weighted by length) plus the sensors
//! mounted on it. Built once from the GIS/asset inventory at load time,
//! then served read-only to the localizers: all query methods take `&self`
//! and degrade to empty/infinite results on unknown ids or disconnected
//! topology instead of erroring, so the localizer can treat any gap as
//! "no information".

use std::collections::{BTreeMap, HashMap};

use leak_map_network_models::{PipeSegment, SensorNode};
use petgraph::algo::{astar, dijkstra};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;
use thiserror::Error;

/// Default search radius for [`PipeNetworkGraph::neighboring_sensors`].
pub const DEFAULT_NEIGHBOR_RADIUS_M: f64 = 2000.0;

/// Errors that can occur while loading network topology.
///
/// Queries never return these; they are load-time validation only.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// A segment references the same node at both ends.
    #[error("segment {segment_id} connects node {node_id} to itself")]
    SelfLoop {
        /// The offending segment id.
        segment_id: String,
        /// The repeated node id.
        node_id: String,
    },

    /// A segment has a non-positive or non-finite length.
    #[error("segment {segment_id} has invalid length {length_m} m")]
    InvalidLength {
        /// The offending segment id.
        segment_id: String,
        /// The invalid length value.
        length_m: f64,
    },
}

/// Edge payload: just enough to map a graph edge back to its segment.
#[derive(Debug, Clone)]
struct EdgeTag {
    segment_id: String,
    length_m: f64,
}

/// Undirected weighted graph over one DMA's pipe network.
///
/// Mutators take `&mut self` and queries take `&self`, so the usual borrow
/// rules enforce the load-then-serve lifecycle: a caller embedding this in
/// a concurrent service builds a replacement graph off to the side and
/// swaps it in whole.
#[derive(Debug, Default)]
pub struct PipeNetworkGraph {
    graph: StableUnGraph<String, EdgeTag>,
    nodes: BTreeMap<String, NodeIndex>,
    edges: BTreeMap<String, EdgeIndex>,
    segments: BTreeMap<String, PipeSegment>,
    sensors: BTreeMap<String, SensorNode>,
}

impl PipeNetworkGraph {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a network from bulk GIS/asset inventory records.
    ///
    /// Invalid segments are skipped with a warning rather than failing the
    /// whole load; a partial network still localizes, an absent one does not.
    #[must_use]
    pub fn from_records(segments: Vec<PipeSegment>, sensors: Vec<SensorNode>) -> Self {
        let mut network = Self::new();

        let mut skipped = 0_usize;
        for segment in segments {
            if let Err(err) = network.add_segment(segment) {
                log::warn!("Skipping invalid segment: {err}");
                skipped += 1;
            }
        }
        for sensor in sensors {
            network.add_sensor(sensor);
        }

        log::info!(
            "Loaded network: {} nodes, {} segments ({} skipped), {} sensors",
            network.node_count(),
            network.segment_count(),
            skipped,
            network.sensor_count()
        );
        network
    }

    /// Inserts a pipe segment, creating its endpoint nodes on demand.
    ///
    /// Re-adding an existing `segment_id` replaces the previous edge, so a
    /// reload with corrected attributes is an overwrite, not a duplicate.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SelfLoop`] if both endpoints are the same
    /// node, or [`NetworkError::InvalidLength`] if the length is not a
    /// positive finite number.
    pub fn add_segment(&mut self, segment: PipeSegment) -> Result<(), NetworkError> {
        if segment.upstream_node == segment.downstream_node {
            return Err(NetworkError::SelfLoop {
                segment_id: segment.segment_id,
                node_id: segment.upstream_node,
            });
        }
        if !segment.length_m.is_finite() || segment.length_m <= 0.0 {
            return Err(NetworkError::InvalidLength {
                segment_id: segment.segment_id,
                length_m: segment.length_m,
            });
        }

        if let Some(old_edge) = self.edges.remove(&segment.segment_id) {
            self.graph.remove_edge(old_edge);
        }

        let upstream = self.ensure_node(&segment.upstream_node);
        let downstream = self.ensure_node(&segment.downstream_node);
        let edge = self.graph.add_edge(
            upstream,
            downstream,
            EdgeTag {
                segment_id: segment.segment_id.clone(),
                length_m: segment.length_m,
            },
        );

        self.edges.insert(segment.segment_id.clone(), edge);
        self.segments.insert(segment.segment_id.clone(), segment);
        Ok(())
    }

    /// Registers a sensor.
    ///
    /// A sensor whose node is not (yet) in the graph is still registered —
    /// distance queries for it return infinity until topology covering its
    /// node is loaded.
    pub fn add_sensor(&mut self, sensor: SensorNode) {
        if !self.nodes.contains_key(&sensor.node_id) {
            log::warn!(
                "Sensor {} sits at node {} which is not in the graph",
                sensor.sensor_id,
                sensor.node_id
            );
        }
        self.sensors.insert(sensor.sensor_id.clone(), sensor);
    }

    /// Approximate walking distance in meters from a sensor to a segment's
    /// midpoint: shortest path to the nearer endpoint plus half the length.
    ///
    /// Returns `f64::INFINITY` for an unknown sensor or segment id, or when
    /// no path exists.
    #[must_use]
    pub fn distance_to_segment(&self, sensor_id: &str, segment_id: &str) -> f64 {
        let Some(start) = self.sensor_node_index(sensor_id) else {
            return f64::INFINITY;
        };
        let Some(segment) = self.segments.get(segment_id) else {
            return f64::INFINITY;
        };

        let costs = dijkstra(&self.graph, start, None, |e| e.weight().length_m);
        Self::segment_distance_from_costs(&costs, segment, &self.nodes)
    }

    /// Distances from one sensor to every reachable segment's midpoint,
    /// from a single shortest-path sweep.
    ///
    /// This is the memoization unit for the Bayesian localizer: one call
    /// per sensor, reused across all candidate segments. Unreachable
    /// segments are omitted. An unknown sensor yields an empty map.
    #[must_use]
    pub fn segment_distances(&self, sensor_id: &str) -> BTreeMap<String, f64> {
        let Some(start) = self.sensor_node_index(sensor_id) else {
            return BTreeMap::new();
        };

        let costs = dijkstra(&self.graph, start, None, |e| e.weight().length_m);
        self.segments
            .iter()
            .filter_map(|(id, segment)| {
                let d = Self::segment_distance_from_costs(&costs, segment, &self.nodes);
                d.is_finite().then(|| (id.clone(), d))
            })
            .collect()
    }

    /// Segment ids along the shortest path between two sensors' nodes.
    ///
    /// Empty if either sensor is unknown or no path exists. When parallel
    /// mains connect the same pair of junctions, the shortest one is
    /// reported.
    #[must_use]
    pub fn segments_between_sensors(&self, sensor_a: &str, sensor_b: &str) -> Vec<String> {
        let (Some(start), Some(goal)) = (
            self.sensor_node_index(sensor_a),
            self.sensor_node_index(sensor_b),
        ) else {
            return Vec::new();
        };

        let Some((_, path)) = astar(
            &self.graph,
            start,
            |n| n == goal,
            |e| e.weight().length_m,
            |_| 0.0,
        ) else {
            return Vec::new();
        };

        path.windows(2)
            .filter_map(|pair| self.cheapest_edge_between(pair[0], pair[1]))
            .collect()
    }

    /// Sensors within `max_distance_m` path-meters of the given sensor,
    /// ascending by distance (ties broken by sensor id).
    ///
    /// The sensor itself is excluded. Empty for an unknown sensor id.
    #[must_use]
    pub fn neighboring_sensors(&self, sensor_id: &str, max_distance_m: f64) -> Vec<(String, f64)> {
        let Some(start) = self.sensor_node_index(sensor_id) else {
            return Vec::new();
        };

        let costs = dijkstra(&self.graph, start, None, |e| e.weight().length_m);
        let mut neighbors: Vec<(String, f64)> = self
            .sensors
            .iter()
            .filter(|(id, _)| id.as_str() != sensor_id)
            .filter_map(|(id, sensor)| {
                let node = self.nodes.get(&sensor.node_id)?;
                let distance = *costs.get(node)?;
                (distance <= max_distance_m).then(|| (id.clone(), distance))
            })
            .collect();

        neighbors.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        neighbors
    }

    /// Iterates all registered segments, ordered by segment id.
    pub fn segments(&self) -> impl Iterator<Item = &PipeSegment> {
        self.segments.values()
    }

    /// Iterates all registered sensors, ordered by sensor id.
    pub fn sensors(&self) -> impl Iterator<Item = &SensorNode> {
        self.sensors.values()
    }

    /// Looks up a segment by id.
    #[must_use]
    pub fn segment(&self, segment_id: &str) -> Option<&PipeSegment> {
        self.segments.get(segment_id)
    }

    /// Looks up a sensor by id.
    #[must_use]
    pub fn sensor(&self, sensor_id: &str) -> Option<&SensorNode> {
        self.sensors.get(sensor_id)
    }

    /// Number of junction nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of pipe segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of registered sensors.
    #[must_use]
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Whether the network has no segments at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn ensure_node(&mut self, node_id: &str) -> NodeIndex {
        if let Some(&index) = self.nodes.get(node_id) {
            return index;
        }
        let index = self.graph.add_node(node_id.to_string());
        self.nodes.insert(node_id.to_string(), index);
        index
    }

    fn sensor_node_index(&self, sensor_id: &str) -> Option<NodeIndex> {
        let sensor = self.sensors.get(sensor_id)?;
        self.nodes.get(&sensor.node_id).copied()
    }

    fn segment_distance_from_costs(
        costs: &HashMap<NodeIndex, f64>,
        segment: &PipeSegment,
        nodes: &BTreeMap<String, NodeIndex>,
    ) -> f64 {
        let endpoint_cost = |node_id: &str| {
            nodes
                .get(node_id)
                .and_then(|index| costs.get(index))
                .copied()
                .unwrap_or(f64::INFINITY)
        };

        let nearest = endpoint_cost(&segment.upstream_node)
            .min(endpoint_cost(&segment.downstream_node));
        nearest + segment.length_m / 2.0
    }

    fn cheapest_edge_between(&self, a: NodeIndex, b: NodeIndex) -> Option<String> {
        self.graph
            .edges_connecting(a, b)
            .min_by(|x, y| x.weight().length_m.total_cmp(&y.weight().length_m))
            .map(|edge| edge.weight().segment_id.clone())
    }
}

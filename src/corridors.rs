//! Room graph connection and corridor carving
//!
//! Builds a minimum spanning tree over the rooms (Kruskal over
//! nearest-edge-point distances, union-find for cycle detection), then
//! carves a corridor for every accepted connection: a symmetric Bresenham
//! line between the two closest edge points, stamped with a rough-edged
//! disc at every step.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::grid::OccupancyGrid;
use crate::regions::{Point, Room};

/// Corridor probability for cells on the outermost ring of the carve
/// disc, in tenths. Interior cells always open.
const ROUGH_EDGE_TENTHS: i32 = 6;

/// Tunables for the connection phase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Extra connections added beyond the spanning tree.
    pub cycles: usize,
    /// Candidate edges longer than this (in cells) are discarded before
    /// any processing; the graph may stay disconnected as a result.
    pub max_distance: Option<i64>,
    /// Disc radius stamped along carved lines.
    pub line_radius: i32,
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            cycles: 0,
            max_distance: None,
            line_radius: 1,
        }
    }
}

/// One carved corridor between two rooms.
#[derive(Clone, Debug)]
pub struct Connection {
    /// Room indices, smaller first.
    pub rooms: (usize, usize),
    /// The edge points the corridor runs between.
    pub endpoints: (Point, Point),
    /// True for loop edges added beyond the spanning tree.
    pub is_cycle: bool,
}

/// Outcome of the connection phase.
///
/// Disconnection under a distance limit is a reported state, not an
/// error: `components` counts the disjoint groups that remain and
/// `isolated_rooms` the rooms outside the largest one.
#[derive(Debug)]
pub struct ConnectionReport {
    pub connections: Vec<Connection>,
    pub components: usize,
    pub isolated_rooms: usize,
}

impl ConnectionReport {
    /// Whether a corridor was carved directly between two rooms.
    pub fn are_connected(&self, a: usize, b: usize) -> bool {
        let pair = (a.min(b), a.max(b));
        self.connections.iter().any(|c| c.rooms == pair)
    }
}

/// Candidate connection between two rooms.
struct RoomEdge {
    dist: i64,
    rooms: (usize, usize),
    endpoints: (Point, Point),
}

/// Disjoint-set forest with path compression and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(count: usize) -> Self {
        Self {
            parent: (0..count).collect(),
            size: vec![1; count],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    /// Merge two sets; false when already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        true
    }
}

/// Minimum squared distance between two rooms' edge points, with the
/// closest pair realizing it.
fn room_distance(first: &Room, second: &Room) -> Option<(i64, Point, Point)> {
    let mut best: Option<(i64, Point, Point)> = None;
    for &a in &first.edge_points {
        for &b in &second.edge_points {
            let dist = a.dist_sq(&b);
            if best.map_or(true, |(d, _, _)| dist < d) {
                best = Some((dist, a, b));
            }
        }
    }
    best
}

/// Connect all rooms with an MST plus optional cycles, carving each
/// accepted connection into the grid.
pub fn connect_rooms(
    map: &mut OccupancyGrid,
    rooms: &[Room],
    params: &ConnectionParams,
    rng: &mut ChaCha8Rng,
) -> ConnectionReport {
    if rooms.is_empty() {
        return ConnectionReport {
            connections: Vec::new(),
            components: 0,
            isolated_rooms: 0,
        };
    }

    let mut edges = Vec::with_capacity(rooms.len() * (rooms.len() - 1) / 2);
    for i in 1..rooms.len() {
        for j in 0..i {
            if let Some((dist, pi, pj)) = room_distance(&rooms[i], &rooms[j]) {
                edges.push(RoomEdge {
                    dist,
                    rooms: (j, i),
                    endpoints: (pj, pi),
                });
            }
        }
    }

    // Stable sort on weight: ties resolve by pair construction order.
    edges.sort_by_key(|e| e.dist);
    if let Some(max) = params.max_distance {
        edges.retain(|e| e.dist <= max * max);
    }

    let mut sets = DisjointSet::new(rooms.len());
    let mut connections = Vec::new();
    let mut used = vec![false; edges.len()];

    for (idx, edge) in edges.iter().enumerate() {
        if sets.union(edge.rooms.0, edge.rooms.1) {
            used[idx] = true;
            carve_corridor(map, edge.endpoints.0, edge.endpoints.1, params.line_radius, rng);
            connections.push(Connection {
                rooms: edge.rooms,
                endpoints: edge.endpoints,
                is_cycle: false,
            });
        }
    }

    // Loop edges: lowest-weight candidates the tree didn't use.
    let mut remaining = params.cycles;
    for (idx, edge) in edges.iter().enumerate() {
        if remaining == 0 {
            break;
        }
        if used[idx] {
            continue;
        }
        carve_corridor(map, edge.endpoints.0, edge.endpoints.1, params.line_radius, rng);
        connections.push(Connection {
            rooms: edge.rooms,
            endpoints: edge.endpoints,
            is_cycle: true,
        });
        remaining -= 1;
    }

    let mut components = 0;
    let mut largest = 0;
    for i in 0..rooms.len() {
        if sets.find(i) == i {
            components += 1;
            largest = largest.max(sets.size[i]);
        }
    }

    ConnectionReport {
        connections,
        components,
        isolated_rooms: rooms.len() - largest,
    }
}

/// Stamp the corridor discs along the line between two edge points.
fn carve_corridor(
    map: &mut OccupancyGrid,
    from: Point,
    to: Point,
    radius: i32,
    rng: &mut ChaCha8Rng,
) {
    for point in trace_line(from, to) {
        carve_disc(map, point, radius, rng);
    }
}

/// Integer line rasterization between two grid points, inclusive.
///
/// Symmetric Bresenham variant: when the slope is steep the driving axis
/// swaps from x to y, so both shallow and steep lines step one cell at a
/// time along their longer extent.
pub fn trace_line(from: Point, to: Point) -> Vec<Point> {
    let mut points = Vec::new();

    let mut x = from.x;
    let mut y = from.y;

    let dx = to.x - from.x;
    let dy = to.y - from.y;

    let mut inverted = false;
    let mut step = dx.signum();
    let mut gradient_step = dy.signum();

    let mut longest = dx.abs();
    let mut shortest = dy.abs();

    if longest < shortest {
        inverted = true;
        longest = dy.abs();
        shortest = dx.abs();
        step = dy.signum();
        gradient_step = dx.signum();
    }

    let mut gradient_accumulation = longest / 2;
    for _ in 0..longest {
        points.push(Point::new(x, y));

        if inverted {
            y += step;
        } else {
            x += step;
        }

        gradient_accumulation += shortest;
        if gradient_accumulation >= longest {
            if inverted {
                x += gradient_step;
            } else {
                y += gradient_step;
            }
            gradient_accumulation -= longest;
        }
    }
    points.push(Point::new(x, y));

    points
}

/// Open a disc of cells around a corridor point.
///
/// Cells strictly inside the radius always open; cells on the outermost
/// ring open with probability `ROUGH_EDGE_TENTHS`/10, which leaves the
/// organic ragged tunnel edge instead of a perfect circle.
fn carve_disc(map: &mut OccupancyGrid, center: Point, radius: i32, rng: &mut ChaCha8Rng) {
    let inner = radius - 1;
    for dx in -radius..=radius {
        for dy in -radius..=radius {
            let d2 = dx * dx + dy * dy;
            if d2 > radius * radius {
                continue;
            }
            if d2 > inner * inner && rng.gen_range(0..10) >= ROUGH_EDGE_TENTHS {
                continue;
            }
            let (cx, cy) = ((center.x + dx) as i64, (center.y + dy) as i64);
            if map.in_bounds(cx, cy) {
                map.set(cx as usize, cy as usize, false);
            }
        }
    }
}

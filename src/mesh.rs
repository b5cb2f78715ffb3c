//! Marching-squares mesh extraction
//!
//! Converts the final occupancy grid into renderable geometry: a lattice
//! of control nodes (one per grid cell, active when the cell is rock),
//! a 16-case polygon lookup per 2x2 square of control nodes, lazy vertex
//! deduplication, and outline tracing along edges shared by fewer than
//! two triangles. Outlines drive the extruded wall skirt.
//!
//! The lattice is a flat array indexed by (x, y); midpoint companion
//! nodes are addressed by id and their positions derived on access, so
//! no node object graph is ever allocated.

use crate::grid::OccupancyGrid;

/// Minimal 3-component vertex. Cave surface lies in the XZ plane, walls
/// extrude toward -Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Triangulated cave surface with its boundary outlines.
pub struct CaveMesh {
    pub vertices: Vec<Vec3>,
    /// Flat triangle index list, three entries per triangle.
    pub triangles: Vec<u32>,
    /// Planar UVs over the map extent.
    pub uvs: Vec<[f32; 2]>,
    /// Closed boundary loops: first vertex index repeated at the end.
    pub outlines: Vec<Vec<u32>>,
}

/// Extruded side-wall geometry built from the outlines.
pub struct WallMesh {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<u32>,
    /// U runs along the outline in cell units, V down the extrusion.
    pub uvs: Vec<[f32; 2]>,
}

/// Node kinds within one lattice cell; the id space is
/// `3 * (y * width + x) + kind`.
const NODE_CONTROL: usize = 0;
const NODE_RIGHT: usize = 1;
const NODE_ABOVE: usize = 2;

struct Mesher<'a> {
    map: &'a OccupancyGrid,
    square_size: f32,
    /// Lazily assigned vertex index per lattice node id.
    node_vertex: Vec<Option<u32>>,
    vertices: Vec<Vec3>,
    uvs: Vec<[f32; 2]>,
    triangles: Vec<u32>,
    /// Triangle ids touching each vertex, for outline-edge counting.
    vertex_triangles: Vec<Vec<u32>>,
    triangle_verts: Vec<[u32; 3]>,
    /// Vertices of fully active squares; they can never touch an outline.
    enclosed: Vec<bool>,
}

impl<'a> Mesher<'a> {
    fn new(map: &'a OccupancyGrid, square_size: f32) -> Self {
        Self {
            map,
            square_size,
            node_vertex: vec![None; 3 * map.width * map.height],
            vertices: Vec::new(),
            uvs: Vec::new(),
            triangles: Vec::new(),
            vertex_triangles: Vec::new(),
            triangle_verts: Vec::new(),
            enclosed: Vec::new(),
        }
    }

    fn node_id(&self, x: usize, y: usize, kind: usize) -> usize {
        3 * (y * self.map.width + x) + kind
    }

    /// World position of a lattice node, derived from its id.
    fn node_position(&self, id: usize) -> Vec3 {
        let kind = id % 3;
        let cell = id / 3;
        let x = cell % self.map.width;
        let y = cell / self.map.width;

        let sq = self.square_size;
        let map_w = self.map.width as f32 * sq;
        let map_h = self.map.height as f32 * sq;
        let mut pos = Vec3::new(
            -map_w / 2.0 + x as f32 * sq + sq / 2.0,
            0.0,
            -map_h / 2.0 + y as f32 * sq + sq / 2.0,
        );
        match kind {
            NODE_RIGHT => pos.x += sq / 2.0,
            NODE_ABOVE => pos.z += sq / 2.0,
            _ => {}
        }
        pos
    }

    fn ensure_vertex(&mut self, id: usize) -> u32 {
        if let Some(index) = self.node_vertex[id] {
            return index;
        }
        let index = self.vertices.len() as u32;
        let pos = self.node_position(id);
        let map_w = self.map.width as f32 * self.square_size;
        let map_h = self.map.height as f32 * self.square_size;
        self.vertices.push(pos);
        self.uvs.push([pos.x / map_w + 0.5, pos.z / map_h + 0.5]);
        self.vertex_triangles.push(Vec::new());
        self.enclosed.push(false);
        self.node_vertex[id] = Some(index);
        index
    }

    fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        let id = self.triangle_verts.len() as u32;
        self.triangles.extend_from_slice(&[a, b, c]);
        self.triangle_verts.push([a, b, c]);
        self.vertex_triangles[a as usize].push(id);
        self.vertex_triangles[b as usize].push(id);
        self.vertex_triangles[c as usize].push(id);
    }

    /// Assign vertices for a fragment and triangulate it as a fan.
    fn add_fragment(&mut self, nodes: &[usize]) -> Vec<u32> {
        let indices: Vec<u32> = nodes.iter().map(|&id| self.ensure_vertex(id)).collect();
        for i in 2..indices.len() {
            self.add_triangle(indices[0], indices[i - 1], indices[i]);
        }
        indices
    }

    /// Emit the polygon fragment for one square of the lattice.
    ///
    /// Corner order matches the configuration code: 8 = top-left,
    /// 4 = top-right, 2 = bottom-right, 1 = bottom-left. Windings are
    /// fixed per case and must not be reordered.
    fn march_square(&mut self, x: usize, y: usize) {
        let top_left = self.node_id(x, y + 1, NODE_CONTROL);
        let top_right = self.node_id(x + 1, y + 1, NODE_CONTROL);
        let bottom_right = self.node_id(x + 1, y, NODE_CONTROL);
        let bottom_left = self.node_id(x, y, NODE_CONTROL);

        let centre_top = self.node_id(x, y + 1, NODE_RIGHT);
        let centre_right = self.node_id(x + 1, y, NODE_ABOVE);
        let centre_bottom = self.node_id(x, y, NODE_RIGHT);
        let centre_left = self.node_id(x, y, NODE_ABOVE);

        let mut configuration = 0;
        if *self.map.get(x, y + 1) {
            configuration += 8;
        }
        if *self.map.get(x + 1, y + 1) {
            configuration += 4;
        }
        if *self.map.get(x + 1, y) {
            configuration += 2;
        }
        if *self.map.get(x, y) {
            configuration += 1;
        }

        let fragment: Vec<usize> = match configuration {
            0 => return,

            // one active corner
            1 => vec![centre_left, centre_bottom, bottom_left],
            2 => vec![bottom_right, centre_bottom, centre_right],
            4 => vec![top_right, centre_right, centre_top],
            8 => vec![top_left, centre_top, centre_left],

            // two adjacent corners
            3 => vec![centre_right, bottom_right, bottom_left, centre_left],
            6 => vec![centre_top, top_right, bottom_right, centre_bottom],
            9 => vec![top_left, centre_top, centre_bottom, bottom_left],
            12 => vec![top_left, top_right, centre_right, centre_left],

            // two diagonal corners
            5 => vec![
                centre_top,
                top_right,
                centre_right,
                centre_bottom,
                bottom_left,
                centre_left,
            ],
            10 => vec![
                top_left,
                centre_top,
                centre_right,
                bottom_right,
                centre_bottom,
                centre_left,
            ],

            // three active corners
            7 => vec![centre_top, top_right, bottom_right, bottom_left, centre_left],
            11 => vec![top_left, centre_top, centre_right, bottom_right, bottom_left],
            13 => vec![top_left, top_right, centre_right, centre_bottom, bottom_left],
            14 => vec![top_left, top_right, bottom_right, centre_bottom, centre_left],

            // fully active: corners only, and nothing here can be boundary
            15 => vec![top_left, top_right, bottom_right, bottom_left],

            _ => unreachable!("configuration is 4 bits"),
        };

        let indices = self.add_fragment(&fragment);
        if configuration == 15 {
            for index in indices {
                self.enclosed[index as usize] = true;
            }
        }
    }

    /// An edge is on the boundary when fewer than two triangles share it.
    fn is_outline_edge(&self, a: u32, b: u32) -> bool {
        let shared = self.vertex_triangles[a as usize]
            .iter()
            .filter(|&&t| self.triangle_verts[t as usize].contains(&b))
            .count();
        shared < 2
    }

    /// First unvisited vertex reachable from `v` across an outline edge.
    fn connected_outline_vertex(&self, v: u32, checked: &[bool]) -> Option<u32> {
        for &t in &self.vertex_triangles[v as usize] {
            for &b in &self.triangle_verts[t as usize] {
                if b != v && !checked[b as usize] && self.is_outline_edge(v, b) {
                    return Some(b);
                }
            }
        }
        None
    }

    /// Trace every boundary loop. Iterative walk; each loop ends by
    /// repeating its starting vertex.
    fn calculate_outlines(&self) -> Vec<Vec<u32>> {
        let mut checked = self.enclosed.clone();
        let mut outlines = Vec::new();

        for v in 0..self.vertices.len() as u32 {
            if checked[v as usize] {
                continue;
            }
            let Some(start) = self.connected_outline_vertex(v, &checked) else {
                continue;
            };
            checked[v as usize] = true;

            let mut outline = vec![v];
            let mut cur = start;
            loop {
                outline.push(cur);
                checked[cur as usize] = true;
                match self.connected_outline_vertex(cur, &checked) {
                    Some(next) => cur = next,
                    None => break,
                }
            }
            outline.push(v);
            outlines.push(outline);
        }
        outlines
    }
}

/// Run marching squares over the grid.
///
/// Row-major square iteration and lazy vertex assignment make the output
/// arrays a pure function of the grid and square size.
pub fn generate_mesh(map: &OccupancyGrid, square_size: f32) -> CaveMesh {
    let mut mesher = Mesher::new(map, square_size);

    if map.width > 1 && map.height > 1 {
        for y in 0..map.height - 1 {
            for x in 0..map.width - 1 {
                mesher.march_square(x, y);
            }
        }
    }

    let outlines = mesher.calculate_outlines();
    CaveMesh {
        vertices: mesher.vertices,
        triangles: mesher.triangles,
        uvs: mesher.uvs,
        outlines,
    }
}

/// Extrude the outlines downward into side walls, two triangles per
/// outline segment.
pub fn build_walls(mesh: &CaveMesh, wall_height: f32, square_size: f32) -> WallMesh {
    let mut wall = WallMesh {
        vertices: Vec::new(),
        triangles: Vec::new(),
        uvs: Vec::new(),
    };

    for outline in &mesh.outlines {
        let mut run = 0.0f32;
        for pair in outline.windows(2) {
            let start = mesh.vertices[pair[0] as usize];
            let end = mesh.vertices[pair[1] as usize];

            let seg = {
                let dx = end.x - start.x;
                let dz = end.z - start.z;
                (dx * dx + dz * dz).sqrt() / square_size
            };
            let base = wall.vertices.len() as u32;

            wall.vertices.push(start); // left top
            wall.vertices.push(end); // right top
            wall.vertices
                .push(Vec3::new(start.x, start.y - wall_height, start.z)); // left bottom
            wall.vertices
                .push(Vec3::new(end.x, end.y - wall_height, end.z)); // right bottom

            wall.uvs.push([run, 0.0]);
            wall.uvs.push([run + seg, 0.0]);
            wall.uvs.push([run, 1.0]);
            wall.uvs.push([run + seg, 1.0]);

            wall.triangles
                .extend_from_slice(&[base, base + 2, base + 3]);
            wall.triangles
                .extend_from_slice(&[base + 3, base + 1, base]);

            run += seg;
        }
    }
    wall
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 5x5 grid, solid border, open 3x3 interior.
    fn bordered_grid() -> OccupancyGrid {
        let mut map = OccupancyGrid::new_with(5, 5, true);
        for y in 1..4 {
            for x in 1..4 {
                map.set(x, y, false);
            }
        }
        map
    }

    #[test]
    fn test_fully_solid_grid_is_closed() {
        let map = OccupancyGrid::new_with(5, 5, true);
        let mesh = generate_mesh(&map, 1.0);

        // every square hits configuration 15: two triangles per square,
        // corner vertices only, nothing on the boundary
        assert_eq!(mesh.vertices.len(), 25);
        assert_eq!(mesh.triangles.len(), 16 * 2 * 3);
        assert!(mesh.outlines.is_empty());
    }

    #[test]
    fn test_fully_open_grid_is_empty() {
        let map = OccupancyGrid::new_with(4, 4, false);
        let mesh = generate_mesh(&map, 1.0);
        assert!(mesh.vertices.is_empty());
        assert!(mesh.triangles.is_empty());
        assert!(mesh.outlines.is_empty());
    }

    #[test]
    fn test_bordered_grid_matches_hand_computed_counts() {
        // Hand-walked configurations: the four corner squares hit cases
        // 11/7/13/14 (three triangles each), the eight edge squares hit
        // 3/6/9/12 (two each), the four interior squares are empty.
        let mesh = generate_mesh(&bordered_grid(), 1.0);

        assert_eq!(mesh.triangles.len() / 3, 4 * 3 + 8 * 2);
        // 16 border control nodes plus 12 midpoint nodes
        assert_eq!(mesh.vertices.len(), 28);
    }

    #[test]
    fn test_bordered_grid_outlines_are_closed_loops() {
        let mesh = generate_mesh(&bordered_grid(), 1.0);

        // outer rim plus the loop around the open interior
        assert_eq!(mesh.outlines.len(), 2);
        let mut lens: Vec<usize> = mesh.outlines.iter().map(|o| o.len()).collect();
        lens.sort_unstable();
        // 12 midpoints and 16 rim nodes, each loop closed by repetition
        assert_eq!(lens, vec![13, 17]);
        for outline in &mesh.outlines {
            assert_eq!(outline.first(), outline.last());
            // no vertex repeats except the closure
            let interior = &outline[..outline.len() - 1];
            let mut seen = std::collections::HashSet::new();
            assert!(interior.iter().all(|v| seen.insert(v)));
        }
    }

    #[test]
    fn test_solid_block_in_open_grid_has_single_closed_outline() {
        let mut map = OccupancyGrid::new_with(9, 9, false);
        for y in 3..6 {
            for x in 3..6 {
                map.set(x, y, true);
            }
        }
        let mesh = generate_mesh(&map, 1.0);

        assert_eq!(mesh.outlines.len(), 1);
        let outline = &mesh.outlines[0];
        assert_eq!(outline.first(), outline.last());
        assert!(outline.len() > 4);
    }

    #[test]
    fn test_mesh_is_deterministic() {
        let map = bordered_grid();
        let a = generate_mesh(&map, 2.0);
        let b = generate_mesh(&map, 2.0);
        assert_eq!(a.triangles, b.triangles);
        assert_eq!(a.vertices.len(), b.vertices.len());
        for (va, vb) in a.vertices.iter().zip(&b.vertices) {
            assert_eq!(va, vb);
        }
    }

    #[test]
    fn test_vertices_are_deduplicated() {
        // adjacent case-15 squares share their common control nodes
        let map = OccupancyGrid::new_with(3, 2, true);
        let mesh = generate_mesh(&map, 1.0);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangles.len() / 3, 4);
    }

    #[test]
    fn test_uvs_cover_unit_range() {
        let mesh = generate_mesh(&bordered_grid(), 1.5);
        assert_eq!(mesh.uvs.len(), mesh.vertices.len());
        for uv in &mesh.uvs {
            assert!((0.0..=1.0).contains(&uv[0]));
            assert!((0.0..=1.0).contains(&uv[1]));
        }
    }

    #[test]
    fn test_walls_have_two_triangles_per_segment() {
        let mesh = generate_mesh(&bordered_grid(), 1.0);
        let wall = build_walls(&mesh, 3.0, 1.0);

        let segments: usize = mesh.outlines.iter().map(|o| o.len() - 1).sum();
        assert_eq!(wall.triangles.len() / 3, segments * 2);
        assert_eq!(wall.vertices.len(), segments * 4);

        // extrusion goes downward by the wall height
        let min_y = wall.vertices.iter().map(|v| v.y).fold(f32::MAX, f32::min);
        assert_eq!(min_y, -3.0);
    }
}

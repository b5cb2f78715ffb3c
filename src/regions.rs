//! Connected-region analysis
//!
//! Flood-fill extraction of 4-connected regions over the occupancy grid,
//! used to prune pinhole walls and micro-caves and to promote the
//! surviving open regions into rooms for the corridor connector.

use std::collections::VecDeque;

use crate::grid::{Grid, OccupancyGrid};

/// Grid coordinate compared by value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    pub fn dist_sq(&self, other: &Point) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

const CARDINALS: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// All maximal 4-connected regions of cells matching `tile_type`.
///
/// Scans row-major; every matching cell lands in exactly one region.
pub fn find_regions(map: &OccupancyGrid, tile_type: bool) -> Vec<Vec<Point>> {
    let mut regions = Vec::new();
    let mut visited: Grid<bool> = Grid::new(map.width, map.height);

    for y in 0..map.height {
        for x in 0..map.width {
            if !*visited.get(x, y) && *map.get(x, y) == tile_type {
                regions.push(flood_region(map, &mut visited, x, y, tile_type));
            }
        }
    }
    regions
}

/// Breadth-first fill from one seed cell, marking everything it reaches.
fn flood_region(
    map: &OccupancyGrid,
    visited: &mut Grid<bool>,
    start_x: usize,
    start_y: usize,
    tile_type: bool,
) -> Vec<Point> {
    let mut points = Vec::new();
    let mut queue = VecDeque::new();

    visited.set(start_x, start_y, true);
    queue.push_back(Point::new(start_x as i32, start_y as i32));

    while let Some(cur) = queue.pop_front() {
        points.push(cur);

        for (dx, dy) in CARDINALS {
            let nx = cur.x as i64 + dx;
            let ny = cur.y as i64 + dy;
            if let Some(&cell) = map.get_signed(nx, ny) {
                let (ux, uy) = (nx as usize, ny as usize);
                if cell == tile_type && !*visited.get(ux, uy) {
                    visited.set(ux, uy, true);
                    queue.push_back(Point::new(nx as i32, ny as i32));
                }
            }
        }
    }
    points
}

/// An open region large enough to survive pruning.
///
/// Connectivity between rooms is not stored here; the connector returns
/// it as an explicit edge list.
pub struct Room {
    pub points: Vec<Point>,
    /// Open cells with at least one solid cardinal neighbour. Cells on
    /// the map border count the outside as solid.
    pub edge_points: Vec<Point>,
}

impl Room {
    pub fn new(points: Vec<Point>, map: &OccupancyGrid) -> Self {
        let edge_points = points
            .iter()
            .copied()
            .filter(|p| {
                CARDINALS.iter().any(|(dx, dy)| {
                    map.get_signed(p.x as i64 + dx, p.y as i64 + dy)
                        .copied()
                        .unwrap_or(true)
                })
            })
            .collect();
        Self {
            points,
            edge_points,
        }
    }

    pub fn size(&self) -> usize {
        self.points.len()
    }
}

/// Prune undersized regions and promote the survivors to rooms.
///
/// Solid regions below `wall_threshold` are opened up (they would leave
/// isolated rock specks), then open regions below `cave_threshold` are
/// filled in (they would leave unreachable pockets). Rooms are built
/// against the fully pruned grid.
pub fn refine_regions(
    map: &mut OccupancyGrid,
    wall_threshold: usize,
    cave_threshold: usize,
) -> Vec<Room> {
    for region in find_regions(map, true) {
        if region.len() < wall_threshold {
            for p in &region {
                map.set(p.x as usize, p.y as usize, false);
            }
        }
    }

    let mut surviving = Vec::new();
    for region in find_regions(map, false) {
        if region.len() < cave_threshold {
            for p in &region {
                map.set(p.x as usize, p.y as usize, true);
            }
        } else {
            surviving.push(region);
        }
    }

    surviving
        .into_iter()
        .map(|points| Room::new(points, map))
        .collect()
}

/// Fill every open region except the largest one.
pub fn keep_largest_region(map: &mut OccupancyGrid) {
    let regions = find_regions(map, false);
    let Some(largest) = regions
        .iter()
        .enumerate()
        .max_by_key(|(idx, region)| (region.len(), usize::MAX - idx))
        .map(|(idx, _)| idx)
    else {
        return;
    };

    for (idx, region) in regions.iter().enumerate() {
        if idx != largest {
            for p in region {
                map.set(p.x as usize, p.y as usize, true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

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
    fn test_bordered_grid_has_one_open_region_of_nine() {
        let map = bordered_grid();
        let regions = find_regions(&map, false);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].len(), 9);
    }

    #[test]
    fn test_regions_partition_the_grid() {
        let mut map = OccupancyGrid::new_with(8, 8, false);
        // scatter some rock
        for &(x, y) in &[(0, 0), (1, 0), (4, 4), (4, 5), (5, 4), (7, 7), (2, 6)] {
            map.set(x, y, true);
        }

        for tile_type in [true, false] {
            let regions = find_regions(&map, tile_type);
            let mut seen = HashSet::new();
            for region in &regions {
                for p in region {
                    assert_eq!(*map.get(p.x as usize, p.y as usize), tile_type);
                    assert!(seen.insert(*p), "point {:?} in two regions", p);
                }
            }
            let expected = map
                .iter()
                .filter(|&(_, _, &cell)| cell == tile_type)
                .count();
            assert_eq!(seen.len(), expected);
        }
    }

    #[test]
    fn test_diagonal_cells_are_separate_regions() {
        let mut map = OccupancyGrid::new_with(4, 4, false);
        map.set(1, 1, true);
        map.set(2, 2, true);
        assert_eq!(find_regions(&map, true).len(), 2);
    }

    #[test]
    fn test_refine_opens_pinholes_and_fills_micro_rooms() {
        let mut map = OccupancyGrid::new_with(9, 9, true);
        // one large open room
        for y in 1..6 {
            for x in 1..6 {
                map.set(x, y, false);
            }
        }
        // pinhole wall speck inside it
        map.set(3, 3, true);
        // isolated micro room in the corner
        map.set(7, 7, false);

        let rooms = refine_regions(&mut map, 4, 4);

        assert!(!*map.get(3, 3), "pinhole wall should be opened");
        assert!(*map.get(7, 7), "micro room should be filled");
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].size(), 25);
    }

    #[test]
    fn test_room_edge_points_are_subset_adjacent_to_rock() {
        let map = bordered_grid();
        let regions = find_regions(&map, false);
        let room = Room::new(regions.into_iter().next().unwrap(), &map);

        let points: HashSet<Point> = room.points.iter().copied().collect();
        for p in &room.edge_points {
            assert!(points.contains(p));
        }
        // interior centre cell is no edge point, ring cells are
        assert!(!room.edge_points.contains(&Point::new(2, 2)));
        assert_eq!(room.edge_points.len(), 8);
    }

    #[test]
    fn test_border_cells_treat_outside_as_solid() {
        // fully open map: every border cell is an edge point
        let map = OccupancyGrid::new_with(3, 3, false);
        let regions = find_regions(&map, false);
        let room = Room::new(regions.into_iter().next().unwrap(), &map);
        assert_eq!(room.edge_points.len(), 8);
    }

    #[test]
    fn test_keep_largest_region() {
        let mut map = OccupancyGrid::new_with(10, 5, true);
        for x in 1..7 {
            map.set(x, 1, false);
        }
        for x in 1..4 {
            map.set(x, 3, false);
        }
        keep_largest_region(&mut map);
        assert!(!*map.get(1, 1));
        assert!(*map.get(1, 3), "smaller region should be filled");
        assert_eq!(find_regions(&map, false).len(), 1);
    }
}

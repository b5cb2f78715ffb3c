//! Map and mesh export
//!
//! Flat color buffers for the rendering collaborator, PNG convenience
//! wrappers, and a Wavefront OBJ dump so generated geometry can be
//! inspected in any viewer without an engine.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::biomes::BiomeSet;
use crate::grid::{Grid, OccupancyGrid, ScalarField};
use crate::mesh::{CaveMesh, WallMesh};
use crate::params::GenerationError;

/// Rock is drawn dark, open floor light.
const SOLID_COLOR: [u8; 3] = [24, 20, 18];
const OPEN_COLOR: [u8; 3] = [235, 231, 222];

/// Flat width*height color buffer for an occupancy grid.
pub fn occupancy_color_map(map: &OccupancyGrid) -> Vec<[u8; 3]> {
    map.iter()
        .map(|(_, _, &solid)| if solid { SOLID_COLOR } else { OPEN_COLOR })
        .collect()
}

/// Grayscale buffer for a scalar field, normalized over its own range.
pub fn field_color_map(field: &ScalarField) -> Vec<[u8; 3]> {
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for (_, _, &v) in field.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    let range = (max - min).max(1e-6);

    field
        .iter()
        .map(|(_, _, &v)| {
            let t = ((v - min) / range * 255.0) as u8;
            [t, t, t]
        })
        .collect()
}

/// Color buffer for a dominant-biome index grid.
pub fn biome_color_map(map: &Grid<u8>, set: &BiomeSet) -> Vec<[u8; 3]> {
    map.iter()
        .map(|(_, _, &idx)| set.get(idx as usize).color)
        .collect()
}

/// Save a flat color buffer as a PNG.
pub fn export_png(
    colors: &[[u8; 3]],
    width: usize,
    height: usize,
    path: &Path,
) -> Result<(), GenerationError> {
    let mut img: RgbImage = ImageBuffer::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            img.put_pixel(x as u32, y as u32, Rgb(colors[y * width + x]));
        }
    }
    img.save(path)?;
    Ok(())
}

/// Export an occupancy grid as a black-and-white PNG.
pub fn export_occupancy(map: &OccupancyGrid, path: &Path) -> Result<(), GenerationError> {
    export_png(&occupancy_color_map(map), map.width, map.height, path)
}

/// Export a scalar field as a grayscale PNG.
pub fn export_field(field: &ScalarField, path: &Path) -> Result<(), GenerationError> {
    export_png(&field_color_map(field), field.width, field.height, path)
}

/// Export a biome map using each biome's configured color.
pub fn export_biomes(
    map: &Grid<u8>,
    set: &BiomeSet,
    path: &Path,
) -> Result<(), GenerationError> {
    export_png(&biome_color_map(map, set), map.width, map.height, path)
}

/// Write cave surface and wall skirt as one OBJ file with two groups.
pub fn write_mesh_obj(
    mesh: &CaveMesh,
    walls: &WallMesh,
    path: &Path,
) -> Result<(), GenerationError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "# cave_generator mesh export")?;
    writeln!(out, "o cave")?;
    for v in &mesh.vertices {
        writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for uv in &mesh.uvs {
        writeln!(out, "vt {} {}", uv[0], uv[1])?;
    }
    for tri in mesh.triangles.chunks_exact(3) {
        // OBJ indices are 1-based
        let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
        writeln!(out, "f {}/{} {}/{} {}/{}", a, a, b, b, c, c)?;
    }

    let offset = mesh.vertices.len() as u32;
    writeln!(out, "o walls")?;
    for v in &walls.vertices {
        writeln!(out, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for uv in &walls.uvs {
        writeln!(out, "vt {} {}", uv[0], uv[1])?;
    }
    for tri in walls.triangles.chunks_exact(3) {
        let (a, b, c) = (offset + tri[0] + 1, offset + tri[1] + 1, offset + tri[2] + 1);
        writeln!(out, "f {}/{} {}/{} {}/{}", a, a, b, b, c, c)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_colors_match_cells() {
        let mut map = OccupancyGrid::new_with(3, 2, true);
        map.set(1, 0, false);
        let colors = occupancy_color_map(&map);
        assert_eq!(colors.len(), 6);
        assert_eq!(colors[0], SOLID_COLOR);
        assert_eq!(colors[1], OPEN_COLOR);
    }

    #[test]
    fn test_field_colors_span_full_range() {
        let mut field = ScalarField::new_with(2, 1, 0.0);
        field.set(1, 0, 1.0);
        let colors = field_color_map(&field);
        assert_eq!(colors[0], [0, 0, 0]);
        assert_eq!(colors[1], [255, 255, 255]);
    }

    #[test]
    fn test_biome_colors_use_palette() {
        let set = BiomeSet::default_set();
        let mut map: Grid<u8> = Grid::new(2, 1);
        map.set(1, 0, 1);
        let colors = biome_color_map(&map, &set);
        assert_eq!(colors[0], set.get(0).color);
        assert_eq!(colors[1], set.get(1).color);
    }
}

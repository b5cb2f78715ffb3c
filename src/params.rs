//! Generation parameters and validation
//!
//! The configuration collaborator for the whole pipeline: the core
//! passes assume a validated `MapParams` and do not re-check ranges
//! themselves (the noise engine keeps its own fail-fast guards since it
//! is also callable standalone). Presets round-trip through JSON so a
//! good cave can be shared as a small text file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::corridors::ConnectionParams;
use crate::noise_field::NoiseParams;

/// Errors produced by generation and export.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("image export failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("preset parse failed: {0}")]
    Preset(#[from] serde_json::Error),
}

/// Every tunable of a generation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapParams {
    /// Map width in cells.
    pub width: usize,
    /// Map height in cells.
    pub height: usize,
    /// Master seed (>= 1).
    pub seed: u64,
    /// Noise field shape.
    pub noise: NoiseParams,
    /// Cells with noise below this become solid rock (0.0-1.0).
    pub fill_threshold: f32,
    /// Rings near the map edge that are probabilistically forced open (>= 1).
    pub edge_smoothing: u32,
    /// Majority-rule smoothing iterations per refinement round.
    pub smooth_iterations: u32,
    /// Solid regions smaller than this are opened up.
    pub wall_threshold: usize,
    /// Open regions smaller than this are filled in.
    pub cave_threshold: usize,
    /// Extra connections added beyond the spanning tree.
    pub cycles: usize,
    /// Refuse connections longer than this many cells, if set.
    pub max_connection_distance: Option<i64>,
    /// Corridor half-width stamped along connection lines.
    pub line_radius: i32,
    /// Fill every open region except the largest after connecting.
    pub keep_largest: bool,
    /// World-space size of one grid cell in the mesh.
    pub square_size: f32,
    /// Depth of the extruded wall skirt.
    pub wall_height: f32,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            width: 128,
            height: 72,
            seed: 1,
            noise: NoiseParams::default(),
            fill_threshold: 0.5,
            edge_smoothing: 4,
            smooth_iterations: 5,
            wall_threshold: 50,
            cave_threshold: 50,
            cycles: 0,
            max_connection_distance: None,
            line_radius: 1,
            keep_largest: false,
            square_size: 1.0,
            wall_height: 5.0,
        }
    }
}

impl MapParams {
    /// Check every range contract the core passes rely on.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.width < 1 || self.height < 1 {
            return Err(GenerationError::InvalidParameter(format!(
                "map dimensions must be at least 1x1, got {}x{}",
                self.width, self.height
            )));
        }
        if self.seed < 1 {
            return Err(GenerationError::InvalidParameter(
                "seed must be at least 1".into(),
            ));
        }
        if self.noise.scale <= 0.0 {
            return Err(GenerationError::InvalidParameter(format!(
                "noise scale must be positive, got {}",
                self.noise.scale
            )));
        }
        if self.noise.lacunarity < 1.0 {
            return Err(GenerationError::InvalidParameter(format!(
                "lacunarity must be at least 1.0, got {}",
                self.noise.lacunarity
            )));
        }
        if !(0.0..=1.0).contains(&self.noise.persistence) {
            return Err(GenerationError::InvalidParameter(format!(
                "persistence must be within [0,1], got {}",
                self.noise.persistence
            )));
        }
        if !(0.0..=1.0).contains(&self.fill_threshold) {
            return Err(GenerationError::InvalidParameter(format!(
                "fill threshold must be within [0,1], got {}",
                self.fill_threshold
            )));
        }
        if self.edge_smoothing < 1 {
            return Err(GenerationError::InvalidParameter(
                "edge smoothing must be at least 1".into(),
            ));
        }
        if self.line_radius < 0 {
            return Err(GenerationError::InvalidParameter(
                "line radius cannot be negative".into(),
            ));
        }
        if self.square_size <= 0.0 {
            return Err(GenerationError::InvalidParameter(format!(
                "square size must be positive, got {}",
                self.square_size
            )));
        }
        if let Some(max) = self.max_connection_distance {
            if max < 0 {
                return Err(GenerationError::InvalidParameter(
                    "max connection distance cannot be negative".into(),
                ));
            }
        }
        Ok(())
    }

    /// Load and validate a JSON preset.
    pub fn from_json_file(path: &Path) -> Result<Self, GenerationError> {
        let text = fs::read_to_string(path)?;
        let params: MapParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    /// The room-connection slice of the parameters.
    pub fn connection(&self) -> ConnectionParams {
        ConnectionParams {
            cycles: self.cycles,
            max_distance: self.max_connection_distance,
            line_radius: self.line_radius,
        }
    }
}

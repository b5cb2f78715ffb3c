//! Biome field synthesis
//!
//! Weighted Voronoi-style assignment over a coarse grid: every grid cell
//! hides one jittered seed point, the query blends between the nearest
//! seed points, and each seed point picks its biome with a weighted draw
//! from the positional hash. The result is a smooth weight vector per
//! query instead of hard cell boundaries.

use noise::{Perlin, Seedable};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, ScalarField};
use crate::hash::SeedHash;
use crate::noise_field::{perlin01, NoiseParams};
use crate::params::GenerationError;

/// Candidate window is 4x4 grid cells around the query.
const WINDOW: i64 = 4;

/// One biome definition: how likely it is to own a seed point, how its
/// terrain height behaves, and how it is painted on export maps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Biome {
    pub name: String,
    /// Relative likelihood of a seed point landing on this biome (> 0).
    pub probability_weight: i64,
    /// Dominance bias added when picking the single strongest biome.
    pub strength: f32,
    /// Per-biome height noise shape.
    pub noise: NoiseParams,
    /// World-space height range: `base_height + h * height_mult`.
    pub base_height: f32,
    pub height_mult: f32,
    /// Export color.
    pub color: [u8; 3],
}

/// Validated, non-empty biome list with a cached probability-weight sum.
#[derive(Clone, Debug)]
pub struct BiomeSet {
    biomes: Vec<Biome>,
    weight_sum: i64,
}

impl BiomeSet {
    pub fn new(biomes: Vec<Biome>) -> Result<Self, GenerationError> {
        if biomes.is_empty() {
            return Err(GenerationError::InvalidParameter(
                "biome set cannot be empty".into(),
            ));
        }
        if biomes.len() > 256 {
            return Err(GenerationError::InvalidParameter(format!(
                "biome set cannot exceed 256 entries, got {}",
                biomes.len()
            )));
        }
        let mut weight_sum = 0;
        for biome in &biomes {
            if biome.probability_weight <= 0 {
                return Err(GenerationError::InvalidParameter(format!(
                    "biome '{}' needs a positive probability weight",
                    biome.name
                )));
            }
            weight_sum += biome.probability_weight;
        }
        Ok(Self { biomes, weight_sum })
    }

    pub fn len(&self) -> usize {
        self.biomes.len()
    }

    pub fn get(&self, index: usize) -> &Biome {
        &self.biomes[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Biome> {
        self.biomes.iter()
    }

    /// A small usable default palette.
    pub fn default_set() -> Self {
        let biome = |name: &str, weight, strength, scale, octaves, base, mult, color| Biome {
            name: name.to_string(),
            probability_weight: weight,
            strength,
            noise: NoiseParams {
                scale,
                octaves,
                ..NoiseParams::default()
            },
            base_height: base,
            height_mult: mult,
            color,
        };
        Self::new(vec![
            biome("plains", 5, 0.0, 90.0, 3, 4.0, 6.0, [120, 170, 80]),
            biome("forest", 4, 0.0, 70.0, 4, 6.0, 10.0, [40, 110, 50]),
            biome("mountains", 2, 0.1, 45.0, 5, 12.0, 40.0, [140, 130, 125]),
            biome("desert", 3, 0.0, 110.0, 2, 3.0, 4.0, [210, 190, 120]),
        ])
        .expect("default biome set is valid")
    }
}

/// Spacing and blending controls for the biome field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiomeFieldParams {
    /// Edge length of one coarse grid cell, in map cells (>= 1).
    pub grid_size: i64,
    /// Magnitude of the noise perturbation added to squared distances.
    pub noise_mult: f64,
    /// Frequency of the perturbation noise.
    pub noise_dist: f64,
    /// Distance band over which neighbouring seed points blend (> 0).
    pub smoothness: f64,
}

impl Default for BiomeFieldParams {
    fn default() -> Self {
        Self {
            grid_size: 32,
            noise_mult: 300.0,
            noise_dist: 4.0,
            smoothness: 400.0,
        }
    }
}

/// Seed-derived sampling context for one biome field.
///
/// All state is explicit and owned here; two samplers with the same seed
/// and parameters answer every query identically, regardless of call
/// order or interleaving.
pub struct BiomeSampler {
    hash: SeedHash,
    perlin: Perlin,
    params: BiomeFieldParams,
    /// Offset folded into the distance-perturbation noise.
    field_offset: (f64, f64),
    /// Offset applied to per-biome height sampling.
    height_offset: (f64, f64),
    /// Per biome, per octave sample offsets for height synthesis.
    octave_offsets: Vec<Vec<(f64, f64)>>,
}

impl BiomeSampler {
    pub fn new(
        seed: u64,
        set: &BiomeSet,
        params: BiomeFieldParams,
    ) -> Result<Self, GenerationError> {
        if params.grid_size < 1 {
            return Err(GenerationError::InvalidParameter(format!(
                "biome grid size must be at least 1, got {}",
                params.grid_size
            )));
        }
        if params.smoothness <= 0.0 {
            return Err(GenerationError::InvalidParameter(format!(
                "biome smoothness must be positive, got {}",
                params.smoothness
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let field_offset = (
            rng.gen_range(-10_000..10_000) as f64,
            rng.gen_range(-10_000..10_000) as f64,
        );
        let height_offset = (
            rng.gen_range(-100_000..100_000) as f64,
            rng.gen_range(-100_000..100_000) as f64,
        );
        let octave_offsets = set
            .iter()
            .map(|biome| {
                (0..biome.noise.octaves)
                    .map(|_| {
                        (
                            rng.gen_range(-100_000..100_000) as f64,
                            rng.gen_range(-100_000..100_000) as f64,
                        )
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            hash: SeedHash::new(seed),
            perlin: Perlin::new(1).set_seed(seed as u32),
            params,
            field_offset,
            height_offset,
            octave_offsets,
        })
    }

    /// Start of the 4x4 candidate window along one axis.
    ///
    /// Queries in the left half of their cell look one extra cell to the
    /// left, right-half queries one extra to the right, so the window is
    /// symmetric around the query point.
    fn window_start(coord: i64, grid: i64) -> i64 {
        let cell = coord.div_euclid(grid);
        let frac = coord - cell * grid;
        if 2 * frac >= grid {
            cell - 1
        } else {
            cell - 2
        }
    }

    /// Jittered seed point inside a coarse cell.
    fn seed_point(&self, cell_x: i64, cell_y: i64) -> (i64, i64) {
        let grid = self.params.grid_size;
        let h = self.hash.get(cell_x, cell_y);
        let jitter_x = h.rem_euclid(grid);
        let jitter_y = (h / grid).rem_euclid(grid);
        (cell_x * grid + jitter_x, cell_y * grid + jitter_y)
    }

    /// Squared distance from the query to a cell's seed point, with the
    /// Perlin perturbation that breaks up grid alignment.
    fn perturbed_distance(&self, x: i64, y: i64, cell_x: i64, cell_y: i64) -> f64 {
        let (seed_x, seed_y) = self.seed_point(cell_x, cell_y);
        let dx = (seed_x - x) as f64;
        let dy = (seed_y - y) as f64;
        let mut dist = dx * dx + dy * dy;
        dist += perlin01(
            &self.perlin,
            self.params.noise_dist * (dx + self.field_offset.0) / 100.0,
            self.params.noise_dist * (dy + self.field_offset.1) / 100.0,
        ) * self.params.noise_mult;
        dist
    }

    /// Per-biome weight vector at (x, y). Contributing weights sum to 1.
    pub fn weights(&self, set: &BiomeSet, x: i64, y: i64) -> Vec<f32> {
        debug_assert_eq!(set.len(), self.octave_offsets.len());

        let grid = self.params.grid_size;
        let start_x = Self::window_start(x, grid);
        let start_y = Self::window_start(y, grid);

        let mut dists = [0.0f64; (WINDOW * WINDOW) as usize];
        let mut closest = f64::MAX;
        for i in 0..WINDOW {
            for j in 0..WINDOW {
                let dist = self.perturbed_distance(x, y, start_x + i, start_y + j);
                dists[(i * WINDOW + j) as usize] = dist;
                closest = closest.min(dist);
            }
        }

        let smooth = self.params.smoothness;
        let mut total = 0.0;
        for &dist in &dists {
            if dist - closest < smooth {
                let t = smooth + closest - dist;
                total += t * t;
            }
        }

        let mut weights = vec![0.0f32; set.len()];
        for (idx, &dist) in dists.iter().enumerate() {
            if dist - closest >= smooth {
                continue;
            }
            let cell_x = start_x + idx as i64 / WINDOW;
            let cell_y = start_y + idx as i64 % WINDOW;
            let mut draw = self.hash.get(cell_x, cell_y) % set.weight_sum;
            for (b, biome) in set.iter().enumerate() {
                draw -= biome.probability_weight;
                if draw < 0 {
                    let t = smooth + closest - dist;
                    weights[b] += (t * t / total) as f32;
                    break;
                }
            }
        }
        weights
    }

    /// Index of the single strongest biome, weight plus dominance bias.
    pub fn dominant(&self, set: &BiomeSet, x: i64, y: i64) -> usize {
        let weights = self.weights(set, x, y);
        let mut best = 0;
        let mut best_val = f32::MIN;
        for (i, biome) in set.iter().enumerate() {
            let val = weights[i] + biome.strength;
            if val > best_val {
                best_val = val;
                best = i;
            }
        }
        best
    }

    /// Normalized fractal height for one biome at a point, in [0,1].
    fn biome_height01(&self, set: &BiomeSet, index: usize, x: i64, y: i64) -> f64 {
        let biome = set.get(index);
        let scale = biome.noise.scale.max(1e-4);

        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut value = 0.0;
        let mut max_value = 0.0;
        for &(ox, oy) in &self.octave_offsets[index] {
            max_value += amplitude;
            let sample_x = (x as f64 + self.height_offset.0) / scale * frequency + ox;
            let sample_y = (y as f64 + self.height_offset.1) / scale * frequency + oy;
            value += perlin01(&self.perlin, sample_x, sample_y) * amplitude;
            amplitude *= biome.noise.persistence;
            frequency *= biome.noise.lacunarity;
        }
        if max_value > 0.0 {
            value / max_value
        } else {
            0.5
        }
    }

    /// Terrain height at (x, y): per-biome heights mixed by the weight
    /// vector, in world units.
    pub fn blended_height(&self, set: &BiomeSet, x: i64, y: i64) -> f32 {
        let weights = self.weights(set, x, y);
        let mut height = 0.0f32;
        for (i, biome) in set.iter().enumerate() {
            if weights[i] < 1e-4 {
                continue;
            }
            let h = self.biome_height01(set, i, x, y) as f32;
            height += weights[i] * (biome.base_height + h * biome.height_mult);
        }
        height
    }

    /// Dominant-biome index grid, for texture export.
    pub fn biome_map(&self, set: &BiomeSet, width: usize, height: usize) -> Grid<u8> {
        let mut map = Grid::new_with(width, height, 0u8);
        for y in 0..height {
            for x in 0..width {
                map.set(x, y, self.dominant(set, x as i64, y as i64) as u8);
            }
        }
        map
    }

    /// Blended terrain height grid, in world units.
    pub fn height_field(&self, set: &BiomeSet, width: usize, height: usize) -> ScalarField {
        let mut map = ScalarField::new_with(width, height, 0.0);
        for y in 0..height {
            for x in 0..width {
                map.set(x, y, self.blended_height(set, x as i64, y as i64));
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(seed: u64) -> (BiomeSampler, BiomeSet) {
        let set = BiomeSet::default_set();
        let sampler = BiomeSampler::new(seed, &set, BiomeFieldParams::default()).unwrap();
        (sampler, set)
    }

    #[test]
    fn test_weights_sum_to_one() {
        let (sampler, set) = sampler(11);
        for &(x, y) in &[(0i64, 0i64), (17, 93), (-40, 12), (500, -500)] {
            let weights = sampler.weights(&set, x, y);
            let sum: f32 = weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "sum {} at ({}, {})", sum, x, y);
            assert!(weights.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_weights_are_call_order_independent() {
        let (sampler_a, set) = sampler(23);
        let (sampler_b, _) = sampler(23);

        // Warm one sampler with unrelated queries first.
        let _ = sampler_a.weights(&set, 900, 900);
        let _ = sampler_a.weights(&set, -3, 8);

        assert_eq!(
            sampler_a.weights(&set, 55, 71),
            sampler_b.weights(&set, 55, 71)
        );
    }

    #[test]
    fn test_same_seed_same_field() {
        let (sampler_a, set) = sampler(5);
        let (sampler_b, _) = sampler(5);
        let map_a = sampler_a.biome_map(&set, 24, 24);
        let map_b = sampler_b.biome_map(&set, 24, 24);
        assert!(map_a == map_b);
    }

    #[test]
    fn test_dominant_is_valid_index() {
        let (sampler, set) = sampler(31);
        for y in 0..16 {
            for x in 0..16 {
                assert!(sampler.dominant(&set, x * 13, y * 13) < set.len());
            }
        }
    }

    #[test]
    fn test_blended_height_deterministic() {
        let (sampler_a, set) = sampler(77);
        let (sampler_b, _) = sampler(77);
        for &(x, y) in &[(0i64, 0i64), (31, -4), (1000, 2000)] {
            assert_eq!(
                sampler_a.blended_height(&set, x, y).to_bits(),
                sampler_b.blended_height(&set, x, y).to_bits()
            );
        }
    }

    #[test]
    fn test_rejects_bad_field_params() {
        let set = BiomeSet::default_set();
        let zero_grid = BiomeFieldParams {
            grid_size: 0,
            ..BiomeFieldParams::default()
        };
        assert!(BiomeSampler::new(1, &set, zero_grid).is_err());

        let flat = BiomeFieldParams {
            smoothness: 0.0,
            ..BiomeFieldParams::default()
        };
        assert!(BiomeSampler::new(1, &set, flat).is_err());
    }

    #[test]
    fn test_empty_biome_set_rejected() {
        assert!(BiomeSet::new(Vec::new()).is_err());
    }
}

//! Full generation pipeline
//!
//! Runs every phase in order and bundles the results: noise-thresholded
//! base map, majority smoothing, two refinement rounds (prune regions,
//! connect rooms, carve corridors), then marching-squares meshing. Each
//! phase takes the single occupancy grid by exclusive borrow; the only
//! random stream is the ChaCha generator created here from the seed.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::cavemap::{generate_base_map, smooth_map};
use crate::corridors::{connect_rooms, ConnectionReport};
use crate::grid::OccupancyGrid;
use crate::mesh::{build_walls, generate_mesh, CaveMesh, WallMesh};
use crate::params::{GenerationError, MapParams};
use crate::regions::{keep_largest_region, refine_regions, Room};

/// Pruning and connection run this many times, with smoothing between.
const REFINEMENT_ROUNDS: usize = 2;

/// Everything one generation run produces.
pub struct CaveWorld {
    pub params: MapParams,
    pub map: OccupancyGrid,
    /// Rooms surviving the final refinement round.
    pub rooms: Vec<Room>,
    /// Connection outcome of the final round.
    pub report: ConnectionReport,
    pub mesh: CaveMesh,
    pub walls: WallMesh,
}

/// Run the whole pipeline for one parameter set.
pub fn generate(params: &MapParams) -> Result<CaveWorld, GenerationError> {
    params.validate()?;

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut map = generate_base_map(
        params.width,
        params.height,
        params.seed,
        &params.noise,
        params.fill_threshold,
        params.edge_smoothing,
        &mut rng,
    )?;

    let mut rooms = Vec::new();
    let mut report = ConnectionReport {
        connections: Vec::new(),
        components: 0,
        isolated_rooms: 0,
    };

    for _ in 0..REFINEMENT_ROUNDS {
        for _ in 0..params.smooth_iterations {
            smooth_map(&mut map);
        }

        rooms = refine_regions(&mut map, params.wall_threshold, params.cave_threshold);
        report = connect_rooms(&mut map, &rooms, &params.connection(), &mut rng);

        if params.keep_largest {
            keep_largest_region(&mut map);
        }
    }

    let mesh = generate_mesh(&map, params.square_size);
    let walls = build_walls(&mesh, params.wall_height, params.square_size);

    Ok(CaveWorld {
        params: params.clone(),
        map,
        rooms,
        report,
        mesh,
        walls,
    })
}

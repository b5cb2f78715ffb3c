use std::path::PathBuf;
use std::process;

use clap::Parser;

mod biomes;
mod cavemap;
mod corridors;
mod export;
mod grid;
mod hash;
mod mesh;
mod noise_field;
mod params;
mod regions;
mod world;

use biomes::{BiomeFieldParams, BiomeSampler, BiomeSet};
use noise_field::generate_noise_field;
use params::{GenerationError, MapParams};

#[derive(Parser, Debug)]
#[command(name = "cave_generator")]
#[command(about = "Generate procedural cave maps and meshes")]
struct Args {
    /// Width of the map in cells
    #[arg(short = 'W', long, default_value = "128")]
    width: usize,

    /// Height of the map in cells
    #[arg(short = 'H', long, default_value = "72")]
    height: usize,

    /// Random seed (>= 1; uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Noise scale (larger = broader caves)
    #[arg(long, default_value = "27.0")]
    scale: f64,

    /// Number of noise octaves
    #[arg(long, default_value = "4")]
    octaves: u32,

    /// Amplitude decay per octave (0-1)
    #[arg(long, default_value = "0.5")]
    persistence: f64,

    /// Frequency growth per octave (>= 1)
    #[arg(long, default_value = "2.0")]
    lacunarity: f64,

    /// Noise below this becomes rock (0-1)
    #[arg(long, default_value = "0.5")]
    fill: f32,

    /// Rings near the edge probabilistically forced open
    #[arg(long, default_value = "4")]
    edge_smoothing: u32,

    /// Smoothing iterations per refinement round
    #[arg(long, default_value = "5")]
    smooth_iterations: u32,

    /// Solid regions smaller than this are opened
    #[arg(long, default_value = "50")]
    wall_threshold: usize,

    /// Open regions smaller than this are filled
    #[arg(long, default_value = "50")]
    cave_threshold: usize,

    /// Extra connections beyond the spanning tree
    #[arg(long, default_value = "0")]
    cycles: usize,

    /// Skip connections longer than this many cells
    #[arg(long)]
    max_connection_distance: Option<i64>,

    /// Corridor half-width
    #[arg(long, default_value = "1")]
    line_radius: i32,

    /// Keep only the largest cave after connecting
    #[arg(long)]
    keep_largest: bool,

    /// World-space size of one cell in the mesh
    #[arg(long, default_value = "1.0")]
    square_size: f32,

    /// Depth of the extruded wall skirt
    #[arg(long, default_value = "5.0")]
    wall_height: f32,

    /// Load all parameters from a JSON preset instead (overrides flags)
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Output path for the cave map PNG
    #[arg(long, default_value = "cave_map.png")]
    out_map: PathBuf,

    /// Export the raw noise field to a grayscale PNG
    #[arg(long)]
    out_noise: Option<PathBuf>,

    /// Export the cave and wall meshes to an OBJ file
    #[arg(long)]
    out_mesh: Option<PathBuf>,

    /// Export a biome map PNG (default biome palette)
    #[arg(long)]
    out_biomes: Option<PathBuf>,

    /// Export the blended biome height field to a grayscale PNG
    #[arg(long)]
    out_height: Option<PathBuf>,

    /// Coarse grid size for biome placement
    #[arg(long, default_value = "32")]
    biome_grid: i64,
}

fn main() {
    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), GenerationError> {
    let params = match &args.preset {
        Some(path) => MapParams::from_json_file(path)?,
        None => params_from_args(&args),
    };
    params.validate()?;

    println!("Generating cave with seed: {}", params.seed);
    println!("Map size: {}x{}", params.width, params.height);

    let world = world::generate(&params)?;

    let open = world.map.open_cell_count();
    println!(
        "Cave cells: {} open ({:.1}%)",
        open,
        100.0 * open as f64 / (params.width * params.height) as f64
    );
    println!(
        "Rooms: {} ({} connections, {} loops)",
        world.rooms.len(),
        world.report.connections.len(),
        world
            .report
            .connections
            .iter()
            .filter(|c| c.is_cycle)
            .count()
    );
    if world.report.isolated_rooms > 0 {
        println!(
            "Warning: {} rooms in {} components remain unreachable",
            world.report.isolated_rooms, world.report.components
        );
    }
    println!(
        "Mesh: {} vertices, {} triangles, {} outlines ({} wall triangles)",
        world.mesh.vertices.len(),
        world.mesh.triangles.len() / 3,
        world.mesh.outlines.len(),
        world.walls.triangles.len() / 3
    );

    export::export_occupancy(&world.map, &args.out_map)?;
    println!("Wrote {}", args.out_map.display());

    if let Some(path) = &args.out_noise {
        let field = generate_noise_field(params.width, params.height, params.seed, &params.noise)?;
        export::export_field(&field, path)?;
        println!("Wrote {}", path.display());
    }

    if let Some(path) = &args.out_mesh {
        export::write_mesh_obj(&world.mesh, &world.walls, path)?;
        println!("Wrote {}", path.display());
    }

    if args.out_biomes.is_some() || args.out_height.is_some() {
        let set = BiomeSet::default_set();
        let field_params = BiomeFieldParams {
            grid_size: args.biome_grid,
            ..BiomeFieldParams::default()
        };
        let sampler = BiomeSampler::new(params.seed, &set, field_params)?;

        if let Some(path) = &args.out_biomes {
            let map = sampler.biome_map(&set, params.width, params.height);
            export::export_biomes(&map, &set, path)?;
            println!("Wrote {}", path.display());
        }
        if let Some(path) = &args.out_height {
            let heights = sampler.height_field(&set, params.width, params.height);
            export::export_field(&heights, path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

fn params_from_args(args: &Args) -> MapParams {
    let seed = args.seed.unwrap_or_else(|| rand::random::<u64>().max(1));
    MapParams {
        width: args.width,
        height: args.height,
        seed,
        noise: noise_field::NoiseParams {
            scale: args.scale,
            octaves: args.octaves,
            persistence: args.persistence,
            lacunarity: args.lacunarity,
            offset: (0.0, 0.0),
        },
        fill_threshold: args.fill,
        edge_smoothing: args.edge_smoothing,
        smooth_iterations: args.smooth_iterations,
        wall_threshold: args.wall_threshold,
        cave_threshold: args.cave_threshold,
        cycles: args.cycles,
        max_connection_distance: args.max_connection_distance,
        line_radius: args.line_radius,
        keep_largest: args.keep_largest,
        square_size: args.square_size,
        wall_height: args.wall_height,
    }
}

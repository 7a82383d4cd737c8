//! uvbake - glTF lightmap-prep tool
//!
//! Flattens glTF scenes (single aggregated buffer, world-space vertices,
//! one node per primitive) and generates a unique UV set at TEXCOORD_4 for
//! downstream per-texel baking.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use uvbake::{ChartOptions, GridPacker, Pipeline, FILTER_TRIANGLES};

#[derive(Parser)]
#[command(name = "uvbake")]
#[command(about = "glTF lightmap-prep tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a scene: one buffer, world-space vertices, one node per primitive
    Flatten {
        /// Input .gltf/.glb file, or a directory containing one
        input: PathBuf,

        /// Output .gltf file (the binary payload is written alongside)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep non-triangle primitives instead of culling them
        #[arg(long)]
        all_topologies: bool,
    },

    /// Flatten and generate the baked UV set (TEXCOORD_4)
    Unwrap {
        /// Input .gltf/.glb file, or a directory containing one
        input: PathBuf,

        /// Output .gltf file (the binary payload is written alongside)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep non-triangle primitives instead of culling them
        #[arg(long)]
        all_topologies: bool,

        /// Atlas resolution in texels
        #[arg(long, default_value_t = 1024)]
        resolution: u32,

        /// Clearance around each chart in texels
        #[arg(long, default_value_t = 2)]
        padding: u32,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Flatten {
            input,
            output,
            all_topologies,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("flat.gltf"));
            let bin = output.with_extension("bin");
            tracing::info!("Flattening {:?} -> {:?}", input, output);

            let mut pipeline = Pipeline::new();
            let handle = pipeline.load(&input)?;
            let handle = pipeline.flatten(handle, flags(all_topologies))?;
            pipeline.save(handle, &output, &bin)?;
            tracing::info!("Done!");
        }

        Commands::Unwrap {
            input,
            output,
            all_topologies,
            resolution,
            padding,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension("baked.gltf"));
            let bin = output.with_extension("bin");
            tracing::info!("Unwrapping {:?} -> {:?}", input, output);

            let mut pipeline = Pipeline::new();
            let handle = pipeline.load(&input)?;
            let handle = pipeline.flatten(handle, flags(all_topologies))?;
            let options = ChartOptions {
                resolution,
                padding,
            };
            let handle = pipeline.parameterize_with(handle, &mut GridPacker::new(), &options)?;
            pipeline.save(handle, &output, &bin)?;
            tracing::info!("Done!");
        }
    }

    Ok(())
}

fn flags(all_topologies: bool) -> u32 {
    if all_topologies {
        0
    } else {
        FILTER_TRIANGLES
    }
}

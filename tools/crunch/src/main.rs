/// Operator CLI for the parts of the engine that run without an implicit
/// model: tunnel tube generation and mesh blob inspection.
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strata_core::ops::{compute_tunnel_meshes, TunnelMeshesData};
use strata_core::profile::JobProfile;
use strata_core::{CancelToken, MeshCodec, MeshFormat};

#[derive(Parser, Debug)]
#[command(name = "crunch", about = "Offline runner for strata-core computations")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate tunnel meshes from a tunnel payload JSON file.
    Tunnels {
        /// Path to the TunnelMeshesData payload.
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the generated OFF files.
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,

        /// Print the job profile report to stderr.
        #[arg(long)]
        profile: bool,
    },

    /// Inspect a mesh blob (OFF or Draco) and report its topology.
    MeshInfo {
        /// Path to the mesh file.
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();
    let codec = MeshCodec::default();

    match args.command {
        Command::Tunnels { input, out_dir, profile } => {
            let payload = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let data: TunnelMeshesData =
                serde_json::from_str(&payload).context("parsing tunnel payload")?;
            let mut job_profile = JobProfile::new("tunnel_meshes");
            let meshes: BTreeMap<String, Vec<u8>> = compute_tunnel_meshes(
                &data,
                &codec,
                MeshFormat::Off,
                &mut job_profile,
                &CancelToken::new(),
            )?;
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            for (name, bytes) in meshes {
                let path = out_dir.join(format!("{name}.off"));
                fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
                println!("{}", path.display());
            }
            if profile {
                eprintln!("{}", job_profile.report());
            }
        }
        Command::MeshInfo { input } => {
            let bytes =
                fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let mesh = codec.decode(&bytes)?;
            println!("vertices: {}", mesh.vertex_count());
            println!("faces:    {}", mesh.triangle_count());
            println!("closed:   {}", mesh.is_closed());
            if mesh.is_closed() {
                println!("volume:   {:.3}", mesh.signed_volume());
            }
        }
    }
    Ok(())
}

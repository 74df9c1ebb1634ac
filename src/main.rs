// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use eikonal_sp::batch::{BatchProgress, BatchRaytracer, Shot};
use eikonal_sp::cells::{CellLaw, CellParameter};
use eikonal_sp::grid::{Grid, GridConfig, SlownessModel};
use eikonal_sp::io;
use eikonal_sp::point::Point;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    Nodal,
    Isotropic,
    Elliptical,
    TiltedElliptical,
    VtiPsv,
    VtiSh,
}

impl Model {
    fn slowness_model(self) -> SlownessModel {
        match self {
            Model::Nodal => SlownessModel::Nodal,
            Model::Isotropic => SlownessModel::Cells(CellLaw::Isotropic),
            Model::Elliptical => SlownessModel::Cells(CellLaw::Elliptical),
            Model::TiltedElliptical => SlownessModel::Cells(CellLaw::TiltedElliptical),
            Model::VtiPsv => SlownessModel::Cells(CellLaw::VtiPsv),
            Model::VtiSh => SlownessModel::Cells(CellLaw::VtiSh),
        }
    }
}

#[derive(Parser)]
#[command(
    name = "eikonal-sp",
    about = "Shortest-path traveltime and ray tracing on regular grids"
)]
struct Cli {
    /// Dimensionality (2 or 3)
    #[arg(short = 'd', long)]
    dim: usize,

    /// Number of cells, comma-separated (e.g., 100,50 or 40,40,20)
    #[arg(short = 'c', long)]
    cells: String,

    /// Cell size, one value or one per axis
    #[arg(long, default_value = "1.0")]
    spacing: String,

    /// Grid origin, comma-separated (default: all zeros)
    #[arg(long, allow_hyphen_values = true)]
    origin: Option<String>,

    /// Secondary nodes per edge, one value or one per axis
    #[arg(long, default_value = "2")]
    secondary: String,

    /// Slowness law
    #[arg(long, value_enum, default_value = "nodal")]
    model: Model,

    /// Slowness field: "uniform:<val>", "gradient:<v0>,<g>" (velocity linear
    /// in the vertical axis), "slowness-file:<path>", or "velocity-file:<path>"
    #[arg(long, default_value = "uniform:1.0")]
    slowness: String,

    /// Uniform anisotropy ratio xi (elliptical laws)
    #[arg(long)]
    xi: Option<f64>,

    /// Uniform tilt angle in radians (tilted elliptical law)
    #[arg(long)]
    tilt: Option<f64>,

    /// Uniform Vp0 (VTI P/SV law)
    #[arg(long)]
    vp0: Option<f64>,

    /// Uniform Vs0 (VTI laws)
    #[arg(long)]
    vs0: Option<f64>,

    /// Uniform Thomsen epsilon (VTI P/SV law)
    #[arg(long)]
    epsilon: Option<f64>,

    /// Uniform Thomsen delta (VTI P/SV law)
    #[arg(long)]
    delta: Option<f64>,

    /// Uniform Thomsen gamma (VTI SH law)
    #[arg(long)]
    gamma: Option<f64>,

    /// Phase of the VTI P/SV law: 1 for P, anything else for SV
    #[arg(long)]
    phase: Option<i32>,

    /// Source coordinates, comma-separated (repeatable)
    #[arg(long, num_args = 1, allow_hyphen_values = true)]
    tx: Vec<String>,

    /// Receiver coordinates, comma-separated (repeatable)
    #[arg(long, num_args = 1, allow_hyphen_values = true)]
    rx: Vec<String>,

    /// Start time, one value or one per source
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    t0: String,

    /// Number of propagation slots (worker threads)
    #[arg(long, default_value = "1")]
    threads: usize,

    /// Output file for receiver times (.npy), one per (tx, rx) pair, tx-major
    #[arg(short = 'o', long, default_value = "times.npy")]
    output: PathBuf,

    /// Also write the ray-length matrix (.npy, one row per pair)
    #[arg(long)]
    lengths: Option<PathBuf>,

    /// Also write the primary-node travel-time field of all sources (.npy)
    #[arg(long)]
    field: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print a line to stderr after every finished source group
    #[arg(long)]
    progress: bool,
}

fn parse_list<T: std::str::FromStr>(s: &str, what: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{}: expected comma-separated values", what))
}

fn parse_array<T, const N: usize>(s: &str, what: &str, broadcast: bool) -> Result<[T; N]>
where
    T: std::str::FromStr + Copy,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let parts: Vec<T> = parse_list(s, what)?;
    if broadcast && parts.len() == 1 {
        return Ok([parts[0]; N]);
    }
    <[T; N]>::try_from(parts.as_slice())
        .map_err(|_| anyhow!("--{} has {} components but --dim is {}", what, parts.len(), N))
}

fn build_slowness<const N: usize>(mode: &str, grid: &Grid<N>) -> Result<Vec<f64>> {
    if let Some(val_str) = mode.strip_prefix("uniform:") {
        let val: f64 = val_str.parse().context("invalid uniform slowness value")?;
        if !val.is_finite() || val <= 0.0 {
            bail!("uniform slowness must be positive and finite, got {}", val);
        }
        let num: usize = io::slowness_shape(grid).iter().product();
        return Ok(vec![val; num]);
    }

    if let Some(params) = mode.strip_prefix("gradient:") {
        let parts: Vec<f64> = parse_list(params, "slowness")?;
        if parts.len() != 2 {
            bail!("gradient mode expects 'gradient:<v0>,<g>', got '{}'", mode);
        }
        let (v0, g) = (parts[0], parts[1]);

        // Sample depth at corners for the nodal law, at cell centers otherwise.
        let shape = io::slowness_shape(grid);
        let offset = match grid.model() {
            SlownessModel::Nodal => 0.0,
            SlownessModel::Cells(_) => 0.5,
        };
        let nz = shape[N - 1];
        let h = grid.spacing()[N - 1];
        let depth_v: Vec<f64> = (0..nz)
            .map(|k| v0 + g * (k as f64 + offset) * h)
            .collect();
        if let Some(v) = depth_v.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            bail!(
                "gradient: velocity {} must be positive and finite (v0={}, g={})",
                v,
                v0,
                g
            );
        }
        let num: usize = shape.iter().product();
        // the vertical axis varies fastest
        return Ok((0..num).map(|i| 1.0 / depth_v[i % nz]).collect());
    }

    let shape = io::slowness_shape(grid);
    if let Some(path_str) = mode.strip_prefix("slowness-file:") {
        return io::load_npy_slowness(Path::new(path_str), &shape)
            .with_context(|| format!("failed to load slowness from {}", path_str));
    }

    if let Some(path_str) = mode.strip_prefix("velocity-file:") {
        return io::load_velocity_as_slowness(Path::new(path_str), &shape)
            .with_context(|| format!("failed to load velocity from {}", path_str));
    }

    bail!(
        "unknown --slowness mode: '{}'. Expected 'uniform:<val>', 'gradient:<v0>,<g>', \
         'slowness-file:<path>', or 'velocity-file:<path>'",
        mode
    );
}

fn configure_model<const N: usize>(cli: &Cli, grid: &mut Grid<N>) -> Result<()> {
    if grid.parameter(CellParameter::Slowness).is_some() {
        let slowness = build_slowness(&cli.slowness, grid)?;
        grid.set_slowness(&slowness)?;
    }
    let uniform = [
        ("xi", CellParameter::Xi, cli.xi),
        ("tilt", CellParameter::TiltAngle, cli.tilt),
        ("vp0", CellParameter::Vp0, cli.vp0),
        ("vs0", CellParameter::Vs0, cli.vs0),
        ("epsilon", CellParameter::Epsilon, cli.epsilon),
        ("delta", CellParameter::Delta, cli.delta),
        ("gamma", CellParameter::Gamma, cli.gamma),
    ];
    for (flag, param, value) in uniform {
        if let Some(v) = value {
            grid.fill_parameter(param, v)
                .with_context(|| format!("cannot set --{}", flag))?;
        }
    }
    if let Some(phase) = cli.phase {
        grid.set_phase(phase)?;
    }
    Ok(())
}

fn run<const N: usize>(cli: &Cli) -> Result<()> {
    let cells: [usize; N] = parse_array(&cli.cells, "cells", false)?;
    let spacing: [f64; N] = parse_array(&cli.spacing, "spacing", true)?;
    let secondary: [usize; N] = parse_array(&cli.secondary, "secondary", true)?;

    let mut config = GridConfig::new(cells, spacing)
        .with_secondary_nodes(secondary)
        .with_threads(cli.threads)
        .with_model(cli.model.slowness_model());
    if let Some(origin) = &cli.origin {
        config = config.with_origin(parse_array(origin, "origin", false)?);
    }
    let mut grid = Grid::new(config)?;
    configure_model(cli, &mut grid)?;
    tracing::info!(
        n_nodes = grid.n_nodes(),
        n_cells = grid.n_cells(),
        "grid ready"
    );

    let tx: Vec<Point<N>> = cli
        .tx
        .iter()
        .map(|s| parse_array::<f64, N>(s, "tx", false).map(Point::new))
        .collect::<Result<_>>()?;
    let rx: Vec<Point<N>> = cli
        .rx
        .iter()
        .map(|s| parse_array::<f64, N>(s, "rx", false).map(Point::new))
        .collect::<Result<_>>()?;
    let mut t0: Vec<f64> = parse_list(&cli.t0, "t0")?;
    if t0.len() == 1 {
        t0 = vec![t0[0]; tx.len()];
    }
    if t0.len() != tx.len() {
        bail!("--t0 has {} values but {} --tx were given", t0.len(), tx.len());
    }

    let shots: Vec<Shot<N>> = tx
        .iter()
        .zip(&t0)
        .flat_map(|(&source, &t)| {
            rx.iter().map(move |&receiver| Shot {
                source,
                t0: t,
                receiver,
            })
        })
        .collect();

    let mut tracer = BatchRaytracer::new(&grid).with_lengths(cli.lengths.is_some());
    if cli.progress {
        tracer = tracer.with_progress(Box::new(|p: BatchProgress| {
            eprintln!(
                "[{:.1}s] source groups {}/{}",
                p.elapsed.as_secs_f64(),
                p.groups_done,
                p.n_groups
            );
        }));
    }
    let result = tracer.run(&shots)?;

    io::save_npy_values(&result.times, &cli.output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    if let (Some(path), Some(matrix)) = (&cli.lengths, &result.lengths) {
        io::save_npy_lengths(matrix, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    if let Some(path) = &cli.field {
        let field = grid.propagate(&tx, &t0, 0)?;
        io::save_npy_field(&field, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    tracing::info!(
        n_shots = shots.len(),
        output = %cli.output.display(),
        "raytracing finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.tx.is_empty() {
        bail!("at least one --tx must be specified");
    }
    if cli.rx.is_empty() {
        bail!("at least one --rx must be specified");
    }

    match cli.dim {
        2 => run::<2>(&cli),
        3 => run::<3>(&cli),
        other => bail!("--dim must be 2 or 3, got {}", other),
    }
}

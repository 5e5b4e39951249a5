//! Command-line sampling and copying of gridded raster datasets.

mod commands;
mod parse;

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use grid_sampler::{Crs, DimensionRange, ElementType, SamplerConfig, ZarrCompression};

use commands::{CopyRequest, PointMethod, PointQuery};
use parse::CoordinateList;

#[derive(Parser, Debug)]
#[command(name = "gridtool")]
#[command(about = "Sample and copy gridded raster datasets")]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the dataset geometry as JSON
    Info {
        path: PathBuf,
    },

    /// Nearest-cell values at points
    Nearest(PointArgs),

    /// Bilinearly interpolated values at points
    Interpolate(PointArgs),

    /// Sample points along a polyline
    Transect {
        path: PathBuf,

        /// Polyline vertices as "x,y;x,y"
        #[arg(long, value_parser = parse::coordinates)]
        vertices: CoordinateList,

        /// CRS of the vertices (default: the dataset CRS)
        #[arg(long, value_parser = parse::crs)]
        crs: Option<Crs>,

        /// Spacing in metres (default: derived from the cell size)
        #[arg(long)]
        spacing: Option<f64>,

        /// Also print the nearest value at each point
        #[arg(long)]
        values: bool,
    },

    /// Copy a dataset with optional subsetting and transcoding
    Copy {
        input: PathBuf,
        output: PathBuf,

        /// Data variable chunking as "rows,cols"
        #[arg(long, value_parser = parse::chunking)]
        chunking: Option<[usize; 2]>,

        /// Store y north to south (true) or south to north (false)
        #[arg(long)]
        invert_y: Option<bool>,

        /// Compression codec
        #[arg(long, default_value = "blosc_zstd")]
        compression: ZarrCompression,

        /// Compression level (1-9)
        #[arg(long, default_value_t = 4)]
        level: u8,

        /// Dimension range as "dim=start:end" (repeatable)
        #[arg(long = "range", value_parser = parse::dimension_range)]
        ranges: Vec<(String, DimensionRange)>,

        /// Element type mapping as "from=to" (repeatable)
        #[arg(long = "dtype", value_parser = parse::datatype_mapping)]
        datatypes: Vec<(ElementType, ElementType)>,
    },
}

#[derive(Args, Debug)]
struct PointArgs {
    path: PathBuf,

    /// Query points as "x,y;x,y"
    #[arg(long, value_parser = parse::coordinates)]
    coords: CoordinateList,

    /// CRS of the query points (default: the dataset CRS)
    #[arg(long, value_parser = parse::crs)]
    crs: Option<Crs>,

    /// Byte budget per fetch batch
    #[arg(long, env = "GRID_MAX_BYTES")]
    max_bytes: Option<usize>,

    /// Variable to sample (default: the primary data variable)
    #[arg(long)]
    variable: Option<String>,
}

impl PointArgs {
    fn query(self) -> (PathBuf, PointQuery) {
        (
            self.path,
            PointQuery {
                coords: self.coords.0,
                crs: self.crs,
                max_bytes: self.max_bytes,
                variable: self.variable,
            },
        )
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let config = SamplerConfig::from_env();
    debug!(?config, "Loaded configuration");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match cli.command {
        Command::Info { path } => commands::summary(&path, config, &mut out)?,
        Command::Nearest(args) => {
            let (path, query) = args.query();
            commands::points(&path, config, PointMethod::Nearest, &query, &mut out)?
        }
        Command::Interpolate(args) => {
            let (path, query) = args.query();
            commands::points(&path, config, PointMethod::Interpolated, &query, &mut out)?
        }
        Command::Transect {
            path,
            vertices,
            crs,
            spacing,
            values,
        } => commands::transect(
            &path,
            config,
            &vertices.0,
            crs.as_ref(),
            spacing,
            values,
            &mut out,
        )?,
        Command::Copy {
            input,
            output,
            chunking,
            invert_y,
            compression,
            level,
            ranges,
            datatypes,
        } => {
            let request = CopyRequest {
                chunking,
                invert_y,
                compression,
                level,
                ranges,
                datatypes,
            };
            commands::copy(&input, &output, &request, &mut out)?
        }
    }

    out.flush()?;
    Ok(())
}

//! FlowTrace CLI - D8 hydrology from the command line

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use flowtrace_algorithms::hydrology::{
    flow_accumulation, longest_flow_paths, resolve_outlets, stream_lines, subaccumulation,
    subwatersheds, AccumulationParams, ConfluenceMode, DirectionEncoding, FlowGrid,
    LongestFlowPathParams, OutletCell, StreamParams, Traversal,
};
use flowtrace_core::io::{
    parse_coordinates, read_geotiff, read_outlets_geojson, write_geotiff, write_lines_geojson,
};
use flowtrace_core::{LineCollection, Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "flowtrace")]
#[command(author, version, about = "Hydrology over D8 flow direction grids", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Flow accumulation (cell count or weighted sum)
    Accumulate {
        /// Flow direction raster
        input: PathBuf,
        /// Output accumulation raster
        output: PathBuf,
        /// Direction encoding of the input
        #[arg(short, long, value_enum, default_value_t = EncodingArg::Auto)]
        format: EncodingArg,
        /// Weight raster summed instead of counting cells
        #[arg(short, long)]
        weight: Option<PathBuf>,
        /// Negate cells whose upstream area may extend past the grid
        #[arg(short, long)]
        negative: bool,
        /// Write 0 instead of null for no-flow cells without inflow
        #[arg(short, long)]
        zero: bool,
        #[command(flatten)]
        traversal: TraversalArgs,
    },
    /// Remove the area above each outlet from an accumulation raster
    Subaccumulate {
        /// Flow direction raster
        input: PathBuf,
        /// Accumulation raster computed from the same directions
        accumulation: PathBuf,
        /// Output subaccumulation raster
        output: PathBuf,
        /// Direction encoding of the input
        #[arg(short, long, value_enum, default_value_t = EncodingArg::Auto)]
        format: EncodingArg,
        #[command(flatten)]
        outlets: OutletArgs,
    },
    /// Label the subwatershed draining to each outlet
    Subwatersheds {
        /// Flow direction raster
        input: PathBuf,
        /// Output subwatershed id raster
        output: PathBuf,
        /// Direction encoding of the input
        #[arg(short, long, value_enum, default_value_t = EncodingArg::Auto)]
        format: EncodingArg,
        #[command(flatten)]
        outlets: OutletArgs,
        #[command(flatten)]
        traversal: TraversalArgs,
    },
    /// Extract stream lines as GeoJSON
    Streams {
        /// Flow direction raster
        input: PathBuf,
        /// Accumulation raster computed from the same directions
        accumulation: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Direction encoding of the input
        #[arg(short, long, value_enum, default_value_t = EncodingArg::Auto)]
        format: EncodingArg,
        /// Minimum accumulation of a stream cell
        #[arg(short, long, default_value_t = 1000.0)]
        threshold: f64,
        /// Follow the main branch through confluences instead of splitting
        #[arg(short, long)]
        continuous: bool,
    },
    /// Longest flow path above each outlet as GeoJSON
    LongestFlowPath {
        /// Flow direction raster
        input: PathBuf,
        /// Unweighted accumulation raster computed from the same directions
        accumulation: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Direction encoding of the input
        #[arg(short, long, value_enum, default_value_t = EncodingArg::Auto)]
        format: EncodingArg,
        #[command(flatten)]
        outlets: OutletArgs,
        #[command(flatten)]
        traversal: TraversalArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EncodingArg {
    /// Detect from the largest value
    Auto,
    /// Degrees, multiples of 45
    Degree,
    /// 1..8 counter-clockwise from NE
    #[value(name = "degree45")]
    Degree45,
    /// Powers of two clockwise from E
    #[value(name = "power2")]
    Power2,
    /// 1..8 counter-clockwise from NE
    Compass,
}

impl From<EncodingArg> for DirectionEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Auto => DirectionEncoding::Auto,
            EncodingArg::Degree => DirectionEncoding::Degree,
            EncodingArg::Degree45 => DirectionEncoding::Degree45,
            EncodingArg::Power2 => DirectionEncoding::Power2,
            EncodingArg::Compass => DirectionEncoding::Compass,
        }
    }
}

#[derive(Args, Debug)]
struct OutletArgs {
    /// Outlet coordinates as "x,y[,id];x,y[,id];..."
    #[arg(long, conflicts_with = "outlets", required_unless_present = "outlets")]
    coordinates: Option<String>,
    /// GeoJSON file of outlet points
    #[arg(long)]
    outlets: Option<PathBuf>,
    /// Integer property holding the outlet id
    #[arg(long, requires = "outlets")]
    id_field: Option<String>,
}

#[derive(Args, Debug)]
struct TraversalArgs {
    /// Traverse recursively instead of with an explicit stack
    #[arg(short, long)]
    recursive: bool,
    /// Recursion depth limit
    #[arg(long, default_value_t = Traversal::DEFAULT_MAX_DEPTH, requires = "recursive")]
    max_depth: usize,
}

impl TraversalArgs {
    fn traversal(&self) -> Traversal {
        if self.recursive {
            Traversal::Recursive {
                max_depth: self.max_depth,
            }
        } else {
            Traversal::Iterative
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_flow(path: &Path, format: EncodingArg) -> Result<FlowGrid> {
    let pb = spinner("Reading flow directions...");
    let raw: Raster<i32> = read_geotiff(path).context("Failed to read flow direction raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raw.cols(), raw.rows());
    FlowGrid::from_raster(&raw, format.into()).context("Failed to decode flow directions")
}

fn read_values(path: &Path, what: &str) -> Result<Raster<f64>> {
    let pb = spinner(&format!("Reading {}...", what));
    let raster: Raster<f64> =
        read_geotiff(path).with_context(|| format!("Failed to read {} raster", what))?;
    pb.finish_and_clear();
    Ok(raster)
}

fn read_outlets(args: &OutletArgs, flow: &FlowGrid) -> Result<Vec<OutletCell>> {
    let points = match (&args.coordinates, &args.outlets) {
        (Some(text), _) => parse_coordinates(text).context("Invalid outlet coordinates")?,
        (None, Some(path)) => read_outlets_geojson(path, args.id_field.as_deref())
            .context("Failed to read outlets")?,
        (None, None) => anyhow::bail!("Either --coordinates or --outlets is required"),
    };
    let cells = resolve_outlets(&points, flow);
    if cells.is_empty() {
        anyhow::bail!("No outlet falls inside the flow direction grid");
    }
    info!("Outlets: {} of {} inside the grid", cells.len(), points.len());
    Ok(cells)
}

fn write_raster<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_lines(lines: &LineCollection, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_lines_geojson(path, lines.iter()).context("Failed to write output")?;
    pb.finish_and_clear();
    info!("Lines: {}", lines.len());
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Accumulate {
            input,
            output,
            format,
            weight,
            negative,
            zero,
            traversal,
        } => {
            let flow = read_flow(&input, format)?;
            let weight = weight
                .as_deref()
                .map(|path| read_values(path, "weight"))
                .transpose()?;
            let params = AccumulationParams {
                negative,
                zero,
                traversal: traversal.traversal(),
            };
            let start = Instant::now();
            let result = flow_accumulation(&flow, weight.as_ref(), params)
                .context("Failed to calculate flow accumulation")?;
            let elapsed = start.elapsed();
            write_raster(&result, &output)?;
            done("Flow accumulation", &output, elapsed);
        }

        Commands::Subaccumulate {
            input,
            accumulation,
            output,
            format,
            outlets,
        } => {
            let flow = read_flow(&input, format)?;
            let mut accum = read_values(&accumulation, "accumulation")?;
            let cells = read_outlets(&outlets, &flow)?;
            let start = Instant::now();
            subaccumulation(&flow, &mut accum, &cells).context("Failed to calculate subaccumulation")?;
            let elapsed = start.elapsed();
            write_raster(&accum, &output)?;
            done("Subaccumulation", &output, elapsed);
        }

        Commands::Subwatersheds {
            input,
            output,
            format,
            outlets,
            traversal,
        } => {
            let flow = read_flow(&input, format)?;
            let cells = read_outlets(&outlets, &flow)?;
            let start = Instant::now();
            let result = subwatersheds(flow, &cells, traversal.traversal())
                .context("Failed to delineate subwatersheds")?;
            let elapsed = start.elapsed();
            write_raster(&result, &output)?;
            done("Subwatersheds", &output, elapsed);
        }

        Commands::Streams {
            input,
            accumulation,
            output,
            format,
            threshold,
            continuous,
        } => {
            let flow = read_flow(&input, format)?;
            let accum = read_values(&accumulation, "accumulation")?;
            let params = StreamParams {
                threshold,
                confluence: if continuous {
                    ConfluenceMode::Continuous
                } else {
                    ConfluenceMode::Split
                },
            };
            let start = Instant::now();
            let lines = stream_lines(&flow, &accum, params).context("Failed to extract streams")?;
            let elapsed = start.elapsed();
            write_lines(&lines, &output)?;
            done("Stream lines", &output, elapsed);
        }

        Commands::LongestFlowPath {
            input,
            accumulation,
            output,
            format,
            outlets,
            traversal,
        } => {
            let flow = read_flow(&input, format)?;
            let accum = read_values(&accumulation, "accumulation")?;
            let cells = read_outlets(&outlets, &flow)?;
            let params = LongestFlowPathParams {
                traversal: traversal.traversal(),
            };
            let start = Instant::now();
            let lines = longest_flow_paths(&flow, &accum, &cells, params)
                .context("Failed to find longest flow paths")?;
            let elapsed = start.elapsed();
            write_lines(&lines, &output)?;
            done("Longest flow paths", &output, elapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("flowtrace").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_accumulate_flags() {
        let cli = parse(&["accumulate", "fdr.tif", "acc.tif", "-f", "power2", "-n", "-z", "-r"]);
        let Commands::Accumulate {
            format,
            negative,
            zero,
            weight,
            traversal,
            ..
        } = cli.command
        else {
            panic!("expected accumulate");
        };
        assert_eq!(format, EncodingArg::Power2);
        assert!(negative && zero);
        assert!(weight.is_none());
        assert_eq!(
            traversal.traversal(),
            Traversal::Recursive {
                max_depth: Traversal::DEFAULT_MAX_DEPTH
            }
        );
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["streams", "fdr.tif", "acc.tif", "streams.geojson"]);
        let Commands::Streams {
            format,
            threshold,
            continuous,
            ..
        } = cli.command
        else {
            panic!("expected streams");
        };
        assert_eq!(format, EncodingArg::Auto);
        assert_eq!(threshold, 1000.0);
        assert!(!continuous);
    }

    #[test]
    fn test_outlets_are_required() {
        let args = ["flowtrace", "subwatersheds", "fdr.tif", "ws.tif"];
        assert!(Cli::try_parse_from(args).is_err());

        let both = [
            "flowtrace",
            "subwatersheds",
            "fdr.tif",
            "ws.tif",
            "--coordinates",
            "1,2",
            "--outlets",
            "o.geojson",
        ];
        assert!(Cli::try_parse_from(both).is_err());

        let cli = parse(&["subwatersheds", "fdr.tif", "ws.tif", "--coordinates", "1,2,3"]);
        let Commands::Subwatersheds { outlets, traversal, .. } = cli.command else {
            panic!("expected subwatersheds");
        };
        assert_eq!(outlets.coordinates.as_deref(), Some("1,2,3"));
        assert_eq!(traversal.traversal(), Traversal::Iterative);
    }

    #[test]
    fn test_max_depth_needs_recursive() {
        let args = [
            "flowtrace",
            "longest-flow-path",
            "fdr.tif",
            "acc.tif",
            "lfp.geojson",
            "--coordinates",
            "1,2",
            "--max-depth",
            "10",
        ];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(EncodingArg::from_str("degree45", false).unwrap(), EncodingArg::Degree45);
        assert_eq!(
            DirectionEncoding::from(EncodingArg::Compass),
            DirectionEncoding::Compass
        );
    }
}

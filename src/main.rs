use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use surveygraph::config::OutputFormat;
use surveygraph::logging::{init_logging, LogConfig};
use surveygraph::runtime::{self, PlotType, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "surveygraph")]
#[command(about = "Generate bar, line, histogram and timeline plots from survey data", long_about = None)]
struct Args {
    #[arg(help = "Data files (CSV), one per dataset")]
    data: Vec<PathBuf>,

    #[arg(short = 'c', long = "codebook", required = true, help = "Codebook file (CSV)")]
    codebook: PathBuf,

    #[arg(long = "config", required = true, help = "Configuration file (TOML)")]
    config: PathBuf,

    #[arg(
        short = 'l',
        long = "labels",
        num_args = 1..,
        help = "Dataset labels, one per data file (defaults to the file names)"
    )]
    labels: Vec<String>,

    #[arg(
        short = 'p',
        long = "plot-type",
        value_enum,
        num_args = 1..,
        default_values_t = [PlotType::Bar],
        help = "Plot types to create"
    )]
    plot_types: Vec<PlotType>,

    #[arg(short = 'f', long = "format", value_enum, help = "Output format (overrides the configuration)")]
    format: Option<OutputFormat>,

    #[arg(short = 'o', long = "output-name", default_value = "surveygraph", help = "Name of the run")]
    output_name: String,

    #[arg(long = "output-dir", default_value = ".", help = "Directory that receives the run directory")]
    output_dir: PathBuf,

    #[arg(long = "full-rerun", help = "Ignore cached configuration, codebook and data")]
    full_rerun: bool,

    #[arg(long = "no-cache", help = "Neither read nor write cached copies")]
    no_cache: bool,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help = "More log output")]
    verbose: u8,

    #[arg(short = 'q', long = "quiet", action = clap::ArgAction::Count, help = "Less log output")]
    quiet: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_config = LogConfig::from_verbosity(args.verbose, args.quiet)
        .with_ansi(std::io::stderr().is_terminal());
    init_logging(&log_config);

    let options = RunOptions {
        data: args.data,
        labels: args.labels,
        codebook: args.codebook,
        config: args.config,
        plot_types: args.plot_types,
        format: args.format,
        output_name: args.output_name,
        output_dir: args.output_dir,
        full_rerun: args.full_rerun,
        no_cache: args.no_cache,
    };

    let written = runtime::run(&options).context("Failed to create plots")?;
    for path in written {
        println!("{}", path.display());
    }

    Ok(())
}

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pricewatch", version)]
#[command(about = "Cheapest Mercado Libre listings for an item, with an optional price recommendation")]
pub struct Cli {
    /// YAML config file (default: ./pricewatch.yaml, then the user config dir)
    #[arg(long, global = true, env = "PRICEWATCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log encoding, overrides `logging.format`
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Debug logging, mirrored to stderr
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search one item and print its ten cheapest listings
    Search {
        #[arg(required = true, num_args = 1.., value_name = "QUERY")]
        query: Vec<String>,
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Print the result as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Read one query per line from stdin until `exit`, `quit` or EOF
    Interactive {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Price every row of a CSV file
    Batch {
        #[arg(value_name = "INPUT.csv")]
        input: PathBuf,
        /// Output CSV (default: stdout)
        #[arg(short, long, value_name = "OUTPUT.csv")]
        output: Option<PathBuf>,
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// List the known selector sets
    Selectors,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Which fields a listing needs to be kept
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Selector set version, overrides `extraction.selector_set`
    #[arg(long = "selectors", value_name = "VERSION")]
    pub selectors: Option<String>,

    /// Skip the price recommendation
    #[arg(long)]
    pub no_recommend: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    PriceOnly,
    NamePriceUrl,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Text,
    Json,
}

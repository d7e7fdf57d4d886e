use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "known-defects")]
#[command(about = "Report methods marked @KnownDefect or @KnownAndAcceptedDefect in compiled classes")]
pub struct Cli {
    /// Class directories or jar files to scan, in order.
    #[arg(value_name = "ROOT")]
    pub roots: Vec<PathBuf>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Extra package prefix to skip (repeatable).
    #[arg(long = "ignore", value_name = "PREFIX")]
    pub ignore: Vec<String>,

    /// Do not skip java, javax, sun, com.sun and javassist classes.
    #[arg(long)]
    pub no_default_ignores: bool,

    #[arg(long)]
    pub follow_links: bool,

    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

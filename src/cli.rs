//! Command-line interface definitions using clap

use clap::Parser;

/// shortvault - short-code storage with asynchronous deletion
#[derive(Parser, Debug)]
#[command(name = "shortvault")]
#[command(version)]
#[command(about = "Short-code storage with asynchronous deletion", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short = 'c', default_value = "config.toml")]
    pub config: String,

    /// Print a sample configuration file and exit
    #[arg(long)]
    pub print_config: bool,
}

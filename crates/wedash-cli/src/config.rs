use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// CLI for wedash
#[derive(Parser, Debug)]
#[command(name = "wedash", version, about = "Terminal dashboard for local services")]
pub struct Cli {
    /// Directory to scan for services; may be repeated (default: current directory)
    #[arg(short, long = "root", value_name = "PATH")]
    pub roots: Vec<PathBuf>,

    /// How many directory levels below a root are scanned
    #[arg(long, default_value_t = 5)]
    pub max_depth: usize,

    /// Number of lines shown by the "last logs" action
    #[arg(long, default_value_t = 200)]
    pub last: usize,

    /// Columns of the service table
    #[arg(long, value_enum, default_value_t = Columns::Minimal)]
    pub columns: Columns,

    /// Print a status snapshot and exit
    #[arg(long)]
    pub list: bool,

    /// Write diagnostics to this file while the dashboard runs
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Debug-level diagnostics
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        if self.roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.roots.clone()
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Columns {
    /// Status, service and pid
    #[default]
    Minimal,
    /// Also unit, project, log path and last update
    Full,
}

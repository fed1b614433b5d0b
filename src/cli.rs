//! CLI argument parsing for the wsr-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::FormKind;

#[derive(Parser)]
#[command(name = "wsr-worker", about = "Weekly status report intake worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Load, validate and print the active column mapping
    CheckColumns,
    /// Run a JSON batch file through the submission pipeline
    Submit {
        /// Which grid form the batch came from
        #[arg(long, value_enum)]
        kind: FormArg,
        /// JSON file holding an array of rows keyed by column label
        #[arg(long)]
        file: PathBuf,
        /// Recorded as the submitter on every created row
        #[arg(long)]
        entered_by: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormArg {
    Weekly,
    Accomplishments,
}

impl From<FormArg> for FormKind {
    fn from(arg: FormArg) -> Self {
        match arg {
            FormArg::Weekly => FormKind::WeeklyReport,
            FormArg::Accomplishments => FormKind::Accomplishments,
        }
    }
}
